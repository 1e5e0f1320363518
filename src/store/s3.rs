// S3-backed credential store
// Signs single-object GET/PUT requests with AWS Signature Version 4

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Url};
use sha2::{Digest, Sha256};

use super::{CredentialStore, StoreError};

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "s3";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

/// Where the credentials object lives
#[derive(Debug, Clone, PartialEq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
    pub region: String,
    /// S3-compatible endpoint; when set, path-style addressing is used
    pub endpoint: Option<String>,
}

impl S3Location {
    /// Object URL, virtual-hosted on AWS or path-style on a custom endpoint
    fn object_url(&self) -> Result<Url, StoreError> {
        let key = self
            .key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let raw = match &self.endpoint {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.bucket,
                key
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        };

        Url::parse(&raw).map_err(|e| StoreError::Backend(format!("Invalid S3 URL {}: {}", raw, e)))
    }
}

/// Headers produced by signing one request
#[derive(Debug)]
struct SignedRequest {
    authorization: String,
    amz_date: String,
    content_sha256: String,
}

/// Credential store holding one JSON object in an S3 bucket
pub struct S3CredentialStore {
    client: Client,
    access_key_id: String,
    secret_access_key: String,
    location: S3Location,
    url: Url,
}

impl S3CredentialStore {
    pub fn new(
        client: Client,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        location: S3Location,
    ) -> Result<Self, StoreError> {
        let url = location.object_url()?;
        Ok(Self {
            client,
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            location,
            url,
        })
    }

    fn sign(&self, method: &str, payload: &[u8], now: DateTime<Utc>) -> SignedRequest {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let content_sha256 = hex::encode(Sha256::digest(payload));

        let host = match self.url.port() {
            Some(port) => format!("{}:{}", self.url.host_str().unwrap_or_default(), port),
            None => self.url.host_str().unwrap_or_default().to_string(),
        };

        let canonical_request = format!(
            "{method}\n{path}\n\nhost:{host}\nx-amz-content-sha256:{content_sha256}\nx-amz-date:{amz_date}\n\n{SIGNED_HEADERS}\n{content_sha256}",
            path = self.url.path(),
        );

        let scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.location.region, SERVICE
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = derive_signing_key(
            &self.secret_access_key,
            &date_stamp,
            &self.location.region,
            SERVICE,
        );
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        SignedRequest {
            authorization: format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM, self.access_key_id, scope, SIGNED_HEADERS, signature
            ),
            amz_date,
            content_sha256,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = status.as_u16(), body = %body, "S3 request failed");
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl CredentialStore for S3CredentialStore {
    async fn get(&self) -> Result<String, StoreError> {
        tracing::debug!(url = %self.url, "Reading credentials object from S3");
        let signed = self.sign("GET", b"", Utc::now());

        let response = self
            .client
            .get(self.url.clone())
            .header("Authorization", signed.authorization)
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.content_sha256)
            .send()
            .await?;

        let response = Self::check(response).await?;
        Ok(response.text().await?)
    }

    async fn put(&self, blob: String) -> Result<(), StoreError> {
        tracing::debug!(url = %self.url, "Writing credentials object to S3");
        let signed = self.sign("PUT", blob.as_bytes(), Utc::now());

        let response = self
            .client
            .put(self.url.clone())
            .header("Authorization", signed.authorization)
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.content_sha256)
            .header("Content-Type", "application/json")
            .body(blob)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    fn location(&self) -> String {
        format!("s3://{}/{}", self.location.bucket, self.location.key)
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// SigV4 signing key: HMAC chain over date, region, service
fn derive_signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn location(endpoint: Option<&str>) -> S3Location {
        S3Location {
            bucket: "creds-bucket".to_string(),
            key: "simpleinout/credentials.json".to_string(),
            region: "us-east-1".to_string(),
            endpoint: endpoint.map(str::to_string),
        }
    }

    #[test]
    fn test_signing_key_reference_vector() {
        // AWS documentation example for deriving a signing key
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_virtual_hosted_url() {
        let url = location(None).object_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://creds-bucket.s3.us-east-1.amazonaws.com/simpleinout/credentials.json"
        );
    }

    #[test]
    fn test_path_style_url_encodes_key() {
        let mut loc = location(Some("http://localhost:9000/"));
        loc.key = "tokens/my key.json".to_string();
        let url = loc.object_url().unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/creds-bucket/tokens/my%20key.json"
        );
    }

    #[test]
    fn test_sign_header_shape() {
        let store = S3CredentialStore::new(Client::new(), "AKIDEXAMPLE", "secret", location(None))
            .unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 0).unwrap();
        let signed = store.sign("GET", b"", now);

        assert_eq!(signed.amz_date, "20240309T123000Z");
        // SHA-256 of the empty payload
        assert_eq!(
            signed.content_sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert!(signed.authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240309/us-east-1/s3/aws4_request, SignedHeaders=host;x-amz-content-sha256;x-amz-date, Signature="
        ));
        let signature = signed.authorization.rsplit('=').next().unwrap();
        assert_eq!(signature.len(), 64);

        // Signing is deterministic for identical input
        let again = store.sign("GET", b"", now);
        assert_eq!(signed.authorization, again.authorization);
        // and sensitive to the method
        let put = store.sign("PUT", b"", now);
        assert_ne!(signed.authorization, put.authorization);
    }

    #[tokio::test]
    async fn test_put_then_get_against_mock() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{"access_token":"A","refresh_token":"B"}"#;

        let put = server
            .mock("PUT", "/creds-bucket/simpleinout/credentials.json")
            .match_header(
                "authorization",
                mockito::Matcher::Regex("^AWS4-HMAC-SHA256 Credential=AKID/".to_string()),
            )
            .match_header("x-amz-date", mockito::Matcher::Any)
            .match_body(body)
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let get = server
            .mock("GET", "/creds-bucket/simpleinout/credentials.json")
            .match_header("x-amz-content-sha256", mockito::Matcher::Any)
            .with_status(200)
            .with_body(body)
            .expect(1)
            .create_async()
            .await;

        let store =
            S3CredentialStore::new(Client::new(), "AKID", "secret", location(Some(&server.url())))
                .unwrap();
        store.put(body.to_string()).await.unwrap();
        assert_eq!(store.get().await.unwrap(), body);

        put.assert_async().await;
        get.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_reports_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/creds-bucket/simpleinout/credentials.json")
            .with_status(403)
            .with_body("AccessDenied")
            .create_async()
            .await;

        let store =
            S3CredentialStore::new(Client::new(), "AKID", "secret", location(Some(&server.url())))
                .unwrap();
        match store.get().await.unwrap_err() {
            StoreError::Status { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "AccessDenied");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.location(), "s3://creds-bucket/simpleinout/credentials.json");
    }
}
