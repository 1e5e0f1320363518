// OAuth2 token endpoint calls

use reqwest::Client;

use super::types::{Credentials, Grant, TokenPayload};
use crate::error::{Error, Result};

/// Scope requested by the password grant
const PASSWORD_SCOPE: &str = "read write executive";

/// OAuth2 token endpoint plus the client credentials it expects
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    client: Client,
    url: String,
    client_id: String,
    client_secret: String,
}

impl TokenEndpoint {
    pub fn new(client: Client, url: String, client_id: String, client_secret: String) -> Self {
        Self {
            client,
            url,
            client_id,
            client_secret,
        }
    }

    /// Form fields for a grant
    fn form<'a>(&'a self, grant: &Grant<'a>) -> Vec<(&'static str, &'a str)> {
        let mut form = vec![
            ("grant_type", grant.grant_type()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        match *grant {
            Grant::Password { username, password } => {
                form.push(("username", username));
                form.push(("password", password));
                form.push(("scope", PASSWORD_SCOPE));
            }
            Grant::AuthorizationCode { code, redirect_uri } => {
                form.push(("code", code));
                form.push(("redirect_uri", redirect_uri));
            }
            Grant::RefreshToken { refresh_token } => {
                form.push(("refresh_token", refresh_token));
            }
        }

        form
    }

    /// POST a grant and return the validated token pair
    pub async fn request(&self, grant: &Grant<'_>) -> Result<Credentials> {
        let grant_type = grant.grant_type();
        tracing::debug!(url = %self.url, grant_type, "Requesting token");

        let response = self
            .client
            .post(&self.url)
            .header("Accept", "application/json")
            .form(&self.form(grant))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                grant_type,
                status = status.as_u16(),
                body = %body,
                "Token request failed"
            );

            // OAuth error bodies carry error / error_description
            if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(&body) {
                if let Some(error_code) = error_json.get("error").and_then(|v| v.as_str()) {
                    tracing::debug!(
                        error = error_code,
                        description = error_json
                            .get("error_description")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default(),
                        "OAuth error details"
                    );
                }
            }

            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let payload: TokenPayload = serde_json::from_str(&body)?;
        let credentials = payload.into_credentials()?;

        tracing::info!(grant_type, "Token granted");
        Ok(credentials)
    }
}
