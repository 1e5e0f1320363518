use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::auth::{TokenManager, MAX_ATTEMPTS};
use crate::error::{Error, Result};

/// Bearer-authenticated HTTP client for the Simple In/Out API
///
/// Every GET is retried at most once, and only after a 401 has been answered
/// with a token refresh. Other failures surface immediately.
pub struct ApiClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Service root, without trailing slash
    base_url: String,

    /// Token manager
    tokens: Arc<TokenManager>,
}

impl ApiClient {
    pub fn new(client: Client, base_url: impl Into<String>, tokens: Arc<TokenManager>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with `query` and return the decoded JSON body
    pub async fn get<Q>(&self, path: &str, query: &Q) -> Result<Value>
    where
        Q: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 1;

        loop {
            let token = match self.tokens.access_token().await {
                Some(token) => token,
                None if self.tokens.has_store() => {
                    tracing::warn!("No access token held, loading credentials from store");
                    self.tokens.load_from_store().await?.access_token
                }
                None => return Err(Error::NoAccessToken),
            };

            tracing::debug!(
                url = %url,
                attempt,
                max_attempts = MAX_ATTEMPTS,
                "Executing request attempt"
            );

            match self.send(&url, query, &token).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_unauthorized() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(path, "Received 401, refreshing token and retrying...");
                    self.tokens.refresh().await?;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        path,
                        attempt,
                        error = %e,
                        "Request failed"
                    );
                    return Err(e.context(format!("Get {}", path)));
                }
            }
        }
    }

    /// One request, no retry
    async fn send<Q>(&self, url: &str, query: &Q, token: &str) -> Result<Value>
    where
        Q: Serialize + ?Sized,
    {
        let response = self
            .client
            .get(url)
            .query(query)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                // Categorize the error for better debugging
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection_failed"
                } else if e.is_request() {
                    "request_error"
                } else {
                    "unknown"
                };
                tracing::warn!(error_kind, error = %e, url, "HTTP request error");
                Error::Transport(e)
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
