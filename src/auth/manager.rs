use std::sync::Arc;
use tokio::sync::RwLock;

use super::credentials::{decode_blob, encode_blob, redact};
use super::grants::TokenEndpoint;
use super::types::{Credentials, Grant, TokenPayload, TokenState};
use crate::error::{Error, Result};
use crate::store::CredentialStore;

/// Upper bound on attempts for any single logical call (one original try plus
/// one retry after a refresh or store reload)
pub const MAX_ATTEMPTS: u32 = 2;

/// Token manager
/// Owns the in-memory token pair and every transition of it.
///
/// The pair is read and replaced under a short-lived lock that is never held
/// across network I/O. Refresh is not single-flight: concurrent callers that
/// all see a 401 will each refresh, and the last response wins.
pub struct TokenManager {
    /// Current token pair
    state: RwLock<TokenState>,

    /// OAuth token endpoint
    endpoint: TokenEndpoint,

    /// Optional shared store, consulted only on fallback edges
    store: Option<Arc<dyn CredentialStore>>,
}

impl TokenManager {
    pub fn new(
        endpoint: TokenEndpoint,
        access_token: Option<String>,
        refresh_token: Option<String>,
        store: Option<Arc<dyn CredentialStore>>,
    ) -> Self {
        // Seed tokens only count as a pair; half a pair leaves the client
        // unauthenticated
        let state = match (access_token, refresh_token) {
            (Some(access_token), Some(refresh_token)) => TokenState {
                access_token: Some(access_token),
                refresh_token: Some(refresh_token),
            },
            (None, None) => TokenState::default(),
            _ => {
                tracing::warn!(
                    "Ignoring seed token: access and refresh tokens must be given together"
                );
                TokenState::default()
            }
        };

        Self {
            state: RwLock::new(state),
            endpoint,
            store,
        }
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state.read().await.access_token.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.state.read().await.refresh_token.clone()
    }

    /// Current pair, if both tokens are held
    pub async fn credentials(&self) -> Option<Credentials> {
        self.state.read().await.credentials()
    }

    /// Acquire a pair with the resource-owner password grant. No fallback.
    pub async fn acquire_with_password(&self, username: &str, password: &str) -> Result<Credentials> {
        tracing::info!("Requesting access token with password grant...");

        let creds = self
            .endpoint
            .request(&Grant::Password { username, password })
            .await
            .map_err(|e| e.context("Get Access Token"))?;

        self.persist(creds.into()).await
    }

    /// Acquire a pair with an authorization code, or from the store when no
    /// code is given. A rejected code falls back to the store when one exists.
    pub async fn acquire_with_code(
        &self,
        code: Option<&str>,
        redirect_uri: &str,
    ) -> Result<Credentials> {
        let Some(code) = code else {
            if self.has_store() {
                tracing::info!("No authorization code given, loading credentials from store");
                return self.load_from_store().await;
            }
            return Err(Error::MissingParameter("code"));
        };

        tracing::info!("Exchanging authorization code for tokens...");
        match self
            .endpoint
            .request(&Grant::AuthorizationCode { code, redirect_uri })
            .await
        {
            Ok(creds) => self.persist(creds.into()).await,
            Err(e) if e.is_unauthorized() && self.has_store() => {
                tracing::warn!("Authorization code rejected (401), falling back to stored credentials");
                self.load_from_store().await
            }
            Err(e) => Err(e.context("Get Access Token")),
        }
    }

    /// Obtain a new pair with the refresh-token grant.
    ///
    /// A 401 from the token endpoint reloads the store and tries once more;
    /// the store copy may have been refreshed by another process.
    pub async fn refresh(&self) -> Result<Credentials> {
        let mut attempt = 1;

        loop {
            let refresh_token = match self.refresh_token().await {
                Some(token) => token,
                None if self.has_store() => {
                    tracing::warn!("No refresh token held, loading credentials from store");
                    self.load_from_store().await?.refresh_token
                }
                None => return Err(Error::NoRefreshToken),
            };

            tracing::debug!(
                attempt,
                max_attempts = MAX_ATTEMPTS,
                refresh_token = redact(&refresh_token),
                "Refreshing access token..."
            );

            match self
                .endpoint
                .request(&Grant::RefreshToken {
                    refresh_token: &refresh_token,
                })
                .await
            {
                Ok(creds) => return self.persist(creds.into()).await,
                Err(e) if e.is_unauthorized() && self.has_store() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        attempt,
                        "Refresh token rejected (401), reloading credentials from store and retrying..."
                    );
                    self.load_from_store().await?;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("Token refresh failed: {}", e);
                    return Err(e.context("Refresh Token"));
                }
            }
        }
    }

    /// Read the pair from the store and make it current
    pub async fn load_from_store(&self) -> Result<Credentials> {
        let store = self
            .store
            .as_ref()
            .ok_or(Error::MissingParameter("credential_store"))?;

        let blob = store
            .get()
            .await
            .map_err(|e| Error::from(e).context("Get Credentials From S3"))?;
        let creds = decode_blob(&blob).map_err(|e| e.context("Get Credentials From S3"))?;

        self.state.write().await.replace(&creds);

        tracing::info!(
            location = %store.location(),
            access_token = redact(&creds.access_token),
            "Loaded credentials from store"
        );
        Ok(creds)
    }

    /// Validate and adopt a pair, mirroring it to the store when configured.
    /// Nothing is written anywhere unless both tokens are present.
    pub async fn persist(&self, payload: TokenPayload) -> Result<Credentials> {
        let creds = payload
            .into_credentials()
            .map_err(|e| e.context("Set Credentials"))?;

        self.state.write().await.replace(&creds);

        if let Some(store) = &self.store {
            let blob = encode_blob(&creds).map_err(|e| e.context("Set Credentials"))?;
            store
                .put(blob)
                .await
                .map_err(|e| Error::from(e).context("Set Credentials"))?;
            tracing::info!(location = %store.location(), "Stored credentials");
        }

        Ok(creds)
    }
}
