// Simple In/Out client
// Grant-flow specific token acquisition plus the API endpoint methods

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Credentials, TokenEndpoint, TokenManager, TokenPayload};
use crate::config::{ClientConfig, ClientOptions};
use crate::error::{Error, Result};
use crate::http_client::ApiClient;
use crate::store::{CredentialStore, S3CredentialStore};

const NO_QUERY: &[(&str, &str)] = &[];

/// How a client obtains its first token pair
pub trait Flow: Sized + Send + Sync {
    /// Pull flow-specific settings out of the validated configuration
    fn from_config(config: &ClientConfig) -> Result<Self>;
}

/// Resource-owner password grant
#[derive(Debug, Clone)]
pub struct PasswordFlow;

impl Flow for PasswordFlow {
    fn from_config(_config: &ClientConfig) -> Result<Self> {
        Ok(Self)
    }
}

/// Authorization-code grant; requires a redirect URI
#[derive(Debug, Clone)]
pub struct AuthorizationCodeFlow {
    redirect_uri: String,
}

impl Flow for AuthorizationCodeFlow {
    fn from_config(config: &ClientConfig) -> Result<Self> {
        let redirect_uri = config
            .redirect_uri
            .clone()
            .ok_or(Error::MissingParameter("redirect_uri"))?;
        Ok(Self { redirect_uri })
    }
}

/// Simple In/Out API client
pub struct SimpleInOut<F: Flow = PasswordFlow> {
    flow: F,
    tokens: Arc<TokenManager>,
    api: ApiClient,
}

pub type PasswordClient = SimpleInOut<PasswordFlow>;
pub type AuthorizationCodeClient = SimpleInOut<AuthorizationCodeFlow>;

impl<F: Flow> SimpleInOut<F> {
    /// Build a client; an S3 credential store is attached when the store
    /// options are supplied
    pub fn new(options: ClientOptions) -> Result<Self> {
        let config = ClientConfig::from_options(options)?;
        let http = http_client(&config)?;

        let store: Option<Arc<dyn CredentialStore>> = match &config.store {
            Some(store) => Some(Arc::new(S3CredentialStore::new(
                http.clone(),
                store.access_key_id.clone(),
                store.secret_access_key.clone(),
                store.location.clone(),
            )?)),
            None => None,
        };

        Self::assemble(config, http, store)
    }

    /// Build a client around a caller-provided credential store. Store
    /// options, if any, are still validated but the given store is used.
    pub fn with_store(options: ClientOptions, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let config = ClientConfig::from_options(options)?;
        let http = http_client(&config)?;
        Self::assemble(config, http, Some(store))
    }

    fn assemble(
        config: ClientConfig,
        http: Client,
        store: Option<Arc<dyn CredentialStore>>,
    ) -> Result<Self> {
        let flow = F::from_config(&config)?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let endpoint = TokenEndpoint::new(
            http.clone(),
            format!("{}/oauth/token", base_url),
            config.client_id,
            config.client_secret,
        );

        if let Some(store) = &store {
            tracing::info!(location = %store.location(), "Credential store configured");
        }

        let tokens = Arc::new(TokenManager::new(
            endpoint,
            config.access_token,
            config.refresh_token,
            store,
        ));
        let api = ApiClient::new(http, base_url, tokens.clone());

        Ok(Self { flow, tokens, api })
    }

    // === Credentials ===

    /// Refresh the token pair with the refresh-token grant
    pub async fn refresh_access_token(&self) -> Result<Credentials> {
        self.tokens.refresh().await
    }

    /// Adopt a token pair, mirroring it to the store when one is configured
    pub async fn set_credentials(&self, payload: impl Into<TokenPayload>) -> Result<Credentials> {
        self.tokens.persist(payload.into()).await
    }

    /// Replace the in-memory pair with the store's copy
    pub async fn load_credentials(&self) -> Result<Credentials> {
        self.tokens.load_from_store().await
    }

    pub async fn credentials(&self) -> Option<Credentials> {
        self.tokens.credentials().await
    }

    pub async fn access_token(&self) -> Option<String> {
        self.tokens.access_token().await
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens.refresh_token().await
    }

    pub fn has_store(&self) -> bool {
        self.tokens.has_store()
    }

    // === API ===

    /// Authenticated GET against any API path
    pub async fn get<Q>(&self, path: &str, query: &Q) -> Result<Value>
    where
        Q: Serialize + ?Sized,
    {
        self.api.get(path, query).await
    }

    /// Verify the client is configured correctly
    pub async fn ok(&self) -> Result<Value> {
        self.get("/api/v2/ok", NO_QUERY).await
    }

    pub async fn company(&self) -> Result<Value> {
        self.get("/api/v2/company", NO_QUERY).await
    }

    pub async fn fences(&self) -> Result<Value> {
        self.get("/api/v2/fences", NO_QUERY).await
    }

    pub async fn groups(&self) -> Result<Value> {
        self.get("/api/v2/groups", NO_QUERY).await
    }

    pub async fn statuses<Q>(&self, query: &Q) -> Result<Value>
    where
        Q: Serialize + ?Sized,
    {
        self.get("/api/v2/statuses", query).await
    }

    pub async fn current_user(&self) -> Result<Value> {
        self.get("/api/v2/users/current", NO_QUERY).await
    }

    pub async fn user(&self, user_id: impl Display) -> Result<Value> {
        self.get(&format!("/api/v2/users/{}", user_id), NO_QUERY).await
    }

    pub async fn user_statuses<Q>(&self, user_id: impl Display, query: &Q) -> Result<Value>
    where
        Q: Serialize + ?Sized,
    {
        self.get(&format!("/api/v2/users/{}/statuses", user_id), query).await
    }
}

impl SimpleInOut<PasswordFlow> {
    /// Obtain a token pair with username and password
    pub async fn get_access_token(&self, username: &str, password: &str) -> Result<Credentials> {
        self.tokens.acquire_with_password(username, password).await
    }
}

impl SimpleInOut<AuthorizationCodeFlow> {
    /// Exchange an authorization code for a token pair. Without a code the
    /// pair is read from the credential store.
    pub async fn get_access_token(&self, code: Option<&str>) -> Result<Credentials> {
        self.tokens
            .acquire_with_code(code, &self.flow.redirect_uri)
            .await
    }

    pub fn redirect_uri(&self) -> &str {
        &self.flow.redirect_uri
    }
}

fn http_client(config: &ClientConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.request_timeout))
        .build()?)
}
