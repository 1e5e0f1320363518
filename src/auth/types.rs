// Authentication types

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Complete credential pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Token pair as received from the token endpoint, the store, or a caller.
/// Either field may be missing until validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenPayload {
    /// Validate that both tokens are present and non-empty
    pub fn into_credentials(self) -> Result<Credentials> {
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(Error::MissingCredential("access_token"))?;
        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(Error::MissingCredential("refresh_token"))?;
        Ok(Credentials {
            access_token,
            refresh_token,
        })
    }
}

impl From<Credentials> for TokenPayload {
    fn from(creds: Credentials) -> Self {
        Self {
            access_token: Some(creds.access_token),
            refresh_token: Some(creds.refresh_token),
        }
    }
}

/// In-memory token state. Both tokens are absent until the first acquisition;
/// afterwards the pair is only ever replaced whole.
#[derive(Debug, Clone, Default)]
pub(crate) struct TokenState {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl TokenState {
    pub fn replace(&mut self, creds: &Credentials) {
        self.access_token = Some(creds.access_token.clone());
        self.refresh_token = Some(creds.refresh_token.clone());
    }

    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.access_token, &self.refresh_token) {
            (Some(a), Some(r)) => Some(Credentials::new(a.clone(), r.clone())),
            _ => None,
        }
    }
}

/// OAuth2 grant sent to the token endpoint
#[derive(Debug, Clone)]
pub enum Grant<'a> {
    Password {
        username: &'a str,
        password: &'a str,
    },
    AuthorizationCode {
        code: &'a str,
        redirect_uri: &'a str,
    },
    RefreshToken {
        refresh_token: &'a str,
    },
}

impl Grant<'_> {
    pub fn grant_type(&self) -> &'static str {
        match self {
            Grant::Password { .. } => "password",
            Grant::AuthorizationCode { .. } => "authorization_code",
            Grant::RefreshToken { .. } => "refresh_token",
        }
    }
}
