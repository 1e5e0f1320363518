// Credential blob encoding for the credential store

use super::types::{Credentials, TokenPayload};
use crate::error::Result;

/// Parse a stored blob, requiring both tokens
pub fn decode_blob(blob: &str) -> Result<Credentials> {
    let payload: TokenPayload = serde_json::from_str(blob)?;
    payload.into_credentials()
}

/// Serialize credentials as the JSON object kept in the store
pub fn encode_blob(creds: &Credentials) -> Result<String> {
    Ok(serde_json::to_string(creds)?)
}

/// Short token prefix for logs
pub fn redact(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}
