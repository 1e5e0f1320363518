// Authentication module
// Manages the OAuth2 token lifecycle and the optional credential store

mod credentials;
mod grants;
mod manager;
mod types;

pub use grants::TokenEndpoint;
pub use manager::{TokenManager, MAX_ATTEMPTS};
pub use types::{Credentials, Grant, TokenPayload};
