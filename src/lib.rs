// Simple In/Out API client - library root

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http_client;
pub mod store;

pub use auth::Credentials;
pub use client::{AuthorizationCodeClient, PasswordClient, SimpleInOut};
pub use config::ClientOptions;
pub use error::{Error, ErrorKind, Result};
