// Credential store module
// Single-object blob storage shared between client processes

mod s3;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

pub use s3::{S3CredentialStore, S3Location};

/// Errors raised by a credential store backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// Generic backend failure
    #[error("Credential store error: {0}")]
    Backend(String),

    /// Request to the remote store failed
    #[error("Credential store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Remote store answered with a non-success status
    #[error("Credential store returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Nothing has been stored yet
    #[error("Credential store is empty")]
    Empty,
}

/// A single JSON blob holding `{access_token, refresh_token}`
///
/// The object location is fixed when the store is built; calls carry no
/// addressing. Implementations must be shareable across tasks.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the stored blob
    async fn get(&self) -> Result<String, StoreError>;

    /// Replace the stored blob
    async fn put(&self, blob: String) -> Result<(), StoreError>;

    /// Human readable location, used in logs
    fn location(&self) -> String;
}

/// In-process credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    blob: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a blob
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: RwLock::new(Some(blob.into())),
        }
    }

    /// Current contents without going through the trait
    pub async fn snapshot(&self) -> Option<String> {
        self.blob.read().await.clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Result<String, StoreError> {
        self.blob.read().await.clone().ok_or(StoreError::Empty)
    }

    async fn put(&self, blob: String) -> Result<(), StoreError> {
        *self.blob.write().await = Some(blob);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_empty() {
        let store = MemoryCredentialStore::new();
        let err = store.get().await.unwrap_err();
        assert!(matches!(err, StoreError::Empty));
        assert_eq!(store.snapshot().await, None);
    }

    #[tokio::test]
    async fn test_memory_store_put_replaces() {
        let store = MemoryCredentialStore::with_blob(r#"{"access_token":"a"}"#);
        store.put(r#"{"access_token":"b"}"#.to_string()).await.unwrap();
        assert_eq!(store.get().await.unwrap(), r#"{"access_token":"b"}"#);
    }
}
