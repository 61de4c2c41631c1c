//! Key-value store port for trust-mark persistence
//!
//! Keys are opaque strings; values are JSON. Read-modify-write on a single
//! key must be atomic at the key level, which [`KeyValueStore::modify`]
//! provides.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Closure applied under the store's key-level lock.
///
/// Receives the current value (if any); returns the value to write, `None`
/// to delete the key, or an error to abort without writing.
pub type ModifyFn = Box<dyn FnOnce(Option<Value>) -> Result<Option<Value>, StoreError> + Send>;

/// Port for the trust-mark key-value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write `value` under `key`, replacing any previous value
    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Delete the entry under `key`; deleting a missing key is a no-op
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List all keys currently in the store
    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Atomically read, transform and write back the value under `key`
    ///
    /// Returns the value that was written, or `None` when the closure
    /// deleted the key.
    async fn modify(&self, key: &str, f: ModifyFn) -> Result<Option<Value>, StoreError>;
}

/// Store-specific errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("write refused: {0}")]
    Refused(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
