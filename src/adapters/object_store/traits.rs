//! Remote object storage abstraction

use crate::domain::Result;
use async_trait::async_trait;
use tokio::fs::File;

/// Remote object storage the export files are shipped to
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stream `body` to `key`, replacing any existing object
    ///
    /// `body` is positioned at the start of the payload and holds exactly
    /// `length` bytes from there on. It is consumed by a single attempt.
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::AggregatorError::ObjectStore`] if the store
    /// rejects the write or cannot be reached.
    async fn put_object(&self, key: &str, body: File, length: u64) -> Result<()>;

    /// Human-readable destination for logs (e.g. `s3://bucket`)
    fn location(&self) -> String;
}
