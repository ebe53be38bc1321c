//! Storage trait definitions.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;

/// Metadata about a stored object.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time (if available).
    pub last_modified: Option<time::OffsetDateTime>,
}

/// A flat key to bytes object store.
///
/// There is no hierarchy and no transactions: `/` inside a key is only a
/// naming convention that `list` can filter on.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's size without fetching content.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Get an object's content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Put an object atomically, replacing any previous content.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Delete an object. Returns `NotFound` if it does not exist.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// List every key starting with `prefix`.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Get the name of this storage backend.
    ///
    /// Returns a static string identifier for the backend type (e.g., "s3", "filesystem").
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Check backend health/connectivity.
    async fn health_check(&self) -> StorageResult<()>;

    /// Delete several objects, continuing past individual failures.
    ///
    /// Missing objects count as deleted. Returns the keys that could not be
    /// removed together with the error for each.
    async fn delete_many(&self, keys: &[String]) -> Vec<(String, StorageError)> {
        let mut failures = Vec::new();
        for key in keys {
            match self.delete(key).await {
                Ok(()) | Err(StorageError::NotFound(_)) => {}
                Err(e) => failures.push((key.clone(), e)),
            }
        }
        failures
    }
}
