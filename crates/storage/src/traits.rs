//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Object store abstraction over a flat key namespace.
///
/// Keys use `/` as separator. Backends must report a missing object as
/// [`StorageError::NotFound`](crate::StorageError::NotFound) so callers can
/// tell absence apart from infrastructure failures.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Put an object atomically, replacing any previous content.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Delete an object.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// List object keys under a prefix.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Static identifier of the backend type (e.g. "filesystem"), for logs.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is reachable.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
