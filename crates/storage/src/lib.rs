//! Object storage abstraction and backends for blockgate.
//!
//! This crate provides:
//! - The `ObjectStore` trait the filters read deletion marks and indexes through
//! - A tenant-scoped view over a shared bucket
//! - Backends: local filesystem

pub mod backends;
pub mod error;
pub mod tenant;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use error::{StorageError, StorageResult};
pub use tenant::TenantStore;
pub use traits::ObjectStore;

use blockgate_core::config::StorageConfig;
use std::sync::Arc;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
    }
}
