//! Filter and bucket index error types.

use blockgate_core::BlockId;
use blockgate_storage::StorageError;
use thiserror::Error;

/// Errors that abort a filtering cycle.
///
/// Missing or unreadable deletion marks never show up here; they are
/// absorbed by the filters. Everything in this enum means the cycle's
/// result must be discarded and the cycle retried later.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("failed to read deletion mark for block {block_id}: {source}")]
    Storage {
        block_id: BlockId,
        #[source]
        source: StorageError,
    },

    #[error("filtering cancelled")]
    Cancelled,

    #[error("fetch task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Core(#[from] blockgate_core::Error),

    #[error("invalid tenant: {0}")]
    Tenant(#[source] StorageError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("bucket index error: {0}")]
    BucketIndex(#[from] BucketIndexError),
}

impl FilterError {
    /// Whether the cycle stopped because it was cancelled rather than broken.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type for filter operations.
pub type FilterResult<T> = std::result::Result<T, FilterError>;

/// Errors reading or writing a tenant's bucket index.
#[derive(Debug, Error)]
pub enum BucketIndexError {
    #[error("bucket index not found for tenant {0}")]
    NotFound(String),

    #[error("bucket index corrupted: {0}")]
    Corrupted(String),

    #[error("unsupported bucket index version: {0}")]
    UnsupportedVersion(u32),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for bucket index operations.
pub type BucketIndexResult<T> = std::result::Result<T, BucketIndexError>;
