//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid block id: {0}")]
    InvalidBlockId(String),

    #[error("invalid deletion mark: {0}")]
    InvalidDeletionMark(String),

    #[error("unsupported deletion mark version: {version} (supported: {supported})")]
    UnsupportedMarkVersion { version: u32, supported: u32 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
