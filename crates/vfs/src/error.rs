//! Filesystem error taxonomy.

use docspace_metadata::MetadataError;
use docspace_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by filesystem and space operations.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("metadata error: {0}")]
    Metadata(MetadataError),
}

impl From<MetadataError> for FsError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound(msg) => FsError::NotFound(msg),
            MetadataError::AlreadyExists(msg) => FsError::Conflict(msg),
            MetadataError::InvalidMove(msg) => FsError::BadRequest(msg),
            other => FsError::Metadata(other),
        }
    }
}

impl From<docspace_core::Error> for FsError {
    fn from(err: docspace_core::Error) -> Self {
        FsError::BadRequest(err.to_string())
    }
}

/// Result type for filesystem operations.
pub type FsResult<T> = std::result::Result<T, FsError>;
