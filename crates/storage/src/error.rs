//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Whether retrying the same call might succeed.
    ///
    /// Missing objects, rejected keys and bad configuration never heal on
    /// their own; transport and disk failures might.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::PermissionDenied
                    | std::io::ErrorKind::InvalidInput
            ),
            StorageError::S3(_) | StorageError::Unavailable(_) => true,
            StorageError::NotFound(_) | StorageError::InvalidKey(_) | StorageError::Config(_) => {
                false
            }
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
