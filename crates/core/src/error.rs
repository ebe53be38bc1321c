//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid space name: {0}")]
    InvalidSpaceName(String),

    #[error("unknown entry kind: {0}")]
    UnknownEntryKind(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
