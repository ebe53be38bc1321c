//! Core domain types and shared logic for docspace.
//!
//! This crate defines the data model used across all other crates:
//! - Entry kinds, the root sentinel and blob key layout
//! - Logical path parsing and name validation
//! - Space name rules
//! - Application configuration

pub mod config;
pub mod entry;
pub mod error;
pub mod path;
pub mod space;

pub use entry::{
    EntryKind, MAX_FOLDER_DEPTH, ROOT_PARENT_ID, blob_key_for, logical_parent, persisted_parent,
    space_blob_prefix,
};
pub use error::{Error, Result};
pub use path::{
    LogicalPath, PATH_SEPARATOR, join_display, resolve_parent_and_leaf, validate_segment_name,
};
pub use space::{normalize_space_name, space_name_key};
