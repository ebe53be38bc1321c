//! Virtual filesystem for docspace.
//!
//! Presents a nested folder/file hierarchy per space while file content
//! lives in a flat blob store. The pieces:
//! - [`PathResolver`] walks logical paths down the entry tree
//! - [`FilesystemService`] orchestrates the entry tree and blob store for
//!   every folder and file operation
//! - [`SpaceRegistry`] owns the space lifecycle and delegates the recursive
//!   work of space deletion to the filesystem service

pub mod error;
pub mod resolver;
pub mod retry;
pub mod service;
pub mod spaces;
pub mod types;

pub use error::{FsError, FsResult};
pub use resolver::{PathResolver, Resolution, ResolvedDirectory};
pub use retry::RetryPolicy;
pub use service::FilesystemService;
pub use spaces::SpaceRegistry;
pub use types::{
    DirectoryContents, FileMetadata, FolderDeletion, FolderElement, FolderSize, ItemsDeletion,
    Space, SpaceDeletion,
};
