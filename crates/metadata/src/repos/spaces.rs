//! Space repository.

use crate::error::MetadataResult;
use crate::models::SpaceRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for space records.
#[async_trait]
pub trait SpaceRepo: Send + Sync {
    /// Create a new space.
    ///
    /// Fails with `AlreadyExists` when another space has the same
    /// `name_key`; the check is the unique index, not a prior lookup.
    async fn create_space(&self, space: &SpaceRow) -> MetadataResult<()>;

    /// List all spaces ordered by name.
    async fn list_spaces(&self) -> MetadataResult<Vec<SpaceRow>>;

    /// Get a space by ID.
    async fn get_space(&self, space_id: Uuid) -> MetadataResult<Option<SpaceRow>>;

    /// Delete a space record together with any entries still attached to it.
    ///
    /// Runs in one transaction and returns the blob keys of files removed
    /// along the way. Fails with `NotFound` if the space does not exist.
    async fn delete_space(&self, space_id: Uuid) -> MetadataResult<Vec<String>>;
}
