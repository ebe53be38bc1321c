//! Space lifecycle.

use crate::error::{FsError, FsResult};
use crate::service::FilesystemService;
use crate::types::{Space, SpaceDeletion};
use docspace_core::{normalize_space_name, space_blob_prefix, space_name_key};
use docspace_metadata::{MetadataStore, SpaceRepo, SpaceRow};
use docspace_storage::ObjectStore;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Creates, lists and deletes spaces.
pub struct SpaceRegistry {
    store: Arc<dyn MetadataStore>,
    fs: Arc<FilesystemService>,
    blobs: Arc<dyn ObjectStore>,
}

impl SpaceRegistry {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        fs: Arc<FilesystemService>,
        blobs: Arc<dyn ObjectStore>,
    ) -> Self {
        Self { store, fs, blobs }
    }

    /// Create a space. Names are unique ignoring case.
    #[instrument(skip(self))]
    pub async fn create_space(&self, name: &str) -> FsResult<Space> {
        let name = normalize_space_name(name)?;
        let row = SpaceRow {
            space_id: Uuid::new_v4(),
            name_key: space_name_key(&name),
            name,
            created_at: OffsetDateTime::now_utc(),
        };
        self.store.create_space(&row).await?;

        info!(space_id = %row.space_id, name = %row.name, "space created");
        Ok(row.into())
    }

    /// All spaces, ordered by name.
    pub async fn list_spaces(&self) -> FsResult<Vec<Space>> {
        let rows = self.store.list_spaces().await?;
        Ok(rows.into_iter().map(Space::from).collect())
    }

    pub async fn get_space(&self, space_id: Uuid) -> FsResult<Space> {
        self.store
            .get_space(space_id)
            .await?
            .map(Space::from)
            .ok_or_else(|| FsError::NotFound(format!("space {space_id} not found")))
    }

    /// Delete a space with every entry and blob beneath it.
    ///
    /// The tree is cleared through the filesystem service first, then the
    /// space record goes, then anything still stored under the space's blob
    /// prefix is swept. Blob failures along the way are logged and counted.
    #[instrument(skip(self))]
    pub async fn delete_space(&self, space_id: Uuid) -> FsResult<SpaceDeletion> {
        self.fs.require_space(space_id).await?;

        let tree = self.fs.clear_space(space_id).await?;

        // Entries created after the clear are removed with the record.
        let stragglers = self.store.delete_space(space_id).await?;
        let (_, straggler_failures) = self.fs.purge_blobs(&stragglers).await;
        let unpurged = tree.blob_failures + straggler_failures;

        // Failed keys are still under the prefix, so a successful sweep
        // retries them and its own failures are exactly what is left behind.
        let prefix = space_blob_prefix(space_id);
        let (orphans_swept, blob_failures) = match self.blobs.list(&prefix).await {
            Ok(leftovers) => self.fs.purge_blobs(&leftovers).await,
            Err(e) => {
                warn!(%space_id, prefix = %prefix, error = %e, "failed to sweep space blobs");
                (0, unpurged)
            }
        };

        let deletion = SpaceDeletion {
            tree,
            orphans_swept,
            blob_failures,
        };
        info!(
            %space_id,
            files_removed = tree.files_removed + stragglers.len(),
            orphans_swept,
            blob_failures,
            "space deleted"
        );
        Ok(deletion)
    }
}
