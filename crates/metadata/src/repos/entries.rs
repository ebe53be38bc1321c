//! Entry tree repository.
//!
//! The tree is an adjacency list: each row points at its parent, and rows
//! directly under a space root point at `ROOT_PARENT_ID`. Sibling names are
//! unique per `(space_id, parent_id)` regardless of kind, enforced by the
//! underlying store rather than by callers.

use crate::error::{MetadataError, MetadataResult};
use crate::models::EntryRow;
use async_trait::async_trait;
use docspace_core::logical_parent;
use std::collections::HashSet;
use time::OffsetDateTime;
use uuid::Uuid;

/// Immediate children of a directory, partitioned by kind.
#[derive(Debug, Clone, Default)]
pub struct DirectoryListing {
    /// File names, ordered.
    pub files: Vec<String>,
    /// Folder entries, ordered by name.
    pub sub_folders: Vec<EntryRow>,
}

/// A freshly created folder and its display path (e.g. `"docs/notes"`).
#[derive(Debug, Clone)]
pub struct CreatedFolder {
    pub entry: EntryRow,
    pub display_path: String,
}

/// Aggregate of everything beneath a directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubtreeStats {
    pub files: u64,
    pub folders: u64,
    pub total_bytes: u64,
}

/// Repository for the folder/file tree.
#[async_trait]
pub trait EntryRepo: Send + Sync {
    /// Insert a folder or file row.
    ///
    /// Fails with `AlreadyExists` if a sibling with the same name exists and
    /// `NotFound` if the parent folder is gone.
    async fn insert_entry(&self, entry: &EntryRow) -> MetadataResult<()>;

    /// Insert rows in order, all or nothing.
    ///
    /// Each row's parent must already exist or appear earlier in `entries`.
    /// Errors are those of [`insert_entry`](Self::insert_entry) for the first
    /// row that fails, and nothing is written.
    async fn insert_entries(&self, entries: &[EntryRow]) -> MetadataResult<()>;

    /// Get an entry by ID within a space.
    async fn get_entry(&self, space_id: Uuid, entry_id: Uuid)
    -> MetadataResult<Option<EntryRow>>;

    /// Find the child of `parent_id` (`None` = root) with exactly this name.
    async fn find_child(
        &self,
        space_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> MetadataResult<Option<EntryRow>>;

    /// Immediate children of `parent_id`, ordered by name.
    async fn get_children(
        &self,
        space_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> MetadataResult<Vec<EntryRow>>;

    /// Every file in the space regardless of depth, ordered by name.
    async fn list_all_files(&self, space_id: Uuid) -> MetadataResult<Vec<EntryRow>>;

    /// Record new content for a file.
    async fn update_file_content(
        &self,
        space_id: Uuid,
        entry_id: Uuid,
        size_bytes: i64,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Give an entry a new parent and/or name.
    ///
    /// Fails with `AlreadyExists` on a sibling collision and `NotFound` if
    /// the entry or the new parent folder is gone. Fails with `InvalidMove`
    /// when the new parent is the entry itself or lies in its subtree; that
    /// check runs in the same transaction as the update.
    async fn relocate_entry(
        &self,
        space_id: Uuid,
        entry_id: Uuid,
        new_parent_id: Option<Uuid>,
        new_name: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Delete a single row. Fails with `NotFound` if nothing was deleted.
    async fn delete_entry(&self, space_id: Uuid, entry_id: Uuid) -> MetadataResult<()>;

    /// Delete `root_id` and every descendant in one transaction, returning
    /// the blob keys of the deleted files.
    ///
    /// With `root_id = None` every entry of the space is deleted. Never
    /// touches blob storage.
    async fn delete_subtree(
        &self,
        space_id: Uuid,
        root_id: Option<Uuid>,
    ) -> MetadataResult<Vec<String>>;

    /// Counts and total file size of everything beneath `root_id`
    /// (exclusive), or of the whole space for `None`.
    async fn subtree_stats(
        &self,
        space_id: Uuid,
        root_id: Option<Uuid>,
    ) -> MetadataResult<SubtreeStats>;

    /// Create a folder and report its display path.
    async fn create_folder(
        &self,
        space_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> MetadataResult<CreatedFolder> {
        let entry = EntryRow::new_folder(space_id, parent_id, name);
        self.insert_entry(&entry).await?;
        let display_path = self.display_path(space_id, entry.entry_id).await?;
        Ok(CreatedFolder {
            entry,
            display_path,
        })
    }

    /// Immediate children partitioned into file names and folder entries.
    async fn list_children(
        &self,
        space_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> MetadataResult<DirectoryListing> {
        let mut listing = DirectoryListing::default();
        for child in self.get_children(space_id, parent_id).await? {
            if child.is_folder() {
                listing.sub_folders.push(child);
            } else {
                listing.files.push(child.name);
            }
        }
        Ok(listing)
    }

    /// The entry and all its ancestors, root-most first.
    ///
    /// Fails with `Internal` if the parent chain revisits an entry.
    async fn ancestor_chain(&self, space_id: Uuid, entry_id: Uuid) -> MetadataResult<Vec<EntryRow>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(entry_id);

        while let Some(id) = current {
            if !seen.insert(id) {
                return Err(MetadataError::Internal(format!(
                    "cycle in entry tree of space {space_id} at entry {id}"
                )));
            }
            let entry = self
                .get_entry(space_id, id)
                .await?
                .ok_or_else(|| MetadataError::NotFound(format!("entry {id} not found")))?;
            current = logical_parent(entry.parent_id);
            chain.push(entry);
        }

        chain.reverse();
        Ok(chain)
    }

    /// Slash-joined names from the root down to the entry (`"docs/notes"`).
    async fn display_path(&self, space_id: Uuid, entry_id: Uuid) -> MetadataResult<String> {
        let chain = self.ancestor_chain(space_id, entry_id).await?;
        Ok(chain
            .iter()
            .map(|entry| entry.name.as_str())
            .collect::<Vec<_>>()
            .join("/"))
    }
}
