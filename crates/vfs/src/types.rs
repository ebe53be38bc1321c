//! Values returned by filesystem and space operations.

use docspace_metadata::SpaceRow;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// A named top-level tenant.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<SpaceRow> for Space {
    fn from(row: SpaceRow) -> Self {
        Self {
            id: row.space_id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

/// A file as reported to callers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileMetadata {
    pub name: String,
    /// Containing directory with a leading slash (`"/docs/notes"`, `"/"`).
    pub path: String,
    pub size: u64,
}

/// Immediate contents of a directory.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryContents {
    pub files: Vec<String>,
    pub sub_folder_elements: Vec<FolderElement>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FolderElement {
    pub item_name: String,
    pub is_folder: bool,
}

/// Outcome of a recursive folder delete.
///
/// The tree rows are gone once this is returned; `blob_failures` counts
/// blobs that could not be purged and are left as orphans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderDeletion {
    pub files_removed: usize,
    pub blobs_deleted: usize,
    pub blob_failures: usize,
}

/// Outcome of a batch delete within one directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemsDeletion {
    /// Files removed directly or beneath a removed folder.
    pub files_removed: usize,
    pub folders_removed: usize,
    pub blob_failures: usize,
}

/// Outcome of a space delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpaceDeletion {
    pub tree: FolderDeletion,
    /// Orphaned blobs found under the space prefix and removed.
    pub orphans_swept: usize,
    /// Blobs still present after the sweep.
    pub blob_failures: usize,
}

/// Aggregate size of a directory's subtree.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FolderSize {
    pub path: String,
    pub files: u64,
    pub folders: u64,
    pub total_bytes: u64,
}
