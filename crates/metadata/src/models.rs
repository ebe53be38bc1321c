//! Database models mapping to the metadata schema.

use docspace_core::{EntryKind, logical_parent, persisted_parent};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Space record: a named top-level tenant.
#[derive(Debug, Clone, FromRow)]
pub struct SpaceRow {
    pub space_id: Uuid,
    /// Name as given at creation (trimmed).
    pub name: String,
    /// Lower-cased name backing the case-insensitive unique index.
    pub name_key: String,
    pub created_at: OffsetDateTime,
}

/// A folder or file in a space's tree.
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct EntryRow {
    pub entry_id: Uuid,
    pub space_id: Uuid,
    /// `ROOT_PARENT_ID` for entries directly under the space root.
    pub parent_id: Uuid,
    pub name: String,
    /// "folder" or "file".
    pub kind: String,
    /// Set only for files.
    pub blob_key: Option<String>,
    pub size_bytes: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl EntryRow {
    pub fn new_folder(space_id: Uuid, parent_id: Option<Uuid>, name: &str) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            entry_id: Uuid::new_v4(),
            space_id,
            parent_id: persisted_parent(parent_id),
            name: name.to_string(),
            kind: EntryKind::Folder.as_str().to_string(),
            blob_key: None,
            size_bytes: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_file(
        space_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
        blob_key: String,
        size_bytes: i64,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            entry_id: Uuid::new_v4(),
            space_id,
            parent_id: persisted_parent(parent_id),
            name: name.to_string(),
            kind: EntryKind::File.as_str().to_string(),
            blob_key: Some(blob_key),
            size_bytes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn entry_kind(&self) -> EntryKind {
        if self.kind == EntryKind::Folder.as_str() {
            EntryKind::Folder
        } else {
            EntryKind::File
        }
    }

    pub fn is_folder(&self) -> bool {
        self.entry_kind().is_folder()
    }

    pub fn is_file(&self) -> bool {
        !self.is_folder()
    }

    /// Parent id, or `None` for the space root.
    pub fn parent(&self) -> Option<Uuid> {
        logical_parent(self.parent_id)
    }
}
