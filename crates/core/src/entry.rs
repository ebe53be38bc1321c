//! Entry kinds and blob key layout.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum number of folder levels beneath a space root.
pub const MAX_FOLDER_DEPTH: usize = 20;

/// Parent id persisted for entries that live directly under a space root.
///
/// The root has no row of its own. Storing the nil UUID instead of NULL lets
/// the `(space_id, parent_id, name)` unique index cover root-level names too.
pub const ROOT_PARENT_ID: Uuid = Uuid::nil();

/// Kind of a node in the entry tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Folder,
    File,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Folder => "folder",
            EntryKind::File => "file",
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, EntryKind::Folder)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "folder" => Ok(EntryKind::Folder),
            "file" => Ok(EntryKind::File),
            other => Err(Error::UnknownEntryKind(other.to_string())),
        }
    }
}

/// Convert an optional parent id into its persisted form.
pub fn persisted_parent(parent_id: Option<Uuid>) -> Uuid {
    parent_id.unwrap_or(ROOT_PARENT_ID)
}

/// Convert a persisted parent id back into `None` for the space root.
pub fn logical_parent(parent_id: Uuid) -> Option<Uuid> {
    if parent_id == ROOT_PARENT_ID {
        None
    } else {
        Some(parent_id)
    }
}

/// Key prefix under which every blob of a space is stored.
pub fn space_blob_prefix(space_id: Uuid) -> String {
    format!("spaces/{space_id}/")
}

/// Build the blob key for a file.
///
/// Keys are derived from a fresh id rather than the logical path so that
/// renames and moves never touch the blob store.
pub fn blob_key_for(space_id: Uuid, blob_id: Uuid) -> String {
    format!("{}{}", space_blob_prefix(space_id), blob_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_roundtrip() {
        for kind in [EntryKind::Folder, EntryKind::File] {
            assert_eq!(kind.as_str().parse::<EntryKind>().unwrap(), kind);
        }
        assert!("symlink".parse::<EntryKind>().is_err());
    }

    #[test]
    fn test_root_parent_mapping() {
        assert_eq!(persisted_parent(None), ROOT_PARENT_ID);
        assert_eq!(logical_parent(ROOT_PARENT_ID), None);

        let id = Uuid::new_v4();
        assert_eq!(logical_parent(persisted_parent(Some(id))), Some(id));
    }

    #[test]
    fn test_blob_keys_live_under_space_prefix() {
        let space = Uuid::new_v4();
        let key = blob_key_for(space, Uuid::new_v4());
        assert!(key.starts_with(&space_blob_prefix(space)));
        assert_ne!(key, blob_key_for(space, Uuid::new_v4()));
    }
}
