//! Translation from logical paths to entries.
//!
//! Resolution only reads the tree. Each step down requires a folder child
//! with exactly the segment's name; a file in the middle of a path is as
//! good as a missing segment.

use docspace_core::LogicalPath;
use docspace_metadata::{EntryRepo, EntryRow, MetadataResult, MetadataStore};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// A directory that exists in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDirectory {
    /// Folder entry id, `None` for the space root.
    pub id: Option<Uuid>,
    pub path: LogicalPath,
}

impl ResolvedDirectory {
    pub fn root() -> Self {
        Self {
            id: None,
            path: LogicalPath::root(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.id.is_none()
    }

    pub fn depth(&self) -> usize {
        self.path.depth()
    }
}

/// Result of walking a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Directory(ResolvedDirectory),
    /// The walk stopped at `segment`, which is absent or not a folder.
    Missing { segment: String },
}

/// Walks logical paths down a space's entry tree.
pub struct PathResolver {
    store: Arc<dyn MetadataStore>,
}

impl PathResolver {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Resolve a directory path. The root always resolves.
    pub async fn resolve(&self, space_id: Uuid, path: &LogicalPath) -> MetadataResult<Resolution> {
        if path.is_root() {
            return Ok(Resolution::Directory(ResolvedDirectory::root()));
        }

        let mut current: Option<Uuid> = None;
        for segment in path.segments() {
            match self.store.find_child(space_id, current, segment).await? {
                Some(child) if child.is_folder() => current = Some(child.entry_id),
                _ => {
                    debug!(%space_id, path = %path, segment = %segment, "path did not resolve");
                    return Ok(Resolution::Missing {
                        segment: segment.clone(),
                    });
                }
            }
        }

        Ok(Resolution::Directory(ResolvedDirectory {
            id: current,
            path: path.clone(),
        }))
    }

    /// Find a file named `filename` inside the directory at `path`.
    ///
    /// `None` when the directory is missing, the name is absent, or the name
    /// belongs to a folder.
    pub async fn resolve_file(
        &self,
        space_id: Uuid,
        path: &LogicalPath,
        filename: &str,
    ) -> MetadataResult<Option<(ResolvedDirectory, EntryRow)>> {
        let Resolution::Directory(dir) = self.resolve(space_id, path).await? else {
            return Ok(None);
        };
        let file = self
            .store
            .find_child(space_id, dir.id, filename)
            .await?
            .filter(EntryRow::is_file);
        Ok(file.map(|file| (dir, file)))
    }
}
