//! Filesystem service: folder and file operations over the entry tree and
//! the blob store.
//!
//! Each operation is a series of resolver reads, at most one entry-tree
//! mutation, and at most one batch of blob calls. Blob writes happen before
//! the tree mutation that references them; blob deletes happen after the
//! tree mutation that dereferences them. A crash in between can leave an
//! orphaned blob but never an entry pointing at missing content.

use crate::error::{FsError, FsResult};
use crate::resolver::{PathResolver, Resolution, ResolvedDirectory};
use crate::retry::RetryPolicy;
use crate::types::{
    DirectoryContents, FileMetadata, FolderDeletion, FolderElement, FolderSize, ItemsDeletion,
};
use bytes::Bytes;
use docspace_core::{
    LogicalPath, MAX_FOLDER_DEPTH, blob_key_for, join_display, resolve_parent_and_leaf,
    validate_segment_name,
};
use docspace_metadata::{EntryRepo, EntryRow, MetadataError, MetadataStore, SpaceRepo, SpaceRow};
use docspace_storage::{ObjectStore, StorageError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Orchestrates the resolver, the entry store and the blob store.
pub struct FilesystemService {
    store: Arc<dyn MetadataStore>,
    resolver: Arc<PathResolver>,
    blobs: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
}

impl FilesystemService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        resolver: Arc<PathResolver>,
        blobs: Arc<dyn ObjectStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            resolver,
            blobs,
            retry,
        }
    }

    /// Create a folder named `name` inside the directory at `path`.
    ///
    /// Returns the new folder's display path (`"docs/notes"`).
    #[instrument(skip(self))]
    pub async fn create_folder(
        &self,
        space_id: Uuid,
        path: Option<&str>,
        name: &str,
    ) -> FsResult<String> {
        self.require_space(space_id).await?;
        validate_segment_name(name)?;

        let dir = self.resolve_dir(space_id, &LogicalPath::parse(path)).await?;
        if dir.depth() + 1 > MAX_FOLDER_DEPTH {
            return Err(FsError::BadRequest(format!(
                "folders may be nested at most {MAX_FOLDER_DEPTH} levels deep"
            )));
        }

        let created = self.store.create_folder(space_id, dir.id, name).await?;
        info!(%space_id, path = %created.display_path, "folder created");
        Ok(created.display_path)
    }

    /// Store `data` as `filename` inside the directory at `path`.
    ///
    /// An existing file of that name is overwritten in place under its
    /// current blob key. A folder of that name is a conflict.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload_file(
        &self,
        space_id: Uuid,
        path: Option<&str>,
        filename: &str,
        data: Bytes,
    ) -> FsResult<FileMetadata> {
        self.require_space(space_id).await?;
        validate_segment_name(filename)?;

        let dir = self.resolve_dir(space_id, &LogicalPath::parse(path)).await?;

        if let Some(existing) = self.store.find_child(space_id, dir.id, filename).await? {
            return self.overwrite_file(&dir, existing, data).await;
        }

        let blob_key = blob_key_for(space_id, Uuid::new_v4());
        self.put_blob(&blob_key, data.clone()).await?;

        let entry = EntryRow::new_file(
            space_id,
            dir.id,
            filename,
            blob_key.clone(),
            data.len() as i64,
        );
        match self.store.insert_entry(&entry).await {
            Ok(()) => {
                info!(%space_id, dir = %dir.path, file = filename, size = data.len(), "file uploaded");
                Ok(file_metadata(&dir.path, &entry))
            }
            Err(MetadataError::AlreadyExists(_)) => {
                // Lost an insert race; the winner's entry takes the content.
                self.discard_blob(&blob_key).await;
                match self.store.find_child(space_id, dir.id, filename).await? {
                    Some(winner) => self.overwrite_file(&dir, winner, data).await,
                    None => Err(FsError::Conflict(format!(
                        "'{filename}' changed concurrently, retry the upload"
                    ))),
                }
            }
            Err(e) => {
                self.discard_blob(&blob_key).await;
                Err(e.into())
            }
        }
    }

    /// Fetch a file's content.
    #[instrument(skip(self))]
    pub async fn download_file(
        &self,
        space_id: Uuid,
        path: Option<&str>,
        filename: &str,
    ) -> FsResult<(FileMetadata, Bytes)> {
        self.require_space(space_id).await?;
        let (dir, file) = self
            .resolve_file(space_id, &LogicalPath::parse(path), filename)
            .await?;
        let blob_key = blob_key_of(&file)?;

        let data = self
            .retry
            .run("get", blob_key, || self.blobs.get(blob_key))
            .await?;
        Ok((file_metadata(&dir.path, &file), data))
    }

    /// Delete a single file: blob first, then its entry.
    #[instrument(skip(self))]
    pub async fn delete_file(
        &self,
        space_id: Uuid,
        path: Option<&str>,
        filename: &str,
    ) -> FsResult<()> {
        self.require_space(space_id).await?;
        let (dir, file) = self
            .resolve_file(space_id, &LogicalPath::parse(path), filename)
            .await?;
        self.remove_file(&file).await?;
        info!(%space_id, dir = %dir.path, file = filename, "file deleted");
        Ok(())
    }

    /// Delete several files and folders from the directory at `path`.
    ///
    /// Every name is resolved before anything is removed, so one missing name
    /// fails the request with nothing touched. Removal then goes item by
    /// item; a failure stops the batch and earlier removals stand.
    #[instrument(skip(self))]
    pub async fn delete_items(
        &self,
        space_id: Uuid,
        path: Option<&str>,
        names: &[String],
    ) -> FsResult<ItemsDeletion> {
        self.require_space(space_id).await?;
        if names.is_empty() {
            return Err(FsError::BadRequest("no items to delete".to_string()));
        }
        let dir = self.resolve_dir(space_id, &LogicalPath::parse(path)).await?;

        let mut seen = HashSet::new();
        let mut doomed = Vec::with_capacity(names.len());
        for name in names.iter().filter(|name| seen.insert(name.as_str())) {
            let entry = self
                .store
                .find_child(space_id, dir.id, name)
                .await?
                .ok_or_else(|| FsError::NotFound(format!("'{name}' not found in {}", dir.path)))?;
            doomed.push(entry);
        }

        let mut outcome = ItemsDeletion::default();
        for entry in doomed {
            if entry.is_folder() {
                let deletion = self.delete_subtree(space_id, Some(entry.entry_id)).await?;
                outcome.folders_removed += 1;
                outcome.files_removed += deletion.files_removed;
                outcome.blob_failures += deletion.blob_failures;
            } else {
                self.remove_file(&entry).await?;
                outcome.files_removed += 1;
            }
        }

        info!(
            %space_id,
            dir = %dir.path,
            files_removed = outcome.files_removed,
            folders_removed = outcome.folders_removed,
            "items deleted"
        );
        Ok(outcome)
    }

    /// Immediate contents of the directory at `path` (root when omitted).
    #[instrument(skip(self))]
    pub async fn list_contents(
        &self,
        space_id: Uuid,
        path: Option<&str>,
    ) -> FsResult<DirectoryContents> {
        self.require_space(space_id).await?;
        let dir = self.resolve_dir(space_id, &LogicalPath::parse(path)).await?;

        let listing = self.store.list_children(space_id, dir.id).await?;
        Ok(DirectoryContents {
            files: listing.files,
            sub_folder_elements: listing
                .sub_folders
                .into_iter()
                .map(|folder| FolderElement {
                    item_name: folder.name,
                    is_folder: true,
                })
                .collect(),
        })
    }

    /// Every file in the space, regardless of depth.
    #[instrument(skip(self))]
    pub async fn list_all_documents(&self, space_id: Uuid) -> FsResult<Vec<FileMetadata>> {
        self.require_space(space_id).await?;

        let files = self.store.list_all_files(space_id).await?;
        let mut dir_paths: HashMap<Option<Uuid>, String> = HashMap::new();
        let mut documents = Vec::with_capacity(files.len());

        for file in files {
            let parent = file.parent();
            let path = match dir_paths.get(&parent) {
                Some(path) => path.clone(),
                None => {
                    let path = match parent {
                        None => "/".to_string(),
                        Some(parent_id) => format!(
                            "/{}",
                            self.store.display_path(space_id, parent_id).await?
                        ),
                    };
                    dir_paths.insert(parent, path.clone());
                    path
                }
            };
            documents.push(FileMetadata {
                name: file.name,
                path,
                size: file.size_bytes.max(0) as u64,
            });
        }

        Ok(documents)
    }

    /// Delete the folder at `path` with everything beneath it.
    ///
    /// Blob purge failures are logged and counted, never returned: once the
    /// tree rows are gone the folder is gone.
    #[instrument(skip(self))]
    pub async fn delete_folder(&self, space_id: Uuid, path: &str) -> FsResult<FolderDeletion> {
        self.require_space(space_id).await?;
        let path = LogicalPath::parse(Some(path));
        if path.is_root() {
            return Err(FsError::BadRequest(
                "the space root cannot be deleted".to_string(),
            ));
        }

        let dir = self.resolve_dir(space_id, &path).await?;
        let deletion = self.delete_subtree(space_id, dir.id).await?;
        info!(
            %space_id,
            path = %dir.path,
            files_removed = deletion.files_removed,
            blob_failures = deletion.blob_failures,
            "folder deleted"
        );
        Ok(deletion)
    }

    /// Remove every entry of a space and purge their blobs.
    ///
    /// Used by space deletion; the space record itself is left alone.
    pub async fn clear_space(&self, space_id: Uuid) -> FsResult<FolderDeletion> {
        self.delete_subtree(space_id, None).await
    }

    /// Rename the folder or file at `path` (its last segment) to `new_name`.
    ///
    /// Returns the entry's new display path.
    #[instrument(skip(self))]
    pub async fn rename_entry(
        &self,
        space_id: Uuid,
        path: &str,
        new_name: &str,
    ) -> FsResult<String> {
        self.require_space(space_id).await?;
        validate_segment_name(new_name)?;
        let (parent, leaf) = resolve_parent_and_leaf(path)?;

        let dir = self.resolve_dir(space_id, &parent).await?;
        let entry = self
            .store
            .find_child(space_id, dir.id, &leaf)
            .await?
            .ok_or_else(|| FsError::NotFound(format!("'{leaf}' not found in {}", dir.path)))?;

        self.relocate(&entry, &dir, new_name).await
    }

    /// Rename the file `filename` inside the directory at `path`.
    #[instrument(skip(self))]
    pub async fn rename_file(
        &self,
        space_id: Uuid,
        path: Option<&str>,
        filename: &str,
        new_name: &str,
    ) -> FsResult<FileMetadata> {
        self.require_space(space_id).await?;
        validate_segment_name(new_name)?;
        let (dir, file) = self
            .resolve_file(space_id, &LogicalPath::parse(path), filename)
            .await?;

        self.relocate(&file, &dir, new_name).await?;
        Ok(FileMetadata {
            name: new_name.to_string(),
            path: dir.path.directory_path(),
            size: file.size_bytes.max(0) as u64,
        })
    }

    /// Move the entry `name` from the directory at `path` into the directory
    /// at `destination`, keeping its name.
    ///
    /// Returns the entry's new display path.
    #[instrument(skip(self))]
    pub async fn move_entry(
        &self,
        space_id: Uuid,
        path: Option<&str>,
        name: &str,
        destination: Option<&str>,
    ) -> FsResult<String> {
        self.require_space(space_id).await?;
        let source = self.resolve_dir(space_id, &LogicalPath::parse(path)).await?;
        let entry = self
            .store
            .find_child(space_id, source.id, name)
            .await?
            .ok_or_else(|| FsError::NotFound(format!("'{name}' not found in {}", source.path)))?;

        let target = self
            .resolve_dir(space_id, &LogicalPath::parse(destination))
            .await?;

        if entry.is_folder() {
            // Cheap rejection by path; the store repeats the check against
            // the live tree inside the relocating transaction.
            if !target.is_root() && target.path.starts_with(&source.path.join(name)?) {
                return Err(FsError::BadRequest(format!(
                    "cannot move '{name}' into its own subtree"
                )));
            }

            let height = self.folder_height(space_id, entry.entry_id).await?;
            if target.depth() + height > MAX_FOLDER_DEPTH {
                return Err(FsError::BadRequest(format!(
                    "folders may be nested at most {MAX_FOLDER_DEPTH} levels deep"
                )));
            }
        }

        self.relocate(&entry, &target, name).await
    }

    /// Copy the entry `name` from the directory at `path` into the directory
    /// at `destination`, keeping its name.
    ///
    /// A folder is copied with everything beneath it. Each copied file gets a
    /// blob of its own, written before the new rows are inserted in a single
    /// all-or-nothing batch. Returns the copy's display path.
    #[instrument(skip(self))]
    pub async fn copy_entry(
        &self,
        space_id: Uuid,
        path: Option<&str>,
        name: &str,
        destination: Option<&str>,
    ) -> FsResult<String> {
        self.require_space(space_id).await?;
        let source = self.resolve_dir(space_id, &LogicalPath::parse(path)).await?;
        let entry = self
            .store
            .find_child(space_id, source.id, name)
            .await?
            .ok_or_else(|| FsError::NotFound(format!("'{name}' not found in {}", source.path)))?;

        let target = self
            .resolve_dir(space_id, &LogicalPath::parse(destination))
            .await?;

        if entry.is_folder() {
            if target.path.starts_with(&source.path.join(name)?) {
                return Err(FsError::BadRequest(format!(
                    "cannot copy '{name}' into itself"
                )));
            }
            let height = self.folder_height(space_id, entry.entry_id).await?;
            if target.depth() + height > MAX_FOLDER_DEPTH {
                return Err(FsError::BadRequest(format!(
                    "folders may be nested at most {MAX_FOLDER_DEPTH} levels deep"
                )));
            }
        }
        if self.store.find_child(space_id, target.id, name).await?.is_some() {
            return Err(FsError::Conflict(format!(
                "an entry named '{name}' already exists in {}",
                target.path
            )));
        }

        let plan = self.plan_copy(space_id, entry, target.id).await?;
        let mut written = Vec::new();
        for (row, source_key) in &plan {
            let (Some(from), Some(to)) = (source_key.as_deref(), row.blob_key.as_deref()) else {
                continue;
            };
            if let Err(e) = self.copy_blob(from, to).await {
                self.discard_blobs(&written).await;
                return Err(e);
            }
            written.push(to.to_string());
        }

        let rows: Vec<EntryRow> = plan.into_iter().map(|(row, _)| row).collect();
        if let Err(e) = self.store.insert_entries(&rows).await {
            self.discard_blobs(&written).await;
            return Err(e.into());
        }

        let new_path = join_display(&target.path.display_path(), name);
        info!(
            %space_id,
            from = %source.path,
            to = %new_path,
            entries = rows.len(),
            blobs = written.len(),
            "entry copied"
        );
        Ok(new_path)
    }

    /// File count, folder count and total bytes beneath the directory at
    /// `path`.
    #[instrument(skip(self))]
    pub async fn folder_size(&self, space_id: Uuid, path: Option<&str>) -> FsResult<FolderSize> {
        self.require_space(space_id).await?;
        let dir = self.resolve_dir(space_id, &LogicalPath::parse(path)).await?;

        let stats = self.store.subtree_stats(space_id, dir.id).await?;
        Ok(FolderSize {
            path: dir.path.directory_path(),
            files: stats.files,
            folders: stats.folders,
            total_bytes: stats.total_bytes,
        })
    }

    /// Purge blobs, logging each failure. Returns `(deleted, failed)`.
    pub(crate) async fn purge_blobs(&self, keys: &[String]) -> (usize, usize) {
        if keys.is_empty() {
            return (0, 0);
        }
        let failures = self.blobs.delete_many(keys).await;
        for (key, error) in &failures {
            warn!(key = %key, error = %error, "failed to delete blob, leaving orphan");
        }
        (keys.len() - failures.len(), failures.len())
    }

    pub(crate) async fn require_space(&self, space_id: Uuid) -> FsResult<SpaceRow> {
        self.store
            .get_space(space_id)
            .await?
            .ok_or_else(|| FsError::NotFound(format!("space {space_id} not found")))
    }

    async fn resolve_dir(
        &self,
        space_id: Uuid,
        path: &LogicalPath,
    ) -> FsResult<ResolvedDirectory> {
        match self.resolver.resolve(space_id, path).await? {
            Resolution::Directory(dir) => Ok(dir),
            Resolution::Missing { segment } => Err(FsError::NotFound(format!(
                "folder '{segment}' in {path} not found"
            ))),
        }
    }

    async fn resolve_file(
        &self,
        space_id: Uuid,
        path: &LogicalPath,
        filename: &str,
    ) -> FsResult<(ResolvedDirectory, EntryRow)> {
        self.resolver
            .resolve_file(space_id, path, filename)
            .await?
            .ok_or_else(|| FsError::NotFound(format!("file '{filename}' in {path} not found")))
    }

    async fn delete_subtree(
        &self,
        space_id: Uuid,
        root: Option<Uuid>,
    ) -> FsResult<FolderDeletion> {
        let keys = self.store.delete_subtree(space_id, root).await?;
        let (blobs_deleted, blob_failures) = self.purge_blobs(&keys).await;
        Ok(FolderDeletion {
            files_removed: keys.len(),
            blobs_deleted,
            blob_failures,
        })
    }

    /// Blob first, then the entry.
    async fn remove_file(&self, file: &EntryRow) -> FsResult<()> {
        let blob_key = blob_key_of(file)?;
        match self
            .retry
            .run("delete", blob_key, || self.blobs.delete(blob_key))
            .await
        {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.store.delete_entry(file.space_id, file.entry_id).await?;
        Ok(())
    }

    /// Fresh rows for a copy of `root` and its subtree under `parent`,
    /// parents ahead of children. File rows carry a new blob key and are
    /// paired with the key their content comes from.
    async fn plan_copy(
        &self,
        space_id: Uuid,
        root: EntryRow,
        parent: Option<Uuid>,
    ) -> FsResult<Vec<(EntryRow, Option<String>)>> {
        let mut plan = Vec::new();
        let mut queue = VecDeque::from([(root, parent)]);
        while let Some((original, parent)) = queue.pop_front() {
            if original.is_folder() {
                let copy = EntryRow::new_folder(space_id, parent, &original.name);
                for child in self.store.get_children(space_id, Some(original.entry_id)).await? {
                    queue.push_back((child, Some(copy.entry_id)));
                }
                plan.push((copy, None));
            } else {
                let source_key = blob_key_of(&original)?.to_string();
                let copy = EntryRow::new_file(
                    space_id,
                    parent,
                    &original.name,
                    blob_key_for(space_id, Uuid::new_v4()),
                    original.size_bytes,
                );
                plan.push((copy, Some(source_key)));
            }
        }
        Ok(plan)
    }

    async fn copy_blob(&self, from: &str, to: &str) -> FsResult<()> {
        let data = self
            .retry
            .run("get", from, || self.blobs.get(from))
            .await?;
        self.put_blob(to, data).await
    }

    async fn overwrite_file(
        &self,
        dir: &ResolvedDirectory,
        existing: EntryRow,
        data: Bytes,
    ) -> FsResult<FileMetadata> {
        if existing.is_folder() {
            return Err(FsError::Conflict(format!(
                "a folder named '{}' already exists in {}",
                existing.name, dir.path
            )));
        }
        let blob_key = blob_key_of(&existing)?;
        self.put_blob(blob_key, data.clone()).await?;

        let now = OffsetDateTime::now_utc();
        if let Err(e) = self
            .store
            .update_file_content(existing.space_id, existing.entry_id, data.len() as i64, now)
            .await
        {
            // Deleted underneath us; nothing references the blob any more.
            if matches!(e, MetadataError::NotFound(_)) {
                self.discard_blob(blob_key).await;
            }
            return Err(e.into());
        }

        info!(
            space_id = %existing.space_id,
            dir = %dir.path,
            file = %existing.name,
            size = data.len(),
            "file overwritten"
        );
        Ok(FileMetadata {
            name: existing.name,
            path: dir.path.directory_path(),
            size: data.len() as u64,
        })
    }

    async fn relocate(
        &self,
        entry: &EntryRow,
        target: &ResolvedDirectory,
        new_name: &str,
    ) -> FsResult<String> {
        if entry.parent() == target.id && entry.name == new_name {
            return Ok(join_display(&target.path.display_path(), new_name));
        }

        self.store
            .relocate_entry(
                entry.space_id,
                entry.entry_id,
                target.id,
                new_name,
                OffsetDateTime::now_utc(),
            )
            .await?;

        let new_path = join_display(&target.path.display_path(), new_name);
        info!(
            space_id = %entry.space_id,
            from = %entry.name,
            to = %new_path,
            "entry relocated"
        );
        Ok(new_path)
    }

    /// Levels a folder occupies counting itself (1 for an empty folder).
    async fn folder_height(&self, space_id: Uuid, folder_id: Uuid) -> FsResult<usize> {
        let mut height = 0;
        let mut level = vec![folder_id];
        while !level.is_empty() && height <= MAX_FOLDER_DEPTH {
            height += 1;
            let mut next = Vec::new();
            for id in level {
                let listing = self.store.list_children(space_id, Some(id)).await?;
                next.extend(listing.sub_folders.into_iter().map(|f| f.entry_id));
            }
            level = next;
        }
        Ok(height)
    }

    async fn put_blob(&self, key: &str, data: Bytes) -> FsResult<()> {
        self.retry
            .run("put", key, || self.blobs.put(key, data.clone()))
            .await?;
        debug!(key = key, size = data.len(), "blob written");
        Ok(())
    }

    async fn discard_blobs(&self, keys: &[String]) {
        for key in keys {
            self.discard_blob(key).await;
        }
    }

    async fn discard_blob(&self, key: &str) {
        if let Err(e) = self.blobs.delete(key).await
            && !matches!(e, StorageError::NotFound(_))
        {
            warn!(key = key, error = %e, "failed to discard unused blob, leaving orphan");
        }
    }
}

fn blob_key_of(file: &EntryRow) -> FsResult<&str> {
    file.blob_key.as_deref().ok_or_else(|| {
        FsError::Metadata(MetadataError::Internal(format!(
            "file entry {} has no blob key",
            file.entry_id
        )))
    })
}

fn file_metadata(dir: &LogicalPath, file: &EntryRow) -> FileMetadata {
    FileMetadata {
        name: file.name.clone(),
        path: dir.directory_path(),
        size: file.size_bytes.max(0) as u64,
    }
}
