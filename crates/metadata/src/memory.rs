//! In-memory metadata store for tests.
//!
//! Every operation runs under a single lock, so the sibling and name-key
//! uniqueness checks are atomic with the write that follows them.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{EntryRow, SpaceRow};
use crate::repos::{EntryRepo, SpaceRepo, SubtreeStats};
use crate::store::MetadataStore;
use async_trait::async_trait;
use docspace_core::{logical_parent, persisted_parent};
use std::collections::{BTreeMap, HashMap, HashSet};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    spaces: BTreeMap<Uuid, SpaceRow>,
    entries: HashMap<Uuid, EntryRow>,
}

impl State {
    fn sibling_taken(&self, space_id: Uuid, parent_id: Uuid, name: &str, except: Option<Uuid>) -> bool {
        self.entries.values().any(|e| {
            e.space_id == space_id
                && e.parent_id == parent_id
                && e.name == name
                && Some(e.entry_id) != except
        })
    }

    fn ensure_parent_folder(&self, space_id: Uuid, parent_id: Option<Uuid>) -> MetadataResult<()> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        match self.entries.get(&parent_id) {
            Some(parent) if parent.space_id == space_id && parent.is_folder() => Ok(()),
            _ => Err(MetadataError::NotFound(format!(
                "parent folder {parent_id} not found"
            ))),
        }
    }

    /// Ids of every entry beneath `parent_id`, excluding it.
    fn descendants(&self, space_id: Uuid, parent_id: Uuid) -> Vec<Uuid> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut frontier = vec![parent_id];
        while let Some(current) = frontier.pop() {
            for entry in self.entries.values() {
                if entry.space_id == space_id
                    && entry.parent_id == current
                    && seen.insert(entry.entry_id)
                {
                    found.push(entry.entry_id);
                    frontier.push(entry.entry_id);
                }
            }
        }
        found
    }

    fn insert(&mut self, entry: &EntryRow) -> MetadataResult<()> {
        if !self.spaces.contains_key(&entry.space_id) {
            return Err(MetadataError::NotFound(format!(
                "space {} not found",
                entry.space_id
            )));
        }
        self.ensure_parent_folder(entry.space_id, entry.parent())?;
        if self.sibling_taken(entry.space_id, entry.parent_id, &entry.name, None) {
            return Err(MetadataError::AlreadyExists(format!(
                "an entry named '{}' already exists",
                entry.name
            )));
        }
        if let Some(key) = &entry.blob_key
            && self
                .entries
                .values()
                .any(|e| e.blob_key.as_deref() == Some(key.as_str()))
        {
            return Err(MetadataError::AlreadyExists(format!(
                "blob key '{key}' already in use"
            )));
        }
        self.entries.insert(entry.entry_id, entry.clone());
        Ok(())
    }

    /// Whether `entry_id` is `start` or one of its ancestors.
    fn is_ancestor_or_self(&self, entry_id: Uuid, start: Option<Uuid>) -> bool {
        let mut seen = HashSet::new();
        let mut current = start;
        while let Some(id) = current {
            if id == entry_id {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            current = self
                .entries
                .get(&id)
                .and_then(|e| logical_parent(e.parent_id));
        }
        false
    }

    fn sorted(mut rows: Vec<EntryRow>) -> Vec<EntryRow> {
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.entry_id.cmp(&b.entry_id)));
        rows
    }
}

/// Metadata store held entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn migrate(&self) -> MetadataResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        Ok(())
    }
}

#[async_trait]
impl SpaceRepo for MemoryStore {
    async fn create_space(&self, space: &SpaceRow) -> MetadataResult<()> {
        let mut state = self.state.lock().await;
        if state.spaces.values().any(|s| s.name_key == space.name_key) {
            return Err(MetadataError::AlreadyExists(format!(
                "space '{}' already exists",
                space.name
            )));
        }
        state.spaces.insert(space.space_id, space.clone());
        Ok(())
    }

    async fn list_spaces(&self) -> MetadataResult<Vec<SpaceRow>> {
        let state = self.state.lock().await;
        let mut spaces: Vec<SpaceRow> = state.spaces.values().cloned().collect();
        spaces.sort_by(|a, b| a.name_key.cmp(&b.name_key));
        Ok(spaces)
    }

    async fn get_space(&self, space_id: Uuid) -> MetadataResult<Option<SpaceRow>> {
        Ok(self.state.lock().await.spaces.get(&space_id).cloned())
    }

    async fn delete_space(&self, space_id: Uuid) -> MetadataResult<Vec<String>> {
        let mut state = self.state.lock().await;
        if state.spaces.remove(&space_id).is_none() {
            return Err(MetadataError::NotFound(format!(
                "space {space_id} not found"
            )));
        }
        let mut blob_keys = Vec::new();
        state.entries.retain(|_, entry| {
            if entry.space_id != space_id {
                return true;
            }
            if let Some(key) = entry.blob_key.take() {
                blob_keys.push(key);
            }
            false
        });
        Ok(blob_keys)
    }
}

#[async_trait]
impl EntryRepo for MemoryStore {
    async fn insert_entry(&self, entry: &EntryRow) -> MetadataResult<()> {
        self.state.lock().await.insert(entry)
    }

    async fn insert_entries(&self, entries: &[EntryRow]) -> MetadataResult<()> {
        let mut state = self.state.lock().await;
        for (inserted, entry) in entries.iter().enumerate() {
            if let Err(e) = state.insert(entry) {
                for undo in &entries[..inserted] {
                    state.entries.remove(&undo.entry_id);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    async fn get_entry(&self, space_id: Uuid, entry_id: Uuid) -> MetadataResult<Option<EntryRow>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .get(&entry_id)
            .filter(|e| e.space_id == space_id)
            .cloned())
    }

    async fn find_child(
        &self,
        space_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> MetadataResult<Option<EntryRow>> {
        let parent_id = persisted_parent(parent_id);
        let state = self.state.lock().await;
        Ok(state
            .entries
            .values()
            .find(|e| e.space_id == space_id && e.parent_id == parent_id && e.name == name)
            .cloned())
    }

    async fn get_children(
        &self,
        space_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> MetadataResult<Vec<EntryRow>> {
        let parent_id = persisted_parent(parent_id);
        let state = self.state.lock().await;
        let children = state
            .entries
            .values()
            .filter(|e| e.space_id == space_id && e.parent_id == parent_id)
            .cloned()
            .collect();
        Ok(State::sorted(children))
    }

    async fn list_all_files(&self, space_id: Uuid) -> MetadataResult<Vec<EntryRow>> {
        let state = self.state.lock().await;
        let files = state
            .entries
            .values()
            .filter(|e| e.space_id == space_id && e.is_file())
            .cloned()
            .collect();
        Ok(State::sorted(files))
    }

    async fn update_file_content(
        &self,
        space_id: Uuid,
        entry_id: Uuid,
        size_bytes: i64,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()> {
        let mut state = self.state.lock().await;
        match state.entries.get_mut(&entry_id) {
            Some(entry) if entry.space_id == space_id && entry.is_file() => {
                entry.size_bytes = size_bytes;
                entry.updated_at = updated_at;
                Ok(())
            }
            _ => Err(MetadataError::NotFound(format!(
                "file entry {entry_id} not found"
            ))),
        }
    }

    async fn relocate_entry(
        &self,
        space_id: Uuid,
        entry_id: Uuid,
        new_parent_id: Option<Uuid>,
        new_name: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()> {
        let mut state = self.state.lock().await;
        state.ensure_parent_folder(space_id, new_parent_id)?;
        if state.is_ancestor_or_self(entry_id, new_parent_id) {
            return Err(MetadataError::InvalidMove(
                "a folder cannot be moved into itself or its own subtree".to_string(),
            ));
        }
        let parent_id = persisted_parent(new_parent_id);
        if state.sibling_taken(space_id, parent_id, new_name, Some(entry_id)) {
            return Err(MetadataError::AlreadyExists(format!(
                "an entry named '{new_name}' already exists"
            )));
        }
        match state.entries.get_mut(&entry_id) {
            Some(entry) if entry.space_id == space_id => {
                entry.parent_id = parent_id;
                entry.name = new_name.to_string();
                entry.updated_at = updated_at;
                Ok(())
            }
            _ => Err(MetadataError::NotFound(format!("entry {entry_id} not found"))),
        }
    }

    async fn delete_entry(&self, space_id: Uuid, entry_id: Uuid) -> MetadataResult<()> {
        let mut state = self.state.lock().await;
        match state.entries.get(&entry_id) {
            Some(entry) if entry.space_id == space_id => {
                state.entries.remove(&entry_id);
                Ok(())
            }
            _ => Err(MetadataError::NotFound(format!("entry {entry_id} not found"))),
        }
    }

    async fn delete_subtree(
        &self,
        space_id: Uuid,
        root_id: Option<Uuid>,
    ) -> MetadataResult<Vec<String>> {
        let mut state = self.state.lock().await;
        let mut doomed = Vec::new();
        if let Some(root_id) = root_id {
            if !state
                .entries
                .get(&root_id)
                .is_some_and(|e| e.space_id == space_id)
            {
                return Err(MetadataError::NotFound(format!("entry {root_id} not found")));
            }
            doomed.push(root_id);
        }
        doomed.extend(state.descendants(space_id, persisted_parent(root_id)));

        let blob_keys = doomed
            .iter()
            .filter_map(|id| state.entries.remove(id))
            .filter_map(|entry| entry.blob_key)
            .collect();
        Ok(blob_keys)
    }

    async fn subtree_stats(
        &self,
        space_id: Uuid,
        root_id: Option<Uuid>,
    ) -> MetadataResult<SubtreeStats> {
        let state = self.state.lock().await;
        let mut stats = SubtreeStats::default();
        for id in state.descendants(space_id, persisted_parent(root_id)) {
            if let Some(entry) = state.entries.get(&id) {
                if entry.is_folder() {
                    stats.folders += 1;
                } else {
                    stats.files += 1;
                    stats.total_bytes += entry.size_bytes.max(0) as u64;
                }
            }
        }
        Ok(stats)
    }
}
