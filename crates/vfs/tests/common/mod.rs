//! Test harness for the filesystem service and space registry.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use docspace_metadata::{MemoryStore, MetadataStore, SqliteStore};
use docspace_storage::{MemoryBackend, ObjectMeta, ObjectStore, StorageError, StorageResult};
use docspace_vfs::{FilesystemService, PathResolver, RetryPolicy, SpaceRegistry};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// Blob store that fails on demand.
///
/// Wraps a [`MemoryBackend`]; `fail_puts(n)` makes the next `n` puts fail
/// with a transient error, `fail_deletes(n)` does the same for deletes and
/// `fail_deletes_for(key)` makes every delete of that key fail.
#[derive(Default)]
pub struct FlakyBackend {
    inner: MemoryBackend,
    put_failures: AtomicU32,
    put_calls: AtomicU32,
    failing_deletes: Mutex<HashSet<String>>,
    delete_failures: AtomicU32,
    put_allowance: Mutex<Option<u32>>,
    fail_all_deletes: std::sync::atomic::AtomicBool,
}

impl FlakyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts(&self, count: u32) {
        self.put_failures.store(count, Ordering::SeqCst);
    }

    /// Let `n` more puts succeed and fail every one after; `None` lifts
    /// the limit.
    pub fn allow_puts(&self, n: Option<u32>) {
        *self.put_allowance.lock().unwrap() = n;
    }

    pub fn put_calls(&self) -> u32 {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn fail_deletes_for(&self, key: &str) {
        self.failing_deletes.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_deletes(&self, count: u32) {
        self.delete_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_all_deletes(&self, fail: bool) {
        self.fail_all_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn keys(&self) -> Vec<String> {
        self.inner.keys().await
    }
}

#[async_trait]
impl ObjectStore for FlakyBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.put_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.put_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("injected put failure".to_string()));
        }
        if let Some(allowance) = self.put_allowance.lock().unwrap().as_mut() {
            if *allowance == 0 {
                return Err(StorageError::Unavailable("injected put failure".to_string()));
            }
            *allowance -= 1;
        }
        self.inner.put(key, data).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let blocked = self.fail_all_deletes.load(Ordering::SeqCst)
            || self.failing_deletes.lock().unwrap().contains(key);
        if blocked {
            return Err(StorageError::Unavailable("injected delete failure".to_string()));
        }
        let remaining = self.delete_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.delete_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("injected delete failure".to_string()));
        }
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }

    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// A wired-up service stack over a scratch database and a flaky blob store.
pub struct TestFs {
    pub store: Arc<dyn MetadataStore>,
    pub blobs: Arc<FlakyBackend>,
    pub fs: Arc<FilesystemService>,
    pub spaces: SpaceRegistry,
    _temp_dir: Option<TempDir>,
}

impl TestFs {
    /// Stack over a SQLite database in a temp directory.
    pub async fn sqlite() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store = SqliteStore::new(temp_dir.path().join("test.db"), None)
            .await
            .expect("Failed to open SQLite store");
        Self::with_store(Arc::new(store), Some(temp_dir))
    }

    /// Stack over the in-memory metadata store.
    pub fn memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), None)
    }

    fn with_store(store: Arc<dyn MetadataStore>, temp_dir: Option<TempDir>) -> Self {
        let blobs = Arc::new(FlakyBackend::new());
        let resolver = Arc::new(PathResolver::new(store.clone()));
        let fs = Arc::new(FilesystemService::new(
            store.clone(),
            resolver,
            blobs.clone(),
            RetryPolicy::new(3, Duration::from_millis(1)),
        ));
        let spaces = SpaceRegistry::new(store.clone(), fs.clone(), blobs.clone());
        Self {
            store,
            blobs,
            fs,
            spaces,
            _temp_dir: temp_dir,
        }
    }

    pub async fn space(&self, name: &str) -> Uuid {
        self.spaces
            .create_space(name)
            .await
            .expect("Failed to create space")
            .id
    }

    pub async fn upload(&self, space: Uuid, path: &str, name: &str, body: &str) {
        self.fs
            .upload_file(space, Some(path), name, Bytes::from(body.to_string()))
            .await
            .expect("Failed to upload file");
    }

    pub async fn document_names(&self, space: Uuid) -> Vec<String> {
        self.fs
            .list_all_documents(space)
            .await
            .expect("Failed to list documents")
            .into_iter()
            .map(|d| d.name)
            .collect()
    }
}

/// Run a test against both metadata store implementations.
pub async fn run_fs_test_both<F, Fut>(test_fn: F)
where
    F: Fn(TestFs) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    test_fn(TestFs::sqlite().await).await;
    test_fn(TestFs::memory()).await;
}
