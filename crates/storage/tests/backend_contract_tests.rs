mod common;

use common::{assert_concurrent_overwrites, assert_object_store_contract};
use docspace_storage::{FilesystemBackend, MemoryBackend, ObjectStore};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_filesystem_backend_contract() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(FilesystemBackend::new(dir.path()).await.unwrap());
    assert_object_store_contract(store).await;
}

#[tokio::test]
async fn test_memory_backend_contract() {
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryBackend::new());
    assert_object_store_contract(store).await;
}

#[tokio::test]
async fn test_filesystem_concurrent_overwrites() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(FilesystemBackend::new(dir.path()).await.unwrap());
    assert_concurrent_overwrites(store).await;
}

#[tokio::test]
async fn test_memory_concurrent_overwrites() {
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryBackend::new());
    assert_concurrent_overwrites(store).await;
}
