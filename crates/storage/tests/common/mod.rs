//! Shared checks run against every backend.

use bytes::Bytes;
use docspace_storage::{ObjectStore, StorageError};
use std::sync::Arc;

/// Behaviour every backend must share.
pub async fn assert_object_store_contract(store: Arc<dyn ObjectStore>) {
    let space = "spaces/0b9e4f5c-contract";
    let key = format!("{space}/blob-1");

    assert!(!store.exists(&key).await.unwrap());
    assert!(matches!(
        store.get(&key).await,
        Err(StorageError::NotFound(_))
    ));

    store.put(&key, Bytes::from_static(b"v1")).await.unwrap();
    store.put(&key, Bytes::from_static(b"version-2")).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), Bytes::from_static(b"version-2"));
    assert_eq!(store.head(&key).await.unwrap().size, 9);

    store
        .put(&format!("{space}/blob-2"), Bytes::from_static(b"x"))
        .await
        .unwrap();
    store
        .put("spaces/other/blob-3", Bytes::from_static(b"y"))
        .await
        .unwrap();

    let mut listed = store.list(&format!("{space}/")).await.unwrap();
    listed.sort();
    assert_eq!(listed, vec![key.clone(), format!("{space}/blob-2")]);

    store.delete(&key).await.unwrap();
    assert!(matches!(
        store.delete(&key).await,
        Err(StorageError::NotFound(_))
    ));

    let failures = store
        .delete_many(&[format!("{space}/blob-2"), key.clone()])
        .await;
    assert!(failures.is_empty());
    assert!(store.list(&format!("{space}/")).await.unwrap().is_empty());
    assert!(store.exists("spaces/other/blob-3").await.unwrap());
}

/// Concurrent writers to one key leave exactly one complete value behind.
pub async fn assert_concurrent_overwrites(store: Arc<dyn ObjectStore>) {
    let key = "spaces/race/blob";
    let mut handles = Vec::new();
    for i in 0..8u8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.put(key, Bytes::from(vec![i; 1024])).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let data = store.get(key).await.unwrap();
    assert_eq!(data.len(), 1024);
    assert!(data.iter().all(|b| *b == data[0]));
    assert_eq!(store.list("spaces/race/").await.unwrap().len(), 1);
}
