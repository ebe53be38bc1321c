//! Entry tree tests across metadata store implementations.

mod common;

use common::{TestMetadata, create_space, run_metadata_test_all};
use docspace_metadata::{EntryRepo, EntryRow, MemoryStore, MetadataError, MetadataStore};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

fn file_row(space_id: Uuid, parent: Option<Uuid>, name: &str, size: i64) -> EntryRow {
    EntryRow::new_file(
        space_id,
        parent,
        name,
        format!("spaces/{space_id}/{}", Uuid::new_v4()),
        size,
    )
}

#[tokio::test]
async fn test_create_folder_reports_display_path() {
    run_metadata_test_all(|store| async move {
        let space = create_space(&store, "paths").await;

        let docs = store
            .create_folder(space.space_id, None, "docs")
            .await
            .unwrap();
        assert_eq!(docs.display_path, "docs");

        let notes = store
            .create_folder(space.space_id, Some(docs.entry.entry_id), "notes")
            .await
            .unwrap();
        assert_eq!(notes.display_path, "docs/notes");

        let found = store
            .find_child(space.space_id, Some(docs.entry.entry_id), "notes")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.entry_id, notes.entry.entry_id);
        assert!(found.is_folder());
        assert_eq!(found.parent(), Some(docs.entry.entry_id));
    })
    .await;
}

#[tokio::test]
async fn test_sibling_names_unique_regardless_of_kind() {
    run_metadata_test_all(|store| async move {
        let space = create_space(&store, "siblings").await;
        let docs = store
            .create_folder(space.space_id, None, "docs")
            .await
            .unwrap();

        let err = store
            .create_folder(space.space_id, None, "docs")
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::AlreadyExists(_)), "got {err:?}");

        let err = store
            .insert_entry(&file_row(space.space_id, None, "docs", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::AlreadyExists(_)), "got {err:?}");

        // Same name one level down, or in another space, is fine.
        store
            .create_folder(space.space_id, Some(docs.entry.entry_id), "docs")
            .await
            .unwrap();
        let other = create_space(&store, "elsewhere").await;
        store
            .create_folder(other.space_id, None, "docs")
            .await
            .unwrap();
    })
    .await;
}

#[tokio::test]
async fn test_insert_under_missing_parent_fails() {
    run_metadata_test_all(|store| async move {
        let space = create_space(&store, "orphans").await;

        let err = store
            .create_folder(space.space_id, Some(Uuid::new_v4()), "lost")
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)), "got {err:?}");

        // A file is not a valid parent either.
        let file = file_row(space.space_id, None, "a.txt", 1);
        store.insert_entry(&file).await.unwrap();
        let err = store
            .insert_entry(&file_row(space.space_id, Some(file.entry_id), "b.txt", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)), "got {err:?}");
    })
    .await;
}

#[tokio::test]
async fn test_list_children_partitions_and_orders() {
    run_metadata_test_all(|store| async move {
        let space = create_space(&store, "listing").await;
        store
            .insert_entry(&file_row(space.space_id, None, "zeta.txt", 1))
            .await
            .unwrap();
        store
            .insert_entry(&file_row(space.space_id, None, "alpha.txt", 1))
            .await
            .unwrap();
        store
            .create_folder(space.space_id, None, "notes")
            .await
            .unwrap();
        let docs = store
            .create_folder(space.space_id, None, "docs")
            .await
            .unwrap();
        store
            .insert_entry(&file_row(
                space.space_id,
                Some(docs.entry.entry_id),
                "nested.txt",
                1,
            ))
            .await
            .unwrap();

        let listing = store.list_children(space.space_id, None).await.unwrap();
        assert_eq!(listing.files, vec!["alpha.txt", "zeta.txt"]);
        let folders: Vec<&str> = listing
            .sub_folders
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(folders, vec!["docs", "notes"]);

        let nested = store
            .list_children(space.space_id, Some(docs.entry.entry_id))
            .await
            .unwrap();
        assert_eq!(nested.files, vec!["nested.txt"]);
        assert!(nested.sub_folders.is_empty());
    })
    .await;
}

#[tokio::test]
async fn test_list_all_files_ignores_folders() {
    run_metadata_test_all(|store| async move {
        let space = create_space(&store, "flat").await;
        let a = store.create_folder(space.space_id, None, "a").await.unwrap();
        let b = store
            .create_folder(space.space_id, Some(a.entry.entry_id), "b")
            .await
            .unwrap();
        for (parent, name) in [
            (None, "root.txt"),
            (Some(a.entry.entry_id), "one.txt"),
            (Some(b.entry.entry_id), "two.txt"),
        ] {
            store
                .insert_entry(&file_row(space.space_id, parent, name, 1))
                .await
                .unwrap();
        }

        let names: Vec<String> = store
            .list_all_files(space.space_id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["one.txt", "root.txt", "two.txt"]);
    })
    .await;
}

#[tokio::test]
async fn test_update_file_content() {
    run_metadata_test_all(|store| async move {
        let space = create_space(&store, "content").await;
        let file = file_row(space.space_id, None, "a.txt", 3);
        store.insert_entry(&file).await.unwrap();

        store
            .update_file_content(space.space_id, file.entry_id, 42, OffsetDateTime::now_utc())
            .await
            .unwrap();
        let updated = store
            .get_entry(space.space_id, file.entry_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.size_bytes, 42);
        assert_eq!(updated.blob_key, file.blob_key);

        let folder = store
            .create_folder(space.space_id, None, "docs")
            .await
            .unwrap();
        let err = store
            .update_file_content(space.space_id, folder.entry.entry_id, 1, OffsetDateTime::now_utc())
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)), "got {err:?}");
    })
    .await;
}

#[tokio::test]
async fn test_relocate_entry_renames_and_moves() {
    run_metadata_test_all(|store| async move {
        let space = create_space(&store, "moves").await;
        let docs = store
            .create_folder(space.space_id, None, "docs")
            .await
            .unwrap();
        let archive = store
            .create_folder(space.space_id, None, "archive")
            .await
            .unwrap();
        let file = file_row(space.space_id, Some(docs.entry.entry_id), "a.txt", 1);
        store.insert_entry(&file).await.unwrap();

        store
            .relocate_entry(
                space.space_id,
                docs.entry.entry_id,
                None,
                "documents",
                OffsetDateTime::now_utc(),
            )
            .await
            .unwrap();
        assert_eq!(
            store
                .display_path(space.space_id, file.entry_id)
                .await
                .unwrap(),
            "documents/a.txt"
        );

        store
            .relocate_entry(
                space.space_id,
                file.entry_id,
                Some(archive.entry.entry_id),
                "a.txt",
                OffsetDateTime::now_utc(),
            )
            .await
            .unwrap();
        assert_eq!(
            store
                .display_path(space.space_id, file.entry_id)
                .await
                .unwrap(),
            "archive/a.txt"
        );

        let err = store
            .relocate_entry(
                space.space_id,
                archive.entry.entry_id,
                None,
                "documents",
                OffsetDateTime::now_utc(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::AlreadyExists(_)), "got {err:?}");

        let err = store
            .relocate_entry(
                space.space_id,
                Uuid::new_v4(),
                None,
                "ghost",
                OffsetDateTime::now_utc(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)), "got {err:?}");
    })
    .await;
}

#[tokio::test]
async fn test_delete_entry_twice_is_not_found() {
    run_metadata_test_all(|store| async move {
        let space = create_space(&store, "deletes").await;
        let file = file_row(space.space_id, None, "a.txt", 1);
        store.insert_entry(&file).await.unwrap();

        store.delete_entry(space.space_id, file.entry_id).await.unwrap();
        let err = store
            .delete_entry(space.space_id, file.entry_id)
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)), "got {err:?}");
    })
    .await;
}

#[tokio::test]
async fn test_delete_subtree_collects_nested_blob_keys() {
    run_metadata_test_all(|store| async move {
        let space = create_space(&store, "subtree").await;
        let docs = store
            .create_folder(space.space_id, None, "docs")
            .await
            .unwrap();
        let notes = store
            .create_folder(space.space_id, Some(docs.entry.entry_id), "notes")
            .await
            .unwrap();
        let outside = file_row(space.space_id, None, "hello.txt", 5);
        let shallow = file_row(space.space_id, Some(docs.entry.entry_id), "a.txt", 1);
        let deep = file_row(space.space_id, Some(notes.entry.entry_id), "b.txt", 2);
        for row in [&outside, &shallow, &deep] {
            store.insert_entry(row).await.unwrap();
        }

        let mut keys = store
            .delete_subtree(space.space_id, Some(docs.entry.entry_id))
            .await
            .unwrap();
        keys.sort();
        let mut expected = vec![
            shallow.blob_key.clone().unwrap(),
            deep.blob_key.clone().unwrap(),
        ];
        expected.sort();
        assert_eq!(keys, expected);

        assert!(
            store
                .get_entry(space.space_id, notes.entry.entry_id)
                .await
                .unwrap()
                .is_none()
        );
        let remaining: Vec<String> = store
            .list_all_files(space.space_id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(remaining, vec!["hello.txt"]);

        let err = store
            .delete_subtree(space.space_id, Some(docs.entry.entry_id))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)), "got {err:?}");
    })
    .await;
}

#[tokio::test]
async fn test_delete_subtree_at_root_clears_space() {
    run_metadata_test_all(|store| async move {
        let space = create_space(&store, "wipe").await;
        let docs = store
            .create_folder(space.space_id, None, "docs")
            .await
            .unwrap();
        store
            .insert_entry(&file_row(space.space_id, Some(docs.entry.entry_id), "a.txt", 1))
            .await
            .unwrap();
        store
            .insert_entry(&file_row(space.space_id, None, "b.txt", 1))
            .await
            .unwrap();

        let keys = store.delete_subtree(space.space_id, None).await.unwrap();
        assert_eq!(keys.len(), 2);

        let listing = store.list_children(space.space_id, None).await.unwrap();
        assert!(listing.files.is_empty());
        assert!(listing.sub_folders.is_empty());

        // Clearing an empty root is not an error.
        assert!(store.delete_subtree(space.space_id, None).await.unwrap().is_empty());
    })
    .await;
}

#[tokio::test]
async fn test_subtree_stats() {
    run_metadata_test_all(|store| async move {
        let space = create_space(&store, "stats").await;
        let docs = store
            .create_folder(space.space_id, None, "docs")
            .await
            .unwrap();
        let notes = store
            .create_folder(space.space_id, Some(docs.entry.entry_id), "notes")
            .await
            .unwrap();
        store
            .insert_entry(&file_row(space.space_id, Some(docs.entry.entry_id), "a.txt", 10))
            .await
            .unwrap();
        store
            .insert_entry(&file_row(space.space_id, Some(notes.entry.entry_id), "b.txt", 32))
            .await
            .unwrap();
        store
            .insert_entry(&file_row(space.space_id, None, "c.txt", 100))
            .await
            .unwrap();

        let stats = store
            .subtree_stats(space.space_id, Some(docs.entry.entry_id))
            .await
            .unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.folders, 1);
        assert_eq!(stats.total_bytes, 42);

        let whole = store.subtree_stats(space.space_id, None).await.unwrap();
        assert_eq!(whole.files, 3);
        assert_eq!(whole.folders, 2);
        assert_eq!(whole.total_bytes, 142);
    })
    .await;
}

#[tokio::test]
async fn test_relocate_into_own_subtree_is_invalid() {
    run_metadata_test_all(|store| async move {
        let space = create_space(&store, "cycles").await;
        let a = store.create_folder(space.space_id, None, "a").await.unwrap();
        let b = store
            .create_folder(space.space_id, Some(a.entry.entry_id), "b")
            .await
            .unwrap();
        let c = store
            .create_folder(space.space_id, Some(b.entry.entry_id), "c")
            .await
            .unwrap();

        for target in [a.entry.entry_id, b.entry.entry_id, c.entry.entry_id] {
            let err = store
                .relocate_entry(
                    space.space_id,
                    a.entry.entry_id,
                    Some(target),
                    "a",
                    OffsetDateTime::now_utc(),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, MetadataError::InvalidMove(_)), "got {err:?}");
        }

        assert_eq!(
            store
                .display_path(space.space_id, c.entry.entry_id)
                .await
                .unwrap(),
            "a/b/c"
        );

        // Moving sideways out of the subtree is fine.
        store
            .relocate_entry(space.space_id, c.entry.entry_id, None, "c", OffsetDateTime::now_utc())
            .await
            .unwrap();
    })
    .await;
}

#[tokio::test]
async fn test_insert_into_missing_space_is_not_found() {
    run_metadata_test_all(|store| async move {
        let err = store
            .create_folder(Uuid::new_v4(), None, "orphan")
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)), "got {err:?}");

        let err = store
            .insert_entry(&file_row(Uuid::new_v4(), None, "orphan.txt", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)), "got {err:?}");
    })
    .await;
}

async fn assert_crossing_relocations_keep_a_tree(store: Arc<dyn MetadataStore>) {
    for round in 0..5 {
        let space = create_space(&store, &format!("crossing-{round}")).await;
        let a = store.create_folder(space.space_id, None, "a").await.unwrap();
        let b = store.create_folder(space.space_id, None, "b").await.unwrap();

        let (a_id, b_id) = (a.entry.entry_id, b.entry.entry_id);
        let a_into_b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .relocate_entry(space.space_id, a_id, Some(b_id), "a", OffsetDateTime::now_utc())
                    .await
            })
        };
        let b_into_a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .relocate_entry(space.space_id, b_id, Some(a_id), "b", OffsetDateTime::now_utc())
                    .await
            })
        };
        let results = [a_into_b.await.unwrap(), b_into_a.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "{results:?}");
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(MetadataError::InvalidMove(_)))),
            "{results:?}"
        );

        // Exactly one folder is left at the root and both paths still resolve.
        let listing = store.list_children(space.space_id, None).await.unwrap();
        assert_eq!(listing.sub_folders.len(), 1);
        store.display_path(space.space_id, a_id).await.unwrap();
        store.display_path(space.space_id, b_id).await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_crossing_relocations_sqlite() {
    let metadata = TestMetadata::new().await.unwrap();
    assert_crossing_relocations_keep_a_tree(metadata.store()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_crossing_relocations_memory() {
    assert_crossing_relocations_keep_a_tree(Arc::new(MemoryStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_crossing_relocations_postgres() {
    let Some(postgres) = common::postgres_or_skip().await else {
        return;
    };
    assert_crossing_relocations_keep_a_tree(postgres.store()).await;
}

async fn assert_one_concurrent_create_wins(store: Arc<dyn MetadataStore>) {
    let space = create_space(&store, "race").await;

    let attempts = (0..8).map(|_| {
        let store = store.clone();
        async move { store.create_folder(space.space_id, None, "contested").await }
    });
    let results = futures::future::join_all(attempts).await;

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(MetadataError::AlreadyExists(_))))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);

    let listing = store.list_children(space.space_id, None).await.unwrap();
    assert_eq!(listing.sub_folders.len(), 1);
}

#[tokio::test]
async fn test_concurrent_create_folder_sqlite() {
    let metadata = TestMetadata::new().await.unwrap();
    assert_one_concurrent_create_wins(metadata.store()).await;
}

#[tokio::test]
async fn test_concurrent_create_folder_memory() {
    assert_one_concurrent_create_wins(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn test_concurrent_create_folder_postgres() {
    let Some(postgres) = common::postgres_or_skip().await else {
        return;
    };
    assert_one_concurrent_create_wins(postgres.store()).await;
}
