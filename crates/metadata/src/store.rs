//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{EntryRepo, SpaceRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: SpaceRepo + EntryRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database and apply the schema.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // One connection serializes writers, which also makes every
            // transaction below behave as SERIALIZABLE.
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(query_timeout_secs.unwrap_or(600)))
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "opened SQLite metadata store");
        Ok(store)
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use crate::repos::SubtreeStats;
    use docspace_core::persisted_parent;
    use time::OffsetDateTime;
    use uuid::Uuid;

    /// Descendants of the entries whose parent is `?2`, within space `?1`.
    const DESCENDANTS_CTE: &str = r#"
        WITH RECURSIVE subtree(entry_id) AS (
            SELECT entry_id FROM entries WHERE space_id = ?1 AND parent_id = ?2
            UNION
            SELECT e.entry_id FROM entries e
            JOIN subtree s ON e.parent_id = s.entry_id
            WHERE e.space_id = ?1
        )
    "#;

    /// Fail with `NotFound` unless `parent_id` is the root or a live folder.
    async fn ensure_parent_folder(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        space_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> MetadataResult<()> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM entries WHERE space_id = ? AND entry_id = ? AND kind = 'folder'",
        )
        .bind(space_id)
        .bind(parent_id)
        .fetch_optional(&mut **tx)
        .await?;
        match found {
            Some(_) => Ok(()),
            None => Err(MetadataError::NotFound(format!(
                "parent folder {parent_id} not found"
            ))),
        }
    }

    async fn insert_row(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        entry: &EntryRow,
    ) -> MetadataResult<()> {
        ensure_parent_folder(tx, entry.space_id, entry.parent()).await?;

        sqlx::query(
            r#"
            INSERT INTO entries
                (entry_id, space_id, parent_id, name, kind, blob_key, size_bytes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.entry_id)
        .bind(entry.space_id)
        .bind(entry.parent_id)
        .bind(&entry.name)
        .bind(&entry.kind)
        .bind(&entry.blob_key)
        .bind(entry.size_bytes)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            MetadataError::from_insert(e, || {
                format!("an entry named '{}' already exists", entry.name)
            })
        })?;
        Ok(())
    }

    /// Fail with `InvalidMove` if `entry_id` is `new_parent_id` or one of its
    /// ancestors. Runs in the relocating transaction so no concurrent move can
    /// slip a cycle in between the check and the update.
    async fn ensure_not_own_ancestor(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        space_id: Uuid,
        entry_id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> MetadataResult<()> {
        let Some(new_parent_id) = new_parent_id else {
            return Ok(());
        };
        let hit: i64 = sqlx::query_scalar(
            r#"
            WITH RECURSIVE ancestors(entry_id, parent_id) AS (
                SELECT entry_id, parent_id FROM entries WHERE space_id = ?1 AND entry_id = ?2
                UNION
                SELECT e.entry_id, e.parent_id FROM entries e
                JOIN ancestors a ON e.entry_id = a.parent_id
                WHERE e.space_id = ?1
            )
            SELECT EXISTS (SELECT 1 FROM ancestors WHERE entry_id = ?3)
            "#,
        )
        .bind(space_id)
        .bind(new_parent_id)
        .bind(entry_id)
        .fetch_one(&mut **tx)
        .await?;
        if hit != 0 {
            return Err(MetadataError::InvalidMove(
                "a folder cannot be moved into itself or its own subtree".to_string(),
            ));
        }
        Ok(())
    }

    #[async_trait]
    impl SpaceRepo for SqliteStore {
        async fn create_space(&self, space: &SpaceRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO spaces (space_id, name, name_key, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(space.space_id)
            .bind(&space.name)
            .bind(&space.name_key)
            .bind(space.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                MetadataError::from_insert(e, || format!("space '{}' already exists", space.name))
            })?;
            Ok(())
        }

        async fn list_spaces(&self) -> MetadataResult<Vec<SpaceRow>> {
            let rows = sqlx::query_as::<_, SpaceRow>("SELECT * FROM spaces ORDER BY name_key")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn get_space(&self, space_id: Uuid) -> MetadataResult<Option<SpaceRow>> {
            let row = sqlx::query_as::<_, SpaceRow>("SELECT * FROM spaces WHERE space_id = ?")
                .bind(space_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn delete_space(&self, space_id: Uuid) -> MetadataResult<Vec<String>> {
            let mut tx = self.pool.begin().await?;

            let blob_keys: Vec<Option<String>> =
                sqlx::query_scalar("DELETE FROM entries WHERE space_id = ? RETURNING blob_key")
                    .bind(space_id)
                    .fetch_all(&mut *tx)
                    .await?;

            let result = sqlx::query("DELETE FROM spaces WHERE space_id = ?")
                .bind(space_id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "space {space_id} not found"
                )));
            }

            tx.commit().await?;
            Ok(blob_keys.into_iter().flatten().collect())
        }
    }

    #[async_trait]
    impl EntryRepo for SqliteStore {
        async fn insert_entry(&self, entry: &EntryRow) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;
            insert_row(&mut tx, entry).await?;
            tx.commit().await?;
            Ok(())
        }

        async fn insert_entries(&self, entries: &[EntryRow]) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;
            for entry in entries {
                insert_row(&mut tx, entry).await?;
            }
            tx.commit().await?;
            Ok(())
        }

        async fn get_entry(
            &self,
            space_id: Uuid,
            entry_id: Uuid,
        ) -> MetadataResult<Option<EntryRow>> {
            let row = sqlx::query_as::<_, EntryRow>(
                "SELECT * FROM entries WHERE space_id = ? AND entry_id = ?",
            )
            .bind(space_id)
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn find_child(
            &self,
            space_id: Uuid,
            parent_id: Option<Uuid>,
            name: &str,
        ) -> MetadataResult<Option<EntryRow>> {
            let row = sqlx::query_as::<_, EntryRow>(
                "SELECT * FROM entries WHERE space_id = ? AND parent_id = ? AND name = ?",
            )
            .bind(space_id)
            .bind(persisted_parent(parent_id))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_children(
            &self,
            space_id: Uuid,
            parent_id: Option<Uuid>,
        ) -> MetadataResult<Vec<EntryRow>> {
            let rows = sqlx::query_as::<_, EntryRow>(
                "SELECT * FROM entries WHERE space_id = ? AND parent_id = ? ORDER BY name",
            )
            .bind(space_id)
            .bind(persisted_parent(parent_id))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn list_all_files(&self, space_id: Uuid) -> MetadataResult<Vec<EntryRow>> {
            let rows = sqlx::query_as::<_, EntryRow>(
                "SELECT * FROM entries WHERE space_id = ? AND kind = 'file' ORDER BY name, entry_id",
            )
            .bind(space_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn update_file_content(
            &self,
            space_id: Uuid,
            entry_id: Uuid,
            size_bytes: i64,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE entries SET size_bytes = ?, updated_at = ? WHERE space_id = ? AND entry_id = ? AND kind = 'file'",
            )
            .bind(size_bytes)
            .bind(updated_at)
            .bind(space_id)
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "file entry {entry_id} not found"
                )));
            }
            Ok(())
        }

        async fn relocate_entry(
            &self,
            space_id: Uuid,
            entry_id: Uuid,
            new_parent_id: Option<Uuid>,
            new_name: &str,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;
            ensure_parent_folder(&mut tx, space_id, new_parent_id).await?;
            ensure_not_own_ancestor(&mut tx, space_id, entry_id, new_parent_id).await?;

            let result = sqlx::query(
                "UPDATE entries SET parent_id = ?, name = ?, updated_at = ? WHERE space_id = ? AND entry_id = ?",
            )
            .bind(persisted_parent(new_parent_id))
            .bind(new_name)
            .bind(updated_at)
            .bind(space_id)
            .bind(entry_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                MetadataError::from_insert(e, || {
                    format!("an entry named '{new_name}' already exists")
                })
            })?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("entry {entry_id} not found")));
            }

            tx.commit().await?;
            Ok(())
        }

        async fn delete_entry(&self, space_id: Uuid, entry_id: Uuid) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM entries WHERE space_id = ? AND entry_id = ?")
                .bind(space_id)
                .bind(entry_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("entry {entry_id} not found")));
            }
            Ok(())
        }

        async fn delete_subtree(
            &self,
            space_id: Uuid,
            root_id: Option<Uuid>,
        ) -> MetadataResult<Vec<String>> {
            let mut tx = self.pool.begin().await?;

            let mut blob_keys: Vec<Option<String>> = sqlx::query_scalar(&format!(
                "{DESCENDANTS_CTE} DELETE FROM entries WHERE entry_id IN (SELECT entry_id FROM subtree) RETURNING blob_key"
            ))
            .bind(space_id)
            .bind(persisted_parent(root_id))
            .fetch_all(&mut *tx)
            .await?;

            if let Some(root_id) = root_id {
                let root_key: Option<Option<String>> = sqlx::query_scalar(
                    "DELETE FROM entries WHERE space_id = ? AND entry_id = ? RETURNING blob_key",
                )
                .bind(space_id)
                .bind(root_id)
                .fetch_optional(&mut *tx)
                .await?;
                match root_key {
                    Some(key) => blob_keys.push(key),
                    // Dropping the transaction rolls back the descendant delete.
                    None => {
                        return Err(MetadataError::NotFound(format!(
                            "entry {root_id} not found"
                        )));
                    }
                }
            }

            tx.commit().await?;
            Ok(blob_keys.into_iter().flatten().collect())
        }

        async fn subtree_stats(
            &self,
            space_id: Uuid,
            root_id: Option<Uuid>,
        ) -> MetadataResult<SubtreeStats> {
            let (files, folders, total_bytes): (i64, i64, i64) = sqlx::query_as(&format!(
                r#"{DESCENDANTS_CTE}
                SELECT
                    COALESCE(SUM(CASE WHEN kind = 'file' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN kind = 'folder' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(size_bytes), 0)
                FROM entries WHERE entry_id IN (SELECT entry_id FROM subtree)
                "#
            ))
            .bind(space_id)
            .bind(persisted_parent(root_id))
            .fetch_one(&self.pool)
            .await?;

            Ok(SubtreeStats {
                files: files.max(0) as u64,
                folders: folders.max(0) as u64,
                total_bytes: total_bytes.max(0) as u64,
            })
        }
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS spaces (
    space_id BLOB PRIMARY KEY,
    name TEXT NOT NULL,
    name_key TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

-- parent_id is the nil UUID for entries directly under a space root, so the
-- sibling unique index also covers root-level names.
CREATE TABLE IF NOT EXISTS entries (
    entry_id BLOB PRIMARY KEY,
    space_id BLOB NOT NULL REFERENCES spaces(space_id),
    parent_id BLOB NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('folder', 'file')),
    blob_key TEXT UNIQUE,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK ((kind = 'file') = (blob_key IS NOT NULL)),
    UNIQUE (space_id, parent_id, name)
);
CREATE INDEX IF NOT EXISTS idx_entries_parent ON entries(space_id, parent_id);
CREATE INDEX IF NOT EXISTS idx_entries_space_kind ON entries(space_id, kind);
"#;
