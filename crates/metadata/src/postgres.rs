//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::*;
use crate::repos::{EntryRepo, SpaceRepo, SubtreeStats};
use crate::store::MetadataStore;
use async_trait::async_trait;
use docspace_core::config::PgSslMode;
use docspace_core::persisted_parent;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres, Transaction};
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// Descendants of the entries whose parent is `$2`, within space `$1`.
const DESCENDANTS_CTE: &str = r#"
    WITH RECURSIVE subtree(entry_id) AS (
        SELECT entry_id FROM entries WHERE space_id = $1 AND parent_id = $2
        UNION
        SELECT e.entry_id FROM entries e
        JOIN subtree s ON e.parent_id = s.entry_id
        WHERE e.space_id = $1
    )
"#;

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// Lets the password come from its own environment variable instead of
    /// a URL.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "connecting to PostgreSQL"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // Prepared statements hold one command each.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Share-lock the parent folder so a concurrent subtree delete cannot remove
/// it underneath the write. Root needs no lock.
async fn lock_parent_folder(
    tx: &mut Transaction<'_, Postgres>,
    space_id: Uuid,
    parent_id: Option<Uuid>,
) -> MetadataResult<()> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    let found: Option<Uuid> = sqlx::query_scalar(
        "SELECT entry_id FROM entries WHERE space_id = $1 AND entry_id = $2 AND kind = 'folder' FOR SHARE",
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

async fn insert_row(tx: &mut Transaction<'_, Postgres>, entry: &EntryRow) -> MetadataResult<()> {
    lock_parent_folder(tx, entry.space_id, entry.parent()).await?;

    sqlx::query(
        r#"
        INSERT INTO entries
            (entry_id, space_id, parent_id, name, kind, blob_key, size_bytes, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
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

/// Serialize relocations within a space and refuse one that would make
/// `entry_id` its own ancestor.
///
/// `FOR NO KEY UPDATE` on the space row conflicts with other relocations and
/// with space deletion, but not with the key-share locks taken by inserts.
async fn lock_space_for_relocate(
    tx: &mut Transaction<'_, Postgres>,
    space_id: Uuid,
    entry_id: Uuid,
    new_parent_id: Option<Uuid>,
) -> MetadataResult<()> {
    let found: Option<Uuid> =
        sqlx::query_scalar("SELECT space_id FROM spaces WHERE space_id = $1 FOR NO KEY UPDATE")
            .bind(space_id)
            .fetch_optional(&mut **tx)
            .await?;
    if found.is_none() {
        return Err(MetadataError::NotFound(format!("space {space_id} not found")));
    }

    let Some(new_parent_id) = new_parent_id else {
        return Ok(());
    };
    let hit: bool = sqlx::query_scalar(
        r#"
        WITH RECURSIVE ancestors(entry_id, parent_id) AS (
            SELECT entry_id, parent_id FROM entries WHERE space_id = $1 AND entry_id = $2
            UNION
            SELECT e.entry_id, e.parent_id FROM entries e
            JOIN ancestors a ON e.entry_id = a.parent_id
            WHERE e.space_id = $1
        )
        SELECT EXISTS (SELECT 1 FROM ancestors WHERE entry_id = $3)
        "#,
    )
    .bind(space_id)
    .bind(new_parent_id)
    .bind(entry_id)
    .fetch_one(&mut **tx)
    .await?;
    if hit {
        return Err(MetadataError::InvalidMove(
            "a folder cannot be moved into itself or its own subtree".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl SpaceRepo for PostgresStore {
    async fn create_space(&self, space: &SpaceRow) -> MetadataResult<()> {
        sqlx::query(
            "INSERT INTO spaces (space_id, name, name_key, created_at) VALUES ($1, $2, $3, $4)",
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
        let row = sqlx::query_as::<_, SpaceRow>("SELECT * FROM spaces WHERE space_id = $1")
            .bind(space_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete_space(&self, space_id: Uuid) -> MetadataResult<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        // Lock the space row first so concurrent deletes serialize here.
        let found: Option<Uuid> =
            sqlx::query_scalar("SELECT space_id FROM spaces WHERE space_id = $1 FOR UPDATE")
                .bind(space_id)
                .fetch_optional(&mut *tx)
                .await?;
        if found.is_none() {
            return Err(MetadataError::NotFound(format!(
                "space {space_id} not found"
            )));
        }

        let blob_keys: Vec<Option<String>> =
            sqlx::query_scalar("DELETE FROM entries WHERE space_id = $1 RETURNING blob_key")
                .bind(space_id)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM spaces WHERE space_id = $1")
            .bind(space_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(blob_keys.into_iter().flatten().collect())
    }
}

#[async_trait]
impl EntryRepo for PostgresStore {
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

    async fn get_entry(&self, space_id: Uuid, entry_id: Uuid) -> MetadataResult<Option<EntryRow>> {
        let row = sqlx::query_as::<_, EntryRow>(
            "SELECT * FROM entries WHERE space_id = $1 AND entry_id = $2",
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
            "SELECT * FROM entries WHERE space_id = $1 AND parent_id = $2 AND name = $3",
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
        // Byte order, matching the SQLite and in-memory stores.
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"SELECT * FROM entries WHERE space_id = $1 AND parent_id = $2 ORDER BY name COLLATE "C""#,
        )
        .bind(space_id)
        .bind(persisted_parent(parent_id))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_all_files(&self, space_id: Uuid) -> MetadataResult<Vec<EntryRow>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"SELECT * FROM entries WHERE space_id = $1 AND kind = 'file' ORDER BY name COLLATE "C", entry_id"#,
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
            "UPDATE entries SET size_bytes = $1, updated_at = $2 WHERE space_id = $3 AND entry_id = $4 AND kind = 'file'",
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
        lock_space_for_relocate(&mut tx, space_id, entry_id, new_parent_id).await?;
        lock_parent_folder(&mut tx, space_id, new_parent_id).await?;

        let result = sqlx::query(
            "UPDATE entries SET parent_id = $1, name = $2, updated_at = $3 WHERE space_id = $4 AND entry_id = $5",
        )
        .bind(persisted_parent(new_parent_id))
        .bind(new_name)
        .bind(updated_at)
        .bind(space_id)
        .bind(entry_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            MetadataError::from_insert(e, || format!("an entry named '{new_name}' already exists"))
        })?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("entry {entry_id} not found")));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_entry(&self, space_id: Uuid, entry_id: Uuid) -> MetadataResult<()> {
        let result = sqlx::query("DELETE FROM entries WHERE space_id = $1 AND entry_id = $2")
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

        if let Some(root_id) = root_id {
            let found: Option<Uuid> = sqlx::query_scalar(
                "SELECT entry_id FROM entries WHERE space_id = $1 AND entry_id = $2 FOR UPDATE",
            )
            .bind(space_id)
            .bind(root_id)
            .fetch_optional(&mut *tx)
            .await?;
            if found.is_none() {
                return Err(MetadataError::NotFound(format!("entry {root_id} not found")));
            }
        }

        // Row locks on every descendant block writers that share-lock one of
        // them as a parent; children committed before this point are picked
        // up by the delete below, which takes a fresh snapshot.
        sqlx::query(&format!(
            "{DESCENDANTS_CTE} SELECT entry_id FROM entries WHERE entry_id IN (SELECT entry_id FROM subtree) FOR UPDATE"
        ))
        .bind(space_id)
        .bind(persisted_parent(root_id))
        .execute(&mut *tx)
        .await?;

        let mut blob_keys: Vec<Option<String>> = sqlx::query_scalar(&format!(
            "{DESCENDANTS_CTE} DELETE FROM entries WHERE entry_id IN (SELECT entry_id FROM subtree) RETURNING blob_key"
        ))
        .bind(space_id)
        .bind(persisted_parent(root_id))
        .fetch_all(&mut *tx)
        .await?;

        if let Some(root_id) = root_id {
            let root_key: Option<String> = sqlx::query_scalar(
                "DELETE FROM entries WHERE space_id = $1 AND entry_id = $2 RETURNING blob_key",
            )
            .bind(space_id)
            .bind(root_id)
            .fetch_one(&mut *tx)
            .await?;
            blob_keys.push(root_key);
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
                COUNT(*) FILTER (WHERE kind = 'file')::BIGINT,
                COUNT(*) FILTER (WHERE kind = 'folder')::BIGINT,
                COALESCE(SUM(size_bytes), 0)::BIGINT
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
