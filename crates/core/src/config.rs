//! Configuration types shared across crates.
//!
//! Loaded by the server binary from a TOML file layered with
//! `DOCSPACE_`-prefixed environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Largest accepted upload body in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Attempts made for a single blob write before the upload fails.
    #[serde(default = "default_blob_retry_attempts")]
    pub blob_retry_attempts: u32,
    /// Delay before the first blob write retry; doubles on every attempt.
    #[serde(default = "default_blob_retry_base_delay_ms")]
    pub blob_retry_base_delay_ms: u64,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_upload_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_blob_retry_attempts() -> u32 {
    3
}

fn default_blob_retry_base_delay_ms() -> u64 {
    100
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
            blob_retry_attempts: default_blob_retry_attempts(),
            blob_retry_base_delay_ms: default_blob_retry_base_delay_ms(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// Get the initial blob write retry delay as a Duration.
    pub fn blob_retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.blob_retry_base_delay_ms)
    }

    /// Validate server configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.blob_retry_attempts == 0 {
            return Err("server.blob_retry_attempts must be at least 1".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("server.max_upload_bytes must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Blobs as files under a local directory.
    Filesystem {
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        bucket: String,
        /// Custom endpoint for S3-compatible services such as MinIO.
        endpoint: Option<String>,
        region: Option<String>,
        /// Prepended to every blob key.
        prefix: Option<String>,
        /// Static credentials. Both or neither; when absent the default
        /// AWS provider chain is used.
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        /// Address buckets as `endpoint/bucket` (MinIO) rather than as a
        /// subdomain.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/blobs"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem { path } if path.as_os_str().is_empty() => {
                Err("filesystem storage requires a non-empty 'path'".to_string())
            }
            StorageConfig::S3 { bucket, .. } if bucket.trim().is_empty() => {
                Err("s3 storage requires a non-empty 'bucket'".to_string())
            }
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            _ => Ok(()),
        }
    }
}

/// TLS policy for PostgreSQL connections.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    Disable,
    #[default]
    Prefer,
    Require,
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// Single-file SQLite database.
    Sqlite {
        path: PathBuf,
        /// Queries slower than this are logged; SQLite cannot cancel them.
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
    /// PostgreSQL, from `url` or from the individual connection fields.
    Postgres {
        /// Wins over the individual fields when both are given.
        url: Option<String>,
        host: Option<String>,
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        username: Option<String>,
        /// Better supplied as DOCSPACE_METADATA__PASSWORD.
        password: Option<String>,
        database: Option<String>,
        ssl_mode: Option<PgSslMode>,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Server-side `statement_timeout`.
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(30_000)
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(600)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/docspace.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    /// A postgres store needs a URL or at least a host and database.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { .. } => Ok(()),
            MetadataConfig::Postgres {
                url,
                host,
                database,
                ..
            } => {
                match (url.as_ref(), host.as_ref(), database.as_ref()) {
                    (Some(_), _, _) | (None, Some(_), Some(_)) => Ok(()),
                    (None, None, _) => Err(
                        "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                    ),
                    (None, Some(_), None) => Err(
                        "postgres config requires 'database' when using individual fields"
                            .to_string(),
                    ),
                }
            }
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Blob storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses filesystem storage and SQLite metadata
    /// with a single fast blob write attempt.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                blob_retry_attempts: 1,
                blob_retry_base_delay_ms: 1,
                ..ServerConfig::default()
            },
            storage: StorageConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.storage.validate()?;
        self.metadata.validate()
    }
}
