//! Application state shared across handlers.

use docspace_core::config::AppConfig;
use docspace_metadata::MetadataStore;
use docspace_storage::ObjectStore;
use docspace_vfs::{FilesystemService, PathResolver, RetryPolicy, SpaceRegistry};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Blob storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Folder and file operations.
    pub fs: Arc<FilesystemService>,
    /// Space lifecycle.
    pub spaces: Arc<SpaceRegistry>,
}

impl AppState {
    /// Wire the filesystem service and space registry over the given stores.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        let resolver = Arc::new(PathResolver::new(metadata.clone()));
        let fs = Arc::new(FilesystemService::new(
            metadata.clone(),
            resolver,
            storage.clone(),
            RetryPolicy::from_config(&config.server),
        ));
        let spaces = Arc::new(SpaceRegistry::new(
            metadata.clone(),
            fs.clone(),
            storage.clone(),
        ));

        Self {
            config: Arc::new(config),
            storage,
            metadata,
            fs,
            spaces,
        }
    }
}
