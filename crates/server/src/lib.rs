//! HTTP API server for docspace.
//!
//! Exposes spaces, folders and files over a JSON/multipart API:
//! - Space lifecycle
//! - Folder create, delete, rename, move and size
//! - File upload, download, delete, rename and listing
//! - Health and Prometheus metrics

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
