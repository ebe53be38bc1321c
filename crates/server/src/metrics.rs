//! Prometheus metrics for the docspace server.
//!
//! Counters cover uploads, deletes and blob cleanup failures, plus a
//! per-method/status request counter fed by [`track_http_requests`].
//!
//! The `/metrics` endpoint is unauthenticated. Metrics carry no space ids,
//! paths or filenames, but the endpoint should still be network-restricted
//! to the Prometheus scrapers.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use docspace_vfs::{FolderDeletion, ItemsDeletion, SpaceDeletion};
use prometheus::{self, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// File metrics
pub static UPLOADS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "docspace_uploads_total",
        "Total number of files uploaded or overwritten",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_BYTES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "docspace_upload_bytes_total",
        "Total bytes accepted by uploads",
    )
    .expect("metric creation failed")
});

pub static FILES_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "docspace_files_deleted_total",
        "Total number of file entries removed, directly or by recursive delete",
    )
    .expect("metric creation failed")
});

pub static FOLDERS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "docspace_folders_deleted_total",
        "Total number of recursive folder deletes",
    )
    .expect("metric creation failed")
});

pub static BLOB_DELETE_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "docspace_blob_delete_failures_total",
        "Total number of blobs left behind after a failed delete",
    )
    .expect("metric creation failed")
});

// HTTP metrics
pub static HTTP_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("docspace_http_requests_total", "Total HTTP requests served"),
        &["method", "status"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests can build as many routers as they like.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(UPLOADS_TOTAL.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_BYTES_TOTAL.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(FILES_DELETED_TOTAL.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(FOLDERS_DELETED_TOTAL.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BLOB_DELETE_FAILURES_TOTAL.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Count every request by method and response status.
pub async fn track_http_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let response = next.run(req).await;
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), response.status().as_str()])
        .inc();
    response
}

pub fn record_upload(size: u64) {
    UPLOADS_TOTAL.inc();
    UPLOAD_BYTES_TOTAL.inc_by(size);
}

pub fn record_file_deleted() {
    FILES_DELETED_TOTAL.inc();
}

pub fn record_folder_deletion(deletion: &FolderDeletion) {
    FOLDERS_DELETED_TOTAL.inc();
    FILES_DELETED_TOTAL.inc_by(deletion.files_removed as u64);
    BLOB_DELETE_FAILURES_TOTAL.inc_by(deletion.blob_failures as u64);
}

pub fn record_items_deletion(deletion: &ItemsDeletion) {
    FOLDERS_DELETED_TOTAL.inc_by(deletion.folders_removed as u64);
    FILES_DELETED_TOTAL.inc_by(deletion.files_removed as u64);
    BLOB_DELETE_FAILURES_TOTAL.inc_by(deletion.blob_failures as u64);
}

pub fn record_space_deletion(deletion: &SpaceDeletion) {
    FILES_DELETED_TOTAL.inc_by(deletion.tree.files_removed as u64);
    BLOB_DELETE_FAILURES_TOTAL.inc_by(deletion.blob_failures as u64);
}
