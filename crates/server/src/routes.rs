//! Route configuration.

use crate::handlers;
use crate::metrics::{metrics_handler, track_http_requests};
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let upload_limit =
        usize::try_from(state.config.server.max_upload_bytes).unwrap_or(usize::MAX);

    let space_routes = Router::new()
        .route(
            "/spaces",
            post(handlers::create_space).get(handlers::list_spaces),
        )
        .route("/spaces/{space_id}", delete(handlers::delete_space))
        // Folders and tree shape
        .route(
            "/spaces/{space_id}/folders",
            post(handlers::create_folder).delete(handlers::delete_folder),
        )
        .route(
            "/spaces/{space_id}/folders/rename",
            put(handlers::rename_folder),
        )
        .route(
            "/spaces/{space_id}/folders/size",
            get(handlers::folder_size),
        )
        .route("/spaces/{space_id}/move", put(handlers::move_entry))
        .route("/spaces/{space_id}/copy", put(handlers::copy_entry))
        .route("/spaces/{space_id}/items", delete(handlers::delete_items))
        .route("/spaces/{space_id}/contents", get(handlers::list_contents))
        // Files
        .route("/spaces/{space_id}/files", get(handlers::list_documents))
        .route(
            "/spaces/{space_id}/files/upload",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/spaces/{space_id}/files/download/single",
            get(handlers::download_file),
        )
        .route(
            "/spaces/{space_id}/files/delete",
            delete(handlers::delete_file),
        )
        .route("/spaces/{space_id}/files/rename", put(handlers::rename_file));

    let mut router = Router::new()
        // Health check (unauthenticated for load balancers/k8s probes)
        .route("/v1/health", get(handlers::health_check))
        .merge(space_routes);

    // The /metrics endpoint must be network-restricted to the scrapers.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .layer(middleware::from_fn(track_http_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
