//! Space lifecycle handlers.

use crate::error::ApiResult;
use crate::handlers::common::{parse_json, parse_space_id};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use bytes::Bytes;
use docspace_vfs::Space;
use serde::Deserialize;

/// Create space request.
#[derive(Debug, Deserialize)]
pub struct CreateSpaceRequest {
    pub name: String,
}

/// POST /spaces - Create a new space.
pub async fn create_space(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Space>)> {
    let body: CreateSpaceRequest = parse_json(&body)?;
    let space = state.spaces.create_space(&body.name).await?;
    Ok((StatusCode::CREATED, Json(space)))
}

/// GET /spaces - List spaces ordered by name.
pub async fn list_spaces(State(state): State<AppState>) -> ApiResult<Json<Vec<Space>>> {
    Ok(Json(state.spaces.list_spaces().await?))
}

/// DELETE /spaces/{space_id} - Delete a space and everything in it.
pub async fn delete_space(
    State(state): State<AppState>,
    Path(space_id): Path<String>,
) -> ApiResult<StatusCode> {
    let space_id = parse_space_id(&space_id)?;
    let deletion = state.spaces.delete_space(space_id).await?;
    metrics::record_space_deletion(&deletion);
    Ok(StatusCode::NO_CONTENT)
}
