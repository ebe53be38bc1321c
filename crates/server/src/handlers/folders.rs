//! Folder and tree-shape handlers.

use crate::error::ApiResult;
use crate::handlers::common::{
    PathQuery, PathResponse, parse_json, parse_query, parse_space_id,
};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use bytes::Bytes;
use docspace_vfs::{DirectoryContents, FolderSize};
use serde::Deserialize;

/// Create folder request. `path` is the parent directory, root when absent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    pub folder_name: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFolderRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameFolderRequest {
    pub path: String,
    pub new_name: String,
}

/// Move request: `name` inside `path` goes into `destination`.
#[derive(Debug, Deserialize)]
pub struct MoveEntryRequest {
    #[serde(default)]
    pub path: Option<String>,
    pub name: String,
    #[serde(default)]
    pub destination: Option<String>,
}

/// Copy request: `name` inside `path` is duplicated into `destination`.
#[derive(Debug, Deserialize)]
pub struct CopyEntryRequest {
    #[serde(default)]
    pub path: Option<String>,
    pub name: String,
    #[serde(default)]
    pub destination: Option<String>,
}

/// Batch delete request: every name in `items` is removed from `path`.
#[derive(Debug, Deserialize)]
pub struct DeleteItemsRequest {
    #[serde(default)]
    pub path: Option<String>,
    pub items: Vec<String>,
}

/// POST /spaces/{space_id}/folders - Create a folder.
pub async fn create_folder(
    State(state): State<AppState>,
    Path(space_id): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<PathResponse>)> {
    let space_id = parse_space_id(&space_id)?;
    let body: CreateFolderRequest = parse_json(&body)?;
    let path = state
        .fs
        .create_folder(space_id, body.path.as_deref(), &body.folder_name)
        .await?;
    Ok((StatusCode::CREATED, Json(PathResponse { path })))
}

/// DELETE /spaces/{space_id}/folders - Recursively delete a folder.
pub async fn delete_folder(
    State(state): State<AppState>,
    Path(space_id): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let space_id = parse_space_id(&space_id)?;
    let body: DeleteFolderRequest = parse_json(&body)?;
    let deletion = state.fs.delete_folder(space_id, &body.path).await?;
    metrics::record_folder_deletion(&deletion);
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /spaces/{space_id}/folders/rename - Rename a folder or file by path.
pub async fn rename_folder(
    State(state): State<AppState>,
    Path(space_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<PathResponse>> {
    let space_id = parse_space_id(&space_id)?;
    let body: RenameFolderRequest = parse_json(&body)?;
    let path = state
        .fs
        .rename_entry(space_id, &body.path, &body.new_name)
        .await?;
    Ok(Json(PathResponse { path }))
}

/// PUT /spaces/{space_id}/move - Move a folder or file to another directory.
pub async fn move_entry(
    State(state): State<AppState>,
    Path(space_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<PathResponse>> {
    let space_id = parse_space_id(&space_id)?;
    let body: MoveEntryRequest = parse_json(&body)?;
    let path = state
        .fs
        .move_entry(
            space_id,
            body.path.as_deref(),
            &body.name,
            body.destination.as_deref(),
        )
        .await?;
    Ok(Json(PathResponse { path }))
}

/// PUT /spaces/{space_id}/copy - Copy a file or folder subtree.
pub async fn copy_entry(
    State(state): State<AppState>,
    Path(space_id): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<PathResponse>)> {
    let space_id = parse_space_id(&space_id)?;
    let body: CopyEntryRequest = parse_json(&body)?;
    let path = state
        .fs
        .copy_entry(
            space_id,
            body.path.as_deref(),
            &body.name,
            body.destination.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(PathResponse { path })))
}

/// DELETE /spaces/{space_id}/items - Delete several files and folders.
pub async fn delete_items(
    State(state): State<AppState>,
    Path(space_id): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let space_id = parse_space_id(&space_id)?;
    let body: DeleteItemsRequest = parse_json(&body)?;
    let deletion = state
        .fs
        .delete_items(space_id, body.path.as_deref(), &body.items)
        .await?;
    metrics::record_items_deletion(&deletion);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /spaces/{space_id}/contents?path= - Immediate children of a directory.
pub async fn list_contents(
    State(state): State<AppState>,
    Path(space_id): Path<String>,
    uri: Uri,
) -> ApiResult<Json<DirectoryContents>> {
    let space_id = parse_space_id(&space_id)?;
    let query: PathQuery = parse_query(&uri)?;
    let contents = state
        .fs
        .list_contents(space_id, query.path.as_deref())
        .await?;
    Ok(Json(contents))
}

/// GET /spaces/{space_id}/folders/size?path= - Aggregate subtree size.
pub async fn folder_size(
    State(state): State<AppState>,
    Path(space_id): Path<String>,
    uri: Uri,
) -> ApiResult<Json<FolderSize>> {
    let space_id = parse_space_id(&space_id)?;
    let query: PathQuery = parse_query(&uri)?;
    let size = state.fs.folder_size(space_id, query.path.as_deref()).await?;
    Ok(Json(size))
}
