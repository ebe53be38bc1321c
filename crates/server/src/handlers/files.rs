//! File handlers: upload, download, delete, rename and flat listing.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{
    FileQuery, PathQuery, parse_json, parse_query, parse_space_id,
};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use docspace_vfs::FileMetadata;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameFileRequest {
    #[serde(default)]
    pub path: Option<String>,
    pub file: String,
    pub new_name: String,
}

/// Flat listing of every file in a space.
#[derive(Debug, Serialize)]
pub struct DocumentsResponse {
    pub documents: Vec<FileMetadata>,
}

/// POST /spaces/{space_id}/files/upload?path= - Upload one file (multipart).
///
/// The first part carrying a filename is stored; other parts are ignored.
pub async fn upload_file(
    State(state): State<AppState>,
    Path(space_id): Path<String>,
    uri: Uri,
    mut multipart: Multipart,
) -> ApiResult<Json<FileMetadata>> {
    let space_id = parse_space_id(&space_id)?;
    let query: PathQuery = parse_query(&uri)?;

    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = multipart.next_field().await? {
        if let Some(filename) = field.file_name().map(str::to_string) {
            upload = Some((filename, field.bytes().await?));
            break;
        }
    }
    let (filename, data) = upload
        .ok_or_else(|| ApiError::BadRequest("multipart body carries no file part".to_string()))?;

    let meta = state
        .fs
        .upload_file(space_id, query.path.as_deref(), &filename, data)
        .await?;
    metrics::record_upload(meta.size);
    Ok(Json(meta))
}

/// GET /spaces/{space_id}/files/download/single?path=&file= - Download a file.
pub async fn download_file(
    State(state): State<AppState>,
    Path(space_id): Path<String>,
    uri: Uri,
) -> ApiResult<Response> {
    let space_id = parse_space_id(&space_id)?;
    let query: FileQuery = parse_query(&uri)?;
    let (meta, data) = state
        .fs
        .download_file(space_id, query.path.as_deref(), &query.file)
        .await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&meta.name)),
        ],
        data,
    )
        .into_response())
}

/// DELETE /spaces/{space_id}/files/delete?path=&file= - Delete a file.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(space_id): Path<String>,
    uri: Uri,
) -> ApiResult<StatusCode> {
    let space_id = parse_space_id(&space_id)?;
    let query: FileQuery = parse_query(&uri)?;
    state
        .fs
        .delete_file(space_id, query.path.as_deref(), &query.file)
        .await?;
    metrics::record_file_deleted();
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /spaces/{space_id}/files/rename - Rename a file within its directory.
pub async fn rename_file(
    State(state): State<AppState>,
    Path(space_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<FileMetadata>> {
    let space_id = parse_space_id(&space_id)?;
    let body: RenameFileRequest = parse_json(&body)?;
    let meta = state
        .fs
        .rename_file(space_id, body.path.as_deref(), &body.file, &body.new_name)
        .await?;
    Ok(Json(meta))
}

/// GET /spaces/{space_id}/files - Every file in the space.
pub async fn list_documents(
    State(state): State<AppState>,
    Path(space_id): Path<String>,
) -> ApiResult<Json<DocumentsResponse>> {
    let space_id = parse_space_id(&space_id)?;
    let documents = state.fs.list_all_documents(space_id).await?;
    Ok(Json(DocumentsResponse { documents }))
}

/// `Content-Disposition` for a download, with an ASCII fallback name.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        utf8_percent_encode(filename, NON_ALPHANUMERIC)
    )
}
