//! Extraction helpers shared across handlers.

use crate::error::{ApiError, ApiResult};
use axum::extract::Query;
use axum::http::Uri;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parse the `{space_id}` path segment.
pub fn parse_space_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| ApiError::BadRequest(format!("invalid space ID: {e}")))
}

/// Decode a JSON request body.
pub fn parse_json<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))
}

/// Decode the request's query string.
///
/// Failures go through [`ApiError`] so clients get the usual JSON error body
/// rather than axum's plain-text rejection.
pub fn parse_query<T: DeserializeOwned>(uri: &Uri) -> ApiResult<T> {
    Query::<T>::try_from_uri(uri)
        .map(|Query(query)| query)
        .map_err(|e| ApiError::BadRequest(format!("invalid query: {}", e.body_text())))
}

/// `?path=` query shared by directory-scoped endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

/// `?path=&file=` query for single-file endpoints.
#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub path: Option<String>,
    pub file: String,
}

/// Display path of a created, renamed or moved entry.
#[derive(Debug, Serialize)]
pub struct PathResponse {
    pub path: String,
}
