//! Request helpers driving the router with `oneshot`.

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::Bytes;
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "docspace-test-boundary";

/// Send a request and collect status, headers and body.
#[allow(dead_code)]
pub async fn raw_request(
    router: &axum::Router,
    request: Request<Body>,
) -> (StatusCode, HeaderMap, Bytes) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

/// Helper to make JSON requests.
#[allow(dead_code)]
pub async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let (status, _, body_bytes) = raw_request(router, builder.body(body).unwrap()).await;

    let json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

/// Build a single-part multipart body carrying `data` as `filename`.
#[allow(dead_code)]
pub fn multipart_body(filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Upload `data` as `filename` into `path` (root when `None`).
#[allow(dead_code)]
pub async fn upload(
    router: &axum::Router,
    space_id: &str,
    path: Option<&str>,
    filename: &str,
    data: &[u8],
) -> (StatusCode, Value) {
    let uri = match path {
        Some(path) => format!("/spaces/{space_id}/files/upload?path={path}"),
        None => format!("/spaces/{space_id}/files/upload"),
    };
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(filename, data)))
        .unwrap();

    let (status, _, body) = raw_request(router, request).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

/// Create a space and return its id.
#[allow(dead_code)]
pub async fn create_space(router: &axum::Router, name: &str) -> String {
    let (status, body) = json_request(
        router,
        "POST",
        "/spaces",
        Some(serde_json::json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create space failed: {body}");
    body["id"].as_str().unwrap().to_string()
}

/// Create a folder and return its display path.
#[allow(dead_code)]
pub async fn create_folder(
    router: &axum::Router,
    space_id: &str,
    path: Option<&str>,
    name: &str,
) -> String {
    let (status, body) = json_request(
        router,
        "POST",
        &format!("/spaces/{space_id}/folders"),
        Some(serde_json::json!({ "folderName": name, "path": path })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create folder failed: {body}");
    body["path"].as_str().unwrap().to_string()
}
