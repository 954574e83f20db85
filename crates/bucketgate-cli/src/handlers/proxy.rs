//! Public read proxy

use crate::{ApiError, AppState};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use std::sync::Arc;

/// Cache directive on successful proxy responses (one year)
pub const PROXY_CACHE_CONTROL: &str = "public, max-age=31536000";

/// GET /{bucket}/{*key} - Stream an object without authentication
pub async fn proxy_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let object = state.gateway.get_object(&bucket, &key).await?;
    let info = object.info;

    let mut response = Response::new(Body::from_stream(object.stream));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let content_type = info
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| {
            let guessed = mime_guess::from_path(&key).first_or_octet_stream();
            HeaderValue::from_str(guessed.as_ref()).unwrap_or(HeaderValue::from_static("application/octet-stream"))
        });
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Some(length) = info.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    if let Some(etag) = info.etag.as_deref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            headers.insert(header::ETAG, value);
        }
    }
    if let Some(last_modified) = info.last_modified.as_deref() {
        if let Ok(value) = HeaderValue::from_str(last_modified) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(PROXY_CACHE_CONTROL));

    Ok(response)
}
