//! Object management handlers (authenticated)

use super::{json_body, required};
use crate::{ApiError, AppState, ErrorCode};
use axum::{
    extract::{
        multipart::{Field, MultipartError},
        rejection::JsonRejection,
        Multipart, Path, State,
    },
    http::StatusCode,
    Json,
};
use bucketgate_core::CoreError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Bytes buffered between the request body and the backend writer
const UPLOAD_PIPE_CAPACITY: usize = 256 * 1024;

/// Fallback when neither the part nor the key names a type
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Upload response body
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub content_type: String,
}

/// POST /api/buckets/{bucket}/upload - Multipart upload with `key` then `file` fields
pub async fn upload_object(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    // Reject before reading any of the body
    if !state.gateway.registry().is_valid(&bucket) {
        return Err(CoreError::InvalidBucket(bucket).into());
    }

    let mut key: Option<String> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("key") => key = Some(field.text().await.map_err(multipart_error)?),
            Some("file") => {
                let key = required(key.as_deref(), "key")?.trim().to_string();
                let content_type = field
                    .content_type()
                    .filter(|ct| !ct.is_empty())
                    .map(str::to_string)
                    .or_else(|| mime_guess::from_path(&key).first().map(|m| m.to_string()))
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

                let size = stream_field(&state, &bucket, &key, field, &content_type).await?;
                return Ok(Json(UploadResponse {
                    success: true,
                    bucket,
                    key,
                    size,
                    content_type,
                }));
            }
            _ => {}
        }
    }

    match key {
        None => Err(ApiError::missing_field("key")),
        Some(_) => Err(ApiError::missing_field("file")),
    }
}

/// Pump one multipart field into the backend through a bounded pipe
async fn stream_field(
    state: &AppState,
    bucket: &str,
    key: &str,
    mut field: Field<'_>,
    content_type: &str,
) -> Result<u64, ApiError> {
    let (mut writer, reader) = tokio::io::duplex(UPLOAD_PIPE_CAPACITY);

    let pump = async move {
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| ApiError::Internal(format!("upload pipe closed: {}", e)))?;
        }
        writer
            .shutdown()
            .await
            .map_err(|e| ApiError::Internal(format!("upload pipe closed: {}", e)))?;
        Ok::<_, ApiError>(())
    };

    let upload = async {
        state
            .gateway
            .put_object(bucket, key, Box::new(reader), content_type)
            .await
            .map_err(ApiError::from)
    };

    let ((), size) = tokio::try_join!(pump, upload)?;
    Ok(size)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(ErrorCode::EntityTooLarge, "Upload exceeds the maximum allowed size")
    } else {
        ApiError::new(ErrorCode::InvalidRequest, err.body_text())
    }
}

/// Delete response body
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub key: String,
}

/// DELETE /api/buckets/{bucket}/objects/{*key} - Delete an object
pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.gateway.delete_object(&bucket, &key).await?;
    Ok(Json(DeleteResponse { success: true, key }))
}

/// Move/copy request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source_key: Option<String>,
    pub target_key: Option<String>,
}

/// Move/copy response body
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub success: bool,
    pub source_key: String,
    pub target_key: String,
}

impl TransferRequest {
    fn keys(&self) -> Result<(&str, &str), ApiError> {
        Ok((
            required(self.source_key.as_deref(), "sourceKey")?,
            required(self.target_key.as_deref(), "targetKey")?,
        ))
    }
}

/// POST /api/buckets/{bucket}/move - Copy then delete the source
pub async fn move_object(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<TransferResponse>, ApiError> {
    let body = json_body(body)?;
    let (source_key, target_key) = body.keys()?;

    state.gateway.move_object(&bucket, source_key, target_key).await?;
    Ok(Json(TransferResponse {
        success: true,
        source_key: source_key.to_string(),
        target_key: target_key.to_string(),
    }))
}

/// POST /api/buckets/{bucket}/copy - Copy an object within a bucket
pub async fn copy_object(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<TransferResponse>, ApiError> {
    let body = json_body(body)?;
    let (source_key, target_key) = body.keys()?;

    state.gateway.copy_object(&bucket, source_key, target_key).await?;
    Ok(Json(TransferResponse {
        success: true,
        source_key: source_key.to_string(),
        target_key: target_key.to_string(),
    }))
}
