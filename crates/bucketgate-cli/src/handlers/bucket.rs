//! Bucket listing handlers

use crate::auth::authenticated_token;
use crate::{ApiError, AppState};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use bucketgate_store::ObjectEntry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One configured bucket as shown to clients
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSummary {
    /// Real bucket identifier
    pub name: String,
    /// Alias, or the real identifier when none is configured
    pub display_name: String,
}

/// GET /api/buckets response
#[derive(Debug, Serialize, Deserialize)]
pub struct ListBucketsResponse {
    pub buckets: Vec<BucketSummary>,
    pub authenticated: bool,
}

/// GET /api/buckets - List configured buckets
pub async fn list_buckets(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Json<ListBucketsResponse> {
    let registry = state.gateway.registry();
    let buckets = registry
        .buckets()
        .map(|(real, display)| BucketSummary {
            name: real.to_string(),
            display_name: display.to_string(),
        })
        .collect();

    let authenticated = authenticated_token(&jar, &headers, &state.sessions).is_some();

    Json(ListBucketsResponse {
        buckets,
        authenticated,
    })
}

/// Query parameters for object listing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListObjectsParams {
    pub prefix: Option<String>,
    pub continuation_token: Option<String>,
}

/// One listing entry
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    pub key: String,
    pub name: String,
    pub size: u64,
    pub last_modified: Option<String>,
    pub etag: String,
    pub is_directory: bool,
}

impl From<ObjectEntry> for ObjectSummary {
    fn from(entry: ObjectEntry) -> Self {
        Self {
            key: entry.key,
            name: entry.name,
            size: entry.size,
            last_modified: entry.last_modified,
            etag: entry.etag,
            is_directory: entry.is_directory,
        }
    }
}

/// GET /api/buckets/{bucket}/objects response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListObjectsResponse {
    pub bucket: String,
    pub prefix: String,
    pub objects: Vec<ObjectSummary>,
    pub next_continuation_token: Option<String>,
    pub is_truncated: bool,
}

/// GET /api/buckets/{bucket}/objects - List one folder of a bucket
pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    Query(params): Query<ListObjectsParams>,
) -> Result<Json<ListObjectsResponse>, ApiError> {
    let prefix = params.prefix.unwrap_or_default();
    let listing = state
        .gateway
        .list_objects(&bucket, &prefix, params.continuation_token.as_deref())
        .await?;

    let is_truncated = listing.next_continuation_token.is_some();
    Ok(Json(ListObjectsResponse {
        bucket,
        prefix,
        objects: listing.entries.into_iter().map(ObjectSummary::from).collect(),
        next_continuation_token: listing.next_continuation_token,
        is_truncated,
    }))
}
