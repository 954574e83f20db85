//! Service-level handlers

use crate::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

/// GET /health - Liveness check
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "rateLimitBackend": format!("{:?}", state.limiters.backend()).to_lowercase(),
        "persistentStorage": state.gateway.store().is_persistent(),
    }))
}
