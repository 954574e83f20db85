//! Login and logout

use super::{json_body, required};
use crate::auth::{presented_tokens, removal_cookie, session_cookie, verify_password};
use crate::{ApiError, AppState};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: Option<String>,
}

/// Login response body
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// POST /api/login - Exchange the password for a session
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = json_body(body)?;
    let password = required(body.password.as_deref(), "password")?;

    if !verify_password(password, &state.config.auth_password) {
        tracing::warn!("Failed login attempt");
        return Err(ApiError::unauthorized());
    }

    let session = state.sessions.create();
    tracing::info!(expires_at = %session.expires_at, "Session created");

    let ttl_secs = u64::try_from(state.sessions.ttl().num_seconds()).unwrap_or(0);
    let jar = jar.add(session_cookie(&session, ttl_secs, state.config.secure_cookies));
    let response = LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
    };
    Ok((jar, Json(response)).into_response())
}

/// POST /api/logout - Revoke the presented session, if any
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Response {
    for token in presented_tokens(&jar, &headers) {
        if state.sessions.revoke(&token) {
            tracing::info!("Session revoked");
        }
    }

    let jar = jar.remove(removal_cookie());
    (jar, Json(serde_json::json!({ "success": true }))).into_response()
}
