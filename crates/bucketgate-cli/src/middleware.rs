//! HTTP middleware for authentication, rate limiting, etc.

use crate::auth::authenticated_token;
use crate::error::ErrorDetail;
use crate::{ApiError, AppState};
use axum::{
    body::Body,
    extract::{ConnectInfo, MatchedPath, State},
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use bucketgate_core::{RateLimitDecision, RateLimiter};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

/// Client identity used when no address is available
pub const UNKNOWN_CLIENT: &str = "unknown";

/// State for one limiter layer
#[derive(Clone)]
pub struct LimiterLayerState {
    pub limiter: Arc<RateLimiter>,
    pub trust_proxy: bool,
}

/// Authentication middleware: requires a live session token
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if authenticated_token(&jar, request.headers(), &state.sessions).is_none() {
        tracing::debug!("Rejected request without a live session");
        return Err(ApiError::unauthorized());
    }

    Ok(next.run(request).await)
}

/// Rate limiting middleware, keyed by client address and matched route
pub async fn rate_limit_middleware(
    State(layer): State<LimiterLayerState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let client = client_identity(&request, layer.trust_proxy);

    let decision = layer.limiter.check(&client, &route).await;
    if !decision.is_allowed() {
        tracing::warn!(
            limiter = layer.limiter.name(),
            client = %client,
            route = %route,
            "Rate limit exceeded"
        );
        return Err(ApiError::RateLimited {
            limit: decision.limit,
            retry_after_secs: decision.reset_after_secs(),
        });
    }

    let mut response = next.run(request).await;
    if decision.is_counted() {
        insert_quota_headers(response.headers_mut(), &decision);
    }
    Ok(response)
}

fn insert_quota_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    // The login route passes two limiters; keep the stricter remaining count
    if let Some(existing) = headers
        .get("ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u32>().ok())
    {
        if existing <= decision.remaining {
            return;
        }
    }
    headers.insert("ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(decision.reset_after_secs()));
}

/// Identify the client: first `X-Forwarded-For` hop when trusted, else the peer address
pub fn client_identity(request: &Request<Body>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Replace the generic server error message with its detail outside production
pub async fn error_detail_middleware(
    State(production): State<bool>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if production {
        return response;
    }

    let Some(detail) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let status = response.status();
    let body = json!({
        "error": detail.code.as_str(),
        "message": detail.detail,
    });
    let mut detailed = (status, Json(body)).into_response();
    for (name, value) in response.headers() {
        if name != header::CONTENT_LENGTH && name != header::CONTENT_TYPE {
            detailed.headers_mut().append(name.clone(), value.clone());
        }
    }
    detailed
}

/// Request ID middleware - adds x-request-id header
pub async fn request_id_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Request ID extension
#[derive(Clone)]
pub struct RequestId(pub String);

/// Logging middleware
pub async fn logging_middleware(
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request.extensions().get::<RequestId>().map(|id| id.0.clone());
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        request_id = request_id.as_deref().unwrap_or("-"),
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use axum::{body::to_bytes, http::StatusCode, middleware::from_fn_with_state, routing::get, Router};
    use bucketgate_core::{exempt_none, LocalCounterStore, RateLimitRule};
    use std::time::Duration;
    use tower::ServiceExt;

    fn request_with_peer(xff: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/buckets");
        if let Some(xff) = xff {
            builder = builder.header("x-forwarded-for", xff);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 4242))));
        request
    }

    #[test]
    fn test_client_identity() {
        let request = request_with_peer(Some("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_identity(&request, true), "203.0.113.9");
        assert_eq!(client_identity(&request, false), "10.0.0.7");

        let request = request_with_peer(None);
        assert_eq!(client_identity(&request, true), "10.0.0.7");

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_identity(&bare, false), UNKNOWN_CLIENT);
    }

    fn limited_router(max: u32) -> Router {
        let limiter = RateLimiter::new(
            "api",
            RateLimitRule::new(Duration::from_secs(60), max).unwrap(),
            Arc::new(LocalCounterStore::new()),
            exempt_none(),
        );
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .route_layer(from_fn_with_state(
                LimiterLayerState {
                    limiter: Arc::new(limiter),
                    trust_proxy: false,
                },
                rate_limit_middleware,
            ))
    }

    #[tokio::test]
    async fn test_rate_limit_headers_and_429() {
        let app = limited_router(2);

        for remaining in ["1", "0"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["ratelimit-limit"], "2");
            assert_eq!(response.headers()["ratelimit-remaining"], remaining);
        }

        let response = app
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = response.headers()[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
        assert!((1..=60).contains(&retry_after));
    }

    async fn failing_handler() -> Result<&'static str, ApiError> {
        Err(ApiError::Internal("backend at 10.1.2.3 refused".to_string()))
    }

    async fn message_for(production: bool) -> String {
        let app = Router::new()
            .route("/fail", get(failing_handler))
            .layer(from_fn_with_state(production, error_detail_middleware));
        let response = app
            .oneshot(Request::builder().uri("/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], ErrorCode::InternalError.as_str());
        body["message"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_error_detail_only_outside_production() {
        assert!(message_for(false).await.contains("10.1.2.3"));
        assert_eq!(message_for(true).await, crate::error::GENERIC_ERROR_MESSAGE);
    }
}
