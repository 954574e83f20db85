//! HTTP route definitions

use crate::middleware::{self, LimiterLayerState};
use crate::{handlers, AppState};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Route template of the public read proxy
pub const PUBLIC_READ_ROUTE: &str = "/{bucket}/{*key}";

/// Route templates no limiter ever counts
pub const RATE_LIMIT_EXEMPT_ROUTES: &[&str] = &[PUBLIC_READ_ROUTE];

/// Create the main router
pub fn create_router(state: Arc<AppState>) -> Router {
    let trust_proxy = state.config.trust_proxy;
    let auth_limit = LimiterLayerState {
        limiter: Arc::clone(&state.limiters.auth),
        trust_proxy,
    };
    let api_limit = LimiterLayerState {
        limiter: Arc::clone(&state.limiters.general_api),
        trust_proxy,
    };

    // Login passes the strict limiter as well as the general one
    let login = Router::new()
        .route("/api/login", post(handlers::login))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_limit,
            middleware::rate_limit_middleware,
        ));

    let protected = Router::new()
        .route("/api/buckets/{bucket}/upload", post(handlers::upload_object))
        .route("/api/buckets/{bucket}/objects/{*key}", delete(handlers::delete_object))
        .route("/api/buckets/{bucket}/move", post(handlers::move_object))
        .route("/api/buckets/{bucket}/copy", post(handlers::copy_object))
        .route_layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::auth_middleware,
        ));

    Router::new()
        // Service endpoints
        .route("/health", get(handlers::health_check))
        .route("/api/logout", post(handlers::logout))

        // Bucket endpoints
        .route("/api/buckets", get(handlers::list_buckets))
        .route("/api/buckets/{bucket}/objects", get(handlers::list_objects))

        // Public read proxy
        .route(PUBLIC_READ_ROUTE, get(handlers::proxy_object))

        .merge(login)
        .merge(protected)
        .route_layer(axum_middleware::from_fn_with_state(
            api_limit,
            middleware::rate_limit_middleware,
        ))

        // Apply middleware
        .layer(axum_middleware::from_fn_with_state(
            state.config.production,
            middleware::error_detail_middleware,
        ))
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(cors_layer(&state.config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(state.config.max_upload_size))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
