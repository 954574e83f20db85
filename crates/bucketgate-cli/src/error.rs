//! Error types and API error codes

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bucketgate_core::CoreError;
use bucketgate_store::StoreError;
use serde_json::json;
use thiserror::Error;

/// Message returned in place of internal error detail
pub const GENERIC_ERROR_MESSAGE: &str = "An internal error occurred";

/// API error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    EntityTooLarge,
    GatewayTimeout,
    InternalError,
    InvalidArgument,
    InvalidRequest,
    MissingField,
    NoSuchBucket,
    NoSuchKey,
    SlowDown,
    Unauthorized,
}

impl ErrorCode {
    /// Get the error code string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntityTooLarge => "EntityTooLarge",
            Self::GatewayTimeout => "GatewayTimeout",
            Self::InternalError => "InternalError",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidRequest => "InvalidRequest",
            Self::MissingField => "MissingField",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::SlowDown => "SlowDown",
            Self::Unauthorized => "Unauthorized",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EntityTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidArgument | Self::InvalidRequest | Self::MissingField => StatusCode::BAD_REQUEST,
            Self::NoSuchBucket | Self::NoSuchKey => StatusCode::NOT_FOUND,
            Self::SlowDown => StatusCode::TOO_MANY_REQUESTS,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    /// Whether the message may carry internal state
    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}

/// Internal detail of a server error, attached to the response for
/// [`crate::middleware::error_detail_middleware`] to expose outside production
#[derive(Clone, Debug)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub detail: String,
}

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Api { code: ErrorCode, message: String },

    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited { limit: u32, retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ApiError {
    /// Create an error with a code and client-facing message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Missing required field
    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorCode::MissingField, format!("Missing required field: {}", field))
    }

    /// Authentication failed; never says why
    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "Unauthorized")
    }

    /// Get the error code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Api { code, .. } => *code,
            Self::RateLimited { .. } => ErrorCode::SlowDown,
            Self::Internal(_) => ErrorCode::InternalError,
            Self::Core(e) => match e {
                CoreError::InvalidBucket(_) => ErrorCode::NoSuchBucket,
                CoreError::InvalidKey(_) | CoreError::Store(StoreError::InvalidArgument(_)) => {
                    ErrorCode::InvalidArgument
                }
                CoreError::Store(StoreError::NotFound { .. }) => ErrorCode::NoSuchKey,
                CoreError::Store(StoreError::Timeout { .. }) => ErrorCode::GatewayTimeout,
                _ => ErrorCode::InternalError,
            },
        }
    }

    fn public_message(&self, code: ErrorCode) -> String {
        match self {
            _ if code.is_internal() => GENERIC_ERROR_MESSAGE.to_string(),
            Self::Core(CoreError::InvalidBucket(name)) => format!("Bucket not found: {}", name),
            Self::Core(CoreError::Store(StoreError::NotFound { key, .. })) => {
                format!("Object not found: {}", key)
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.error_code();
        let status = code.status_code();

        if code.is_internal() {
            tracing::error!(code = code.as_str(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = code.as_str(), error = %self, "Request rejected");
        }

        let body = json!({
            "error": code.as_str(),
            "message": self.public_message(code),
        });
        let mut response = (status, Json(body)).into_response();

        if let Self::RateLimited { limit, retry_after_secs } = &self {
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            headers.insert("ratelimit-limit", HeaderValue::from(*limit));
            headers.insert("ratelimit-remaining", HeaderValue::from(0u32));
            headers.insert("ratelimit-reset", HeaderValue::from(*retry_after_secs));
        }

        if code.is_internal() {
            response.extensions_mut().insert(ErrorDetail {
                code,
                detail: self.to_string(),
            });
        }

        response
    }
}
