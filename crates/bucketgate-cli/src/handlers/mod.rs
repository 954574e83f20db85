//! API request handlers

pub mod bucket;
pub mod object;
pub mod proxy;
pub mod service;
pub mod session;

pub use bucket::*;
pub use object::*;
pub use proxy::*;
pub use service::*;
pub use session::*;

use crate::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::Json;

/// Unwrap a JSON body, reporting malformed or missing bodies as `400`
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        ApiError::new(crate::ErrorCode::InvalidRequest, rejection.body_text())
    })
}

/// Require a non-blank string field
pub(crate) fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::missing_field(field))
}
