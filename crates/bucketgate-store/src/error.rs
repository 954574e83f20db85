//! Error types for the bucketgate-store crate

use thiserror::Error;

/// Result type alias using `StoreError`
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during object storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Object not found
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Bucket is not known to this store
    #[error("unknown bucket: {0}")]
    UnknownBucket(String),

    /// Request arguments were rejected, such as a malformed continuation token
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Backend rejected the credentials
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Backend answered with an unexpected status
    #[error("unexpected status {status} from backend: {message}")]
    Status { status: u16, message: String },

    /// Timeout error
    #[error("operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Transport or protocol failure talking to the backend
    #[error("backend error: {0}")]
    Backend(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    /// Create a not-found error for a bucket/key pair
    pub fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    /// Check if this error means the object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Map a non-success HTTP status for `bucket/key` into an error
    pub fn from_status(status: u16, bucket: &str, key: &str, message: impl Into<String>) -> Self {
        match status {
            400 => Self::InvalidArgument(message.into()),
            404 => Self::not_found(bucket, key),
            401 | 403 => Self::AccessDenied(message.into()),
            _ => Self::Status {
                status,
                message: message.into(),
            },
        }
    }
}

impl From<s3::error::S3Error> for StoreError {
    fn from(err: s3::error::S3Error) -> Self {
        match err {
            s3::error::S3Error::HttpFailWithBody(400, body) => Self::InvalidArgument(body),
            s3::error::S3Error::HttpFailWithBody(status, body) => Self::Status {
                status,
                message: body,
            },
            other => Self::Backend(other.to_string()),
        }
    }
}
