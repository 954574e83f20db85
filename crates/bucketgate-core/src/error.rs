//! Error types for the bucketgate-core crate

use bucketgate_store::StoreError;
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in the gateway core
#[derive(Error, Debug)]
pub enum CoreError {
    /// No real bucket identifiers were configured
    #[error("at least one bucket name must be configured")]
    NoBuckets,

    /// Alias list length differs from the bucket list length
    #[error("alias count mismatch: {aliases} aliases for {buckets} buckets")]
    AliasCountMismatch { aliases: usize, buckets: usize },

    /// A real identifier appears more than once
    #[error("duplicate bucket name: {0}")]
    DuplicateBucket(String),

    /// An alias appears more than once
    #[error("duplicate bucket alias: {0}")]
    DuplicateAlias(String),

    /// A name would resolve to two different buckets
    #[error("ambiguous bucket name: {0} is both an alias and a bucket of different entries")]
    AmbiguousName(String),

    /// Empty or whitespace-only entry in the bucket or alias list
    #[error("bucket names and aliases must not be blank")]
    BlankName,

    /// Window or quota of a rate limit is unusable
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),

    /// Name resolves to no configured bucket
    #[error("invalid bucket: {0}")]
    InvalidBucket(String),

    /// Object key is empty
    #[error("invalid object key: {0:?}")]
    InvalidKey(String),

    /// Copy succeeded but removing the source failed; both objects remain
    #[error("move of {source_key} to {target_key} in {bucket} incomplete: copied but source not deleted: {reason}")]
    MoveIncomplete {
        bucket: String,
        source_key: String,
        target_key: String,
        #[source]
        reason: StoreError,
    },

    /// Storage backend error
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl CoreError {
    /// Check if this is a startup configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NoBuckets
                | Self::AliasCountMismatch { .. }
                | Self::DuplicateBucket(_)
                | Self::DuplicateAlias(_)
                | Self::AmbiguousName(_)
                | Self::BlankName
                | Self::InvalidRateLimit(_)
        )
    }
}
