//! # Bucketgate Store
//!
//! Object storage layer for the bucket gateway.
//!
//! This crate provides:
//! - **Object operations**: Get, list, put, delete and copy objects by real bucket identifier
//! - **S3 backend**: Any S3-compatible provider through `rust-s3`
//! - **Memory backend**: Ordered in-memory store for development and tests
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Storage Gateway              │
//! ├─────────────────────────────────────────┤
//! │           ObjectStore Trait             │
//! ├────────────────────┬────────────────────┤
//! │   S3ObjectStore    │ MemoryObjectStore  │
//! ├────────────────────┴────────────────────┤
//! │        S3-compatible object storage     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Backends never see alias names. Callers resolve bucket names first and pass
//! the real identifier.

pub mod error;
pub mod memory;
pub mod s3;
pub mod types;

pub use error::{Result, StoreError};
pub use memory::MemoryObjectStore;
pub use s3::{S3Config, S3ObjectStore};
pub use types::{ByteStream, ObjectBody, ObjectEntry, ObjectInfo, ObjectListing, ObjectReader};

use async_trait::async_trait;
use tracing::{info, warn};

/// Maximum number of entries a single listing call returns
pub const MAX_LIST_KEYS: usize = 1000;

/// Delimiter used to group keys into directories
pub const DIRECTORY_DELIMITER: &str = "/";

/// Integrity tag carried by synthesized directory entries
pub const DIRECTORY_ETAG: &str = "directory";

/// Trait for object storage backends
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open an object for streaming
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody>;

    /// Fetch object metadata without the body
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo>;

    /// List one page of objects under `prefix`, grouped by `delimiter`
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
        max_keys: usize,
    ) -> Result<ObjectListing>;

    /// Store an object from a reader; returns the stored size when known
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        reader: ObjectReader,
        content_type: &str,
    ) -> Result<u64>;

    /// Delete an object
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Copy an object within a bucket
    async fn copy_object(&self, bucket: &str, source_key: &str, target_key: &str) -> Result<()>;
}

/// Object store chosen at startup: S3 when configured, memory for development
pub enum FlexibleObjectStore {
    /// S3-compatible provider
    S3(S3ObjectStore),
    /// In-memory storage
    Memory(MemoryObjectStore),
}

impl FlexibleObjectStore {
    /// Build the S3 store, or the memory store when `use_memory` is set
    pub fn from_config(config: &S3Config, buckets: &[String], use_memory: bool) -> Result<Self> {
        if use_memory {
            warn!("Using in-memory object store - data will NOT persist");
            let store = MemoryObjectStore::new();
            for bucket in buckets {
                store.create_bucket(bucket);
            }
            return Ok(Self::Memory(store));
        }

        let store = S3ObjectStore::new(config, buckets)?;
        info!(endpoint = %config.endpoint_url(), buckets = buckets.len(), "Using S3 object store");
        Ok(Self::S3(store))
    }

    /// Check if objects outlive the process
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::S3(_))
    }
}

#[async_trait]
impl ObjectStore for FlexibleObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        match self {
            Self::S3(store) => store.get_object(bucket, key).await,
            Self::Memory(store) => store.get_object(bucket, key).await,
        }
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        match self {
            Self::S3(store) => store.head_object(bucket, key).await,
            Self::Memory(store) => store.head_object(bucket, key).await,
        }
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
        max_keys: usize,
    ) -> Result<ObjectListing> {
        match self {
            Self::S3(store) => {
                store
                    .list_objects(bucket, prefix, delimiter, continuation_token, max_keys)
                    .await
            }
            Self::Memory(store) => {
                store
                    .list_objects(bucket, prefix, delimiter, continuation_token, max_keys)
                    .await
            }
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        reader: ObjectReader,
        content_type: &str,
    ) -> Result<u64> {
        match self {
            Self::S3(store) => store.put_object(bucket, key, reader, content_type).await,
            Self::Memory(store) => store.put_object(bucket, key, reader, content_type).await,
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        match self {
            Self::S3(store) => store.delete_object(bucket, key).await,
            Self::Memory(store) => store.delete_object(bucket, key).await,
        }
    }

    async fn copy_object(&self, bucket: &str, source_key: &str, target_key: &str) -> Result<()> {
        match self {
            Self::S3(store) => store.copy_object(bucket, source_key, target_key).await,
            Self::Memory(store) => store.copy_object(bucket, source_key, target_key).await,
        }
    }
}
