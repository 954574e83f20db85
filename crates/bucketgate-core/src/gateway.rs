//! Storage gateway: object operations addressed by alias or real bucket name
//!
//! Every operation resolves the caller-supplied bucket name through the
//! registry first. Unknown names fail with [`CoreError::InvalidBucket`] before
//! any backend call, so the backend only ever sees whitelisted identifiers.

use crate::{BucketRegistry, CoreError, Result};
use bucketgate_store::{
    ObjectBody, ObjectInfo, ObjectListing, ObjectReader, ObjectStore, StoreError,
    DIRECTORY_DELIMITER, MAX_LIST_KEYS,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Default bound on a single backend call
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Object operations over the whitelisted buckets
pub struct StorageGateway<S: ObjectStore> {
    registry: Arc<BucketRegistry>,
    store: Arc<S>,
    timeout: Duration,
}

impl<S: ObjectStore> StorageGateway<S> {
    /// Create a gateway over `store`
    pub fn new(registry: Arc<BucketRegistry>, store: Arc<S>) -> Self {
        Self {
            registry,
            store,
            timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    /// Set the per-call backend timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The bucket registry
    pub fn registry(&self) -> &BucketRegistry {
        &self.registry
    }

    /// The underlying object store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Resolve a bucket name or fail with `InvalidBucket`
    pub fn resolve<'a>(&'a self, name: &str) -> Result<&'a str> {
        self.registry
            .resolve(name)
            .ok_or_else(|| CoreError::InvalidBucket(name.to_string()))
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = bucketgate_store::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(CoreError::from),
            Err(_) => Err(CoreError::Store(StoreError::Timeout {
                seconds: self.timeout.as_secs(),
            })),
        }
    }

    /// Open an object for streaming; the timeout covers opening only
    #[instrument(skip(self))]
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        let real = self.resolve(bucket)?;
        validate_key(key)?;
        self.bounded(self.store.get_object(real, key)).await
    }

    /// Fetch object metadata
    #[instrument(skip(self))]
    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        let real = self.resolve(bucket)?;
        validate_key(key)?;
        self.bounded(self.store.head_object(real, key)).await
    }

    /// List one page (at most `MAX_LIST_KEYS` entries) of the folder at `prefix`
    #[instrument(skip(self))]
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListing> {
        let real = self.resolve(bucket)?;
        let continuation_token = continuation_token.filter(|t| !t.is_empty());
        self.bounded(self.store.list_objects(
            real,
            prefix,
            Some(DIRECTORY_DELIMITER),
            continuation_token,
            MAX_LIST_KEYS,
        ))
        .await
    }

    /// Stream an object into the bucket.
    ///
    /// Not wrapped in the call timeout: large uploads legitimately run long.
    /// The backend bounds each underlying request instead.
    #[instrument(skip(self, reader))]
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        reader: ObjectReader,
        content_type: &str,
    ) -> Result<u64> {
        let real = self.resolve(bucket)?;
        validate_key(key)?;
        let size = self.store.put_object(real, key, reader, content_type).await?;
        info!(bucket = %real, key, size, "Uploaded object");
        Ok(size)
    }

    /// Delete an object
    #[instrument(skip(self))]
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let real = self.resolve(bucket)?;
        validate_key(key)?;
        self.bounded(self.store.delete_object(real, key)).await?;
        info!(bucket = %real, key, "Deleted object");
        Ok(())
    }

    /// Copy an object within a bucket
    #[instrument(skip(self))]
    pub async fn copy_object(&self, bucket: &str, source_key: &str, target_key: &str) -> Result<()> {
        let real = self.resolve(bucket)?;
        validate_key(source_key)?;
        validate_key(target_key)?;
        self.bounded(self.store.copy_object(real, source_key, target_key)).await
    }

    /// Move an object by copying it and then deleting the source.
    ///
    /// Not atomic. If the delete fails after the copy succeeded, both objects
    /// exist and `MoveIncomplete` is returned; nothing is rolled back or retried.
    /// Moving a key onto itself only checks that the object exists.
    #[instrument(skip(self))]
    pub async fn move_object(&self, bucket: &str, source_key: &str, target_key: &str) -> Result<()> {
        if source_key == target_key {
            self.head_object(bucket, source_key).await?;
            return Ok(());
        }

        self.copy_object(bucket, source_key, target_key).await?;
        let real = self.resolve(bucket)?;

        if let Err(e) = self.delete_object(real, source_key).await {
            warn!(bucket = %real, source_key, target_key, error = %e, "Move copied object but failed to delete source");
            let reason = match e {
                CoreError::Store(store_err) => store_err,
                other => StoreError::Backend(other.to_string()),
            };
            return Err(CoreError::MoveIncomplete {
                bucket: real.to_string(),
                source_key: source_key.to_string(),
                target_key: target_key.to_string(),
                reason,
            });
        }
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
