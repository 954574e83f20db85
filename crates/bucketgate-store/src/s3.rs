//! S3-compatible object store backed by `rust-s3`
//!
//! One `Bucket` handle is built per whitelisted real identifier at startup.
//! Uploads go through the streaming put path, which switches to multipart
//! transfer for payloads above the provider's chunk size, so objects are
//! never buffered whole. Downloads expose the provider's chunk stream
//! directly; dropping it aborts the transfer.

use crate::types::{normalize_etag, ObjectBody, ObjectEntry, ObjectInfo, ObjectListing, ObjectReader};
use crate::{ObjectStore, Result, StoreError};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::Region;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Connection settings for an S3-compatible provider
#[derive(Clone, Debug)]
pub struct S3Config {
    /// Endpoint URL; empty means AWS for `region`
    pub endpoint: String,
    /// Region name
    pub region: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Use path-style addressing (MinIO and most self-hosted providers)
    pub path_style: bool,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: "us-east-1".to_string(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            path_style: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl S3Config {
    /// Endpoint actually used for requests
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.is_empty() {
            format!("https://s3.{}.amazonaws.com", self.region)
        } else {
            self.endpoint.trim_end_matches('/').to_string()
        }
    }
}

/// Object store talking to an S3-compatible provider
pub struct S3ObjectStore {
    buckets: HashMap<String, Box<Bucket>>,
}

impl S3ObjectStore {
    /// Build handles for every real bucket identifier
    pub fn new(config: &S3Config, bucket_names: &[String]) -> Result<Self> {
        let credentials = Credentials::new(
            Some(&config.access_key_id),
            Some(&config.secret_access_key),
            None,
            None,
            None,
        )
        .map_err(|e| StoreError::Configuration(format!("invalid S3 credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint_url(),
        };

        let mut buckets = HashMap::with_capacity(bucket_names.len());
        for name in bucket_names {
            let mut bucket = Bucket::new(name, region.clone(), credentials.clone())
                .map_err(|e| StoreError::Configuration(format!("invalid bucket {}: {}", name, e)))?;
            if config.path_style {
                bucket = bucket.with_path_style();
            }
            bucket.set_request_timeout(Some(config.request_timeout));
            buckets.insert(name.clone(), bucket);
        }

        Ok(Self { buckets })
    }

    fn bucket(&self, name: &str) -> Result<&Bucket> {
        self.buckets
            .get(name)
            .map(|b| b.as_ref())
            .ok_or_else(|| StoreError::UnknownBucket(name.to_string()))
    }
}

/// Translate a provider error for `bucket/key`, keeping 404s distinguishable
fn classify(err: S3Error, bucket: &str, key: &str) -> StoreError {
    match err {
        S3Error::HttpFailWithBody(status, body) => StoreError::from_status(status, bucket, key, body),
        other => StoreError::from(other),
    }
}

fn check_status(status: u16, bucket: &str, key: &str) -> Result<()> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(StoreError::from_status(status, bucket, key, "request failed"))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        let info = self.head_object(bucket, key).await?;
        let response = self
            .bucket(bucket)?
            .get_object_stream(key)
            .await
            .map_err(|e| classify(e, bucket, key))?;
        check_status(response.status_code, bucket, key)?;

        let stream = response.bytes.map_err(StoreError::from).boxed();
        Ok(ObjectBody { info, stream })
    }

    #[instrument(skip(self))]
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        let (head, status) = self
            .bucket(bucket)?
            .head_object(key)
            .await
            .map_err(|e| classify(e, bucket, key))?;
        check_status(status, bucket, key)?;

        Ok(ObjectInfo {
            content_type: head.content_type,
            content_length: head.content_length.and_then(|len| u64::try_from(len).ok()),
            last_modified: head.last_modified,
            etag: head.e_tag.as_deref().map(normalize_etag),
        })
    }

    #[instrument(skip(self))]
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
        max_keys: usize,
    ) -> Result<ObjectListing> {
        let (page, status) = self
            .bucket(bucket)?
            .list_page(
                prefix.to_string(),
                delimiter.map(str::to_string),
                continuation_token.map(str::to_string),
                None,
                Some(max_keys),
            )
            .await
            .map_err(|e| classify(e, bucket, prefix))?;
        check_status(status, bucket, prefix)?;

        let mut entries: Vec<ObjectEntry> = page
            .common_prefixes
            .unwrap_or_default()
            .into_iter()
            .map(|cp| ObjectEntry::directory(cp.prefix))
            .collect();

        entries.extend(
            page.contents
                .into_iter()
                // Zero-byte "folder" placeholders are already represented by the prefix.
                .filter(|obj| obj.key != prefix && !obj.key.ends_with('/'))
                .map(|obj| {
                    let etag = obj.e_tag.as_deref().map(normalize_etag).unwrap_or_default();
                    ObjectEntry::object(obj.key, obj.size, Some(obj.last_modified), etag)
                }),
        );

        let next_continuation_token = if page.is_truncated {
            page.next_continuation_token
        } else {
            None
        };

        debug!(entries = entries.len(), truncated = next_continuation_token.is_some(), "Listed objects");
        Ok(ObjectListing {
            entries,
            next_continuation_token,
        })
    }

    #[instrument(skip(self, reader))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut reader: ObjectReader,
        content_type: &str,
    ) -> Result<u64> {
        let response = self
            .bucket(bucket)?
            .put_object_stream_with_content_type(&mut reader, key, content_type)
            .await
            .map_err(|e| classify(e, bucket, key))?;
        check_status(response.status_code(), bucket, key)?;
        Ok(response.uploaded_bytes() as u64)
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let response = self
            .bucket(bucket)?
            .delete_object(key)
            .await
            .map_err(|e| classify(e, bucket, key))?;
        check_status(response.status_code(), bucket, key)
    }

    #[instrument(skip(self))]
    async fn copy_object(&self, bucket: &str, source_key: &str, target_key: &str) -> Result<()> {
        // The copy source header must be URL encoded for non-ASCII keys.
        let encoded_source = urlencoding::encode(source_key);
        let status = self
            .bucket(bucket)?
            .copy_object_internal(encoded_source.as_ref(), target_key)
            .await
            .map_err(|e| classify(e, bucket, source_key))?;
        check_status(status, bucket, source_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn config() -> S3Config {
        S3Config {
            endpoint: "http://localhost:9000/".to_string(),
            access_key_id: "minio".to_string(),
            secret_access_key: "minio123".to_string(),
            path_style: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(config().endpoint_url(), "http://localhost:9000");

        let aws = S3Config {
            region: "eu-west-1".to_string(),
            ..Default::default()
        };
        assert_eq!(aws.endpoint_url(), "https://s3.eu-west-1.amazonaws.com");
    }

    #[test]
    fn test_store_only_knows_configured_buckets() {
        let store = S3ObjectStore::new(&config(), &["raw-id-1".to_string()]).unwrap();
        assert!(store.bucket("raw-id-1").is_ok());
        assert!(matches!(store.bucket("raw-id-2"), Err(StoreError::UnknownBucket(_))));
    }

    #[rstest]
    #[case(200, true)]
    #[case(204, true)]
    #[case(299, true)]
    #[case(403, false)]
    #[case(404, false)]
    #[case(500, false)]
    fn test_success_statuses(#[case] status: u16, #[case] ok: bool) {
        assert_eq!(check_status(status, "b", "k").is_ok(), ok);
    }

    #[test]
    fn test_status_classification() {
        assert!(check_status(404, "b", "k").unwrap_err().is_not_found());
        assert!(matches!(
            check_status(403, "b", "k"),
            Err(StoreError::AccessDenied(_))
        ));
        assert!(matches!(
            classify(S3Error::HttpFailWithBody(404, String::new()), "b", "k"),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            classify(S3Error::HttpFailWithBody(400, "InvalidArgument".to_string()), "b", ""),
            StoreError::InvalidArgument(_)
        ));
        assert!(matches!(
            StoreError::from(S3Error::HttpFailWithBody(400, String::new())),
            StoreError::InvalidArgument(_)
        ));
    }
}
