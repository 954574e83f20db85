//! In-memory object store for development and testing

use crate::types::{ObjectBody, ObjectEntry, ObjectInfo, ObjectListing, ObjectReader};
use crate::{ObjectStore, Result, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Chunk size used when streaming stored objects back out
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone, Debug)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    etag: String,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn info(&self) -> ObjectInfo {
        ObjectInfo {
            content_type: Some(self.content_type.clone()),
            content_length: Some(self.data.len() as u64),
            last_modified: Some(self.last_modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string()),
            etag: Some(self.etag.clone()),
        }
    }
}

/// An in-memory object store with S3-like listing semantics
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    buckets: Arc<RwLock<HashMap<String, BTreeMap<String, StoredObject>>>>,
}

impl MemoryObjectStore {
    /// Create a new store with no buckets
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given buckets already present
    pub fn with_buckets<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for bucket in buckets {
            store.create_bucket(bucket);
        }
        store
    }

    /// Create an empty bucket (no-op if it already exists)
    pub fn create_bucket(&self, bucket: impl Into<String>) {
        self.buckets.write().entry(bucket.into()).or_default();
    }

    /// Insert an object directly, bypassing the reader path
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>, content_type: &str) -> Result<()> {
        let data = data.into();
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::UnknownBucket(bucket.to_string()))?;
        objects.insert(key.to_string(), stored(data, content_type));
        Ok(())
    }

    /// Check whether an object exists
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.buckets
            .read()
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(key))
    }

    /// Number of objects in a bucket
    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets.read().get(bucket).map_or(0, BTreeMap::len)
    }

    fn lookup(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        let buckets = self.buckets.read();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::UnknownBucket(bucket.to_string()))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(bucket, key))
    }
}

fn stored(data: Bytes, content_type: &str) -> StoredObject {
    let hash = blake3::hash(&data);
    StoredObject {
        etag: hex::encode(&hash.as_bytes()[..16]),
        data,
        content_type: content_type.to_string(),
        last_modified: Utc::now(),
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        let object = self.lookup(bucket, key)?;
        let info = object.info();
        let data = object.data;
        let chunks: Vec<Result<Bytes>> = (0..data.len())
            .step_by(STREAM_CHUNK_SIZE)
            .map(|start| Ok(data.slice(start..(start + STREAM_CHUNK_SIZE).min(data.len()))))
            .collect();

        Ok(ObjectBody {
            info,
            stream: stream::iter(chunks).boxed(),
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        Ok(self.lookup(bucket, key)?.info())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
        max_keys: usize,
    ) -> Result<ObjectListing> {
        let buckets = self.buckets.read();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::UnknownBucket(bucket.to_string()))?;

        let after = continuation_token
            .map(|token| {
                hex::decode(token)
                    .ok()
                    .and_then(|raw| String::from_utf8(raw).ok())
                    .ok_or_else(|| StoreError::InvalidArgument("invalid continuation token".to_string()))
            })
            .transpose()?;

        // Items in key order; a directory stands in for every key beneath it.
        let mut items: Vec<ObjectEntry> = Vec::new();
        for (key, object) in objects.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            if let Some(after) = after.as_deref() {
                if key.as_str() <= after || (after.ends_with('/') && key.starts_with(after)) {
                    continue;
                }
            }

            let rest = &key[prefix.len()..];
            let group = delimiter
                .filter(|d| !d.is_empty())
                .and_then(|d| rest.find(d).map(|idx| format!("{}{}", prefix, &rest[..idx + d.len()])));

            let entry = match group {
                Some(common_prefix) => {
                    if items.last().is_some_and(|last| last.key == common_prefix) {
                        continue;
                    }
                    if after.as_deref() == Some(common_prefix.as_str()) {
                        continue;
                    }
                    ObjectEntry::directory(common_prefix)
                }
                None => ObjectEntry::object(
                    key.clone(),
                    object.data.len() as u64,
                    Some(object.last_modified.to_rfc3339()),
                    object.etag.clone(),
                ),
            };

            items.push(entry);
            if items.len() > max_keys {
                break;
            }
        }

        let next_continuation_token = if items.len() > max_keys {
            items.truncate(max_keys);
            items.last().map(|last| hex::encode(last.key.as_bytes()))
        } else {
            None
        };

        let (mut entries, files): (Vec<_>, Vec<_>) = items.into_iter().partition(|e| e.is_directory);
        entries.extend(files);

        Ok(ObjectListing {
            entries,
            next_continuation_token,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut reader: ObjectReader,
        content_type: &str,
    ) -> Result<u64> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        let size = data.len() as u64;
        self.insert(bucket, key, data, content_type)?;
        Ok(size)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::UnknownBucket(bucket.to_string()))?;
        objects.remove(key);
        Ok(())
    }

    async fn copy_object(&self, bucket: &str, source_key: &str, target_key: &str) -> Result<()> {
        let source = self.lookup(bucket, source_key)?;
        let copy = stored(source.data, &source.content_type);
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::UnknownBucket(bucket.to_string()))?;
        objects.insert(target_key.to_string(), copy);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn reader(data: &'static [u8]) -> ObjectReader {
        Box::new(std::io::Cursor::new(data))
    }

    async fn read_body(body: ObjectBody) -> Vec<u8> {
        let chunks: Vec<Bytes> = body.stream.try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MemoryObjectStore::with_buckets(["raw-id-1"]);

        let size = store
            .put_object("raw-id-1", "report.pdf", reader(b"%PDF-1.7"), "application/pdf")
            .await
            .unwrap();
        assert_eq!(size, 8);

        let body = store.get_object("raw-id-1", "report.pdf").await.unwrap();
        assert_eq!(body.info.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(body.info.content_length, Some(8));
        assert_eq!(read_body(body).await, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryObjectStore::with_buckets(["raw-id-1"]);
        let err = store.get_object("raw-id-1", "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_bucket() {
        let store = MemoryObjectStore::new();
        let err = store.head_object("ghost", "key").await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownBucket(_)));
    }

    #[tokio::test]
    async fn test_list_groups_directories() {
        let store = MemoryObjectStore::with_buckets(["b"]);
        store.insert("b", "a.txt", "1", "text/plain").unwrap();
        store.insert("b", "docs/one.txt", "1", "text/plain").unwrap();
        store.insert("b", "docs/two.txt", "1", "text/plain").unwrap();
        store.insert("b", "media/x/y.png", "1", "image/png").unwrap();

        let listing = store.list_objects("b", "", Some("/"), None, 1000).await.unwrap();
        let keys: Vec<_> = listing.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["docs/", "media/", "a.txt"]);
        assert!(listing.entries[0].is_directory);
        assert!(!listing.entries[2].is_directory);
        assert!(listing.next_continuation_token.is_none());

        let nested = store.list_objects("b", "docs/", Some("/"), None, 1000).await.unwrap();
        let names: Vec<_> = nested.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["one.txt", "two.txt"]);
    }

    #[tokio::test]
    async fn test_list_rejects_malformed_token() {
        let store = MemoryObjectStore::with_buckets(["b"]);
        let err = store.list_objects("b", "", Some("/"), Some("zz"), 1000).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let store = MemoryObjectStore::with_buckets(["b"]);
        for i in 0..5 {
            store.insert("b", &format!("file-{i}"), "x", "text/plain").unwrap();
        }
        store.insert("b", "folder/inner", "x", "text/plain").unwrap();

        let mut seen = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = store
                .list_objects("b", "", Some("/"), token.as_deref(), 2)
                .await
                .unwrap();
            assert!(page.entries.len() <= 2);
            seen.extend(page.entries.into_iter().map(|e| e.key));
            match page.next_continuation_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        seen.sort();
        assert_eq!(
            seen,
            vec!["file-0", "file-1", "file-2", "file-3", "file-4", "folder/"]
        );
    }

    #[tokio::test]
    async fn test_copy_and_delete() {
        let store = MemoryObjectStore::with_buckets(["b"]);
        store.insert("b", "src", "payload", "text/plain").unwrap();

        store.copy_object("b", "src", "dst").await.unwrap();
        assert!(store.contains("b", "src"));
        assert!(store.contains("b", "dst"));

        store.delete_object("b", "src").await.unwrap();
        assert!(!store.contains("b", "src"));
        assert_eq!(store.object_count("b"), 1);
    }

    #[tokio::test]
    async fn test_large_object_streams_in_chunks() {
        let store = MemoryObjectStore::with_buckets(["b"]);
        let data = vec![7u8; STREAM_CHUNK_SIZE * 2 + 10];
        store.insert("b", "big.bin", data.clone(), "application/octet-stream").unwrap();

        let body = store.get_object("b", "big.bin").await.unwrap();
        let chunks: Vec<Bytes> = body.stream.try_collect().await.unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), data);
    }
}
