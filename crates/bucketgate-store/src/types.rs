//! Object, listing and body types shared by all backends

use bytes::Bytes;
use futures::stream::BoxStream;
use std::fmt;
use tokio::io::AsyncRead;

use crate::StoreError;

/// Stream of object content chunks
pub type ByteStream = BoxStream<'static, Result<Bytes, StoreError>>;

/// Reader supplying object content for uploads
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Metadata of a stored object
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Content type recorded by the backend
    pub content_type: Option<String>,
    /// Content length in bytes
    pub content_length: Option<u64>,
    /// Last-modified timestamp as reported by the backend
    pub last_modified: Option<String>,
    /// Integrity tag (ETag)
    pub etag: Option<String>,
}

/// An open object: metadata plus a content stream
pub struct ObjectBody {
    /// Object metadata
    pub info: ObjectInfo,
    /// Content stream, pulled on demand
    pub stream: ByteStream,
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// A single listing entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Full object key, or the common prefix for directories
    pub key: String,
    /// Last path component, without trailing delimiter
    pub name: String,
    /// Size in bytes (0 for directories)
    pub size: u64,
    /// Last-modified timestamp (absent for directories)
    pub last_modified: Option<String>,
    /// Integrity tag; `DIRECTORY_ETAG` for directories
    pub etag: String,
    /// Entry synthesized from a common prefix
    pub is_directory: bool,
}

impl ObjectEntry {
    /// Create a plain object entry
    pub fn object(key: impl Into<String>, size: u64, last_modified: Option<String>, etag: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            name: entry_name(&key),
            key,
            size,
            last_modified,
            etag: etag.into(),
            is_directory: false,
        }
    }

    /// Create a synthetic directory entry from a common prefix
    pub fn directory(prefix: impl Into<String>) -> Self {
        let key = prefix.into();
        Self {
            name: entry_name(&key),
            key,
            size: 0,
            last_modified: None,
            etag: crate::DIRECTORY_ETAG.to_string(),
            is_directory: true,
        }
    }
}

/// One page of a listing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectListing {
    /// Directories first, then objects
    pub entries: Vec<ObjectEntry>,
    /// Token for the next page, if the listing was truncated
    pub next_continuation_token: Option<String>,
}

fn entry_name(key: &str) -> String {
    key.trim_end_matches(crate::DIRECTORY_DELIMITER)
        .rsplit(crate::DIRECTORY_DELIMITER)
        .next()
        .unwrap_or(key)
        .to_string()
}

/// Normalise a backend ETag: strip surrounding quotes
pub fn normalize_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_names() {
        assert_eq!(ObjectEntry::object("a/b/report.pdf", 3, None, "x").name, "report.pdf");
        assert_eq!(ObjectEntry::object("top.txt", 3, None, "x").name, "top.txt");
        assert_eq!(ObjectEntry::directory("a/photos/").name, "photos");
    }

    #[test]
    fn test_directory_entry_is_synthetic() {
        let dir = ObjectEntry::directory("docs/");
        assert!(dir.is_directory);
        assert_eq!(dir.size, 0);
        assert_eq!(dir.etag, crate::DIRECTORY_ETAG);
        assert!(dir.last_modified.is_none());
    }

    #[test]
    fn test_normalize_etag() {
        assert_eq!(normalize_etag("\"abc\""), "abc");
        assert_eq!(normalize_etag("abc"), "abc");
    }
}
