//! Object storage for cached media.
//!
//! Defines the object store interface consumed by the cache pipeline and the
//! reaper, with in-memory and filesystem implementations.

pub mod file_store;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
pub use file_store::FsObjectStore;
pub use memory::MemoryObjectStore;

use crate::http::ByteStream;

/// Listing entry for a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Path relative to the bucket root
    pub path: String,
    /// Last write time, if the backend reports one
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
}

/// Bucketed object storage.
///
/// Implementations are shared between unrelated requests and the reaper and
/// perform no cross-request locking.
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Lists up to `max_keys` objects in `bucket`.
    ///
    /// # Errors
    ///
    /// - `StorageError::EmptyBucket` - If `bucket` is empty
    /// - `StorageError::Io` - If the backend could not be read
    async fn list(&self, bucket: &str, max_keys: usize) -> Result<Vec<ObjectInfo>, StorageError>;

    /// Checks whether `path` exists in `bucket`.
    ///
    /// # Errors
    ///
    /// - `StorageError::EmptyBucket` - If `bucket` is empty
    /// - `StorageError::EmptyPath` - If `path` is empty after normalization
    /// - `StorageError::Io` - If the backend could not be read
    async fn exists(&self, bucket: &str, path: &str) -> Result<bool, StorageError>;

    /// Streams `body` into `bucket` under `path` and returns the stored path.
    ///
    /// # Errors
    ///
    /// - `StorageError::EmptyBucket` - If `bucket` is empty
    /// - `StorageError::EmptyPath` - If `path` is empty after normalization
    /// - `StorageError::Io` - If reading the body or writing the object failed
    async fn upload_stream(
        &self,
        bucket: &str,
        path: &str,
        body: ByteStream,
    ) -> Result<String, StorageError>;

    /// Deletes every path in `paths` from `bucket`.
    ///
    /// Paths that no longer exist count as deleted.
    ///
    /// # Errors
    ///
    /// - `StorageError::EmptyBucket` - If `bucket` is empty
    /// - `StorageError::EmptyDeleteList` - If `paths` is empty
    /// - `StorageError::Io` - If an object could not be removed
    async fn delete(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError>;
}

/// Errors that occur during object storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Bucket name is empty")]
    EmptyBucket,

    #[error("Object path is empty")]
    EmptyPath,

    /// Path escapes the bucket or contains unsupported segments
    #[error("Invalid object path '{path}'")]
    InvalidPath {
        /// Offending path
        path: String,
    },

    #[error("Delete called with no paths")]
    EmptyDeleteList,

    /// Backend-specific failure
    #[error("Storage backend error: {reason}")]
    Backend {
        /// Description of the backend failure
        reason: String,
    },

    /// Standard I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejects empty bucket names.
///
/// # Errors
///
/// - `StorageError::EmptyBucket` - If `bucket` is empty
pub fn validate_bucket(bucket: &str) -> Result<(), StorageError> {
    if bucket.is_empty() {
        return Err(StorageError::EmptyBucket);
    }
    Ok(())
}

/// Trims a leading `/` and rejects empty or traversing paths.
///
/// # Errors
///
/// - `StorageError::EmptyPath` - If nothing remains after trimming
/// - `StorageError::InvalidPath` - If a segment is `..` or empty
pub fn normalize_object_path(path: &str) -> Result<&str, StorageError> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(StorageError::EmptyPath);
    }
    if trimmed
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidPath {
            path: path.to_string(),
        });
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_bucket() {
        assert!(matches!(validate_bucket(""), Err(StorageError::EmptyBucket)));
        assert!(validate_bucket("driftnet").is_ok());
    }

    #[test]
    fn test_normalize_object_path() {
        assert_eq!(normalize_object_path("/abc.mp4").unwrap(), "abc.mp4");
        assert_eq!(normalize_object_path("a/b.jpg").unwrap(), "a/b.jpg");
        assert!(matches!(
            normalize_object_path("/"),
            Err(StorageError::EmptyPath)
        ));
        assert!(matches!(
            normalize_object_path("../etc/passwd"),
            Err(StorageError::InvalidPath { .. })
        ));
        assert!(matches!(
            normalize_object_path("a//b"),
            Err(StorageError::InvalidPath { .. })
        ));
    }
}
