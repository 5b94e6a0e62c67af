//! Process-local object store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::RwLock;

use super::{ObjectInfo, ObjectStore, StorageError, normalize_object_path, validate_bucket};
use crate::http::ByteStream;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

/// Object store that keeps every object in memory.
///
/// Used for development runs and tests. Listings come back sorted by path.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    buckets: RwLock<HashMap<String, BTreeMap<String, StoredObject>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object with an explicit modification time.
    ///
    /// # Errors
    ///
    /// - `StorageError::EmptyBucket` - If `bucket` is empty
    /// - `StorageError::EmptyPath` - If `path` is empty after normalization
    pub fn insert(
        &self,
        bucket: &str,
        path: &str,
        data: impl Into<Bytes>,
        last_modified: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        validate_bucket(bucket)?;
        let path = normalize_object_path(path)?;
        self.buckets
            .write()
            .entry(bucket.to_string())
            .or_default()
            .insert(
                path.to_string(),
                StoredObject {
                    data: data.into(),
                    last_modified,
                },
            );
        Ok(())
    }

    /// Returns the stored bytes for `path`, if present.
    pub fn get(&self, bucket: &str, path: &str) -> Option<Bytes> {
        let path = normalize_object_path(path).ok()?;
        self.buckets
            .read()
            .get(bucket)
            .and_then(|objects| objects.get(path))
            .map(|object| object.data.clone())
    }

    /// Number of objects in `bucket`.
    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets.read().get(bucket).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, bucket: &str, max_keys: usize) -> Result<Vec<ObjectInfo>, StorageError> {
        validate_bucket(bucket)?;
        let buckets = self.buckets.read();
        let Some(objects) = buckets.get(bucket) else {
            return Ok(Vec::new());
        };

        Ok(objects
            .iter()
            .take(max_keys)
            .map(|(path, object)| ObjectInfo {
                path: path.clone(),
                last_modified: Some(object.last_modified),
                size: object.data.len() as u64,
            })
            .collect())
    }

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool, StorageError> {
        validate_bucket(bucket)?;
        let path = normalize_object_path(path)?;
        Ok(self
            .buckets
            .read()
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(path)))
    }

    async fn upload_stream(
        &self,
        bucket: &str,
        path: &str,
        mut body: ByteStream,
    ) -> Result<String, StorageError> {
        validate_bucket(bucket)?;
        let path = normalize_object_path(path)?.to_string();

        let mut data = BytesMut::new();
        while let Some(chunk) = body.next().await {
            data.extend_from_slice(&chunk?);
        }

        self.insert(bucket, &path, data.freeze(), Utc::now())?;
        Ok(path)
    }

    async fn delete(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError> {
        validate_bucket(bucket)?;
        if paths.is_empty() {
            return Err(StorageError::EmptyDeleteList);
        }

        let mut buckets = self.buckets.write();
        if let Some(objects) = buckets.get_mut(bucket) {
            for path in paths {
                objects.remove(path.trim_start_matches('/'));
            }
        }
        Ok(())
    }
}
