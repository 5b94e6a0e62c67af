//! Filesystem-backed object store.
//!
//! Each bucket is a directory below the store root. Uploads stream into a
//! temporary sibling file and are renamed into place once complete, so readers
//! never observe a partially written object. An upload that fails or is
//! dropped before the rename removes its temporary file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{ObjectInfo, ObjectStore, StorageError, normalize_object_path, validate_bucket};
use crate::http::ByteStream;

const TEMP_FILE_SUFFIX: &str = ".tmp";

/// Temporary upload file, removed on drop unless committed.
#[derive(Debug)]
struct PartialUpload {
    path: PathBuf,
    committed: bool,
}

impl PartialUpload {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialUpload {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        // Runs on cancellation too, so this cannot await.
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(
                    "Failed to remove partial upload {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

/// Object store that maps buckets to directories.
#[derive(Debug)]
pub struct FsObjectStore {
    root: PathBuf,
    upload_counter: AtomicU64,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            upload_counter: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        validate_bucket(bucket)?;
        let bucket = normalize_object_path(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn object_file(&self, bucket: &str, path: &str) -> Result<(PathBuf, String), StorageError> {
        let dir = self.bucket_dir(bucket)?;
        let path = normalize_object_path(path)?;
        Ok((dir.join(path), path.to_string()))
    }

    async fn write_stream(file_path: &Path, mut body: ByteStream) -> Result<(), StorageError> {
        let mut file = fs::File::create(file_path).await?;
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list(&self, bucket: &str, max_keys: usize) -> Result<Vec<ObjectInfo>, StorageError> {
        let dir = self.bucket_dir(bucket)?;
        let mut objects = Vec::new();
        let mut pending = vec![dir.clone()];

        while let Some(current) = pending.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let metadata = entry.metadata().await?;
                let entry_path = entry.path();
                if metadata.is_dir() {
                    pending.push(entry_path);
                    continue;
                }
                if entry_path
                    .to_string_lossy()
                    .ends_with(TEMP_FILE_SUFFIX)
                {
                    continue;
                }

                let Ok(relative) = entry_path.strip_prefix(&dir) else {
                    continue;
                };
                let path = relative
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                objects.push(ObjectInfo {
                    path,
                    last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                    size: metadata.len(),
                });
            }
        }

        objects.sort_by(|a, b| a.path.cmp(&b.path));
        objects.truncate(max_keys);
        Ok(objects)
    }

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool, StorageError> {
        let (file_path, _) = self.object_file(bucket, path)?;
        Ok(fs::try_exists(&file_path).await?)
    }

    async fn upload_stream(
        &self,
        bucket: &str,
        path: &str,
        body: ByteStream,
    ) -> Result<String, StorageError> {
        let (file_path, stored_path) = self.object_file(bucket, path)?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let upload_id = self.upload_counter.fetch_add(1, Ordering::Relaxed);
        let mut temp_name = file_path.clone().into_os_string();
        temp_name.push(format!(".{upload_id}{TEMP_FILE_SUFFIX}"));
        let partial = PartialUpload::new(PathBuf::from(temp_name));

        Self::write_stream(partial.path(), body).await?;
        fs::rename(partial.path(), &file_path).await?;
        partial.commit();

        tracing::debug!("Stored object {}/{}", bucket, stored_path);
        Ok(stored_path)
    }

    async fn delete(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError> {
        let dir = self.bucket_dir(bucket)?;
        if paths.is_empty() {
            return Err(StorageError::EmptyDeleteList);
        }

        for path in paths {
            let path = normalize_object_path(path)?;
            match fs::remove_file(dir.join(path)).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::time::Duration;

    use bytes::Bytes;
    use futures::stream;
    use tempfile::TempDir;

    use super::*;

    fn body(data: &'static [u8]) -> ByteStream {
        stream::iter(vec![Ok(Bytes::from_static(data))]).boxed()
    }

    async fn files_in(dir: &Path) -> Vec<OsString> {
        let mut names = Vec::new();
        let Ok(mut entries) = fs::read_dir(dir).await else {
            return names;
        };
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name());
        }
        names
    }

    #[tokio::test]
    async fn test_dropped_upload_removes_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(temp_dir.path());
        let bucket_dir = temp_dir.path().join("media");

        let stalled: ByteStream = stream::iter(vec![Ok(Bytes::from_static(b"partial"))])
            .chain(stream::pending())
            .boxed();
        let mut upload = store.upload_stream("media", "clip.mp4", stalled);

        // Drive the upload until the temp file is on disk, then abandon it.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while files_in(&bucket_dir).await.is_empty() {
            assert!(tokio::time::Instant::now() < deadline, "temp file never appeared");
            tokio::select! {
                _ = &mut upload => panic!("stalled upload completed"),
                _ = tokio::time::sleep(Duration::from_millis(5)) => {}
            }
        }
        drop(upload);

        assert!(files_in(&bucket_dir).await.is_empty());
        assert!(store.list("media", 2000).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_upload_leaves_bucket_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(temp_dir.path());

        let stalled: ByteStream = stream::iter(vec![Ok(Bytes::from_static(b"partial"))])
            .chain(stream::pending())
            .boxed();
        let result = tokio::time::timeout(
            Duration::from_millis(200),
            store.upload_stream("media", "clip.mp4", stalled),
        )
        .await;

        assert!(result.is_err());
        assert!(files_in(&temp_dir.path().join("media")).await.is_empty());
    }

    #[tokio::test]
    async fn test_upload_list_exists_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(temp_dir.path());

        let stored = store
            .upload_stream("media", "/5d41402abc4b2a76b9719d911017c592.mp4", body(b"video"))
            .await
            .unwrap();
        assert_eq!(stored, "5d41402abc4b2a76b9719d911017c592.mp4");
        assert!(store.exists("media", &stored).await.unwrap());

        store
            .upload_stream("media", "nested/thumb.jpg", body(b"jpeg"))
            .await
            .unwrap();

        let listing = store.list("media", 2000).await.unwrap();
        let paths: Vec<&str> = listing.iter().map(|o| o.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["5d41402abc4b2a76b9719d911017c592.mp4", "nested/thumb.jpg"]
        );
        assert_eq!(listing[0].size, 5);
        assert!(listing.iter().all(|o| o.last_modified.is_some()));

        store
            .delete("media", &["nested/thumb.jpg".to_string(), "missing.jpg".to_string()])
            .await
            .unwrap();
        assert_eq!(store.list("media", 2000).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_no_object() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(temp_dir.path());
        let failing: ByteStream = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::other("connection reset")),
        ])
        .boxed();

        let result = store.upload_stream("media", "clip.mp4", failing).await;
        assert!(matches!(result, Err(StorageError::Io(_))));
        assert!(!store.exists("media", "clip.mp4").await.unwrap());
        assert!(store.list("media", 2000).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_bucket_lists_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(temp_dir.path());
        assert!(store.list("never-written", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_traversal_and_empty_names() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(temp_dir.path());

        assert!(matches!(
            store.exists("", "a.jpg").await,
            Err(StorageError::EmptyBucket)
        ));
        assert!(matches!(
            store.exists("media", "/").await,
            Err(StorageError::EmptyPath)
        ));
        assert!(matches!(
            store.upload_stream("media", "../escape.jpg", body(b"x")).await,
            Err(StorageError::InvalidPath { .. })
        ));
        assert!(matches!(
            store.delete("media", &[]).await,
            Err(StorageError::EmptyDeleteList)
        ));
    }
}
