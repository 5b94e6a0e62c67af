//! Test doubles for transports, object stores and extractors.
//!
//! Shared by unit tests in this crate and, through the `test-utils` feature,
//! by the extractor crate and the integration test suite.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{StreamExt, stream};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::extractor::{CachePolicy, ExtractError, Extractor};
use crate::http::{ByteStream, HttpError, HttpRequest, HttpTransport};
use crate::media::{Media, MediaItem};
use crate::storage::{MemoryObjectStore, ObjectInfo, ObjectStore, StorageError};

/// Canned answer for requests matching a URL prefix.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Successful response with this body
    Body(Vec<u8>),
    /// Non-success HTTP status
    Status(u16),
    /// Connection-level failure
    Fail(String),
    /// Never answers
    Hang,
}

impl ScriptedResponse {
    pub fn body(data: &[u8]) -> Self {
        ScriptedResponse::Body(data.to_vec())
    }

    pub fn text(text: &str) -> Self {
        ScriptedResponse::Body(text.as_bytes().to_vec())
    }
}

/// HTTP transport answering from a prefix-matched script.
///
/// Routes are checked in insertion order; unmatched URLs answer 404. Every
/// request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<(String, ScriptedResponse)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, prefix: impl Into<String>, response: ScriptedResponse) -> Self {
        self.add_route(prefix, response);
        self
    }

    pub fn add_route(&self, prefix: impl Into<String>, response: ScriptedResponse) {
        self.routes.lock().push((prefix.into(), response));
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests whose URL starts with `prefix`.
    pub fn request_count(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.url.starts_with(prefix))
            .count()
    }

    fn respond(&self, request: HttpRequest) -> ScriptedResponse {
        let response = self
            .routes
            .lock()
            .iter()
            .find(|(prefix, _)| request.url.starts_with(prefix.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or(ScriptedResponse::Status(404));
        self.requests.lock().push(request);
        response
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn fetch_text(&self, request: HttpRequest) -> Result<String, HttpError> {
        let url = request.url.clone();
        match self.respond(request) {
            ScriptedResponse::Body(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            ScriptedResponse::Status(status) => Err(HttpError::Status { url, status }),
            ScriptedResponse::Fail(reason) => Err(HttpError::Request { url, reason }),
            ScriptedResponse::Hang => std::future::pending().await,
        }
    }

    async fn fetch_stream(&self, url: &str) -> Result<ByteStream, HttpError> {
        match self.respond(HttpRequest::get(url)) {
            ScriptedResponse::Body(data) => {
                let middle = data.len() / 2;
                let chunks = vec![
                    Ok(Bytes::copy_from_slice(&data[..middle])),
                    Ok(Bytes::copy_from_slice(&data[middle..])),
                ];
                Ok(stream::iter(chunks).boxed())
            }
            ScriptedResponse::Status(status) => Err(HttpError::Status {
                url: url.to_string(),
                status,
            }),
            ScriptedResponse::Fail(reason) => Err(HttpError::Request {
                url: url.to_string(),
                reason,
            }),
            ScriptedResponse::Hang => std::future::pending().await,
        }
    }
}

/// Object store wrapper that counts calls and injects failures.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: MemoryObjectStore,
    pub list_calls: AtomicUsize,
    pub exists_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    failing_lists: AtomicUsize,
    delete_delay: Mutex<Option<Duration>>,
    deleted: Mutex<Vec<String>>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backing store, for seeding and inspection.
    pub fn inner(&self) -> &MemoryObjectStore {
        &self.inner
    }

    /// Stores `data` under `path` with the current time.
    ///
    /// # Errors
    ///
    /// - `StorageError::EmptyBucket` - If `bucket` is empty
    /// - `StorageError::EmptyPath` - If `path` is empty
    pub fn seed(&self, bucket: &str, path: &str, data: &[u8]) -> Result<(), StorageError> {
        self.inner
            .insert(bucket, path, Bytes::copy_from_slice(data), Utc::now())
    }

    /// Makes the next `count` list calls fail.
    pub fn fail_next_lists(&self, count: usize) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    /// Delays every delete call by `delay`.
    pub fn set_delete_delay(&self, delay: Duration) {
        *self.delete_delay.lock() = Some(delay);
    }

    /// Paths passed to delete, in call order.
    pub fn deleted_paths(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn list(&self, bucket: &str, max_keys: usize) -> Result<Vec<ObjectInfo>, StorageError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failing_lists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if should_fail {
            return Err(StorageError::Backend {
                reason: "scripted list failure".to_string(),
            });
        }
        self.inner.list(bucket, max_keys).await
    }

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool, StorageError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(bucket, path).await
    }

    async fn upload_stream(
        &self,
        bucket: &str,
        path: &str,
        body: ByteStream,
    ) -> Result<String, StorageError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.upload_stream(bucket, path, body).await
    }

    async fn delete(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delete_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.deleted.lock().extend(paths.iter().cloned());
        self.inner.delete(bucket, paths).await
    }
}

/// Extractor returning canned media.
#[derive(Debug, Clone)]
pub struct StubExtractor {
    name: String,
    hosts: Vec<String>,
    policy: CachePolicy,
    items: Vec<MediaItem>,
    delay: Option<Duration>,
    failure: Option<String>,
}

impl StubExtractor {
    pub fn new(name: &str, hosts: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            hosts: hosts.iter().map(|host| host.to_string()).collect(),
            policy: CachePolicy::Direct,
            items: Vec::new(),
            delay: None,
            failure: None,
        }
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_items(mut self, items: Vec<MediaItem>) -> Self {
        self.items = items;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self, reason: &str) -> Self {
        self.failure = Some(reason.to_string());
        self
    }
}

#[async_trait]
impl Extractor for StubExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn hosts(&self) -> Vec<String> {
        self.hosts.clone()
    }

    fn cache_policy(&self) -> CachePolicy {
        self.policy
    }

    async fn extract(&self, url: &str, cancel: &CancellationToken) -> Result<Media, ExtractError> {
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ExtractError::Cancelled { stage: "stub" }),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if let Some(reason) = &self.failure {
            return Err(ExtractError::permanent(reason.clone()));
        }

        let mut media = Media::new(self.source(), url);
        media.items = self.items.clone();
        Ok(media)
    }
}
