//! Media cache and dedup pipeline.
//!
//! Mirrors extracted items into the object store and rewrites their URLs to
//! stable public locations. Objects are keyed by a hash of the origin file
//! name, not of the file contents: two different files sharing a name stem
//! map to the same key and the second one is served from the first upload.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::CacheConfig;
use crate::deadline::{DeadlineError, with_deadline};
use crate::http::{HttpError, HttpTransport};
use crate::media::Media;
use crate::storage::{ObjectStore, StorageError};

/// Errors that occur while caching media items.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Item URL could not be parsed
    #[error("Invalid item URL '{url}': {reason}")]
    InvalidItemUrl {
        /// Offending item URL
        url: String,
        /// Parser error description
        reason: String,
    },

    /// Public base URL is not a valid absolute URL
    #[error("Invalid public base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// Configured base URL
        url: String,
        /// Parser error description
        reason: String,
    },

    /// Fetching the item from its origin failed
    #[error("Download of {url} failed: {source}")]
    Download {
        /// Origin URL of the item
        url: String,
        #[source]
        source: HttpError,
    },

    /// Object store rejected an operation
    #[error("Object store failed for key {key}: {source}")]
    Storage {
        /// Cache key being processed
        key: String,
        #[source]
        source: StorageError,
    },

    /// Lookup or upload ran past its deadline
    #[error("Caching {key} timed out after {after:?}")]
    Timeout {
        /// Cache key being processed
        key: String,
        /// Budget that was exceeded
        after: Duration,
    },

    /// The caller cancelled the batch
    #[error("Caching {key} cancelled by caller")]
    Cancelled {
        /// Cache key being processed
        key: String,
    },

    /// Item worker panicked or was aborted
    #[error("Cache worker aborted: {reason}")]
    Aborted {
        /// Join error description
        reason: String,
    },
}

impl CacheError {
    fn from_deadline(key: &str, error: DeadlineError) -> Self {
        match error {
            DeadlineError::Cancelled => CacheError::Cancelled {
                key: key.to_string(),
            },
            DeadlineError::Elapsed(after) => CacheError::Timeout {
                key: key.to_string(),
                after,
            },
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CacheError::Cancelled { .. })
    }
}

/// Derives the cache key for an item URL.
///
/// The key is the hex MD5 of the last path segment without its extension,
/// followed by the original extension. Query strings never influence the key.
///
/// # Errors
///
/// - `CacheError::InvalidItemUrl` - If `source_url` is not an absolute URL
pub fn derive_cache_key(source_url: &str) -> Result<String, CacheError> {
    let invalid = |reason: String| CacheError::InvalidItemUrl {
        url: source_url.to_string(),
        reason,
    };

    let url = Url::parse(source_url).map_err(|e| invalid(e.to_string()))?;
    let path = urlencoding::decode(url.path()).map_err(|e| invalid(e.to_string()))?;
    let (stem, extension) = split_file_name(&path);

    Ok(format!("{:x}{}", md5::compute(stem.as_bytes()), extension))
}

fn split_file_name(path: &str) -> (&str, &str) {
    let extension = match path.rfind(['.', '/']) {
        Some(index) if path[index..].starts_with('.') => &path[index..],
        _ => "",
    };

    let trimmed = path.trim_end_matches('/');
    let base = match trimmed.rsplit('/').next() {
        Some(segment) if !segment.is_empty() => segment,
        _ if path.is_empty() => ".",
        _ => "/",
    };

    (base.strip_suffix(extension).unwrap_or(base), extension)
}

/// Joins a stored object path onto the public base URL.
pub fn public_object_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Mirrors media items into the object store.
#[derive(Debug, Clone)]
pub struct MediaCache {
    store: Arc<dyn ObjectStore>,
    transport: Arc<dyn HttpTransport>,
    bucket: String,
    public_base_url: String,
    upload_timeout: Duration,
    lookup_timeout: Duration,
}

impl MediaCache {
    /// Creates a cache writing into `bucket`.
    ///
    /// # Errors
    ///
    /// - `CacheError::InvalidBaseUrl` - If the configured public base URL does not parse
    pub fn new(
        store: Arc<dyn ObjectStore>,
        transport: Arc<dyn HttpTransport>,
        bucket: impl Into<String>,
        config: &CacheConfig,
    ) -> Result<Self, CacheError> {
        Url::parse(&config.public_base_url).map_err(|e| CacheError::InvalidBaseUrl {
            url: config.public_base_url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            store,
            transport,
            bucket: bucket.into(),
            public_base_url: config.public_base_url.clone(),
            upload_timeout: config.upload_timeout,
            lookup_timeout: config.lookup_timeout,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Caches every item of `media` and rewrites item URLs in place.
    ///
    /// Items are processed concurrently. The first failure cancels the rest
    /// and is returned; on failure no item URL is rewritten.
    ///
    /// # Errors
    ///
    /// - `CacheError::InvalidItemUrl` - If an item URL is not an absolute URL
    /// - `CacheError::Download` - If fetching an item from its origin failed
    /// - `CacheError::Storage` - If the object store rejected a lookup or upload
    /// - `CacheError::Timeout` - If a lookup or upload exceeded its budget
    /// - `CacheError::Cancelled` - If `cancel` fired before the batch finished
    pub async fn cache_media(
        &self,
        media: &mut Media,
        cancel: &CancellationToken,
    ) -> Result<(), CacheError> {
        if media.items.is_empty() {
            return Ok(());
        }

        let batch = cancel.child_token();
        let mut workers = JoinSet::new();
        for (index, item) in media.items.iter().enumerate() {
            let cache = self.clone();
            let source_url = item.url.clone();
            let batch = batch.clone();
            workers.spawn(async move { (index, cache.cache_item(&source_url, &batch).await) });
        }

        let mut cached_urls: Vec<Option<String>> = vec![None; media.items.len()];
        while let Some(joined) = workers.join_next().await {
            let outcome = match joined {
                Ok((index, Ok(url))) => {
                    cached_urls[index] = Some(url);
                    continue;
                }
                Ok((_, Err(e))) => e,
                Err(e) => CacheError::Aborted {
                    reason: e.to_string(),
                },
            };

            batch.cancel();
            workers.abort_all();
            tracing::warn!("Caching {} failed: {}", media.request_url, outcome);
            return Err(outcome);
        }

        for (item, url) in media.items.iter_mut().zip(cached_urls) {
            if let Some(url) = url {
                item.url = url;
            }
        }
        Ok(())
    }

    async fn cache_item(
        &self,
        source_url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CacheError> {
        let key = derive_cache_key(source_url)?;

        let exists = with_deadline(
            cancel,
            self.lookup_timeout,
            self.store.exists(&self.bucket, &key),
        )
        .await
        .map_err(|e| CacheError::from_deadline(&key, e))?
        .map_err(|source| CacheError::Storage {
            key: key.clone(),
            source,
        })?;

        if exists {
            tracing::debug!("Cache hit for {}", key);
            return Ok(public_object_url(&self.public_base_url, &key));
        }

        let stored_path = with_deadline(cancel, self.upload_timeout, async {
            let body = self
                .transport
                .fetch_stream(source_url)
                .await
                .map_err(|source| CacheError::Download {
                    url: source_url.to_string(),
                    source,
                })?;
            self.store
                .upload_stream(&self.bucket, &key, body)
                .await
                .map_err(|source| CacheError::Storage {
                    key: key.clone(),
                    source,
                })
        })
        .await
        .map_err(|e| CacheError::from_deadline(&key, e))??;

        tracing::info!("Cached {} as {}", source_url, stored_path);
        Ok(public_object_url(&self.public_base_url, &stored_path))
    }
}
