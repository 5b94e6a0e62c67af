//! Media service: resolve a link, extract it, mirror it when required.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cache::MediaCache;
use crate::deadline::with_deadline;
use crate::extractor::{CachePolicy, ExtractError};
use crate::media::Media;
use crate::resolver::{LinkInfo, LinkResolver, ResolveError};
use crate::{DriftnetError, Result};

/// Front door used by delivery layers.
#[derive(Debug, Clone)]
pub struct MediaService {
    resolver: LinkResolver,
    cache: Option<MediaCache>,
    extract_timeout: Duration,
}

impl MediaService {
    /// Creates a service that delivers extracted URLs without mirroring.
    pub fn new(resolver: LinkResolver, extract_timeout: Duration) -> Self {
        Self {
            resolver,
            cache: None,
            extract_timeout,
        }
    }

    /// Enables the cache pipeline for sources with [`CachePolicy::Mirror`].
    pub fn with_cache(mut self, cache: MediaCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Validates `link` and finds its extractor.
    ///
    /// # Errors
    ///
    /// - `ResolveError::InvalidLink` - If `link` is not an absolute URL
    /// - `ResolveError::UnsupportedSource` - If no extractor claims the host
    pub fn resolve(&self, link: &str) -> std::result::Result<LinkInfo, ResolveError> {
        self.resolver.resolve(link)
    }

    /// Extracts media for a resolved link and mirrors it if the source requires.
    ///
    /// Items without a URL are dropped before delivery.
    ///
    /// # Errors
    ///
    /// - `DriftnetError::Extract` - If extraction failed, timed out or was cancelled
    /// - `DriftnetError::Cache` - If mirroring any item failed
    pub async fn get_media(&self, info: &LinkInfo, cancel: &CancellationToken) -> Result<Media> {
        let extractor = &info.extractor;
        let mut media = with_deadline(
            cancel,
            self.extract_timeout,
            extractor.extract(&info.original, cancel),
        )
        .await
        .map_err(|e| ExtractError::from_deadline("extraction", e))??;

        let before = media.items.len();
        media.items.retain(|item| !item.url.is_empty());
        if media.items.len() < before {
            tracing::warn!(
                "Dropped {} items without URL from {}",
                before - media.items.len(),
                info.original
            );
        }
        if media.items.is_empty() {
            return Err(ExtractError::permanent("no downloadable items found").into());
        }

        if extractor.cache_policy() == CachePolicy::Mirror {
            match &self.cache {
                Some(cache) => cache.cache_media(&mut media, cancel).await?,
                None => tracing::debug!(
                    "No cache configured, delivering {} items from {} directly",
                    media.items.len(),
                    info.source
                ),
            }
        }

        tracing::info!(
            "Extracted {} items from {} ({})",
            media.items.len(),
            info.source,
            info.original
        );
        Ok(media)
    }

    /// Resolves `link` and returns its media.
    ///
    /// # Errors
    ///
    /// - `DriftnetError::Resolve` - If the link is invalid or unsupported
    /// - `DriftnetError::Extract` - If extraction failed
    /// - `DriftnetError::Cache` - If mirroring failed
    pub async fn fetch(&self, link: &str, cancel: &CancellationToken) -> Result<Media> {
        let info = self.resolve(link)?;
        self.get_media(&info, cancel).await
    }
}
