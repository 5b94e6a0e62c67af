//! Link resolution: validate user input and find the extractor that owns it.
//!
//! Pure parsing and lookup, no network I/O.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::extractor::Extractor;
use crate::media::MediaSource;
use crate::registry::{ExtractorRegistry, RegistryError};

/// Errors that occur while resolving a link.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Input is empty, unparsable, or missing a scheme or host
    #[error("Invalid link '{input}'")]
    InvalidLink {
        /// Input as supplied
        input: String,
    },

    /// No extractor claims the link's host
    #[error("Unsupported source: {source}")]
    UnsupportedSource {
        /// Underlying registry lookup failure
        #[source]
        source: RegistryError,
    },
}

/// Resolved link ready for extraction.
#[derive(Clone)]
pub struct LinkInfo {
    /// Input exactly as supplied
    pub original: String,
    pub url: Url,
    pub source: MediaSource,
    pub extractor: Arc<dyn Extractor>,
}

impl fmt::Debug for LinkInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkInfo")
            .field("original", &self.original)
            .field("url", &self.url.as_str())
            .field("source", &self.source)
            .finish()
    }
}

/// Checks that `input` is an absolute URL with both a scheme and a host.
pub fn is_valid_link(input: &str) -> bool {
    parse_link(input).is_some()
}

fn parse_link(input: &str) -> Option<Url> {
    if input.is_empty() {
        return None;
    }
    let url = Url::parse(input).ok()?;
    let has_host = url.host_str().is_some_and(|host| !host.is_empty());
    (!url.scheme().is_empty() && has_host).then_some(url)
}

/// Maps user links onto registered extractors.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    registry: Arc<ExtractorRegistry>,
}

impl LinkResolver {
    pub fn new(registry: Arc<ExtractorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ExtractorRegistry> {
        &self.registry
    }

    /// Validates `input` and finds the extractor serving its host.
    ///
    /// # Errors
    ///
    /// - `ResolveError::InvalidLink` - If `input` is not an absolute URL with a host
    /// - `ResolveError::UnsupportedSource` - If no extractor claims the host
    pub fn resolve(&self, input: &str) -> Result<LinkInfo, ResolveError> {
        let url = parse_link(input).ok_or_else(|| ResolveError::InvalidLink {
            input: input.to_string(),
        })?;

        let extractor = self
            .registry
            .get_by_url(url.as_str())
            .map_err(|source| ResolveError::UnsupportedSource { source })?;

        Ok(LinkInfo {
            original: input.to_string(),
            url,
            source: extractor.source(),
            extractor,
        })
    }
}
