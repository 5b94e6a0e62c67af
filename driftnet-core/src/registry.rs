//! Extractor registry indexed by name and by normalized host.
//!
//! Built once at startup, then read concurrently for the process lifetime.
//! Registration validates every mapping before committing any of them, so a
//! rejected extractor leaves no trace.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use url::Url;

use crate::extractor::Extractor;
use crate::media::MediaSource;

const HOST_PREFIXES: [&str; 3] = ["www.", "m.", "mobile."];

/// Errors that occur during registration and lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Another extractor already uses this name
    #[error("Extractor '{name}' is already registered")]
    DuplicateName {
        /// Conflicting extractor name
        name: String,
    },

    /// Another extractor already claims this normalized host
    #[error("Host '{host}' is already claimed by extractor '{owner}'")]
    DuplicateHost {
        /// Normalized host that collided
        host: String,
        /// Name of the extractor that owns the host
        owner: String,
    },

    /// Lookup link could not be parsed
    #[error("Malformed URL '{url}': {reason}")]
    MalformedUrl {
        /// Link that failed to parse
        url: String,
        /// Parser error description
        reason: String,
    },

    /// No extractor serves the host
    #[error("No extractor found for host '{host}'")]
    NoExtractorForHost {
        /// Normalized host that was looked up
        host: String,
    },
}

/// Normalizes a hostname for registry keys.
///
/// Lower-cases, then strips a leading `www.`, `m.` or `mobile.` prefix, first
/// match in that order. Stripping repeats while a prefix still matches, which
/// keeps the function idempotent for stacked prefixes like `www.m.`.
pub fn normalize_host(host: &str) -> String {
    let mut normalized = host.to_lowercase();
    while let Some(rest) = HOST_PREFIXES
        .iter()
        .find_map(|prefix| normalized.strip_prefix(*prefix))
    {
        normalized = rest.to_string();
    }
    normalized
}

#[derive(Default)]
struct RegistryInner {
    by_name: HashMap<String, Arc<dyn Extractor>>,
    by_host: HashMap<String, Arc<dyn Extractor>>,
    order: Vec<String>,
}

/// Lookup table from names and hosts to extractors.
#[derive(Default)]
pub struct ExtractorRegistry {
    inner: RwLock<RegistryInner>,
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ExtractorRegistry")
            .field("extractors", &inner.by_name.len())
            .field("hosts", &inner.by_host.len())
            .finish()
    }
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an extractor under its name and every normalized host.
    ///
    /// Hosts that normalize to the same value within one extractor are
    /// collapsed. Nothing is inserted unless every check passes.
    ///
    /// # Errors
    ///
    /// - `RegistryError::DuplicateName` - If the name is already registered
    /// - `RegistryError::DuplicateHost` - If any normalized host is already claimed
    pub fn register(&self, extractor: Arc<dyn Extractor>) -> Result<(), RegistryError> {
        let name = extractor.name().to_string();

        let mut hosts: Vec<String> = Vec::new();
        for host in extractor.hosts() {
            let normalized = normalize_host(&host);
            if !hosts.contains(&normalized) {
                hosts.push(normalized);
            }
        }

        let mut inner = self.inner.write();

        if inner.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateName { name });
        }

        for host in &hosts {
            if let Some(owner) = inner.by_host.get(host) {
                return Err(RegistryError::DuplicateHost {
                    host: host.clone(),
                    owner: owner.name().to_string(),
                });
            }
        }

        for host in hosts {
            inner.by_host.insert(host, Arc::clone(&extractor));
        }
        inner.order.push(name.clone());
        inner.by_name.insert(name.clone(), extractor);

        tracing::debug!("Registered extractor '{}'", name);
        Ok(())
    }

    /// Registers extractors in order, stopping at the first rejection.
    ///
    /// Extractors registered before the failing one stay registered.
    ///
    /// # Errors
    ///
    /// - `RegistryError::DuplicateName` - If a name is already registered
    /// - `RegistryError::DuplicateHost` - If a normalized host is already claimed
    pub fn register_all<I>(&self, extractors: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = Arc<dyn Extractor>>,
    {
        for extractor in extractors {
            self.register(extractor)?;
        }
        Ok(())
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn Extractor>> {
        self.inner.read().by_name.get(name).cloned()
    }

    /// Looks up the extractor serving `host` after normalization.
    pub fn get_by_host(&self, host: &str) -> Option<Arc<dyn Extractor>> {
        self.inner.read().by_host.get(&normalize_host(host)).cloned()
    }

    /// Parses `raw_url` and looks up the extractor serving its host.
    ///
    /// # Errors
    ///
    /// - `RegistryError::MalformedUrl` - If `raw_url` does not parse
    /// - `RegistryError::NoExtractorForHost` - If no extractor claims the host
    pub fn get_by_url(&self, raw_url: &str) -> Result<Arc<dyn Extractor>, RegistryError> {
        let parsed = Url::parse(raw_url).map_err(|e| RegistryError::MalformedUrl {
            url: raw_url.to_string(),
            reason: e.to_string(),
        })?;

        let host = parsed.host_str().unwrap_or_default();
        self.get_by_host(host)
            .ok_or_else(|| RegistryError::NoExtractorForHost {
                host: normalize_host(host),
            })
    }

    /// Sources in registration order.
    pub fn supported_sources(&self) -> Vec<MediaSource> {
        self.extractors().iter().map(|e| e.source()).collect()
    }

    /// Every normalized host, sorted.
    pub fn supported_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.inner.read().by_host.keys().cloned().collect();
        hosts.sort();
        hosts
    }

    /// Registered extractors in registration order.
    pub fn extractors(&self) -> Vec<Arc<dyn Extractor>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|name| inner.by_name.get(name).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
