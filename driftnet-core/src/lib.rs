//! Driftnet Core - link resolution and media caching
//!
//! This crate provides the building blocks shared by every extractor: the
//! normalized media model, the extractor registry and link resolver, the
//! content-keyed media cache over an object store, and the background reaper
//! that keeps the cache bucket small.

pub mod cache;
pub mod config;
pub mod deadline;
pub mod extractor;
pub mod http;
pub mod media;
pub mod reaper;
pub mod registry;
pub mod resolver;
pub mod service;
pub mod storage;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use cache::{CacheError, MediaCache, derive_cache_key};
pub use config::DriftnetConfig;
pub use extractor::{CachePolicy, ExtractError, Extractor, FailureKind};
pub use http::{HttpError, HttpTransport, ReqwestTransport};
pub use media::{Media, MediaItem, MediaSource, MediaType};
pub use reaper::{ReaperHandle, TempObjectReaper};
pub use registry::{ExtractorRegistry, RegistryError, normalize_host};
pub use resolver::{LinkInfo, LinkResolver, ResolveError};
pub use service::MediaService;
pub use storage::{FsObjectStore, MemoryObjectStore, ObjectStore, StorageError};

/// Errors that can bubble up from any Driftnet subsystem.
#[derive(Debug, thiserror::Error)]
pub enum DriftnetError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

impl DriftnetError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            DriftnetError::Resolve(ResolveError::InvalidLink { .. }) => {
                "That doesn't look like a valid link".to_string()
            }
            DriftnetError::Resolve(ResolveError::UnsupportedSource { .. }) => {
                "This site is not supported yet".to_string()
            }
            DriftnetError::Extract(e) => match e {
                ExtractError::MalformedShortcode { .. } => {
                    "The link does not point to a post".to_string()
                }
                ExtractError::Failed { reason, .. } => format!("Couldn't get the media: {reason}"),
                ExtractError::Timeout { .. } => "The platform took too long to answer".to_string(),
                ExtractError::Cancelled { .. } => "Request cancelled".to_string(),
                ExtractError::ToolUnavailable { .. } => {
                    "Downloads from this site are temporarily unavailable".to_string()
                }
            },
            DriftnetError::Cache(CacheError::Cancelled { .. }) => "Request cancelled".to_string(),
            DriftnetError::Cache(_) => "Couldn't prepare the media for delivery".to_string(),
            DriftnetError::Registry(_) | DriftnetError::Configuration { .. } => {
                "Service is misconfigured".to_string()
            }
            DriftnetError::Storage(_) => "Storage error occurred".to_string(),
            DriftnetError::Http(_) => "Network error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            DriftnetError::Resolve(_)
                | DriftnetError::Extract(ExtractError::MalformedShortcode { .. })
        )
    }

    /// Checks if the caller cancelled the operation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            DriftnetError::Extract(e) => e.is_cancelled(),
            DriftnetError::Cache(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DriftnetError>;
