//! Driftnet Extract - platform capabilities
//!
//! Native extractors for platforms with custom protocols (Instagram, YouTube)
//! and a generic yt-dlp adapter for the long tail of video sites.

pub mod instagram;
pub mod youtube;
pub mod ytdlp;

use std::sync::Arc;

use driftnet_core::config::ExtractionConfig;
use driftnet_core::{Extractor, ExtractorRegistry, HttpTransport, RegistryError};

pub use instagram::InstagramExtractor;
pub use youtube::YoutubeExtractor;
pub use ytdlp::{YtDlpExtractor, YtDlpRunner};

/// Every built-in capability, native ones first.
pub fn builtin_extractors(
    transport: Arc<dyn HttpTransport>,
    config: &ExtractionConfig,
) -> Vec<Arc<dyn Extractor>> {
    let runner = Arc::new(YtDlpRunner::from_config(config));

    let mut extractors: Vec<Arc<dyn Extractor>> = vec![
        Arc::new(InstagramExtractor::new(transport, config)),
        Arc::new(YoutubeExtractor::new(Arc::clone(&runner))),
    ];
    extractors.extend(
        YtDlpExtractor::for_all_sites(&runner)
            .into_iter()
            .map(|extractor| Arc::new(extractor) as Arc<dyn Extractor>),
    );
    extractors
}

/// Builds a registry holding every built-in capability.
///
/// # Errors
///
/// - `RegistryError::DuplicateName` - If two capabilities share a name
/// - `RegistryError::DuplicateHost` - If two capabilities claim the same host
pub fn default_registry(
    transport: Arc<dyn HttpTransport>,
    config: &ExtractionConfig,
) -> Result<ExtractorRegistry, RegistryError> {
    let registry = ExtractorRegistry::new();
    registry.register_all(builtin_extractors(transport, config))?;
    tracing::info!(
        "Registered {} extractors covering {} hosts",
        registry.len(),
        registry.supported_hosts().len()
    );
    Ok(registry)
}
