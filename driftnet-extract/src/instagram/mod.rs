//! Instagram capability.
//!
//! Instagram has no public media API, so extraction runs a strategy chain:
//! the web GraphQL endpoint first, then a scrape of the embeddable page.
//! Item URLs are signed and expire, so produced media is mirrored.

mod embed;
mod graphql;
mod payload;
mod shortcode;
mod strategy;

use std::sync::Arc;

use async_trait::async_trait;
use driftnet_core::config::ExtractionConfig;
use driftnet_core::{CachePolicy, ExtractError, Extractor, HttpTransport, Media, MediaSource};
use tokio_util::sync::CancellationToken;

pub use embed::{
    EmbedStrategy, EmbeddedElement, FailureHint, decode_embedded_post, diagnose_embed_page,
    embed_url, find_embedded_media_element, unescape_embedded_json,
};
pub use graphql::{GRAPHQL_ENDPOINT, GraphqlStrategy, parse_graphql_response};
pub use payload::{PostNode, media_from_post};
pub use shortcode::extract_shortcode;
pub use strategy::{ExtractionStrategy, StrategyChain, StrategyOutcome};

const HOSTS: &[&str] = &["instagram.com", "www.instagram.com"];

#[derive(Debug)]
pub struct InstagramExtractor {
    chain: StrategyChain,
}

impl InstagramExtractor {
    /// Creates the extractor with the GraphQL strategy followed by the embed scrape.
    pub fn new(transport: Arc<dyn HttpTransport>, config: &ExtractionConfig) -> Self {
        let chain = StrategyChain::new()
            .then(GraphqlStrategy::new(Arc::clone(&transport), config))
            .then(EmbedStrategy::new(transport, config));
        Self::with_chain(chain)
    }

    pub fn with_chain(chain: StrategyChain) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl Extractor for InstagramExtractor {
    fn name(&self) -> &str {
        "instagram"
    }

    fn source(&self) -> MediaSource {
        MediaSource::INSTAGRAM
    }

    fn hosts(&self) -> Vec<String> {
        HOSTS.iter().map(|host| host.to_string()).collect()
    }

    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::Mirror
    }

    async fn extract(&self, url: &str, cancel: &CancellationToken) -> Result<Media, ExtractError> {
        let shortcode = extract_shortcode(url)?;
        tracing::debug!("Extracting Instagram post {} from {}", shortcode, url);

        let mut media = self.chain.run(&shortcode, url, cancel).await?;
        media.source = MediaSource::INSTAGRAM;
        media.request_url = url.to_string();
        if media.shortcode.is_none() {
            media.shortcode = Some(shortcode);
        }
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use driftnet_core::MediaType;
    use driftnet_core::test_fixtures::{ScriptedResponse, ScriptedTransport};

    use super::*;

    const REEL: &str = "https://www.instagram.com/reel/CzBjgFiISfF/";
    const CAPTIONED: &str = include_str!("../../fixtures/embed_captioned.html");

    fn extractor(transport: &Arc<ScriptedTransport>) -> InstagramExtractor {
        InstagramExtractor::new(Arc::clone(transport) as Arc<dyn HttpTransport>, &ExtractionConfig::default())
    }

    #[tokio::test]
    async fn test_falls_back_to_embed_page() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(GRAPHQL_ENDPOINT, ScriptedResponse::Status(401))
                .route(embed_url("CzBjgFiISfF"), ScriptedResponse::text(CAPTIONED)),
        );

        let media = extractor(&transport)
            .extract(REEL, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(media.source, MediaSource::INSTAGRAM);
        assert_eq!(media.request_url, REEL);
        assert_eq!(media.items[0].media_type, MediaType::Video);
        assert_eq!(transport.request_count(GRAPHQL_ENDPOINT), 1);
        assert_eq!(transport.request_count("https://www.instagram.com/p/"), 1);
    }

    #[tokio::test]
    async fn test_both_strategies_fail() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(GRAPHQL_ENDPOINT, ScriptedResponse::Fail("connection reset".into()))
                .route(
                    embed_url("CzBjgFiISfF"),
                    ScriptedResponse::text("<html><body></body></html>"),
                ),
        );

        let error = extractor(&transport)
            .extract(REEL, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(error, ExtractError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_malformed_link_skips_network() {
        let transport = Arc::new(ScriptedTransport::new());

        let error = extractor(&transport)
            .extract("https://www.instagram.com/someone/", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(error, ExtractError::MalformedShortcode { .. }));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_capability_surface() {
        let extractor = extractor(&Arc::new(ScriptedTransport::new()));
        assert_eq!(extractor.name(), "instagram");
        assert_eq!(extractor.cache_policy(), CachePolicy::Mirror);
        assert!(extractor.hosts().contains(&"instagram.com".to_string()));
    }
}
