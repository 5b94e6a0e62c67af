//! Instagram link through resolution, extraction fallback and mirroring.

use std::sync::Arc;
use std::time::Duration;

use driftnet_core::cache::public_object_url;
use driftnet_core::config::{CacheConfig, ExtractionConfig};
use driftnet_core::test_fixtures::{ScriptedResponse, ScriptedTransport};
use driftnet_core::{
    DriftnetError, ExtractError, LinkResolver, MediaCache, MediaService, MediaSource, MediaType,
    MemoryObjectStore, derive_cache_key,
};
use driftnet_extract::instagram::{GRAPHQL_ENDPOINT, embed_url};
use tokio_util::sync::CancellationToken;

const CAPTIONED: &str = include_str!("../../driftnet-extract/fixtures/embed_captioned.html");
const REEL: &str = "https://www.instagram.com/reel/CzBjgFiISfF/";
const CLIP: &str = "https://scontent.cdninstagram.com/v/t50/clip.mp4?efg=abc";
const BUCKET: &str = "driftnet-cache";
const PUBLIC_BASE: &str = "https://media.example/cache";

fn service(transport: &Arc<ScriptedTransport>, store: &Arc<MemoryObjectStore>) -> MediaService {
    let registry =
        driftnet_extract::default_registry(transport.clone(), &ExtractionConfig::default())
            .unwrap();
    let config = CacheConfig {
        public_base_url: PUBLIC_BASE.to_string(),
        ..CacheConfig::default()
    };
    let cache = MediaCache::new(store.clone(), transport.clone(), BUCKET, &config).unwrap();

    MediaService::new(LinkResolver::new(Arc::new(registry)), Duration::from_secs(10))
        .with_cache(cache)
}

#[tokio::test]
async fn test_reel_falls_back_to_embed_and_is_mirrored() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route(GRAPHQL_ENDPOINT, ScriptedResponse::Status(401))
            .route(embed_url("CzBjgFiISfF"), ScriptedResponse::text(CAPTIONED))
            .route(
                "https://scontent.cdninstagram.com/",
                ScriptedResponse::body(b"mp4 bytes"),
            ),
    );
    let store = Arc::new(MemoryObjectStore::new());

    let media = service(&transport, &store)
        .fetch(REEL, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(media.source, MediaSource::INSTAGRAM);
    assert_eq!(media.request_url, REEL);
    assert_eq!(media.shortcode.as_deref(), Some("CzBjgFiISfF"));
    assert_eq!(media.items.len(), 1);
    assert_eq!(media.items[0].media_type, MediaType::Video);

    let key = derive_cache_key(CLIP).unwrap();
    assert_eq!(media.items[0].url, public_object_url(PUBLIC_BASE, &key));
    assert_eq!(&store.get(BUCKET, &key).unwrap()[..], b"mp4 bytes");
    assert_eq!(transport.request_count("https://scontent.cdninstagram.com/"), 1);
}

#[tokio::test]
async fn test_second_fetch_reuses_mirrored_object() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route(GRAPHQL_ENDPOINT, ScriptedResponse::Status(429))
            .route(embed_url("CzBjgFiISfF"), ScriptedResponse::text(CAPTIONED))
            .route(
                "https://scontent.cdninstagram.com/",
                ScriptedResponse::body(b"mp4 bytes"),
            ),
    );
    let store = Arc::new(MemoryObjectStore::new());
    let service = service(&transport, &store);

    let first = service.fetch(REEL, &CancellationToken::new()).await.unwrap();
    let second = service
        .fetch("https://instagram.com/p/CzBjgFiISfF/", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first.items, second.items);
    assert_eq!(store.object_count(BUCKET), 1);
    assert_eq!(transport.request_count("https://scontent.cdninstagram.com/"), 1);
}

#[tokio::test]
async fn test_both_strategies_failing_surfaces_extraction_error() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route(GRAPHQL_ENDPOINT, ScriptedResponse::Status(500))
            .route(
                embed_url("CzBjgFiISfF"),
                ScriptedResponse::text("<html><body><div class=\"EmbedIsBroken\"></div></body></html>"),
            ),
    );
    let store = Arc::new(MemoryObjectStore::new());

    let error = service(&transport, &store)
        .fetch(REEL, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        DriftnetError::Extract(ExtractError::Failed { .. })
    ));
    assert!(!error.is_user_error());
    assert!(error.user_message().contains("private"));
    assert_eq!(store.object_count(BUCKET), 0);
}

#[tokio::test]
async fn test_cancelled_fetch_mirrors_nothing() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route(GRAPHQL_ENDPOINT, ScriptedResponse::Hang)
            .route(embed_url("CzBjgFiISfF"), ScriptedResponse::text(CAPTIONED)),
    );
    let store = Arc::new(MemoryObjectStore::new());
    let service = service(&transport, &store);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let error = service.fetch(REEL, &cancel).await.unwrap_err();

    assert!(error.is_cancelled());
    assert_eq!(store.object_count(BUCKET), 0);
}
