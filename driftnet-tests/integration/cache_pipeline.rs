//! Cache pipeline over the filesystem object store.

use std::sync::Arc;

use driftnet_core::cache::{CacheError, public_object_url};
use driftnet_core::config::CacheConfig;
use driftnet_core::test_fixtures::{ScriptedResponse, ScriptedTransport};
use driftnet_core::{
    FsObjectStore, Media, MediaCache, MediaItem, MediaSource, MediaType, ObjectStore,
    derive_cache_key,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const BUCKET: &str = "driftnet-cache";
const PUBLIC_BASE: &str = "https://media.example/cache";

struct Harness {
    _dir: TempDir,
    store: Arc<FsObjectStore>,
    transport: Arc<ScriptedTransport>,
    cache: MediaCache,
}

fn harness(transport: ScriptedTransport) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FsObjectStore::new(dir.path()));
    let transport = Arc::new(transport);
    let config = CacheConfig {
        public_base_url: PUBLIC_BASE.to_string(),
        ..CacheConfig::default()
    };
    let cache = MediaCache::new(store.clone(), transport.clone(), BUCKET, &config).unwrap();

    Harness {
        _dir: dir,
        store,
        transport,
        cache,
    }
}

fn media_with(urls: &[&str]) -> Media {
    let mut media = Media::new(MediaSource::INSTAGRAM, "https://www.instagram.com/p/Cabc/");
    media.items = urls
        .iter()
        .map(|url| MediaItem::new(MediaType::Video, *url))
        .collect();
    media
}

fn public_url_for(source_url: &str) -> String {
    public_object_url(PUBLIC_BASE, &derive_cache_key(source_url).unwrap())
}

#[tokio::test]
async fn test_miss_then_hit_over_filesystem() {
    let h = harness(
        ScriptedTransport::new().route("https://cdn.example/", ScriptedResponse::body(b"payload")),
    );
    let urls = [
        "https://cdn.example/a/clip.mp4?sig=1",
        "https://cdn.example/b/photo.jpg",
    ];

    let mut first = media_with(&urls);
    h.cache
        .cache_media(&mut first, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first.items[0].url, public_url_for(urls[0]));
    assert_eq!(first.items[1].url, public_url_for(urls[1]));
    assert_eq!(h.transport.request_count("https://cdn.example/"), 2);

    let key = derive_cache_key(urls[0]).unwrap();
    let stored = h.store.root().join(BUCKET).join(&key);
    assert_eq!(tokio::fs::read(stored).await.unwrap(), b"payload");

    let mut second = media_with(&urls);
    h.cache
        .cache_media(&mut second, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(second.items, first.items);
    assert_eq!(h.transport.request_count("https://cdn.example/"), 2);
}

#[tokio::test]
async fn test_same_stem_from_different_hosts_shares_object() {
    let h = harness(
        ScriptedTransport::new()
            .route("https://cdn-one.example/", ScriptedResponse::body(b"first"))
            .route("https://cdn-two.example/", ScriptedResponse::body(b"second")),
    );
    let one = "https://cdn-one.example/x/clip.mp4";
    let two = "https://cdn-two.example/y/clip.mp4";
    assert_eq!(derive_cache_key(one).unwrap(), derive_cache_key(two).unwrap());

    let mut first = media_with(&[one]);
    h.cache
        .cache_media(&mut first, &CancellationToken::new())
        .await
        .unwrap();

    let mut second = media_with(&[two]);
    h.cache
        .cache_media(&mut second, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first.items[0].url, second.items[0].url);
    assert_eq!(h.transport.request_count("https://cdn-two.example/"), 0);

    let objects = h.store.list(BUCKET, 100).await.unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].size, b"first".len() as u64);
}

#[tokio::test]
async fn test_failed_item_fails_whole_batch() {
    let h = harness(
        ScriptedTransport::new()
            .route("https://cdn.example/ok/", ScriptedResponse::body(b"ok"))
            .route("https://cdn.example/broken/", ScriptedResponse::Status(500)),
    );
    let urls = [
        "https://cdn.example/ok/one.mp4",
        "https://cdn.example/broken/two.mp4",
    ];

    let mut media = media_with(&urls);
    let error = h
        .cache
        .cache_media(&mut media, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(error, CacheError::Download { .. }));
    assert_eq!(media.items[0].url, urls[0]);
    assert_eq!(media.items[1].url, urls[1]);
}

#[tokio::test]
async fn test_media_without_items_is_untouched() {
    let h = harness(ScriptedTransport::new());
    let mut media = media_with(&[]);

    h.cache
        .cache_media(&mut media, &CancellationToken::new())
        .await
        .unwrap();

    assert!(h.transport.requests().is_empty());
    assert!(h.store.list(BUCKET, 10).await.unwrap().is_empty());
}

proptest::proptest! {
    #[test]
    fn prop_cache_key_ignores_query_and_host(
        host in "[a-z]{3,10}\\.example",
        dir in "[a-z0-9]{1,8}",
        stem in "[A-Za-z0-9_-]{1,16}",
        query in "[a-z]{1,6}=[0-9]{1,6}",
    ) {
        let plain = format!("https://cdn.example/{stem}.mp4");
        let other = format!("https://{host}/{dir}/{stem}.mp4?{query}");
        let key = derive_cache_key(&plain).unwrap();

        proptest::prop_assert_eq!(derive_cache_key(&other).unwrap(), key.clone());
        proptest::prop_assert!(key.ends_with(".mp4"));
    }
}
