//! Long-tail sites handled through the yt-dlp adapter.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use driftnet_core::config::{CacheConfig, ExtractionConfig};
use driftnet_core::test_fixtures::{CountingStore, ScriptedTransport};
use driftnet_core::{
    CachePolicy, DriftnetError, ExtractError, LinkResolver, MediaCache, MediaService,
    MediaSource,
};
use tokio_util::sync::CancellationToken;

fn service_with_binary(binary: PathBuf, store: Arc<CountingStore>) -> MediaService {
    let transport = Arc::new(ScriptedTransport::new());
    let config = ExtractionConfig {
        ytdlp_path: Some(binary),
        ..ExtractionConfig::default()
    };
    let registry = driftnet_extract::default_registry(transport.clone(), &config).unwrap();
    let cache = MediaCache::new(store, transport, "driftnet-cache", &CacheConfig::default())
        .unwrap();

    MediaService::new(LinkResolver::new(Arc::new(registry)), Duration::from_secs(10))
        .with_cache(cache)
}

#[test]
fn test_short_links_resolve_to_their_site() {
    let service = service_with_binary(PathBuf::from("yt-dlp"), Arc::new(CountingStore::new()));

    let info = service.resolve("https://vm.tiktok.com/ABC123").unwrap();
    assert_eq!(info.source, MediaSource::TIKTOK);
    assert_eq!(info.extractor.name(), "tiktok");
    assert_eq!(info.extractor.cache_policy(), CachePolicy::Direct);

    let info = service.resolve("https://www.douyin.com/video/7301").unwrap();
    assert_eq!(info.extractor.name(), "douyin");
}

#[tokio::test]
async fn test_missing_tool_is_reported_as_unavailable() {
    let service = service_with_binary(
        PathBuf::from("/nonexistent/driftnet/yt-dlp"),
        Arc::new(CountingStore::new()),
    );

    let error = service
        .fetch("https://vimeo.com/76979871", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        DriftnetError::Extract(ExtractError::ToolUnavailable { .. })
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_direct_delivery_skips_the_cache() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::TempDir::new().unwrap();
    let script = dir.path().join("yt-dlp");
    let dump = serde_json::json!({
        "id": "7301",
        "title": "Harbour timelapse",
        "uploader": "driftnet.sample",
        "formats": [
            {
                "format_id": "h264_540p",
                "ext": "mp4",
                "url": "https://v16.tiktokcdn.example/clip.mp4",
                "protocol": "https",
                "width": 576,
                "height": 1024,
                "vcodec": "h264",
                "acodec": "aac"
            },
            {
                "format_id": "hls",
                "ext": "mp4",
                "url": "https://v16.tiktokcdn.example/clip.m3u8",
                "protocol": "m3u8_native",
                "vcodec": "h264",
                "acodec": "aac"
            }
        ]
    });
    std::fs::write(&script, format!("#!/bin/sh\ncat <<'EOF'\n{dump}\nEOF\n")).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let store = Arc::new(CountingStore::new());
    let service = service_with_binary(script, Arc::clone(&store));

    let media = service
        .fetch("https://www.tiktok.com/@driftnet.sample/video/7301", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(media.source, MediaSource::TIKTOK);
    assert_eq!(media.title.as_deref(), Some("Harbour timelapse"));
    assert_eq!(media.items.len(), 1);
    assert_eq!(media.items[0].url, "https://v16.tiktokcdn.example/clip.mp4");
    assert_eq!(store.upload_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(store.exists_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}
