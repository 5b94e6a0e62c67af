//! YouTube capability.
//!
//! Format discovery goes through yt-dlp; this module decides which renditions
//! are worth offering.

use std::sync::Arc;

use async_trait::async_trait;
use driftnet_core::{ExtractError, Extractor, Media, MediaSource};
use tokio_util::sync::CancellationToken;

use crate::ytdlp::{YtDlpDump, YtDlpFormat, YtDlpRunner, item_from_format, media_shell};

const HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "m.youtube.com", "youtu.be"];

/// Video-only heights offered alongside the muxed and audio formats.
const HIGH_DEFINITION_HEIGHTS: &[u32] = &[1080, 1440, 2160];

#[derive(Debug, Clone)]
pub struct YoutubeExtractor {
    runner: Arc<YtDlpRunner>,
}

impl YoutubeExtractor {
    pub fn new(runner: Arc<YtDlpRunner>) -> Self {
        Self { runner }
    }
}

/// Keeps formats carrying audio and high-definition video-only formats.
pub fn keep_format(format: &YtDlpFormat) -> bool {
    format.has_audio()
        || format.is_audio_only()
        || format
            .height
            .is_some_and(|height| HIGH_DEFINITION_HEIGHTS.contains(&height))
}

/// Builds YouTube media from a yt-dlp description.
///
/// # Errors
///
/// - `ExtractError::Failed` (permanent) - If no format survives filtering
pub fn media_from_youtube_dump(dump: &YtDlpDump, request_url: &str) -> Result<Media, ExtractError> {
    let mut media = media_shell(dump, MediaSource::YOUTUBE, request_url);
    media.thumbnail_url = dump
        .thumbnails
        .last()
        .map(|thumb| thumb.url.clone())
        .filter(|url| !url.is_empty())
        .or_else(|| dump.thumbnail.clone());
    media.items = dump
        .formats
        .iter()
        .filter(|format| keep_format(format))
        .filter_map(item_from_format)
        .collect();

    if media.items.is_empty() {
        return Err(ExtractError::permanent("empty formats list"));
    }
    Ok(media)
}

#[async_trait]
impl Extractor for YoutubeExtractor {
    fn name(&self) -> &str {
        "youtube"
    }

    fn source(&self) -> MediaSource {
        MediaSource::YOUTUBE
    }

    fn hosts(&self) -> Vec<String> {
        HOSTS.iter().map(|host| host.to_string()).collect()
    }

    async fn extract(&self, url: &str, cancel: &CancellationToken) -> Result<Media, ExtractError> {
        let dump = self.runner.dump_json(url, cancel).await?;
        media_from_youtube_dump(&dump, url)
    }
}

#[cfg(test)]
mod tests {
    use driftnet_core::{FailureKind, MediaType};

    use super::*;

    fn dump(json: serde_json::Value) -> YtDlpDump {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_format_filter() {
        let dump = dump(serde_json::json!({
            "id": "dQw4w9WgXcQ",
            "title": "video",
            "description": "about the video",
            "thumbnails": [
                {"url": "https://i.ytimg.com/vi/x/default.jpg"},
                {"url": "https://i.ytimg.com/vi/x/maxresdefault.jpg"}
            ],
            "formats": [
                {"format_id": "140", "ext": "m4a", "protocol": "https", "url": "https://rr.example/140",
                 "vcodec": "none", "acodec": "mp4a.40.2", "format_note": "medium"},
                {"format_id": "18", "ext": "mp4", "protocol": "https", "url": "https://rr.example/18",
                 "vcodec": "avc1", "acodec": "mp4a.40.2", "height": 360},
                {"format_id": "136", "ext": "mp4", "protocol": "https", "url": "https://rr.example/136",
                 "vcodec": "avc1", "acodec": "none", "height": 720},
                {"format_id": "137", "ext": "mp4", "protocol": "https", "url": "https://rr.example/137",
                 "vcodec": "avc1", "acodec": "none", "height": 1080, "format_note": "1080p"}
            ]
        }));

        let media = media_from_youtube_dump(&dump, "https://youtu.be/dQw4w9WgXcQ").unwrap();
        let ids: Vec<&str> = media
            .items
            .iter()
            .filter_map(|item| item.id.as_deref())
            .collect();

        assert_eq!(ids, vec!["140", "18", "137"]);
        assert_eq!(media.items[0].media_type, MediaType::Audio);
        assert!(media.items[2].video_without_audio);
        assert!(!media.items[1].video_without_audio);
        assert_eq!(media.caption.as_deref(), Some("about the video"));
        assert_eq!(
            media.thumbnail_url.as_deref(),
            Some("https://i.ytimg.com/vi/x/maxresdefault.jpg")
        );
        assert_eq!(media.source, MediaSource::YOUTUBE);
    }

    #[test]
    fn test_nothing_left_is_permanent() {
        let dump = dump(serde_json::json!({
            "id": "x",
            "formats": [
                {"format_id": "160", "ext": "mp4", "protocol": "https", "url": "https://rr.example/160",
                 "vcodec": "avc1", "acodec": "none", "height": 144}
            ]
        }));

        let error = media_from_youtube_dump(&dump, "https://youtu.be/x").unwrap_err();
        assert!(matches!(
            error,
            ExtractError::Failed {
                kind: FailureKind::Permanent,
                ..
            }
        ));
    }
}
