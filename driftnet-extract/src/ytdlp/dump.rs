//! `yt-dlp --dump-json` output and its conversion into [`Media`].

use chrono::{DateTime, Utc};
use driftnet_core::{Media, MediaItem, MediaSource, MediaType};
use serde::Deserialize;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct YtDlpThumbnail {
    #[serde(default)]
    pub url: String,
}

/// One downloadable rendition reported by yt-dlp.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YtDlpFormat {
    #[serde(default)]
    pub format_id: String,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub filesize_approx: Option<u64>,
    #[serde(default)]
    pub format_note: Option<String>,
}

impl YtDlpFormat {
    pub fn has_video(&self) -> bool {
        codec_present(self.vcodec.as_deref())
    }

    pub fn has_audio(&self) -> bool {
        codec_present(self.acodec.as_deref())
    }

    pub fn is_audio_only(&self) -> bool {
        self.vcodec.as_deref() == Some("none") && self.has_audio()
    }

    /// Plain HTTP download, as opposed to manifests or storyboards.
    pub fn is_direct(&self) -> bool {
        let protocol_ok = self
            .protocol
            .as_deref()
            .is_none_or(|protocol| matches!(protocol, "http" | "https"));
        protocol_ok
            && self.ext.as_deref() != Some("mhtml")
            && self.url.as_deref().is_some_and(|url| !url.is_empty())
    }

    pub fn media_type(&self) -> MediaType {
        if self.is_audio_only() {
            MediaType::Audio
        } else if self
            .ext
            .as_deref()
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext))
        {
            MediaType::Photo
        } else {
            MediaType::Video
        }
    }

    pub fn quality_label(&self) -> Option<String> {
        self.format_note
            .clone()
            .filter(|note| !note.is_empty())
            .or_else(|| self.height.map(|height| format!("{height}p")))
    }
}

/// Whole `--dump-json` document for a single video.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YtDlpDump {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub thumbnails: Vec<YtDlpThumbnail>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub comment_count: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub formats: Vec<YtDlpFormat>,
}

/// Media with the dump's metadata and no items.
pub fn media_shell(dump: &YtDlpDump, source: MediaSource, request_url: &str) -> Media {
    let mut media = Media::new(source, request_url);
    media.id = Some(dump.id.clone()).filter(|id| !id.is_empty());
    media.title = dump.title.clone();
    media.caption = dump.description.clone().filter(|text| !text.is_empty());
    media.author = dump.uploader.clone();
    media.thumbnail_url = dump
        .thumbnail
        .clone()
        .or_else(|| dump.thumbnails.last().map(|thumb| thumb.url.clone()));
    media.likes = dump.like_count;
    media.comments = dump.comment_count;
    media.taken_at = dump
        .timestamp
        .and_then(|seconds| DateTime::<Utc>::from_timestamp(seconds, 0));
    media
}

/// Converts a direct format into an item; manifests and storyboards yield `None`.
pub fn item_from_format(format: &YtDlpFormat) -> Option<MediaItem> {
    if !format.is_direct() {
        return None;
    }
    let url = format.url.clone()?;
    let media_type = format.media_type();

    let mut item = MediaItem::new(media_type, url);
    item.id = Some(format.format_id.clone()).filter(|id| !id.is_empty());
    item.quality = format.quality_label();
    item.content_length = format.filesize.or(format.filesize_approx);
    item.mime_type = Some(mime_type_for(format.ext.as_deref(), media_type));
    item.video_without_audio = media_type == MediaType::Video && !format.has_audio();
    if let (Some(width), Some(height)) = (format.width, format.height) {
        item = item.with_dimensions(width, height);
    }
    Some(item)
}

/// Converts every direct format of `dump`.
///
/// Sites that report no format list fall back to the top-level URL.
pub fn media_from_dump(dump: &YtDlpDump, source: MediaSource, request_url: &str) -> Media {
    let mut media = media_shell(dump, source, request_url);
    media.items = dump.formats.iter().filter_map(item_from_format).collect();

    if !media.items.is_empty() {
        return media;
    }

    if let Some(url) = dump.url.as_ref().filter(|url| !url.is_empty()) {
        let single = YtDlpFormat {
            format_id: dump.id.clone(),
            ext: dump.ext.clone(),
            url: Some(url.clone()),
            vcodec: dump.vcodec.clone(),
            acodec: dump.acodec.clone(),
            ..YtDlpFormat::default()
        };
        media.items.extend(item_from_format(&single));
    }
    media
}

/// MIME type from the file extension, kept consistent with the item type.
pub fn mime_type_for(ext: Option<&str>, media_type: MediaType) -> String {
    let guessed = ext
        .map(|ext| ext.trim_start_matches('.'))
        .and_then(|ext| mime_guess::from_ext(ext).first_raw());

    let family = match media_type {
        MediaType::Audio => "audio",
        MediaType::Video => "video",
        MediaType::Photo => "image",
    };

    match guessed {
        Some(mime) if mime.starts_with(family) => mime.to_string(),
        Some(mime) if media_type == MediaType::Audio && mime.starts_with("video/") => {
            format!("audio/{}", &mime["video/".len()..])
        }
        _ => match media_type {
            MediaType::Audio => "audio/mpeg".to_string(),
            MediaType::Video => "video/mp4".to_string(),
            MediaType::Photo => "image/jpeg".to_string(),
        },
    }
}

fn codec_present(codec: Option<&str>) -> bool {
    codec.is_some_and(|codec| !codec.is_empty() && codec != "none")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump(json: serde_json::Value) -> YtDlpDump {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_formats_become_items() {
        let dump = dump(serde_json::json!({
            "id": "7301",
            "title": "clip",
            "uploader": "someone",
            "timestamp": 1700000000,
            "formats": [
                {"format_id": "sb0", "ext": "mhtml", "protocol": "mhtml", "url": "https://cdn.example/sb"},
                {"format_id": "hls-720", "ext": "mp4", "protocol": "m3u8_native", "url": "https://cdn.example/x.m3u8"},
                {"format_id": "h264_720", "ext": "mp4", "protocol": "https", "url": "https://cdn.example/720.mp4",
                 "width": 720, "height": 1280, "vcodec": "h264", "acodec": "aac", "filesize": 1024},
                {"format_id": "audio", "ext": "m4a", "protocol": "https", "url": "https://cdn.example/a.m4a",
                 "vcodec": "none", "acodec": "mp4a.40.2", "format_note": "medium"}
            ]
        }));

        let media = media_from_dump(&dump, MediaSource::TIKTOK, "https://vm.tiktok.com/ABC123");

        assert_eq!(media.source, MediaSource::TIKTOK);
        assert_eq!(media.author.as_deref(), Some("someone"));
        assert_eq!(media.items.len(), 2);

        let video = &media.items[0];
        assert_eq!(video.media_type, MediaType::Video);
        assert_eq!(video.quality.as_deref(), Some("1280p"));
        assert_eq!(video.content_length, Some(1024));
        assert_eq!(video.mime_type.as_deref(), Some("video/mp4"));
        assert!(!video.video_without_audio);

        let audio = &media.items[1];
        assert_eq!(audio.media_type, MediaType::Audio);
        assert_eq!(audio.quality.as_deref(), Some("medium"));
        assert!(audio.mime_type.as_deref().unwrap().starts_with("audio/"));
    }

    #[test]
    fn test_top_level_url_fallback() {
        let dump = dump(serde_json::json!({
            "id": "42",
            "url": "https://cdn.example/only.jpg",
            "ext": "jpg"
        }));

        let media = media_from_dump(&dump, MediaSource::new("pinterest"), "https://pin.it/x");
        assert_eq!(media.items.len(), 1);
        assert_eq!(media.items[0].media_type, MediaType::Photo);
        assert_eq!(media.items[0].mime_type.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_video_only_format_flagged() {
        let format = YtDlpFormat {
            format_id: "137".to_string(),
            ext: Some("mp4".to_string()),
            url: Some("https://cdn.example/137.mp4".to_string()),
            vcodec: Some("avc1".to_string()),
            acodec: Some("none".to_string()),
            height: Some(1080),
            ..YtDlpFormat::default()
        };

        let item = item_from_format(&format).unwrap();
        assert!(item.video_without_audio);
        assert_eq!(item.quality.as_deref(), Some("1080p"));
    }

    #[test]
    fn test_mime_fallbacks() {
        assert_eq!(mime_type_for(None, MediaType::Video), "video/mp4");
        assert_eq!(mime_type_for(Some("unknownext"), MediaType::Photo), "image/jpeg");
        assert_eq!(mime_type_for(Some("webm"), MediaType::Audio), "audio/webm");
        assert_eq!(mime_type_for(Some("png"), MediaType::Photo), "image/png");
    }
}
