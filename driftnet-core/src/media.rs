//! Normalized media model shared by extractors, the cache pipeline and delivery.
//!
//! Extractors produce a [`Media`] aggregate per request. Items keep the order
//! the platform reported them in; the cache pipeline only rewrites item URLs.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag identifying the platform a [`Media`] came from.
///
/// Open set: well-known platforms have associated constants, long-tail sites
/// served by the generic adapter use their site name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaSource(Cow<'static, str>);

impl MediaSource {
    pub const INSTAGRAM: MediaSource = MediaSource(Cow::Borrowed("instagram"));
    pub const YOUTUBE: MediaSource = MediaSource(Cow::Borrowed("youtube"));
    pub const TIKTOK: MediaSource = MediaSource(Cow::Borrowed("tiktok"));
    pub const TWITTER: MediaSource = MediaSource(Cow::Borrowed("twitter"));
    pub const FACEBOOK: MediaSource = MediaSource(Cow::Borrowed("facebook"));
    pub const REDDIT: MediaSource = MediaSource(Cow::Borrowed("reddit"));
    pub const VIMEO: MediaSource = MediaSource(Cow::Borrowed("vimeo"));

    /// Creates a source tag from an arbitrary platform name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Creates a source tag from a static name without allocating.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of downloadable asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Video,
    Photo,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Audio => "audio",
            MediaType::Video => "video",
            MediaType::Photo => "photo",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "audio" => Ok(MediaType::Audio),
            "video" => Ok(MediaType::Video),
            "photo" => Ok(MediaType::Photo),
            _ => Err(format!("Invalid media type: {s}")),
        }
    }
}

/// One downloadable asset within a [`Media`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Platform identifier of the asset, when reported
    pub id: Option<String>,
    /// Platform shortcode of the asset, when reported
    pub shortcode: Option<String>,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    /// Remote origin URL, rewritten to a public cache location by the cache pipeline
    pub url: String,
    /// Quality label such as `1080p`
    pub quality: Option<String>,
    /// Size in bytes, when the platform reports it
    pub content_length: Option<u64>,
    pub mime_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Video stream that carries no audio track and must be muxed by the consumer
    pub video_without_audio: bool,
}

impl MediaItem {
    /// Creates an item with only the required fields set.
    pub fn new(media_type: MediaType, url: impl Into<String>) -> Self {
        Self {
            id: None,
            shortcode: None,
            media_type,
            url: url.into(),
            quality: None,
            content_length: None,
            mime_type: None,
            width: None,
            height: None,
            video_without_audio: false,
        }
    }

    /// Sets the reported dimensions.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// Aggregate result of one extraction.
///
/// Owned by the request that produced it. Once the cache pipeline has
/// finished rewriting item URLs the value is treated as immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub source: MediaSource,
    /// Link exactly as the user supplied it
    pub request_url: String,
    pub id: Option<String>,
    pub shortcode: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub caption: Option<String>,
    pub thumbnail_url: Option<String>,
    pub comments: Option<u64>,
    pub likes: Option<u64>,
    /// Items in platform-reported order
    pub items: Vec<MediaItem>,
    pub taken_at: Option<DateTime<Utc>>,
}

impl Media {
    /// Creates an empty aggregate for `source` and the original request link.
    pub fn new(source: MediaSource, request_url: impl Into<String>) -> Self {
        Self {
            source,
            request_url: request_url.into(),
            id: None,
            shortcode: None,
            title: None,
            author: None,
            caption: None,
            thumbnail_url: None,
            comments: None,
            likes: None,
            items: Vec::new(),
            taken_at: None,
        }
    }

    /// True if any item is a video.
    pub fn has_video(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.media_type == MediaType::Video)
    }
}
