//! Structured post payloads returned by Instagram.
//!
//! The GraphQL API and the embedded page data share most of their node shape,
//! so both decode into the types here before conversion into [`Media`].

use chrono::{DateTime, Utc};
use driftnet_core::{Media, MediaItem, MediaSource, MediaType};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dimensions {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Count {
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptionNode {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptionEdge {
    pub node: CaptionNode,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptionEdges {
    #[serde(default)]
    pub edges: Vec<CaptionEdge>,
}

/// One child of a carousel post.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SidecarNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub shortcode: Option<String>,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub display_url: Option<String>,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SidecarEdge {
    pub node: SidecarNode,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SidecarEdges {
    #[serde(default)]
    pub edges: Vec<SidecarEdge>,
}

/// Post node shared by the GraphQL response and the embedded page data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub shortcode: String,
    #[serde(rename = "__typename", default)]
    pub typename: Option<String>,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub has_audio: Option<bool>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub display_url: Option<String>,
    #[serde(default)]
    pub thumbnail_src: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub taken_at_timestamp: Option<i64>,
    #[serde(default)]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub edge_media_to_caption: Option<CaptionEdges>,
    #[serde(default)]
    pub edge_media_to_comment: Option<Count>,
    #[serde(default)]
    pub edge_liked_by: Option<Count>,
    #[serde(default)]
    pub edge_sidecar_to_children: Option<SidecarEdges>,
}

impl PostNode {
    /// True when the node carries no post data.
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    /// First caption edge, falling back to the title.
    pub fn caption(&self) -> Option<String> {
        self.edge_media_to_caption
            .as_ref()
            .and_then(|caption| caption.edges.first())
            .map(|edge| edge.node.text.clone())
            .filter(|text| !text.is_empty())
            .or_else(|| self.title.clone().filter(|title| !title.is_empty()))
    }

    /// Direct asset URL: the video for video posts, the image otherwise.
    pub fn media_url(&self) -> Option<&str> {
        let url = if self.is_video {
            self.video_url.as_deref()
        } else {
            self.display_url.as_deref()
        };
        url.filter(|url| !url.is_empty())
    }

    fn children(&self) -> &[SidecarEdge] {
        self.edge_sidecar_to_children
            .as_ref()
            .map(|sidecar| sidecar.edges.as_slice())
            .unwrap_or_default()
    }
}

/// Converts a decoded post node into a [`Media`] for `request_url`.
///
/// Carousel children become one item each in platform order; single posts
/// yield one item from the node itself.
pub fn media_from_post(post: &PostNode, request_url: &str) -> Media {
    let mut media = Media::new(MediaSource::INSTAGRAM, request_url);
    media.id = Some(post.id.clone()).filter(|id| !id.is_empty());
    media.shortcode = Some(post.shortcode.clone()).filter(|code| !code.is_empty());
    media.title = post.title.clone().filter(|title| !title.is_empty());
    media.caption = post.caption();
    media.author = post.owner.as_ref().and_then(|owner| owner.username.clone());
    media.thumbnail_url = post
        .thumbnail_src
        .clone()
        .or_else(|| post.display_url.clone());
    media.comments = post.edge_media_to_comment.as_ref().map(|edge| edge.count);
    media.likes = post.edge_liked_by.as_ref().map(|edge| edge.count);
    media.taken_at = post
        .taken_at_timestamp
        .and_then(|seconds| DateTime::<Utc>::from_timestamp(seconds, 0));

    let children = post.children();
    if children.is_empty() {
        if let Some(url) = post.media_url() {
            let mut item = MediaItem::new(media_type(post.is_video), url);
            item.id = media.id.clone();
            item.shortcode = media.shortcode.clone();
            item.video_without_audio = post.is_video && post.has_audio == Some(false);
            apply_dimensions(&mut item, post.dimensions.as_ref());
            media.items.push(item);
        }
    } else {
        for child in children.iter().map(|edge| &edge.node) {
            let url = if child.is_video {
                child.video_url.as_deref()
            } else {
                child.display_url.as_deref()
            };
            let Some(url) = url.filter(|url| !url.is_empty()) else {
                continue;
            };

            let mut item = MediaItem::new(media_type(child.is_video), url);
            item.id = Some(child.id.clone()).filter(|id| !id.is_empty());
            item.shortcode = child.shortcode.clone();
            apply_dimensions(&mut item, child.dimensions.as_ref());
            media.items.push(item);
        }
    }

    media
}

fn media_type(is_video: bool) -> MediaType {
    if is_video {
        MediaType::Video
    } else {
        MediaType::Photo
    }
}

fn apply_dimensions(item: &mut MediaItem, dimensions: Option<&Dimensions>) {
    if let Some(dimensions) = dimensions.filter(|d| d.width > 0 && d.height > 0) {
        item.width = Some(dimensions.width);
        item.height = Some(dimensions.height);
    }
}
