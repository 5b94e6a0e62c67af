//! Fallback strategy: scrape the public embeddable page.
//!
//! The fetched document is searched by two independent techniques running
//! side by side. The structured data blob wins over the bare media element
//! whenever both produce something.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use driftnet_core::config::ExtractionConfig;
use driftnet_core::deadline::with_deadline;
use driftnet_core::http::HttpRequest;
use driftnet_core::{ExtractError, HttpTransport, Media, MediaItem, MediaSource, MediaType};
use regex::Regex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::payload::{PostNode, media_from_post};
use super::strategy::{ExtractionStrategy, StrategyOutcome};

static GQL_DATA_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\\"gql_data\\":([\s\S]*)\}"\}\]\],\["NavigationMetrics"#).unwrap()
});

static VIDEO_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<video\b[^>]*>").unwrap());

static IMG_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<img\b[^>]*>").unwrap());

static SRC_ATTR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\ssrc="([^"]*)""#).unwrap());

static CLASS_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\sclass="([^"]*)""#).unwrap());

static CAPTION_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"</a><br\s*/?><br\s*/?>([\s\S]*?)<div class="CaptionComments">"#).unwrap()
});

static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<br\s*/?>").unwrap());

static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Page markers Instagram shows when a post cannot be embedded.
const PRIVATE_MARKERS: &[&str] = &[
    "EmbedIsBroken",
    "isn't available",
    r#"is_private\":true"#,
    r#""is_private":true"#,
];

#[derive(Debug, Deserialize)]
struct EmbeddedData {
    #[serde(default)]
    shortcode_media: Option<PostNode>,
}

/// Media element found directly in the page markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedElement {
    pub media_type: MediaType,
    pub url: String,
    pub caption: Option<String>,
}

/// Advisory reason for an embed page that yielded nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureHint {
    LikelyPrivate,
    LikelyMalformed,
}

impl FailureHint {
    pub fn message(self) -> &'static str {
        match self {
            FailureHint::LikelyPrivate => {
                "failed to fetch the post: the page is likely private or was removed"
            }
            FailureHint::LikelyMalformed => {
                "failed to fetch the post: the link is likely wrong or the page layout changed"
            }
        }
    }
}

/// Undoes the string escaping applied to the JSON blob embedded in a script.
pub fn unescape_embedded_json(raw: &str) -> String {
    raw.replace(r#"\""#, "\"")
        .replace(r"\\/", "/")
        .replace(r"\\", r"\")
}

/// Finds, unescapes and decodes the structured post blob of an embed page.
///
/// Returns `None` when the blob is absent, undecodable or empty.
pub fn decode_embedded_post(html: &str) -> Option<PostNode> {
    let captured = GQL_DATA_PATTERN.captures(html)?.get(1)?.as_str();
    let json = unescape_embedded_json(captured);

    match serde_json::from_str::<EmbeddedData>(&json) {
        Ok(data) => data.shortcode_media.filter(|node| !node.is_empty()),
        Err(e) => {
            tracing::debug!("Embedded post data did not decode: {}", e);
            None
        }
    }
}

/// Finds the single media element of an embed page.
///
/// A `<video src>` is preferred over the `EmbeddedMediaImage` image.
pub fn find_embedded_media_element(html: &str) -> Option<EmbeddedElement> {
    let video = VIDEO_TAG
        .find_iter(html)
        .find_map(|tag| src_of(tag.as_str()))
        .map(|url| (MediaType::Video, url));

    let element = video.or_else(|| {
        IMG_TAG
            .find_iter(html)
            .filter(|tag| {
                CLASS_ATTR
                    .captures(tag.as_str())
                    .and_then(|caps| caps.get(1))
                    .is_some_and(|class| class.as_str().contains("EmbeddedMediaImage"))
            })
            .find_map(|tag| src_of(tag.as_str()))
            .map(|url| (MediaType::Photo, url))
    });

    element.map(|(media_type, url)| EmbeddedElement {
        media_type,
        url,
        caption: find_caption(html),
    })
}

/// Guesses why an embed page carried no usable data.
pub fn diagnose_embed_page(html: &str) -> FailureHint {
    if PRIVATE_MARKERS.iter().any(|marker| html.contains(marker)) {
        FailureHint::LikelyPrivate
    } else {
        FailureHint::LikelyMalformed
    }
}

fn src_of(tag: &str) -> Option<String> {
    SRC_ATTR
        .captures(tag)
        .and_then(|caps| caps.get(1))
        .map(|src| unescape_html(src.as_str()))
        .filter(|src| !src.is_empty())
}

fn find_caption(html: &str) -> Option<String> {
    let block = CAPTION_BLOCK.captures(html)?.get(1)?.as_str();
    let text = LINE_BREAK.replace_all(block, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let caption = unescape_html(text.trim());
    (!caption.is_empty()).then_some(caption)
}

fn unescape_html(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn media_from_element(element: EmbeddedElement, request_url: &str) -> Media {
    let mut media = Media::new(MediaSource::INSTAGRAM, request_url);
    media.caption = element.caption;
    if element.media_type == MediaType::Photo {
        media.thumbnail_url = Some(element.url.clone());
    }
    media.items.push(MediaItem::new(element.media_type, element.url));
    media
}

/// Embed page URL for a shortcode.
pub fn embed_url(shortcode: &str) -> String {
    format!("https://www.instagram.com/p/{shortcode}/embed/captioned/")
}

/// Fetches the embeddable page and scrapes it.
#[derive(Debug)]
pub struct EmbedStrategy {
    transport: Arc<dyn HttpTransport>,
    user_agent: String,
    timeout: Duration,
}

impl EmbedStrategy {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &ExtractionConfig) -> Self {
        Self {
            transport,
            user_agent: config.user_agent.clone(),
            timeout: config.embed_timeout,
        }
    }

    fn request(&self, shortcode: &str) -> HttpRequest {
        HttpRequest::get(embed_url(shortcode))
            .header("Accept", "*/*")
            .header("Referer", "https://www.instagram.com/")
            .header("DNT", "1")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "same-origin")
            .header("User-Agent", self.user_agent.as_str())
    }
}

#[async_trait]
impl ExtractionStrategy for EmbedStrategy {
    fn name(&self) -> &'static str {
        "embed"
    }

    async fn attempt(
        &self,
        shortcode: &str,
        request_url: &str,
        cancel: &CancellationToken,
    ) -> StrategyOutcome {
        let fetched = with_deadline(
            cancel,
            self.timeout,
            self.transport.fetch_text(self.request(shortcode)),
        )
        .await;

        let html: Arc<str> = match fetched {
            Ok(Ok(body)) => body.into(),
            Ok(Err(e)) => {
                return StrategyOutcome::Fatal(ExtractError::transient(format!(
                    "embed page fetch failed: {e}"
                )));
            }
            Err(e) => return StrategyOutcome::Fatal(ExtractError::from_deadline("embed page fetch", e)),
        };

        let structured = tokio::task::spawn_blocking({
            let html = Arc::clone(&html);
            move || decode_embedded_post(&html)
        });
        let element = tokio::task::spawn_blocking({
            let html = Arc::clone(&html);
            move || find_embedded_media_element(&html)
        });
        let (structured, element) = tokio::join!(structured, element);

        let structured = structured.unwrap_or_else(|e| {
            tracing::warn!("Embedded data scan for {} failed: {}", shortcode, e);
            None
        });
        let element = element.unwrap_or_else(|e| {
            tracing::warn!("Embedded element scan for {} failed: {}", shortcode, e);
            None
        });

        if let Some(post) = structured {
            let media = media_from_post(&post, request_url);
            if !media.items.is_empty() {
                return StrategyOutcome::Success(media);
            }
        }

        if let Some(element) = element {
            tracing::debug!("Using embedded media element for {}", shortcode);
            return StrategyOutcome::Success(media_from_element(element, request_url));
        }

        let hint = diagnose_embed_page(&html);
        StrategyOutcome::Retryable(ExtractError::permanent(hint.message()))
    }
}

#[cfg(test)]
mod tests {
    use driftnet_core::FailureKind;
    use driftnet_core::test_fixtures::{ScriptedResponse, ScriptedTransport};

    use super::*;

    const CAPTIONED: &str = include_str!("../../fixtures/embed_captioned.html");

    fn strategy(transport: ScriptedTransport, timeout: Duration) -> EmbedStrategy {
        let config = ExtractionConfig {
            embed_timeout: timeout,
            ..ExtractionConfig::default()
        };
        EmbedStrategy::new(Arc::new(transport), &config)
    }

    async fn attempt(strategy: &EmbedStrategy) -> StrategyOutcome {
        strategy
            .attempt(
                "CzBjgFiISfF",
                "https://www.instagram.com/reel/CzBjgFiISfF/",
                &CancellationToken::new(),
            )
            .await
    }

    #[test]
    fn test_unescape_embedded_json() {
        let raw = r#"{\"url\":\"https:\\/\\/cdn.example\\/a.mp4\",\"note\":\"a\\\\b\"}"#;
        assert_eq!(
            unescape_embedded_json(raw),
            r#"{"url":"https://cdn.example/a.mp4","note":"a\\b"}"#
        );
    }

    #[test]
    fn test_decode_embedded_post_from_fixture() {
        let post = decode_embedded_post(CAPTIONED).unwrap();

        assert_eq!(post.shortcode, "CzBjgFiISfF");
        assert!(post.is_video);
        assert_eq!(
            post.video_url.as_deref(),
            Some("https://scontent.cdninstagram.com/v/t50/clip.mp4?efg=abc")
        );
        assert_eq!(post.edge_liked_by.as_ref().map(|likes| likes.count), Some(128));
    }

    #[test]
    fn test_decode_without_blob() {
        assert!(decode_embedded_post("<html><body>nothing here</body></html>").is_none());
    }

    #[test]
    fn test_find_image_element_from_fixture() {
        let element = find_embedded_media_element(CAPTIONED).unwrap();

        assert_eq!(element.media_type, MediaType::Photo);
        assert_eq!(
            element.url,
            "https://scontent.cdninstagram.com/v/t51/cover.jpg?stp=dst-jpg&_nc_ht=scontent.cdninstagram.com"
        );
        assert_eq!(
            element.caption.as_deref(),
            Some("Sunset over the harbour & the old pier")
        );
    }

    #[test]
    fn test_video_element_preferred_over_image() {
        let html = r#"<div><img class="EmbeddedMediaImage" src="https://cdn.example/cover.jpg"/>
            <video playsinline src="https://cdn.example/clip.mp4" poster="x"></video></div>"#;

        let element = find_embedded_media_element(html).unwrap();
        assert_eq!(element.media_type, MediaType::Video);
        assert_eq!(element.url, "https://cdn.example/clip.mp4");
        assert_eq!(element.caption, None);
    }

    #[test]
    fn test_unrelated_images_ignored() {
        let html = r#"<img class="Avatar" src="https://cdn.example/avatar.jpg"/>"#;
        assert!(find_embedded_media_element(html).is_none());
    }

    #[test]
    fn test_diagnose_embed_page() {
        assert_eq!(
            diagnose_embed_page(r#"<div class="EmbedIsBroken">Post isn't available</div>"#),
            FailureHint::LikelyPrivate
        );
        assert_eq!(
            diagnose_embed_page("<html><body></body></html>"),
            FailureHint::LikelyMalformed
        );
        assert_ne!(
            FailureHint::LikelyPrivate.message(),
            FailureHint::LikelyMalformed.message()
        );
    }

    #[tokio::test]
    async fn test_structured_blob_wins() {
        let transport = ScriptedTransport::new()
            .route("https://www.instagram.com/p/", ScriptedResponse::text(CAPTIONED));
        let strategy = strategy(transport, Duration::from_secs(1));

        let StrategyOutcome::Success(media) = attempt(&strategy).await else {
            panic!("expected success");
        };

        assert_eq!(media.items.len(), 1);
        assert_eq!(media.items[0].media_type, MediaType::Video);
        assert_eq!(media.author.as_deref(), Some("driftnet.sample"));
        assert_eq!(media.request_url, "https://www.instagram.com/reel/CzBjgFiISfF/");
    }

    #[tokio::test]
    async fn test_element_used_without_blob() {
        let html = r#"<img class="EmbeddedMediaImage" src="https://cdn.example/cover.jpg"/>"#;
        let transport =
            ScriptedTransport::new().route("https://www.instagram.com/p/", ScriptedResponse::text(html));
        let strategy = strategy(transport, Duration::from_secs(1));

        let StrategyOutcome::Success(media) = attempt(&strategy).await else {
            panic!("expected success");
        };
        assert_eq!(media.items[0].media_type, MediaType::Photo);
        assert_eq!(media.items[0].url, "https://cdn.example/cover.jpg");
    }

    #[tokio::test]
    async fn test_empty_page_is_retryable_with_hint() {
        let html = r#"<div class="EmbedIsBroken"></div>"#;
        let transport =
            ScriptedTransport::new().route("https://www.instagram.com/p/", ScriptedResponse::text(html));
        let strategy = strategy(transport, Duration::from_secs(1));

        match attempt(&strategy).await {
            StrategyOutcome::Retryable(ExtractError::Failed { reason, kind }) => {
                assert_eq!(kind, FailureKind::Permanent);
                assert!(reason.contains("private"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal() {
        let transport = ScriptedTransport::new()
            .route("https://www.instagram.com/p/", ScriptedResponse::Status(500));
        let strategy = strategy(transport, Duration::from_secs(1));

        assert!(matches!(attempt(&strategy).await, StrategyOutcome::Fatal(_)));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_fatal() {
        let transport =
            ScriptedTransport::new().route("https://www.instagram.com/p/", ScriptedResponse::Hang);
        let strategy = strategy(transport, Duration::from_millis(50));

        assert!(matches!(
            attempt(&strategy).await,
            StrategyOutcome::Fatal(ExtractError::Timeout { .. })
        ));
    }
}
