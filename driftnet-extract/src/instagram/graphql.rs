//! Primary strategy: the web GraphQL endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use driftnet_core::config::ExtractionConfig;
use driftnet_core::deadline::with_deadline;
use driftnet_core::http::HttpRequest;
use driftnet_core::{ExtractError, HttpTransport};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::payload::{PostNode, media_from_post};
use super::strategy::{ExtractionStrategy, StrategyOutcome};

pub const GRAPHQL_ENDPOINT: &str = "https://www.instagram.com/api/graphql";

/// Anti-CSRF token accepted for anonymous web requests.
const LSD_TOKEN: &str = "AVqbxe3J_YA";
const ASBD_ID: &str = "129477";
const FRIENDLY_NAME: &str = "PolarisPostActionLoadPostQueryQuery";

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<GraphqlData>,
}

#[derive(Debug, Deserialize)]
struct GraphqlData {
    #[serde(default)]
    xdt_shortcode_media: Option<PostNode>,
}

/// Decodes a GraphQL response body into the post node it carries.
///
/// # Errors
///
/// - `ExtractError::Failed` (transient) - If the body is not the expected JSON
/// - `ExtractError::Failed` (permanent) - If the response has no post node
pub fn parse_graphql_response(body: &str) -> Result<PostNode, ExtractError> {
    let response: GraphqlResponse = serde_json::from_str(body)
        .map_err(|e| ExtractError::transient(format!("GraphQL response decode failed: {e}")))?;

    response
        .data
        .and_then(|data| data.xdt_shortcode_media)
        .filter(|node| !node.is_empty())
        .ok_or_else(|| ExtractError::permanent("GraphQL response has no post data"))
}

/// Form body for a post lookup by shortcode.
pub fn build_request_body(doc_id: &str, shortcode: &str) -> String {
    let variables = serde_json::json!({ "shortcode": shortcode }).to_string();
    format!(
        "doc_id={}&variables={}&lsd={}&fb_api_req_friendly_name={}&server_timestamps=true",
        urlencoding::encode(doc_id),
        urlencoding::encode(&variables),
        LSD_TOKEN,
        FRIENDLY_NAME
    )
}

/// Queries the GraphQL endpoint with a persisted document id.
///
/// Only video posts count as a success; anything else hands over to the next
/// strategy.
#[derive(Debug)]
pub struct GraphqlStrategy {
    transport: Arc<dyn HttpTransport>,
    doc_id: String,
    app_id: String,
    user_agent: String,
    timeout: Duration,
}

impl GraphqlStrategy {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &ExtractionConfig) -> Self {
        Self {
            transport,
            doc_id: config.instagram_doc_id.clone(),
            app_id: config.instagram_app_id.clone(),
            user_agent: config.user_agent.clone(),
            timeout: config.api_timeout,
        }
    }

    fn request(&self, shortcode: &str) -> HttpRequest {
        HttpRequest::post_form(GRAPHQL_ENDPOINT, build_request_body(&self.doc_id, shortcode))
            .header("Accept", "*/*")
            .header("User-Agent", self.user_agent.as_str())
            .header("X-IG-App-ID", self.app_id.as_str())
            .header("X-FB-LSD", LSD_TOKEN)
            .header("X-ASBD-ID", ASBD_ID)
            .header("X-FB-Friendly-Name", FRIENDLY_NAME)
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Origin", "https://www.instagram.com")
            .header("Referer", format!("https://www.instagram.com/p/{shortcode}/"))
            .header("Sec-Fetch-Site", "same-origin")
            .header("Sec-Fetch-Mode", "cors")
            .header("Sec-Fetch-Dest", "empty")
    }
}

#[async_trait]
impl ExtractionStrategy for GraphqlStrategy {
    fn name(&self) -> &'static str {
        "graphql"
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

        let body = match fetched {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return StrategyOutcome::Retryable(ExtractError::transient(e.to_string())),
            Err(e) => {
                let error = ExtractError::from_deadline("graphql request", e);
                return if error.is_cancelled() {
                    StrategyOutcome::Fatal(error)
                } else {
                    StrategyOutcome::Retryable(error)
                };
            }
        };

        let post = match parse_graphql_response(&body) {
            Ok(post) => post,
            Err(e) => return StrategyOutcome::Retryable(e),
        };

        if !post.is_video {
            return StrategyOutcome::Retryable(ExtractError::permanent(format!(
                "GraphQL result for {shortcode} is not a video"
            )));
        }

        let media = media_from_post(&post, request_url);
        if media.items.is_empty() {
            return StrategyOutcome::Retryable(ExtractError::permanent(format!(
                "GraphQL result for {shortcode} has no media URL"
            )));
        }
        StrategyOutcome::Success(media)
    }
}
