//! HTTP transport seam used by extractors and the cache pipeline.
//!
//! Extractors fetch small text documents; the cache pipeline streams large
//! bodies straight into the object store without buffering them.

use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;

/// Streaming response body.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Outgoing request description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// POST with an `application/x-www-form-urlencoded` body.
    pub fn post_form(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: Some(body.into()),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Errors that occur during HTTP exchanges.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Client could not be constructed
    #[error("HTTP client setup failed: {reason}")]
    Client {
        /// Builder error description
        reason: String,
    },

    /// Request could not be sent or the connection failed
    #[error("Request to {url} failed: {reason}")]
    Request {
        /// Target URL
        url: String,
        /// Transport error description
        reason: String,
    },

    /// Server answered with a non-success status
    #[error("Request to {url} returned status {status}")]
    Status {
        /// Target URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Response body could not be read
    #[error("Reading body from {url} failed: {reason}")]
    Body {
        /// Target URL
        url: String,
        /// Read error description
        reason: String,
    },
}

/// Performs HTTP requests on behalf of extractors and the cache pipeline.
#[async_trait]
pub trait HttpTransport: Send + Sync + fmt::Debug {
    /// Sends `request` and returns the full body as text.
    ///
    /// # Errors
    ///
    /// - `HttpError::Request` - If the request could not be sent
    /// - `HttpError::Status` - If the server answered with a non-success status
    /// - `HttpError::Body` - If the body could not be read
    async fn fetch_text(&self, request: HttpRequest) -> Result<String, HttpError>;

    /// Issues a GET for `url` and returns the body as a byte stream.
    ///
    /// # Errors
    ///
    /// - `HttpError::Request` - If the request could not be sent
    /// - `HttpError::Status` - If the server answered with a non-success status
    async fn fetch_stream(&self, url: &str) -> Result<ByteStream, HttpError>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a browser user agent and connect timeout.
    ///
    /// # Errors
    ///
    /// - `HttpError::Client` - If the TLS backend or client could not be initialized
    pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| HttpError::Client {
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, HttpError> {
        let response = request.send().await.map_err(|e| HttpError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn fetch_text(&self, request: HttpRequest) -> Result<String, HttpError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = self.send(builder, &request.url).await?;
        response.text().await.map_err(|e| HttpError::Body {
            url: request.url.clone(),
            reason: e.to_string(),
        })
    }

    async fn fetch_stream(&self, url: &str) -> Result<ByteStream, HttpError> {
        let response = self.send(self.client.get(url), url).await?;
        Ok(response.bytes_stream().map(|chunk| chunk.map_err(io::Error::other)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_form_sets_content_type() {
        let request = HttpRequest::post_form("https://example.com/api", "a=1&b=2")
            .header("X-Test", "yes");

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body.as_deref(), Some("a=1&b=2"));
        assert_eq!(
            request.headers,
            vec![
                (
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string()
                ),
                ("X-Test".to_string(), "yes".to_string()),
            ]
        );
    }

    #[test]
    fn test_reqwest_transport_builds() {
        assert!(ReqwestTransport::new("driftnet-test", Duration::from_secs(5)).is_ok());
    }
}
