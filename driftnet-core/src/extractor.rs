//! Extractor capability interface.
//!
//! An extractor turns a link from one platform family into a [`Media`]
//! aggregate. Extractors are registered once at startup and shared read-only.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::deadline::DeadlineError;
use crate::media::{Media, MediaSource};

/// Whether items from a source must be mirrored before delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Item URLs are stable and can be delivered as extracted
    #[default]
    Direct,
    /// Item URLs expire or are access-restricted and go through the cache pipeline
    Mirror,
}

/// Turns a platform link into a normalized [`Media`].
#[async_trait]
pub trait Extractor: Send + Sync + fmt::Debug {
    /// Unique source identifier, used as the registry name.
    fn name(&self) -> &str;

    /// Hostnames this extractor serves, unnormalized.
    fn hosts(&self) -> Vec<String>;

    /// Source tag stamped on produced media.
    fn source(&self) -> MediaSource {
        MediaSource::new(self.name())
    }

    /// Whether produced items need the cache pipeline.
    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::Direct
    }

    /// Extracts media from `url`.
    ///
    /// # Errors
    ///
    /// - `ExtractError::MalformedShortcode` - If the link carries no post identifier
    /// - `ExtractError::Failed` - If no strategy produced usable data
    /// - `ExtractError::Timeout` - If a stage ran past its deadline
    /// - `ExtractError::Cancelled` - If `cancel` fired before completion
    async fn extract(&self, url: &str, cancel: &CancellationToken) -> Result<Media, ExtractError>;
}

/// Distinguishes retry-worthy failures from ones that will not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network or upstream hiccup
    Transient,
    /// The platform answered but had no usable media
    Permanent,
}

/// Errors that occur while extracting media from a platform.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Link path does not contain a recognizable post identifier
    #[error("Couldn't find a post identifier in link '{url}'")]
    MalformedShortcode {
        /// Link that failed to match
        url: String,
    },

    /// No strategy produced usable data
    #[error("Extraction failed: {reason}")]
    Failed {
        /// Human-readable failure description
        reason: String,
        /// Whether retrying later may succeed
        kind: FailureKind,
    },

    /// A stage exceeded its deadline
    #[error("{stage} timed out after {after:?}")]
    Timeout {
        /// Stage that timed out
        stage: &'static str,
        /// Budget that was exceeded
        after: Duration,
    },

    /// The caller cancelled the extraction
    #[error("{stage} cancelled by caller")]
    Cancelled {
        /// Stage that was running when cancellation arrived
        stage: &'static str,
    },

    /// External extraction tool is not installed or not runnable
    #[error("Extraction tool unavailable: {reason}")]
    ToolUnavailable {
        /// Description of why the tool could not be started
        reason: String,
    },
}

impl ExtractError {
    /// Network-flavored failure that may succeed on retry.
    pub fn transient(reason: impl Into<String>) -> Self {
        ExtractError::Failed {
            reason: reason.into(),
            kind: FailureKind::Transient,
        }
    }

    /// Failure where the platform answered without usable data.
    pub fn permanent(reason: impl Into<String>) -> Self {
        ExtractError::Failed {
            reason: reason.into(),
            kind: FailureKind::Permanent,
        }
    }

    /// Maps a deadline interruption onto the stage that was running.
    pub fn from_deadline(stage: &'static str, error: DeadlineError) -> Self {
        match error {
            DeadlineError::Cancelled => ExtractError::Cancelled { stage },
            DeadlineError::Elapsed(after) => ExtractError::Timeout { stage, after },
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExtractError::Cancelled { .. })
    }

    /// True for failures worth retrying later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExtractError::Failed {
                kind: FailureKind::Transient,
                ..
            } | ExtractError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_deadline_keeps_cancellation_distinct() {
        let cancelled = ExtractError::from_deadline("embed page", DeadlineError::Cancelled);
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_transient());

        let elapsed = ExtractError::from_deadline(
            "embed page",
            DeadlineError::Elapsed(Duration::from_secs(10)),
        );
        assert!(!elapsed.is_cancelled());
        assert!(elapsed.is_transient());
        assert_eq!(elapsed.to_string(), "embed page timed out after 10s");
    }

    #[test]
    fn test_failure_kinds() {
        assert!(ExtractError::transient("connection reset").is_transient());
        assert!(!ExtractError::permanent("no media").is_transient());
    }
}
