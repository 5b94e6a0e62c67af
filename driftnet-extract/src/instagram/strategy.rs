//! Ordered extraction strategies with typed outcomes.
//!
//! A chain tries its strategies in order. It stops at the first success or
//! fatal outcome and moves on after a retryable one.

use std::fmt;

use async_trait::async_trait;
use driftnet_core::{ExtractError, Media};
use tokio_util::sync::CancellationToken;

/// Result of one strategy attempt.
#[derive(Debug)]
pub enum StrategyOutcome {
    /// Media was extracted
    Success(Media),
    /// This strategy failed; the next one may still succeed
    Retryable(ExtractError),
    /// Stop the chain with this error
    Fatal(ExtractError),
}

/// One way of turning a post shortcode into media.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    async fn attempt(
        &self,
        shortcode: &str,
        request_url: &str,
        cancel: &CancellationToken,
    ) -> StrategyOutcome;
}

/// Strategies tried in order until one settles the outcome.
#[derive(Debug, Default)]
pub struct StrategyChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl StrategyChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Runs the strategies in order.
    ///
    /// # Errors
    ///
    /// - The error of the first `Fatal` outcome
    /// - The error of the last `Retryable` outcome if every strategy failed
    /// - `ExtractError::Failed` - If the chain is empty
    pub async fn run(
        &self,
        shortcode: &str,
        request_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Media, ExtractError> {
        let mut last_error = None;

        for strategy in &self.strategies {
            match strategy.attempt(shortcode, request_url, cancel).await {
                StrategyOutcome::Success(media) => {
                    tracing::debug!("Strategy {} succeeded for {}", strategy.name(), shortcode);
                    return Ok(media);
                }
                StrategyOutcome::Fatal(e) => {
                    tracing::warn!("Strategy {} aborted for {}: {}", strategy.name(), shortcode, e);
                    return Err(e);
                }
                StrategyOutcome::Retryable(e) => {
                    tracing::debug!("Strategy {} failed for {}: {}", strategy.name(), shortcode, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ExtractError::permanent("no extraction strategy configured")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use driftnet_core::{FailureKind, MediaSource};

    use super::*;

    #[derive(Debug)]
    enum Scripted {
        Succeed,
        Retry,
        Abort,
    }

    #[derive(Debug)]
    struct ScriptedStrategy {
        name: &'static str,
        behavior: Scripted,
        attempts: Arc<AtomicUsize>,
    }

    impl ScriptedStrategy {
        fn new(name: &'static str, behavior: Scripted) -> (Self, Arc<AtomicUsize>) {
            let attempts = Arc::new(AtomicUsize::new(0));
            let strategy = Self {
                name,
                behavior,
                attempts: Arc::clone(&attempts),
            };
            (strategy, attempts)
        }
    }

    #[async_trait]
    impl ExtractionStrategy for ScriptedStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn attempt(
            &self,
            _shortcode: &str,
            request_url: &str,
            _cancel: &CancellationToken,
        ) -> StrategyOutcome {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Scripted::Succeed => {
                    let mut media = Media::new(MediaSource::INSTAGRAM, request_url);
                    media.title = Some(self.name.to_string());
                    StrategyOutcome::Success(media)
                }
                Scripted::Retry => StrategyOutcome::Retryable(ExtractError::transient(self.name)),
                Scripted::Abort => StrategyOutcome::Fatal(ExtractError::Cancelled { stage: self.name }),
            }
        }
    }

    #[tokio::test]
    async fn test_retryable_falls_through_to_next() {
        let (first, first_attempts) = ScriptedStrategy::new("first", Scripted::Retry);
        let (second, second_attempts) = ScriptedStrategy::new("second", Scripted::Succeed);
        let chain = StrategyChain::new().then(first).then(second);

        let media = chain
            .run("abc", "https://instagram.com/p/abc/", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(media.title.as_deref(), Some("second"));
        assert_eq!(first_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(second_attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_stops_chain() {
        let (first, _) = ScriptedStrategy::new("first", Scripted::Succeed);
        let (second, second_attempts) = ScriptedStrategy::new("second", Scripted::Succeed);
        let chain = StrategyChain::new().then(first).then(second);

        let media = chain
            .run("abc", "https://instagram.com/p/abc/", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(media.title.as_deref(), Some("first"));
        assert_eq!(second_attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fatal_stops_chain() {
        let (first, _) = ScriptedStrategy::new("first", Scripted::Abort);
        let (second, second_attempts) = ScriptedStrategy::new("second", Scripted::Succeed);
        let chain = StrategyChain::new().then(first).then(second);

        let error = chain
            .run("abc", "https://instagram.com/p/abc/", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(error.is_cancelled());
        assert_eq!(second_attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_chain_returns_last_error() {
        let (first, _) = ScriptedStrategy::new("first", Scripted::Retry);
        let (second, _) = ScriptedStrategy::new("second", Scripted::Retry);
        let chain = StrategyChain::new().then(first).then(second);

        let error = chain
            .run("abc", "https://instagram.com/p/abc/", &CancellationToken::new())
            .await
            .unwrap_err();

        match error {
            ExtractError::Failed { reason, kind } => {
                assert_eq!(reason, "second");
                assert_eq!(kind, FailureKind::Transient);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_chain_fails() {
        let result = StrategyChain::new()
            .run("abc", "https://instagram.com/p/abc/", &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ExtractError::Failed { .. })));
    }
}
