//! Deadline and cancellation helper for suspension points.
//!
//! Every network call in the pipeline runs through [`with_deadline`] so callers
//! can tell "I was cancelled" apart from "the remote side was too slow".

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Why a guarded future did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeadlineError {
    /// The caller's cancellation token fired first
    #[error("cancelled by caller")]
    Cancelled,

    /// The future ran past its time budget
    #[error("timed out after {0:?}")]
    Elapsed(Duration),
}

/// Runs `future` until it completes, `limit` elapses or `cancel` fires.
///
/// Cancellation wins ties so that a cancelled caller never observes a timeout.
/// The future is dropped on either interruption, which aborts in-flight I/O.
///
/// # Errors
///
/// - `DeadlineError::Cancelled` - If the token was cancelled before completion
/// - `DeadlineError::Elapsed` - If `limit` passed before completion
pub async fn with_deadline<F>(
    cancel: &CancellationToken,
    limit: Duration,
    future: F,
) -> Result<F::Output, DeadlineError>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DeadlineError::Cancelled),
        result = tokio::time::timeout(limit, future) => {
            result.map_err(|_| DeadlineError::Elapsed(limit))
        }
    }
}
