//! Periodic deletion of cached objects past their retention window.
//!
//! Each tick lists the bucket, selects objects strictly older than
//! `now - retention` and deletes them in one batch. A failed tick is logged
//! and the next tick starts from scratch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::ReaperConfig;
use crate::deadline::{DeadlineError, with_deadline};
use crate::storage::{ObjectInfo, ObjectStore, StorageError};

/// Errors that occur during a reaper tick.
#[derive(Debug, thiserror::Error)]
pub enum ReaperError {
    /// Listing the bucket failed
    #[error("Listing bucket {bucket} failed: {source}")]
    List {
        /// Bucket being scanned
        bucket: String,
        #[source]
        source: StorageError,
    },

    /// Deleting expired objects failed
    #[error("Deleting {count} objects from {bucket} failed: {source}")]
    Delete {
        /// Bucket being cleaned
        bucket: String,
        /// Number of objects in the failed batch
        count: usize,
        #[source]
        source: StorageError,
    },

    /// A store call ran past the tick budget or was cancelled
    #[error("Reaper {stage} interrupted: {source}")]
    Interrupted {
        /// Stage that was running
        stage: &'static str,
        #[source]
        source: DeadlineError,
    },
}

/// Outcome of one successful tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReapReport {
    /// Objects returned by the listing
    pub scanned: usize,
    /// Objects deleted this tick
    pub deleted: usize,
}

/// Paths of objects last modified strictly before `cutoff`.
///
/// Objects without a modification time are kept.
pub fn select_expired(objects: &[ObjectInfo], cutoff: DateTime<Utc>) -> Vec<String> {
    objects
        .iter()
        .filter(|object| object.last_modified.is_some_and(|modified| modified < cutoff))
        .map(|object| object.path.clone())
        .collect()
}

/// Deletes expired objects from the cache bucket on a fixed interval.
#[derive(Debug, Clone)]
pub struct TempObjectReaper {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    config: ReaperConfig,
}

impl TempObjectReaper {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, config: ReaperConfig) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            config,
        }
    }

    /// Runs one scan and delete pass relative to `now`.
    ///
    /// # Errors
    ///
    /// - `ReaperError::List` - If listing the bucket failed
    /// - `ReaperError::Delete` - If the batch delete failed
    /// - `ReaperError::Interrupted` - If a store call timed out or `cancel` fired
    pub async fn run_tick(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ReapReport, ReaperError> {
        let retention =
            chrono::Duration::from_std(self.config.retention).unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(retention).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let objects = with_deadline(
            cancel,
            self.config.tick_timeout,
            self.store.list(&self.bucket, self.config.list_page_size),
        )
        .await
        .map_err(|source| ReaperError::Interrupted {
            stage: "list",
            source,
        })?
        .map_err(|source| ReaperError::List {
            bucket: self.bucket.clone(),
            source,
        })?;

        let expired = select_expired(&objects, cutoff);
        let report = ReapReport {
            scanned: objects.len(),
            deleted: expired.len(),
        };
        if expired.is_empty() {
            return Ok(report);
        }

        with_deadline(
            cancel,
            self.config.tick_timeout,
            self.store.delete(&self.bucket, &expired),
        )
        .await
        .map_err(|source| ReaperError::Interrupted {
            stage: "delete",
            source,
        })?
        .map_err(|source| ReaperError::Delete {
            bucket: self.bucket.clone(),
            count: expired.len(),
            source,
        })?;

        tracing::info!("Successfully deleted {} temp files", report.deleted);
        Ok(report)
    }

    /// Starts the periodic scheduler on the current runtime.
    ///
    /// The first tick runs one interval after start.
    pub fn spawn(self) -> ReaperHandle {
        let stop = CancellationToken::new();
        let abort = CancellationToken::new();
        let drain_timeout = self.config.drain_timeout;

        let task = tokio::spawn(self.run(stop.clone(), abort.clone()));

        ReaperHandle {
            stop,
            abort,
            drain_timeout,
            task,
        }
    }

    async fn run(self, stop: CancellationToken, abort: CancellationToken) {
        let period = self.config.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(
            "Reaper started for bucket {} (interval {:?}, retention {:?})",
            self.bucket,
            period,
            self.config.retention
        );

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.run_tick(Utc::now(), &abort).await {
                Ok(report) => tracing::debug!(
                    "Reaper tick scanned {} objects, deleted {}",
                    report.scanned,
                    report.deleted
                ),
                Err(e) => tracing::warn!("Reaper tick failed: {}", e),
            }
        }

        tracing::debug!("Reaper for bucket {} stopped", self.bucket);
    }
}

/// Lifecycle handle for a spawned [`TempObjectReaper`].
#[derive(Debug)]
pub struct ReaperHandle {
    stop: CancellationToken,
    abort: CancellationToken,
    drain_timeout: std::time::Duration,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stops scheduling new ticks and waits for an in-flight tick.
    ///
    /// A tick still running after the drain timeout is cancelled. Returns
    /// `true` if the scheduler drained cleanly.
    pub async fn shutdown(mut self) -> bool {
        self.stop.cancel();

        match tokio::time::timeout(self.drain_timeout, &mut self.task).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(
                    "Reaper did not drain within {:?}, cancelling in-flight tick",
                    self.drain_timeout
                );
                self.abort.cancel();
                self.task.abort();
                false
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;
    use crate::test_fixtures::CountingStore;

    const BUCKET: &str = "driftnet-test";

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn reaper(store: Arc<CountingStore>, config: ReaperConfig) -> TempObjectReaper {
        TempObjectReaper::new(store, BUCKET, config)
    }

    #[test]
    fn test_select_expired_skips_unknown_timestamps() {
        let cutoff = fixed_now();
        let objects = vec![
            ObjectInfo {
                path: "old.mp4".to_string(),
                last_modified: Some(cutoff - chrono::Duration::seconds(1)),
                size: 1,
            },
            ObjectInfo {
                path: "unknown.mp4".to_string(),
                last_modified: None,
                size: 1,
            },
        ];
        assert_eq!(select_expired(&objects, cutoff), vec!["old.mp4"]);
    }

    #[tokio::test]
    async fn test_retention_boundary() {
        let now = fixed_now();
        let store = Arc::new(CountingStore::new());
        let ages = [
            ("fresh.mp4", chrono::Duration::seconds(9 * 60 + 59)),
            ("boundary.mp4", chrono::Duration::seconds(10 * 60)),
            ("expired.mp4", chrono::Duration::seconds(10 * 60 + 1)),
        ];
        for (path, age) in ages {
            store.inner().insert(BUCKET, path, &b"x"[..], now - age).unwrap();
        }

        let report = reaper(Arc::clone(&store), ReaperConfig::default())
            .run_tick(now, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report, ReapReport { scanned: 3, deleted: 1 });
        assert_eq!(store.deleted_paths(), vec!["expired.mp4"]);
        assert!(store.inner().get(BUCKET, "fresh.mp4").is_some());
        assert!(store.inner().get(BUCKET, "boundary.mp4").is_some());
        assert!(store.inner().get(BUCKET, "expired.mp4").is_none());
    }

    #[tokio::test]
    async fn test_tick_without_expired_objects_skips_delete() {
        let now = fixed_now();
        let store = Arc::new(CountingStore::new());
        store.inner().insert(BUCKET, "fresh.jpg", &b"x"[..], now).unwrap();
        let reaper = reaper(Arc::clone(&store), ReaperConfig::default());

        for _ in 0..2 {
            let report = reaper.run_tick(now, &CancellationToken::new()).await.unwrap();
            assert_eq!(report.deleted, 0);
        }
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_uses_configured_page_size() {
        let now = fixed_now();
        let store = Arc::new(CountingStore::new());
        for index in 0..5 {
            let path = format!("old-{index}.mp4");
            store
                .inner()
                .insert(BUCKET, &path, &b"x"[..], now - chrono::Duration::hours(1))
                .unwrap();
        }
        let config = ReaperConfig {
            list_page_size: 2,
            ..Default::default()
        };

        let report = reaper(Arc::clone(&store), config)
            .run_tick(now, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report, ReapReport { scanned: 2, deleted: 2 });
        assert_eq!(store.inner().object_count(BUCKET), 3);
    }

    #[tokio::test]
    async fn test_list_failure_is_reported() {
        let store = Arc::new(CountingStore::new());
        store.fail_next_lists(1);

        let result = reaper(store, ReaperConfig::default())
            .run_tick(fixed_now(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ReaperError::List { .. })));
    }

    #[tokio::test]
    async fn test_scheduler_survives_failed_tick() {
        let store = Arc::new(CountingStore::new());
        store
            .inner()
            .insert(BUCKET, "stale.mp4", &b"x"[..], Utc::now() - chrono::Duration::hours(1))
            .unwrap();
        store.fail_next_lists(1);

        let config = ReaperConfig {
            interval: Duration::from_millis(20),
            ..Default::default()
        };
        let handle = reaper(Arc::clone(&store), config).spawn();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while store.inner().object_count(BUCKET) > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(handle.shutdown().await);
        assert!(store.list_calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(store.inner().object_count(BUCKET), 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains_in_flight_tick() {
        let store = Arc::new(CountingStore::new());
        store
            .inner()
            .insert(BUCKET, "stale.mp4", &b"x"[..], Utc::now() - chrono::Duration::hours(1))
            .unwrap();
        store.set_delete_delay(Duration::from_millis(100));

        let config = ReaperConfig {
            interval: Duration::from_millis(10),
            drain_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let handle = reaper(Arc::clone(&store), config).spawn();

        while store.delete_calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(handle.shutdown().await);
        assert_eq!(store.inner().object_count(BUCKET), 0);
    }

    #[tokio::test]
    async fn test_shutdown_gives_up_after_drain_timeout() {
        let store = Arc::new(CountingStore::new());
        store
            .inner()
            .insert(BUCKET, "stale.mp4", &b"x"[..], Utc::now() - chrono::Duration::hours(1))
            .unwrap();
        store.set_delete_delay(Duration::from_secs(30));

        let config = ReaperConfig {
            interval: Duration::from_millis(10),
            drain_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let handle = reaper(Arc::clone(&store), config).spawn();

        while store.delete_calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!handle.shutdown().await);
    }

    #[tokio::test]
    async fn test_no_ticks_after_stop() {
        let store = Arc::new(CountingStore::new());
        let config = ReaperConfig {
            interval: Duration::from_millis(200),
            ..Default::default()
        };
        let handle = reaper(Arc::clone(&store), config).spawn();

        assert!(handle.shutdown().await);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 0);
    }
}
