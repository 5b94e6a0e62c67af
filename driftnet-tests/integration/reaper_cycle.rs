//! Reaper passes and scheduling over the object stores.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use driftnet_core::config::ReaperConfig;
use driftnet_core::reaper::ReapReport;
use driftnet_core::test_fixtures::CountingStore;
use driftnet_core::{FsObjectStore, MemoryObjectStore, ObjectStore, TempObjectReaper};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const BUCKET: &str = "driftnet-cache";

#[tokio::test]
async fn test_only_objects_past_retention_are_deleted() {
    let now = Utc.with_ymd_and_hms(2024, 9, 14, 8, 30, 0).unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    for (path, age_secs) in [
        ("reels/almost.mp4", 9 * 60 + 59),
        ("reels/exact.mp4", 10 * 60),
        ("reels/expired.mp4", 10 * 60 + 1),
    ] {
        store
            .insert(BUCKET, path, &b"data"[..], now - chrono::Duration::seconds(age_secs))
            .unwrap();
    }

    let reaper = TempObjectReaper::new(store.clone(), BUCKET, ReaperConfig::default());
    let report = reaper
        .run_tick(now, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report, ReapReport { scanned: 3, deleted: 1 });
    assert!(store.get(BUCKET, "reels/almost.mp4").is_some());
    assert!(store.get(BUCKET, "reels/exact.mp4").is_some());
    assert!(store.get(BUCKET, "reels/expired.mp4").is_none());
}

#[tokio::test]
async fn test_pass_over_filesystem_store() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FsObjectStore::new(dir.path()));
    tokio::fs::create_dir_all(dir.path().join(BUCKET)).await.unwrap();
    tokio::fs::write(dir.path().join(BUCKET).join("fresh.jpg"), b"jpg")
        .await
        .unwrap();

    let reaper = TempObjectReaper::new(store.clone(), BUCKET, ReaperConfig::default());

    let report = reaper
        .run_tick(Utc::now(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.deleted, 0);

    let later = Utc::now() + chrono::Duration::minutes(11);
    let report = reaper
        .run_tick(later, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report, ReapReport { scanned: 1, deleted: 1 });
    assert!(store.list(BUCKET, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_scheduler_cleans_up_and_stops() {
    let store = Arc::new(CountingStore::new());
    store
        .inner()
        .insert(
            BUCKET,
            "stale.mp4",
            &b"x"[..],
            Utc::now() - chrono::Duration::minutes(30),
        )
        .unwrap();
    store
        .inner()
        .insert(BUCKET, "recent.mp4", &b"x"[..], Utc::now())
        .unwrap();

    let config = ReaperConfig {
        interval: Duration::from_millis(25),
        ..ReaperConfig::default()
    };
    let handle = TempObjectReaper::new(store.clone(), BUCKET, config).spawn();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while store.inner().get(BUCKET, "stale.mp4").is_some()
        && tokio::time::Instant::now() < deadline
    {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(handle.shutdown().await);
    assert!(store.inner().get(BUCKET, "stale.mp4").is_none());
    assert!(store.inner().get(BUCKET, "recent.mp4").is_some());

    let calls_after_stop = store.list_calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(store.list_calls.load(Ordering::SeqCst), calls_after_stop);
}

#[tokio::test]
async fn test_failed_listings_do_not_stop_the_scheduler() {
    let store = Arc::new(CountingStore::new());
    store
        .inner()
        .insert(
            BUCKET,
            "stale.mp4",
            &b"x"[..],
            Utc::now() - chrono::Duration::hours(2),
        )
        .unwrap();
    store.fail_next_lists(3);

    let config = ReaperConfig {
        interval: Duration::from_millis(15),
        ..ReaperConfig::default()
    };
    let handle = TempObjectReaper::new(store.clone(), BUCKET, config).spawn();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while store.inner().object_count(BUCKET) > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(handle.shutdown().await);
    assert!(store.list_calls.load(Ordering::SeqCst) >= 4);
    assert_eq!(store.deleted_paths(), vec!["stale.mp4"]);
}
