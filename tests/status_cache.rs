// tests/status_cache.rs

mod common;

use std::sync::Arc;
use std::time::Duration;

use jobwait::cache::{cluster_key, entry, CacheEntry, RefreshLock, StatusCache, DEFAULT_CLUSTER_KEY};
use jobwait::clock::{Clock, SystemClock};
use jobwait::errors::JobwaitError;
use jobwait::types::Observation;

use crate::common::builders::ConfigBuilder;
use crate::common::{init_tracing, listing, with_timeout, FakeScheduler, ManualClock};

fn slow_poll(dir: &std::path::Path) -> ConfigBuilder {
    ConfigBuilder::new(dir).poll(Duration::from_secs(60), Duration::from_secs(120))
}

#[tokio::test]
async fn concurrent_callers_share_one_query() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeScheduler::new());
    fake.push_listing(listing(&[("1", "RUNNING"), ("2", "PENDING")]));
    fake.set_query_delay(Duration::from_millis(50));

    let config = slow_poll(dir.path()).build();
    let cache = Arc::new(StatusCache::new(fake.clone(), config.cache, Arc::new(SystemClock)));

    let mut handles = Vec::new();
    for i in 0..16 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let id = if i % 2 == 0 { "1" } else { "2" };
            cache.get_state(None, id).await
        }));
    }
    for handle in handles {
        let obs = with_timeout(handle).await.unwrap().unwrap();
        assert!(matches!(obs, Observation::Listed { .. }));
    }

    assert_eq!(fake.query_count(), 1);
    assert_eq!(cache.refresh_count(), 1);
}

#[tokio::test]
async fn second_instance_reuses_the_file_written_by_the_first() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeScheduler::new());
    fake.push_listing(listing(&[("1001", "RUNNING")]));
    let config = slow_poll(dir.path()).build();

    let first = StatusCache::new(fake.clone(), config.cache.clone(), Arc::new(SystemClock));
    let second = StatusCache::new(fake.clone(), config.cache.clone(), Arc::new(SystemClock));

    first.get_state(None, "1001").await.unwrap();
    let obs = second.get_state(None, "1001").await.unwrap();

    assert_eq!(
        obs,
        Observation::Listed {
            raw: "RUNNING".into(),
            fetched_at: obs.fetched_at()
        }
    );
    assert_eq!(fake.query_count(), 1);
    assert_eq!(second.refresh_count(), 0);
    assert!(entry::entry_path(dir.path(), "default").is_file());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_instances_query_once_per_ttl_window() {
    init_tracing();
    for trial in 0..100 {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeScheduler::new());
        fake.push_listing(listing(&[("1", "RUNNING")]));
        let config = slow_poll(dir.path())
            .lock(Duration::from_millis(1), 1000)
            .build();

        let first = Arc::new(StatusCache::new(fake.clone(), config.cache.clone(), Arc::new(SystemClock)));
        let second = Arc::new(StatusCache::new(fake.clone(), config.cache.clone(), Arc::new(SystemClock)));

        let a = tokio::spawn(async move { first.get_state(None, "1").await });
        let b = tokio::spawn(async move { second.get_state(None, "1").await });
        with_timeout(a).await.unwrap().unwrap();
        with_timeout(b).await.unwrap().unwrap();

        assert_eq!(fake.query_count(), 1, "trial {trial}");
    }
}

#[tokio::test]
async fn absent_job_is_unlisted() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeScheduler::new());
    fake.push_listing(listing(&[("1", "RUNNING")]));
    let cache = StatusCache::new(fake, slow_poll(dir.path()).build().cache, Arc::new(SystemClock));

    assert!(matches!(
        cache.get_state(None, "999").await.unwrap(),
        Observation::Unlisted { .. }
    ));
}

#[tokio::test]
async fn entry_is_refreshed_only_after_its_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeScheduler::new());
    fake.push_listing(listing(&[("1", "PENDING")]));
    fake.push_listing(listing(&[("1", "RUNNING")]));
    let clock = Arc::new(ManualClock::at_epoch());
    let config = ConfigBuilder::new(dir.path())
        .poll(Duration::from_secs(30), Duration::from_secs(60))
        .build();
    let cache = StatusCache::new(fake.clone(), config.cache, clock.clone());

    let first = cache.get_state(None, "1").await.unwrap();
    assert!(matches!(first, Observation::Listed { ref raw, .. } if raw == "PENDING"));

    clock.advance(Duration::from_secs(29));
    let again = cache.get_state(None, "1").await.unwrap();
    assert_eq!(again, first);
    assert_eq!(fake.query_count(), 1);

    clock.advance(Duration::from_secs(32));
    let later = cache.get_state(None, "1").await.unwrap();
    assert!(matches!(later, Observation::Listed { ref raw, .. } if raw == "RUNNING"));
    assert_eq!(fake.query_count(), 2);
    assert_eq!(later.fetched_at(), clock.now());
}

#[tokio::test]
async fn clusters_are_cached_separately() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeScheduler::new());
    fake.push_listing(listing(&[("1", "RUNNING")]));
    let config = slow_poll(dir.path())
        .cluster_poll("doduo", Duration::from_secs(60), Duration::from_secs(60))
        .build();
    let cache = StatusCache::new(fake.clone(), config.cache, Arc::new(SystemClock));

    cache.get_state(None, "1").await.unwrap();
    cache.get_state(Some("doduo"), "1").await.unwrap();
    cache.get_state(Some("doduo"), "1").await.unwrap();

    assert_eq!(fake.query_count(), 2);
    assert!(entry::entry_path(dir.path(), &cluster_key(Some("doduo"))).is_file());
    assert_eq!(
        cache.poll_window(Some("doduo")).min,
        Duration::from_secs(60)
    );
}

#[test]
fn cluster_keys_do_not_collide() {
    assert_eq!(cluster_key(None), DEFAULT_CLUSTER_KEY);
    assert_eq!(cluster_key(Some("  ")), DEFAULT_CLUSTER_KEY);
    assert_eq!(cluster_key(Some("doduo")), "c-doduo");
    assert_ne!(cluster_key(Some("default")), cluster_key(None));
    assert_ne!(cluster_key(Some("a.b")), cluster_key(Some("a_b")));
    assert_eq!(cluster_key(Some("a.b")), "c-a_2eb");
    assert_eq!(cluster_key(Some("a_b")), "c-a_5fb");
}

#[tokio::test]
async fn cluster_named_default_gets_its_own_listing() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeScheduler::new());
    fake.push_listing(listing(&[("1", "RUNNING")]));
    let cache = StatusCache::new(fake.clone(), slow_poll(dir.path()).build().cache, Arc::new(SystemClock));

    cache.get_state(None, "1").await.unwrap();
    cache.get_state(Some("default"), "1").await.unwrap();

    assert_eq!(fake.query_count(), 2);
    assert!(entry::entry_path(dir.path(), DEFAULT_CLUSTER_KEY).is_file());
    assert!(entry::entry_path(dir.path(), "c-default").is_file());
}

#[tokio::test]
async fn query_failure_leaves_the_cache_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeScheduler::new());
    fake.push_listing(listing(&[("1", "RUNNING")]));
    fake.fail_queries(1);
    let cache = StatusCache::new(fake.clone(), slow_poll(dir.path()).build().cache, Arc::new(SystemClock));

    let err = cache.get_state(None, "1").await.unwrap_err();
    assert!(matches!(err, JobwaitError::QueryFailure(_)));
    assert!(!entry::entry_path(dir.path(), "default").exists());

    let obs = cache.get_state(None, "1").await.unwrap();
    assert!(matches!(obs, Observation::Listed { .. }));
    assert_eq!(fake.query_count(), 2);
}

#[tokio::test]
async fn busy_lock_gives_up_after_the_configured_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeScheduler::new());
    let config = slow_poll(dir.path())
        .lock(Duration::from_millis(2), 3)
        .build();
    let cache = StatusCache::new(fake.clone(), config.cache, Arc::new(SystemClock));

    let held = RefreshLock::try_acquire(&entry::lock_path(dir.path(), "default"))
        .unwrap()
        .expect("lock is free");

    let err = with_timeout(cache.get_state(None, "1")).await.unwrap_err();
    assert!(matches!(err, JobwaitError::QueryFailure(ref msg) if msg.contains("3 attempts")), "{err}");
    assert_eq!(fake.query_count(), 0);

    drop(held);
    assert!(cache.get_state(None, "1").await.is_ok());
    assert_eq!(fake.query_count(), 1);
}

#[tokio::test]
async fn waiter_picks_up_entry_refreshed_while_it_waited_for_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeScheduler::new());
    let config = slow_poll(dir.path())
        .lock(Duration::from_millis(10), 100)
        .build();
    let cache = Arc::new(StatusCache::new(fake.clone(), config.cache, Arc::new(SystemClock)));

    let held = RefreshLock::try_acquire(&entry::lock_path(dir.path(), "default"))
        .unwrap()
        .expect("lock is free");

    let waiter = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get_state(None, "77").await })
    };

    // Play the other process: publish a fresh entry, then release the lock.
    tokio::time::sleep(Duration::from_millis(30)).await;
    let now = SystemClock.now();
    let published = CacheEntry {
        cluster: "default".into(),
        fetched_at: now,
        next_refresh: now + chrono::Duration::seconds(120),
        listing: listing(&[("77", "COMPLETED")]),
    };
    std::fs::write(
        entry::entry_path(dir.path(), "default"),
        published.to_toml().unwrap(),
    )
    .unwrap();
    drop(held);

    let obs = with_timeout(waiter).await.unwrap().unwrap();
    assert!(matches!(obs, Observation::Listed { ref raw, .. } if raw == "COMPLETED"));
    assert_eq!(fake.query_count(), 0);
}
