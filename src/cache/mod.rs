// src/cache/mod.rs

//! Shared scheduler status cache.
//!
//! One [`CacheEntry`] per cluster serves every waiter in the process (and,
//! through the cache directory, every cooperating process). A refresh only
//! happens when the entry is past its randomized `next_refresh`, and only by
//! the caller that wins the cluster's refresh lock:
//!
//! 1. fresh in-memory entry → served without locking;
//! 2. stale → take the in-process gate for the cluster, then re-check memory
//!    and the on-disk entry (another process may just have refreshed);
//! 3. still stale → try the cross-process `flock`; the winner reads the
//!    on-disk entry once more, then queries the backend and atomically
//!    replaces the entry, losers sleep briefly and go back to step 2.
//!
//! Query failures are returned to the caller and leave the cache untouched,
//! so the next poll simply tries again.

pub mod entry;
pub mod lock;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{CacheConfig, DelayWindow};
use crate::errors::{JobwaitError, Result};
use crate::exec::SchedulerBackend;
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::Observation;

pub use entry::{cluster_key, CacheEntry, DEFAULT_CLUSTER_KEY};
pub use lock::RefreshLock;

pub struct StatusCache {
    backend: Arc<dyn SchedulerBackend>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    queries: AtomicU64,
}

impl std::fmt::Debug for StatusCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusCache")
            .field("dir", &self.config.dir)
            .field("queries", &self.refresh_count())
            .finish_non_exhaustive()
    }
}

impl StatusCache {
    pub fn new(
        backend: Arc<dyn SchedulerBackend>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            config,
            clock,
            entries: RwLock::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            queries: AtomicU64::new(0),
        }
    }

    /// Number of backend queries issued by this instance.
    pub fn refresh_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    /// Upper bound of the refresh interval, the natural pacing for pollers.
    pub fn poll_window(&self, cluster: Option<&str>) -> DelayWindow {
        self.config.poll_for(cluster)
    }

    /// Look up `job_id` in the cluster's listing, refreshing it if needed.
    pub async fn get_state(&self, cluster: Option<&str>, job_id: &str) -> Result<Observation> {
        let entry = self.entry(cluster).await?;
        let fetched_at = entry.fetched_at;
        Ok(match entry.listing.get(job_id) {
            Some(raw) => Observation::Listed {
                raw: raw.clone(),
                fetched_at,
            },
            None => Observation::Unlisted { fetched_at },
        })
    }

    /// Current (fresh) entry for a cluster.
    pub async fn entry(&self, cluster: Option<&str>) -> Result<Arc<CacheEntry>> {
        let key = cluster_key(cluster);

        if let Some(entry) = self.fresh_in_memory(&key).await {
            return Ok(entry);
        }

        let gate = self.gate(&key);
        let _guard = gate.lock().await;

        let lock_path = entry::lock_path(&self.config.dir, &key);
        for attempt in 0..self.config.lock_attempts {
            if let Some(entry) = self.fresh_in_memory(&key).await {
                return Ok(entry);
            }
            if let Some(entry) = self.fresh_on_disk(&key).await {
                return Ok(entry);
            }

            let lock = RefreshLock::try_acquire(&lock_path).map_err(JobwaitError::from)?;
            match lock {
                Some(lock) => {
                    // The previous holder may have published between the
                    // disk check above and winning the lock.
                    if let Some(entry) = self.fresh_on_disk(&key).await {
                        drop(lock);
                        return Ok(entry);
                    }
                    let result = self.refresh(cluster, &key).await;
                    drop(lock);
                    return result;
                }
                None => {
                    debug!(
                        cluster = %key,
                        attempt,
                        "cache refresh in progress elsewhere; waiting"
                    );
                    let retry = DelayWindow {
                        min: self.config.lock_retry / 2,
                        max: self.config.lock_retry,
                    };
                    tokio::time::sleep(retry.sample()).await;
                }
            }
        }

        Err(JobwaitError::QueryFailure(format!(
            "cache lock {:?} still busy after {} attempts",
            lock_path, self.config.lock_attempts
        )))
    }

    fn gate(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        gates
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn fresh_in_memory(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries.get(key).filter(|e| e.is_fresh(now)).cloned()
    }

    async fn fresh_on_disk(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let path = entry::entry_path(&self.config.dir, key);
        let entry = match CacheEntry::read(&path) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!(path = ?path, error = %e, "ignoring unreadable cache file");
                return None;
            }
        };
        if !entry.is_fresh(self.clock.now()) {
            return None;
        }
        debug!(cluster = %key, fetched_at = %entry.fetched_at, "using cache refreshed by another caller");
        let entry = Arc::new(entry);
        self.entries
            .write()
            .await
            .insert(key.to_string(), entry.clone());
        Some(entry)
    }

    async fn refresh(&self, cluster: Option<&str>, key: &str) -> Result<Arc<CacheEntry>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let listing = self.backend.query(cluster, self.config.lookback).await?;

        let fetched_at = self.clock.now();
        let ttl = self.config.poll_for(cluster).sample();
        let entry = CacheEntry {
            cluster: key.to_string(),
            fetched_at,
            next_refresh: next_refresh(fetched_at, ttl),
            listing,
        };

        let path = entry::entry_path(&self.config.dir, key);
        let text = entry.to_toml()?;
        RealFileSystem.write_atomic(&path, text.as_bytes())?;

        info!(
            cluster = %key,
            jobs = entry.listing.len(),
            next_refresh = %entry.next_refresh,
            "scheduler status cache refreshed"
        );

        let entry = Arc::new(entry);
        self.entries
            .write()
            .await
            .insert(key.to_string(), entry.clone());
        Ok(entry)
    }
}

fn next_refresh(fetched_at: DateTime<Utc>, ttl: std::time::Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|d| fetched_at.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
