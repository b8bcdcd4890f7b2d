// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::types::OnChangePolicy;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [cache]
/// dir = "~/.cache/jobwait"
/// poll_min = "30s"
/// poll_max = "60s"
/// lookback = "7d"
///
/// [cache.cluster.doduo]
/// poll_min = "60s"
/// poll_max = "120s"
///
/// [state]
/// unlisted_timeout = "15m"
///
/// [submit]
/// retries = 5
/// retry_delay_min = "10s"
/// retry_delay_max = "60s"
/// onchange = "raise"
/// ```
///
/// Every section is optional. Durations are strings with a unit suffix
/// (`ms`, `s`, `m`, `h`, `d`).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub cache: RawCacheSection,

    #[serde(default)]
    pub state: RawStateSection,

    #[serde(default)]
    pub submit: RawSubmitSection,
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCacheSection {
    /// Directory holding one status file (and one lock file) per cluster.
    #[serde(default = "default_cache_dir")]
    pub dir: String,

    /// Lower bound of the randomized refresh interval.
    #[serde(default = "default_poll_min")]
    pub poll_min: String,

    /// Upper bound of the randomized refresh interval.
    #[serde(default = "default_poll_max")]
    pub poll_max: String,

    /// How far back the status query looks.
    #[serde(default = "default_lookback")]
    pub lookback: String,

    /// Pause before re-reading the cache when another caller holds the lock.
    #[serde(default = "default_lock_retry")]
    pub lock_retry: String,

    #[serde(default = "default_lock_attempts")]
    pub lock_attempts: u32,

    /// Per-cluster overrides of the refresh interval.
    #[serde(default)]
    pub cluster: BTreeMap<String, RawPollWindow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPollWindow {
    pub poll_min: String,
    pub poll_max: String,
}

fn default_cache_dir() -> String {
    "~/.cache/jobwait".to_string()
}

fn default_poll_min() -> String {
    "30s".to_string()
}

fn default_poll_max() -> String {
    "60s".to_string()
}

fn default_lookback() -> String {
    "7d".to_string()
}

fn default_lock_retry() -> String {
    "1s".to_string()
}

fn default_lock_attempts() -> u32 {
    120
}

impl Default for RawCacheSection {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            poll_min: default_poll_min(),
            poll_max: default_poll_max(),
            lookback: default_lookback(),
            lock_retry: default_lock_retry(),
            lock_attempts: default_lock_attempts(),
            cluster: BTreeMap::new(),
        }
    }
}

/// `[state]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStateSection {
    /// How long a job may be missing from every listing before it is failed.
    #[serde(default = "default_unlisted_timeout")]
    pub unlisted_timeout: String,

    /// Listings fetched earlier than `submission + time_margin` cannot end a job.
    #[serde(default = "default_time_margin")]
    pub time_margin: String,
}

fn default_unlisted_timeout() -> String {
    "15m".to_string()
}

fn default_time_margin() -> String {
    "5s".to_string()
}

impl Default for RawStateSection {
    fn default() -> Self {
        Self {
            unlisted_timeout: default_unlisted_timeout(),
            time_margin: default_time_margin(),
        }
    }
}

/// `[submit]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSubmitSection {
    /// Total number of submission attempts for transient failures.
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_delay_min")]
    pub retry_delay_min: String,

    #[serde(default = "default_retry_delay_max")]
    pub retry_delay_max: String,

    /// Default reconciliation policy; a request may override it.
    #[serde(default)]
    pub onchange: OnChangePolicy,
}

fn default_retries() -> u32 {
    5
}

fn default_retry_delay_min() -> String {
    "10s".to_string()
}

fn default_retry_delay_max() -> String {
    "60s".to_string()
}

impl Default for RawSubmitSection {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            retry_delay_min: default_retry_delay_min(),
            retry_delay_max: default_retry_delay_max(),
            onchange: OnChangePolicy::default(),
        }
    }
}

/// A closed interval from which randomized delays are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayWindow {
    pub min: Duration,
    pub max: Duration,
}

impl DelayWindow {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    /// Draw a uniformly distributed delay from the window.
    pub fn sample(&self) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        rand::rng().random_range(self.min..=self.max)
    }
}

/// Validated cache settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub poll: DelayWindow,
    pub lookback: Duration,
    pub lock_retry: Duration,
    pub lock_attempts: u32,
    pub clusters: BTreeMap<String, DelayWindow>,
}

impl CacheConfig {
    /// Refresh interval for a cluster; `None` is the default cluster.
    pub fn poll_for(&self, cluster: Option<&str>) -> DelayWindow {
        cluster
            .and_then(|name| self.clusters.get(name))
            .copied()
            .unwrap_or(self.poll)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StateConfig {
    pub unlisted_timeout: Duration,
    pub time_margin: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct SubmitConfig {
    pub retries: u32,
    pub retry_delay: DelayWindow,
    pub onchange: OnChangePolicy,
}

/// Validated configuration threaded through the cache and the controller.
///
/// Build it with `Config::try_from(RawConfigFile)` (see `validate.rs`) or
/// through [`crate::config::load_and_validate`].
#[derive(Debug, Clone)]
pub struct Config {
    pub cache: CacheConfig,
    pub state: StateConfig,
    pub submit: SubmitConfig,
}
