#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use jobwait::config::{CacheConfig, Config, DelayWindow, StateConfig, SubmitConfig};
use jobwait::exec::Submission;
use jobwait::joblog::{JobLogStore, JobRecord};
use jobwait::types::{JobState, OnChangePolicy};

/// Builder for `Config` with millisecond-scale timings, so that polling
/// tests finish quickly on the real clock.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: Config {
                cache: CacheConfig {
                    dir: cache_dir.into(),
                    poll: window_ms(5, 10),
                    lookback: Duration::from_secs(3600),
                    lock_retry: Duration::from_millis(5),
                    lock_attempts: 200,
                    clusters: BTreeMap::new(),
                },
                state: StateConfig {
                    unlisted_timeout: Duration::from_secs(60),
                    time_margin: Duration::ZERO,
                },
                submit: SubmitConfig {
                    retries: 3,
                    retry_delay: window_ms(1, 2),
                    onchange: OnChangePolicy::Raise,
                },
            },
        }
    }

    pub fn poll(mut self, min: Duration, max: Duration) -> Self {
        self.config.cache.poll = DelayWindow { min, max };
        self
    }

    pub fn cluster_poll(mut self, cluster: &str, min: Duration, max: Duration) -> Self {
        self.config
            .cache
            .clusters
            .insert(cluster.to_string(), DelayWindow { min, max });
        self
    }

    pub fn lock(mut self, retry: Duration, attempts: u32) -> Self {
        self.config.cache.lock_retry = retry;
        self.config.cache.lock_attempts = attempts;
        self
    }

    pub fn unlisted_timeout(mut self, timeout: Duration) -> Self {
        self.config.state.unlisted_timeout = timeout;
        self
    }

    pub fn time_margin(mut self, margin: Duration) -> Self {
        self.config.state.time_margin = margin;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.config.submit.retries = retries;
        self
    }

    pub fn onchange(mut self, policy: OnChangePolicy) -> Self {
        self.config.submit.onchange = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

pub fn window_ms(min: u64, max: u64) -> DelayWindow {
    DelayWindow {
        min: Duration::from_millis(min),
        max: Duration::from_millis(max),
    }
}

/// Builder for a `JobRecord` as a previous run would have left it.
pub struct JobRecordBuilder {
    record: JobRecord,
}

impl JobRecordBuilder {
    /// A job submitted an hour ago with digest `"d1"`.
    pub fn new(directory: impl Into<PathBuf>, job_id: &str) -> Self {
        let submitted_at = Utc::now() - chrono::Duration::hours(1);
        Self {
            record: JobRecord::submitted(
                directory,
                "d1",
                Submission {
                    job_id: job_id.to_string(),
                    cluster: None,
                },
                submitted_at,
            ),
        }
    }

    pub fn digest(mut self, digest: &str) -> Self {
        self.record.input_digest = digest.to_string();
        self
    }

    pub fn cluster(mut self, cluster: &str) -> Self {
        self.record.cluster = Some(cluster.to_string());
        self
    }

    pub fn submitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.record.submitted_at = Some(at);
        self.record.history[0].at = at;
        self
    }

    /// Append a state, one second after the previous entry.
    pub fn state(mut self, state: JobState) -> Self {
        let at = self.record.history.last().map(|e| e.at).unwrap_or_else(Utc::now)
            + chrono::Duration::seconds(1);
        self.record.push_state(at, state).unwrap();
        self
    }

    pub fn return_code(mut self, code: i32) -> Self {
        self.record.return_code = Some(code);
        self
    }

    pub fn build(self) -> JobRecord {
        self.record
    }

    /// Build and save through `store`.
    pub fn save(self, store: &JobLogStore) -> JobRecord {
        let record = self.build();
        store.save(&record).unwrap();
        record
    }
}

/// Write an executable job script (shebang + `body`) into `dir`.
pub fn write_job_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(&path, format!("#!/usr/bin/env bash\n{body}")).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}
