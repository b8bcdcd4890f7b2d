// src/config/validate.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::config::model::{
    CacheConfig, Config, DelayWindow, RawConfigFile, RawPollWindow, StateConfig, SubmitConfig,
};
use crate::errors::{JobwaitError, Result};

impl TryFrom<RawConfigFile> for Config {
    type Error = JobwaitError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let cache = validate_cache(&raw)?;
        let state = validate_state(&raw)?;
        let submit = validate_submit(&raw)?;
        Ok(Config {
            cache,
            state,
            submit,
        })
    }
}

fn duration_field(section: &str, key: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .map_err(|e| JobwaitError::ConfigError(format!("[{section}].{key}: {e}")))
}

fn window(section: &str, min_key: &str, min: &str, max_key: &str, max: &str) -> Result<DelayWindow> {
    let min_d = duration_field(section, min_key, min)?;
    let max_d = duration_field(section, max_key, max)?;
    if min_d > max_d {
        return Err(JobwaitError::ConfigError(format!(
            "[{section}].{min_key} ({min}) must not exceed [{section}].{max_key} ({max})"
        )));
    }
    Ok(DelayWindow {
        min: min_d,
        max: max_d,
    })
}

fn validate_cache(cfg: &RawConfigFile) -> Result<CacheConfig> {
    let raw = &cfg.cache;

    if raw.dir.trim().is_empty() {
        return Err(JobwaitError::ConfigError(
            "[cache].dir must not be empty".to_string(),
        ));
    }
    if raw.lock_attempts == 0 {
        return Err(JobwaitError::ConfigError(
            "[cache].lock_attempts must be >= 1 (got 0)".to_string(),
        ));
    }

    let poll = window("cache", "poll_min", &raw.poll_min, "poll_max", &raw.poll_max)?;
    if poll.max.is_zero() {
        return Err(JobwaitError::ConfigError(
            "[cache].poll_max must be greater than zero".to_string(),
        ));
    }

    let mut clusters = BTreeMap::new();
    for (name, RawPollWindow { poll_min, poll_max }) in raw.cluster.iter() {
        let section = format!("cache.cluster.{name}");
        clusters.insert(
            name.clone(),
            window(&section, "poll_min", poll_min, "poll_max", poll_max)?,
        );
    }

    Ok(CacheConfig {
        dir: PathBuf::from(raw.dir.trim()),
        poll,
        lookback: duration_field("cache", "lookback", &raw.lookback)?,
        lock_retry: duration_field("cache", "lock_retry", &raw.lock_retry)?,
        lock_attempts: raw.lock_attempts,
        clusters,
    })
}

fn validate_state(cfg: &RawConfigFile) -> Result<StateConfig> {
    Ok(StateConfig {
        unlisted_timeout: duration_field(
            "state",
            "unlisted_timeout",
            &cfg.state.unlisted_timeout,
        )?,
        time_margin: duration_field("state", "time_margin", &cfg.state.time_margin)?,
    })
}

fn validate_submit(cfg: &RawConfigFile) -> Result<SubmitConfig> {
    let raw = &cfg.submit;
    if raw.retries == 0 {
        return Err(JobwaitError::ConfigError(
            "[submit].retries must be >= 1 (got 0)".to_string(),
        ));
    }
    let retry_delay = window(
        "submit",
        "retry_delay_min",
        &raw.retry_delay_min,
        "retry_delay_max",
        &raw.retry_delay_max,
    )?;
    Ok(SubmitConfig {
        retries: raw.retries,
        retry_delay,
        onchange: raw.onchange,
    })
}
