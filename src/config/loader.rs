// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{Config, RawConfigFile};
use crate::errors::{JobwaitError, Result};

/// Environment variables that override individual config keys.
///
/// The CLI is the only caller that reads the process environment; library
/// code always receives an explicit [`Config`].
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("JOBWAIT_CACHE_DIR", "cache.dir"),
    ("JOBWAIT_POLL_MIN", "cache.poll_min"),
    ("JOBWAIT_POLL_MAX", "cache.poll_max"),
    ("JOBWAIT_LOOKBACK", "cache.lookback"),
    ("JOBWAIT_UNLISTED_TIMEOUT", "state.unlisted_timeout"),
    ("JOBWAIT_TIME_MARGIN", "state.time_margin"),
    ("JOBWAIT_SUBMIT_RETRIES", "submit.retries"),
    ("JOBWAIT_RETRY_DELAY_MIN", "submit.retry_delay_min"),
    ("JOBWAIT_RETRY_DELAY_MAX", "submit.retry_delay_max"),
    ("JOBWAIT_ONCHANGE", "submit.onchange"),
];

/// Load a configuration file and return the raw `RawConfigFile`.
///
/// A missing file is not an error: every section has defaults. This only
/// performs TOML deserialization; see [`load_and_validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = ?path, "no config file; using defaults");
        return Ok(RawConfigFile::default());
    }
    let contents = fs::read_to_string(path)?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Apply `JOBWAIT_*` overrides taken from `lookup` onto a raw config.
pub fn apply_env_overrides<F>(raw: &mut RawConfigFile, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    for (var, key) in ENV_OVERRIDES {
        let Some(value) = lookup(var) else {
            continue;
        };
        debug!(var, key, value = %value, "config override from environment");
        match *key {
            "cache.dir" => raw.cache.dir = value,
            "cache.poll_min" => raw.cache.poll_min = value,
            "cache.poll_max" => raw.cache.poll_max = value,
            "cache.lookback" => raw.cache.lookback = value,
            "state.unlisted_timeout" => raw.state.unlisted_timeout = value,
            "state.time_margin" => raw.state.time_margin = value,
            "submit.retries" => {
                raw.submit.retries = value.trim().parse().map_err(|e| {
                    JobwaitError::ConfigError(format!("{var}={value:?}: {e}"))
                })?;
            }
            "submit.retry_delay_min" => raw.submit.retry_delay_min = value,
            "submit.retry_delay_max" => raw.submit.retry_delay_max = value,
            "submit.onchange" => {
                raw.submit.onchange = value
                    .parse()
                    .map_err(|e: String| JobwaitError::ConfigError(format!("{var}: {e}")))?;
            }
            _ => unreachable!("ENV_OVERRIDES lists only handled keys"),
        }
    }
    Ok(())
}

/// Replace a leading `~` with `home`.
pub fn expand_home(dir: &str, home: Option<&Path>) -> PathBuf {
    match (dir.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(dir),
    }
}

/// Load a config file, apply environment overrides and validate.
///
/// This is the entry point used by the CLI:
///
/// - Reads TOML (optional).
/// - Applies `JOBWAIT_*` environment overrides.
/// - Expands `~` in `[cache].dir` using `HOME`.
/// - Checks durations, windows and counts.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config> {
    let mut raw = load_from_path(&path)?;
    apply_env_overrides(&mut raw, |var| std::env::var(var).ok())?;
    let home = std::env::var_os("HOME").map(PathBuf::from);
    raw.cache.dir = expand_home(&raw.cache.dir, home.as_deref())
        .to_string_lossy()
        .into_owned();
    Config::try_from(raw)
}

/// Config file looked up in the current working directory by default.
pub const DEFAULT_CONFIG_FILE: &str = "jobwait.toml";
