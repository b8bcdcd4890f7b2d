// src/logging.rs

//! Logging setup for `jobwait` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `JOBWAIT_LOG` environment variable, either a bare level ("debug") or
//!    full filter directives ("jobwait::cache=trace,info")
//! 3. default to `info`
//!
//! Logs go to STDERR. Stdout is reserved for sweep reports, which are meant
//! to be piped into a shell or reviewed as a script.

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV: &str = "JOBWAIT_LOG";

/// Initialise the global logging subscriber.
///
/// Call once at startup; a second call returns an error instead of panicking.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => EnvFilter::new(lvl.as_directive()),
        None => filter_from_env()?,
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {e}"))
}

fn filter_from_env() -> Result<EnvFilter> {
    match std::env::var(LOG_ENV) {
        Ok(raw) if !raw.trim().is_empty() => EnvFilter::try_new(raw.trim())
            .with_context(|| format!("parsing {LOG_ENV}={raw:?}")),
        _ => Ok(EnvFilter::new("info")),
    }
}
