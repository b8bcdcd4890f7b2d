// src/joblog/mod.rs

//! Per-directory job log store.
//!
//! Every job directory holds at most one job and a fixed set of files:
//!
//! - `jobwait.log`: the [`JobRecord`] (TOML, replaced atomically on every write)
//! - `jobwait.out` / `jobwait.err`: the job's stdout / stderr
//! - `jobwait.ret`: the job script's exit code, written by the wrapper

pub mod record;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};

use crate::errors::{JobwaitError, Result};
use crate::fs::FileSystem;

pub use record::{HistoryError, JobRecord, StateEntry, LOG_FORMAT};

pub const LOG_FILE: &str = "jobwait.log";
pub const STDOUT_FILE: &str = "jobwait.out";
pub const STDERR_FILE: &str = "jobwait.err";
pub const RETURN_CODE_FILE: &str = "jobwait.ret";

/// File names a job script must not use.
pub const RESERVED_FILES: &[&str] = &[LOG_FILE, STDOUT_FILE, STDERR_FILE, RETURN_CODE_FILE];

pub fn log_path(directory: &Path) -> PathBuf {
    directory.join(LOG_FILE)
}

#[derive(Debug, Clone)]
pub struct JobLogStore {
    fs: Arc<dyn FileSystem>,
}

impl JobLogStore {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Load the record of `directory`, if a job was ever submitted there.
    ///
    /// A log that exists but cannot be parsed is an inconsistency: it is
    /// reported, never overwritten.
    pub fn load(&self, directory: &Path) -> Result<Option<JobRecord>> {
        let path = log_path(directory);
        if !self.fs.exists(&path) {
            return Ok(None);
        }
        let text = self.fs.read_to_string(&path)?;
        let record = parse_record(&text).map_err(|detail| JobwaitError::Inconsistency {
            directory: directory.to_path_buf(),
            log: path.clone(),
            detail,
        })?;
        debug!(log = ?path, state = %record.state(), "loaded job log");
        Ok(Some(record))
    }

    pub fn save(&self, record: &JobRecord) -> Result<()> {
        let path = log_path(&record.directory);
        let text = toml::to_string_pretty(record)?;
        self.fs
            .write_atomic(&path, text.as_bytes())
            .with_context(|| format!("writing job log {:?}", path))?;
        debug!(log = ?path, state = %record.state(), "saved job log");
        Ok(())
    }

    /// Remove the log and the capture files of a previous submission.
    pub fn discard(&self, directory: &Path) -> Result<()> {
        for name in [RETURN_CODE_FILE, STDOUT_FILE, STDERR_FILE, LOG_FILE] {
            self.fs.remove_file(&directory.join(name))?;
        }
        info!(dir = ?directory, "discarded previous job log");
        Ok(())
    }

    /// Exit code recorded by the wrapper, if it is there and readable.
    pub fn read_return_code(&self, directory: &Path) -> Option<i32> {
        let path = directory.join(RETURN_CODE_FILE);
        let text = self.fs.read_to_string(&path).ok()?;
        text.trim().parse().ok()
    }
}

/// Parse a log, checking its version marker.
pub fn parse_record(text: &str) -> std::result::Result<JobRecord, String> {
    let record: JobRecord = toml::from_str(text).map_err(|e| format!("unreadable job log: {e}"))?;
    if record.format != LOG_FORMAT {
        return Err(format!(
            "unsupported job log format {} (expected {})",
            record.format, LOG_FORMAT
        ));
    }
    Ok(record)
}
