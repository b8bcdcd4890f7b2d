// src/exec/backend.rs

//! Pluggable scheduler backend abstraction.
//!
//! The status cache, the controller and the maintenance sweeps talk to a
//! `SchedulerBackend` instead of spawning `sacct`/`sbatch`/`scancel`
//! themselves. Production code uses [`crate::exec::SlurmBackend`]; tests
//! provide a fake that records calls and serves scripted listings.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use crate::errors::Result;

/// Boxed future returned by backend methods.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Job id → raw scheduler state label, as returned by one status query.
pub type Listing = BTreeMap<String, String>;

/// Everything needed to hand one job to the scheduler.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Job directory; the submission command runs with this as cwd.
    pub directory: PathBuf,
    /// Script fed to the submission command on stdin.
    pub wrapper: String,
    /// File names (relative to `directory`) for the job's stdout and stderr.
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    /// Shell snippet run right before the submission command.
    pub pre_submit: Option<String>,
}

/// Identity assigned by the scheduler to a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub job_id: String,
    pub cluster: Option<String>,
}

/// Why a submission attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Worth retrying (controller unreachable, timeouts, ...).
    Transient(String),
    /// Retrying will not help (bad request, missing binary, ...).
    Permanent(String),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Transient(msg) => write!(f, "transient: {msg}"),
            SubmitError::Permanent(msg) => write!(f, "permanent: {msg}"),
        }
    }
}

/// Trait abstracting the external batch scheduler.
pub trait SchedulerBackend: Send + Sync {
    /// List the states of jobs known to `cluster` within the lookback window.
    ///
    /// A failure here is a query failure, never "job unlisted".
    fn query<'a>(
        &'a self,
        cluster: Option<&'a str>,
        lookback: Duration,
    ) -> BackendFuture<'a, Result<Listing>>;

    fn submit<'a>(
        &'a self,
        request: &'a SubmitRequest,
    ) -> BackendFuture<'a, std::result::Result<Submission, SubmitError>>;

    fn cancel<'a>(
        &'a self,
        job_id: &'a str,
        cluster: Option<&'a str>,
    ) -> BackendFuture<'a, Result<()>>;

    /// Shell command equivalent to [`SchedulerBackend::cancel`], for reports.
    fn cancel_command(&self, job_id: &str, cluster: Option<&str>) -> String;
}
