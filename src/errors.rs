// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobwaitError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// The job script cannot be submitted as is. Never retried.
    #[error("Invalid job script {script:?}: {reason}")]
    Validation { script: PathBuf, reason: String },

    /// The scheduler rejected the submission for a non-transient reason.
    #[error("Submission failed in {directory:?}: {message}")]
    Submission { directory: PathBuf, message: String },

    #[error("Submission in {directory:?} failed after {attempts} attempts (log: {log:?})")]
    SubmissionExhausted {
        directory: PathBuf,
        log: PathBuf,
        attempts: u32,
    },

    /// The status query could not be run or its output could not be parsed.
    #[error("Scheduler query failed: {0}")]
    QueryFailure(String),

    /// The job log and the scheduler (or the inputs) disagree in a way that
    /// is never repaired automatically.
    #[error("Inconsistent job in {directory:?} (log: {log:?}): {detail}")]
    Inconsistency {
        directory: PathBuf,
        log: PathBuf,
        detail: String,
    },

    #[error("Waiting for the job in {directory:?} was interrupted")]
    Interrupted { directory: PathBuf },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, JobwaitError>;
