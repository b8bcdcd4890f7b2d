// src/exec/mod.rs

//! Scheduler process layer.
//!
//! This is the only place that spawns the scheduler's command line tools,
//! using `tokio::process::Command`.
//!
//! - [`backend`] provides the `SchedulerBackend` trait (query / submit /
//!   cancel) that the cache, controller and sweeps depend on, and which tests
//!   replace with a fake implementation.
//! - [`slurm`] is the production backend built on `sacct`, `sbatch` and
//!   `scancel`.
//! - [`parse`] turns their text output into listings and job ids.
//! - [`process`] runs one command and captures its output.

pub mod backend;
pub mod parse;
pub mod process;
pub mod slurm;

pub use backend::{
    BackendFuture, Listing, SchedulerBackend, Submission, SubmitError, SubmitRequest,
};
pub use slurm::SlurmBackend;
