// src/maintenance/mod.rs

//! Cleanup sweeps over job directories.
//!
//! Both sweeps only print shell commands unless asked to commit, and a log
//! that cannot be read never stops a sweep: it is reported as `unknown`.

pub mod discover;
pub mod sweep;

pub use discover::{discover_logs, Discovery};
pub use sweep::{cancel_sweep, remove_sweep, SweepOptions, SweepReport};
