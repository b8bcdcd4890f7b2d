// src/config/mod.rs

//! Configuration loading and validation for jobwait.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file and environment overrides (`loader.rs`).
//! - Turn raw strings into durations and windows (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::{format_duration, parse_duration};
pub use loader::{
    apply_env_overrides, expand_home, load_and_validate, load_from_path,
    DEFAULT_CONFIG_FILE,
};
pub use model::{
    CacheConfig, Config, DelayWindow, RawConfigFile, StateConfig, SubmitConfig,
};
