// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::types::OnChangePolicy;

/// Command-line arguments for `jobwait`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobwait",
    version,
    about = "Submit batch jobs once and wait for them, across restarts.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). A missing file means defaults.
    #[arg(long, value_name = "PATH", default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBWAIT_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Submit the job of a directory (at most once) and wait for it.
    Wait(WaitArgs),

    /// Print (or, with --commit, run) scancel for unfinished jobs.
    CancelJobs(SweepArgs),

    /// Print (or, with --commit, run) rm -rf for failed or cancelled jobs.
    RemoveJobs(SweepArgs),

    /// Print the effective configuration.
    CheckConfig,
}

#[derive(Debug, Clone, Args)]
pub struct WaitArgs {
    /// Job directory.
    pub directory: PathBuf,

    /// Job script, relative to the job directory.
    #[arg(long, value_name = "NAME", default_value = "slurmjob.sh")]
    pub script: String,

    /// Input digest. Computed from the job script and --input files when
    /// omitted.
    #[arg(long, value_name = "DIGEST")]
    pub digest: Option<String>,

    /// Extra input file folded into the computed digest.
    #[arg(long = "input", value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// What to do when the inputs changed since the last submission.
    #[arg(long, value_name = "POLICY")]
    pub onchange: Option<OnChangePolicy>,

    /// Output the job must produce (checked under onchange=ignore).
    #[arg(long = "out", value_name = "PATH")]
    pub outputs: Vec<PathBuf>,

    /// Shell snippet run before sbatch, e.g. `module swap cluster/doduo`.
    #[arg(long, value_name = "CMD")]
    pub rc: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct SweepArgs {
    /// Directories to search recursively (default: current directory).
    pub paths: Vec<PathBuf>,

    /// Act instead of only printing the commands.
    #[arg(short, long)]
    pub commit: bool,

    /// Select all jobs, not only the default selection.
    #[arg(short, long)]
    pub all: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Filter directive understood by `EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
