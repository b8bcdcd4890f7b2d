// src/lib.rs

pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod controller;
pub mod digest;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod joblog;
pub mod logging;
pub mod maintenance;
pub mod state;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::StatusCache;
use crate::cli::{CliArgs, Command, SweepArgs, WaitArgs};
use crate::clock::SystemClock;
use crate::config::{format_duration, load_and_validate, Config, DelayWindow};
use crate::controller::{Controller, JobRequest};
use crate::exec::{SchedulerBackend, SlurmBackend};
use crate::fs::RealFileSystem;
use crate::joblog::JobLogStore;
use crate::maintenance::{SweepOptions, SweepReport};

/// Everything a command needs, built once from the validated config.
struct Services {
    backend: Arc<dyn SchedulerBackend>,
    cache: Arc<StatusCache>,
    store: JobLogStore,
}

impl Services {
    fn new(config: &Config) -> Self {
        let backend: Arc<dyn SchedulerBackend> = Arc::new(SlurmBackend::new());
        let cache = Arc::new(StatusCache::new(
            backend.clone(),
            config.cache.clone(),
            Arc::new(SystemClock),
        ));
        let store = JobLogStore::new(Arc::new(RealFileSystem));
        Self {
            backend,
            cache,
            store,
        }
    }
}

/// High-level entry point used by `main.rs`.
///
/// Returns whether the command succeeded; for `wait` this means the job
/// completed successfully.
pub async fn run(args: CliArgs) -> Result<bool> {
    let config = load_and_validate(&args.config)?;
    debug!(config = ?config, "configuration loaded");

    match args.command {
        Command::CheckConfig => {
            print_config(&args.config, &config);
            Ok(true)
        }
        Command::Wait(wait) => run_wait(&config, wait).await,
        Command::CancelJobs(sweep) => {
            let services = Services::new(&config);
            let report = maintenance::cancel_sweep(
                &services.store,
                &services.cache,
                services.backend.as_ref(),
                &sweep_options(sweep),
            )
            .await;
            print_report(&report);
            Ok(true)
        }
        Command::RemoveJobs(sweep) => {
            let services = Services::new(&config);
            let report = maintenance::remove_sweep(&services.store, &sweep_options(sweep));
            print_report(&report);
            Ok(true)
        }
    }
}

async fn run_wait(config: &Config, args: WaitArgs) -> Result<bool> {
    let services = Services::new(config);
    let job_script = args.directory.join(&args.script);
    let input_digest = match args.digest {
        Some(digest) => digest,
        None => {
            let inputs = std::iter::once(job_script.clone()).chain(args.inputs.iter().cloned());
            digest::compute_input_digest(inputs)?
        }
    };

    // Ctrl-C stops waiting; the job itself keeps running.
    let shutdown = CancellationToken::new();
    {
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            token.cancel();
        });
    }

    let controller = Controller::new(
        services.backend,
        services.cache,
        services.store,
        Arc::new(SystemClock),
        config,
        shutdown,
    );
    let request = JobRequest {
        onchange: args.onchange,
        outputs: args.outputs,
        pre_submit: args.rc,
        ..JobRequest::new(args.directory, job_script, input_digest)
    };

    let realization = controller.realize(&request).await?;
    info!(
        dir = ?request.directory,
        job_id = %realization.job_id,
        state = %realization.state,
        return_code = ?realization.return_code,
        "job finished"
    );
    if let Some(diagnostic) = &realization.diagnostic {
        eprintln!("{}: {diagnostic}", request.directory.display());
    }
    Ok(realization.state.is_success())
}

fn sweep_options(args: SweepArgs) -> SweepOptions {
    SweepOptions {
        roots: args.paths,
        commit: args.commit,
        include_all: args.all,
    }
}

fn print_report(report: &SweepReport) {
    for line in &report.lines {
        println!("{line}");
    }
}

fn print_window(name: &str, window: &DelayWindow) {
    println!(
        "  {name} = {} .. {}",
        format_duration(window.min),
        format_duration(window.max)
    );
}

fn print_config(path: &Path, config: &Config) {
    println!("jobwait configuration ({})", path.display());
    println!("[cache]");
    println!("  dir = {}", config.cache.dir.display());
    print_window("poll", &config.cache.poll);
    println!("  lookback = {}", format_duration(config.cache.lookback));
    println!("  lock_retry = {}", format_duration(config.cache.lock_retry));
    println!("  lock_attempts = {}", config.cache.lock_attempts);
    for (cluster, window) in &config.cache.clusters {
        print_window(&format!("cluster.{cluster}.poll"), window);
    }
    println!("[state]");
    println!(
        "  unlisted_timeout = {}",
        format_duration(config.state.unlisted_timeout)
    );
    println!("  time_margin = {}", format_duration(config.state.time_margin));
    println!("[submit]");
    println!("  retries = {}", config.submit.retries);
    print_window("retry_delay", &config.submit.retry_delay);
    println!("  onchange = {}", config.submit.onchange);
}
