// src/maintenance/sweep.rs

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::cache::StatusCache;
use crate::exec::SchedulerBackend;
use crate::joblog::{JobLogStore, JobRecord};
use crate::state::classify_raw_state;
use crate::types::{JobState, Observation};

use super::discover::discover_logs;

/// Options shared by both sweeps.
#[derive(Debug, Clone, Default)]
pub struct SweepOptions {
    /// Directories to search; the current directory when empty.
    pub roots: Vec<PathBuf>,
    /// Act instead of only printing what would be done.
    pub commit: bool,
    /// Select every job, not only the default selection.
    pub include_all: bool,
}

/// What a sweep printed and how many jobs it selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub lines: Vec<String>,
    pub selected: usize,
}

impl SweepReport {
    fn note(&mut self, message: impl AsRef<str>) {
        self.lines.push(format!("# {}", message.as_ref()));
    }
}

/// Label printed for a log that could not be interpreted.
const UNKNOWN: &str = "unknown";

fn job_dir(log: &Path) -> PathBuf {
    log.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Load a log, turning every problem into a reportable message.
fn load_record(store: &JobLogStore, log: &Path) -> Result<JobRecord, String> {
    match store.load(&job_dir(log)) {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err("log disappeared".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Print (and with `commit`, issue) a cancel command for every job that is
/// still queued or running.
pub async fn cancel_sweep(
    store: &JobLogStore,
    cache: &StatusCache,
    backend: &dyn SchedulerBackend,
    options: &SweepOptions,
) -> SweepReport {
    let discovery = discover_logs(store.fs().as_ref(), &options.roots);
    let mut report = SweepReport::default();
    for warning in &discovery.warnings {
        report.note(warning);
    }

    for log in &discovery.logs {
        let record = match load_record(store, log) {
            Ok(record) => record,
            Err(reason) => {
                warn!(log = ?log, error = %reason, "cannot read job log");
                report.note(format!("{}  state={UNKNOWN} ({reason})", log.display()));
                continue;
            }
        };
        let Some(job_id) = record.job_id.as_deref() else {
            report.note(format!("{}  state={UNKNOWN} (no job id)", log.display()));
            continue;
        };

        let state = current_state(cache, &record, job_id).await;
        if !options.include_all && state.is_terminal() {
            continue;
        }

        report.selected += 1;
        let cluster = record.cluster.as_deref();
        report.lines.push(format!(
            "{}  # {} state={}",
            backend.cancel_command(job_id, cluster),
            log.display(),
            state
        ));

        if options.commit {
            match backend.cancel(job_id, cluster).await {
                Ok(()) => info!(job_id, log = ?log, "job cancelled"),
                Err(e) => {
                    warn!(job_id, log = ?log, error = %e, "cancel failed");
                    report.note(format!("cancel of job {job_id} failed: {e}"));
                }
            }
        }
    }
    report
}

/// A recorded terminal state is final; otherwise ask the status cache and
/// keep the recorded state when the scheduler has nothing better to say.
async fn current_state(cache: &StatusCache, record: &JobRecord, job_id: &str) -> JobState {
    let recorded = record.state();
    if recorded.is_terminal() {
        return recorded;
    }
    match cache.get_state(record.cluster.as_deref(), job_id).await {
        Ok(Observation::Listed { raw, .. }) => match classify_raw_state(&raw) {
            Some(observed) if observed.rank() > recorded.rank() => observed,
            _ => recorded,
        },
        Ok(Observation::Unlisted { .. }) => recorded,
        Err(e) => {
            warn!(job_id, error = %e, "status query failed; using recorded state");
            recorded
        }
    }
}

/// Print (and with `commit`, perform) the removal of every job directory
/// whose job failed or was cancelled. Successful jobs are left alone.
pub fn remove_sweep(store: &JobLogStore, options: &SweepOptions) -> SweepReport {
    let fs = store.fs();
    let discovery = discover_logs(fs.as_ref(), &options.roots);
    let mut report = SweepReport::default();
    for warning in &discovery.warnings {
        report.note(warning);
    }

    for log in &discovery.logs {
        let label = match load_record(store, log) {
            Ok(record) => {
                let unsuccessful = record.terminal().is_some_and(|t| t.is_unsuccessful());
                if !(unsuccessful || options.include_all) {
                    continue;
                }
                record.state().to_string()
            }
            Err(reason) => {
                warn!(log = ?log, error = %reason, "cannot read job log");
                if !options.include_all {
                    report.note(format!("{}  state={UNKNOWN} ({reason})", log.display()));
                    continue;
                }
                UNKNOWN.to_string()
            }
        };

        let dir = job_dir(log);
        report.selected += 1;
        report
            .lines
            .push(format!("rm -rf {}  # state={label}", dir.display()));

        if options.commit {
            match fs.remove_dir_all(&dir) {
                Ok(()) => info!(dir = ?dir, "job directory removed"),
                Err(e) => {
                    warn!(dir = ?dir, error = %e, "removal failed");
                    report.note(format!("removal of {} failed: {e}", dir.display()));
                }
            }
        }
    }
    report
}
