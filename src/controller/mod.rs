// src/controller/mod.rs

//! Submission controller.
//!
//! `realize` is idempotent: it submits the job of a directory at most once,
//! reconciles a previous submission with the current inputs according to
//! the `onchange` policy, then waits until the job reaches a terminal state.
//! Re-running it after completion only re-reads the job log.

pub mod submit;
pub mod validate;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::StatusCache;
use crate::clock::Clock;
use crate::config::{Config, StateConfig, SubmitConfig};
use crate::errors::{JobwaitError, Result};
use crate::exec::parse::is_valid_job_id;
use crate::exec::{SchedulerBackend, SubmitRequest};
use crate::joblog::{log_path, JobLogStore, JobRecord, RETURN_CODE_FILE, STDERR_FILE, STDOUT_FILE};
use crate::state::{self, Timing};
use crate::types::{JobState, Observation, OnChangePolicy, TerminalState};

pub use submit::{render_wrapper, submit_with_retries};
pub use validate::validate_job_script;

/// One call to [`Controller::realize`].
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub directory: PathBuf,
    pub job_script: PathBuf,
    /// Digest of everything the job depends on, computed by the caller.
    pub input_digest: String,
    /// Overrides the configured policy when set.
    pub onchange: Option<OnChangePolicy>,
    /// Files the job is expected to produce (relative to `directory` unless
    /// absolute). Only checked when an outdated job is kept under `ignore`.
    pub outputs: Vec<PathBuf>,
    /// Shell snippet run right before the submission command.
    pub pre_submit: Option<String>,
}

impl JobRequest {
    pub fn new(
        directory: impl Into<PathBuf>,
        job_script: impl Into<PathBuf>,
        input_digest: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            job_script: job_script.into(),
            input_digest: input_digest.into(),
            onchange: None,
            outputs: Vec::new(),
            pre_submit: None,
        }
    }
}

/// Outcome of a realized job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Realization {
    pub state: TerminalState,
    pub job_id: String,
    pub return_code: Option<i32>,
    pub diagnostic: Option<String>,
}

impl Realization {
    fn from_record(record: &JobRecord, state: TerminalState) -> Self {
        Self {
            state,
            job_id: record.job_id.clone().unwrap_or_default(),
            return_code: record.return_code,
            diagnostic: record.diagnostic.clone(),
        }
    }
}

pub struct Controller {
    backend: Arc<dyn SchedulerBackend>,
    cache: Arc<StatusCache>,
    store: JobLogStore,
    clock: Arc<dyn Clock>,
    state: StateConfig,
    submit: SubmitConfig,
    shutdown: CancellationToken,
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("state", &self.state)
            .field("submit", &self.submit)
            .finish_non_exhaustive()
    }
}

impl Controller {
    pub fn new(
        backend: Arc<dyn SchedulerBackend>,
        cache: Arc<StatusCache>,
        store: JobLogStore,
        clock: Arc<dyn Clock>,
        config: &Config,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            backend,
            cache,
            store,
            clock,
            state: config.state.clone(),
            submit: config.submit.clone(),
            shutdown,
        }
    }

    /// Make sure the job of `request.directory` has run to a terminal state.
    pub async fn realize(&self, request: &JobRequest) -> Result<Realization> {
        let directory = &request.directory;
        let policy = request.onchange.unwrap_or(self.submit.onchange);

        let Some(mut record) = self.store.load(directory)? else {
            debug!(dir = ?directory, "no job log; submitting");
            let mut record = self.submit_new(request).await?;
            return self.wait(&mut record).await;
        };

        self.check_record(directory, &record)?;
        if record.directory != *directory {
            debug!(
                dir = ?directory,
                recorded = ?record.directory,
                "job directory was moved; using its current location"
            );
            record.directory = directory.clone();
        }

        if record.input_digest == request.input_digest {
            return self.wait(&mut record).await;
        }

        match policy {
            OnChangePolicy::Raise => Err(self.inconsistency(
                directory,
                format!(
                    "inputs changed since job {} was submitted (recorded digest {}, current {}); \
                     rerun with onchange=resubmit or onchange=ignore",
                    record.job_id.as_deref().unwrap_or("?"),
                    record.input_digest,
                    request.input_digest
                ),
            )),
            OnChangePolicy::Resubmit => {
                // Validate before touching the old job.
                validate_job_script(self.store.fs().as_ref(), directory, &request.job_script)?;
                if let (false, Some(job_id)) =
                    (record.state().is_terminal(), record.job_id.as_deref())
                {
                    info!(dir = ?directory, job_id, "inputs changed; cancelling previous job");
                    if let Err(e) = self.backend.cancel(job_id, record.cluster.as_deref()).await {
                        warn!(dir = ?directory, job_id, error = %e, "failed to cancel previous job");
                    }
                }
                self.store.discard(directory)?;
                let mut record = self.submit_new(request).await?;
                self.wait(&mut record).await
            }
            OnChangePolicy::Ignore => {
                warn!(
                    dir = ?directory,
                    recorded = %record.input_digest,
                    current = %request.input_digest,
                    "inputs changed; keeping the previous job"
                );
                let realization = self.wait(&mut record).await?;
                Ok(self.check_outputs(request, realization))
            }
        }
    }

    fn inconsistency(&self, directory: &Path, detail: impl Into<String>) -> JobwaitError {
        JobwaitError::Inconsistency {
            directory: directory.to_path_buf(),
            log: log_path(directory),
            detail: detail.into(),
        }
    }

    fn check_record(&self, directory: &Path, record: &JobRecord) -> Result<()> {
        match record.job_id.as_deref() {
            None => Err(self.inconsistency(directory, "job log has no job id")),
            Some(id) if !is_valid_job_id(id) => {
                Err(self.inconsistency(directory, format!("job log has a malformed job id '{id}'")))
            }
            Some(_) if record.submitted_at.is_none() => {
                Err(self.inconsistency(directory, "job log has no submission time"))
            }
            Some(_) => Ok(()),
        }
    }

    /// A completed job kept despite changed inputs must at least have left
    /// its return code and declared outputs behind.
    fn check_outputs(&self, request: &JobRequest, realization: Realization) -> Realization {
        if realization.state != TerminalState::Completed {
            return realization;
        }
        let fs = self.store.fs();
        let missing: Vec<PathBuf> = std::iter::once(PathBuf::from(RETURN_CODE_FILE))
            .chain(request.outputs.iter().cloned())
            .map(|p| request.directory.join(p))
            .filter(|p| !fs.exists(p))
            .collect();
        if missing.is_empty() {
            return realization;
        }
        warn!(dir = ?request.directory, ?missing, "completed job is missing expected files");
        Realization {
            state: TerminalState::Failed,
            diagnostic: Some(format!("completed job is missing expected files: {missing:?}")),
            ..realization
        }
    }

    async fn submit_new(&self, request: &JobRequest) -> Result<JobRecord> {
        let directory = &request.directory;
        let header =
            validate_job_script(self.store.fs().as_ref(), directory, &request.job_script)?;
        let wrapper = render_wrapper(&submit::script_name(&request.job_script), &header);
        let submit_request = SubmitRequest {
            directory: directory.clone(),
            wrapper,
            stdout: PathBuf::from(STDOUT_FILE),
            stderr: PathBuf::from(STDERR_FILE),
            pre_submit: request.pre_submit.clone(),
        };

        let submission = submit_with_retries(
            self.backend.as_ref(),
            &submit_request,
            &self.submit,
            &self.shutdown,
        )
        .await?;

        let record = JobRecord::submitted(
            directory.clone(),
            request.input_digest.clone(),
            submission,
            self.clock.now(),
        );
        self.store.save(&record)?;
        info!(
            dir = ?directory,
            job_id = record.job_id.as_deref().unwrap_or_default(),
            cluster = record.cluster.as_deref().unwrap_or("default"),
            "job submitted"
        );
        Ok(record)
    }

    /// Poll until the job is terminal. Never cancels the job itself.
    async fn wait(&self, record: &mut JobRecord) -> Result<Realization> {
        loop {
            if let Some(terminal) = record.terminal() {
                return Ok(Realization::from_record(record, terminal));
            }

            let job_id = record.job_id.clone().unwrap_or_default();
            // The cache may sit in its lock-retry loop for a long time.
            let polled = tokio::select! {
                result = self.cache.get_state(record.cluster.as_deref(), &job_id) => result,
                _ = self.shutdown.cancelled() => return Err(self.interrupted(record, &job_id)),
            };
            match polled {
                Ok(observation) => {
                    self.apply(record, &observation)?;
                    if record.terminal().is_some() {
                        continue;
                    }
                }
                Err(JobwaitError::QueryFailure(message)) => {
                    warn!(
                        dir = ?record.directory,
                        job_id = %job_id,
                        error = %message,
                        "scheduler query failed; retrying on next poll"
                    );
                }
                Err(e) => return Err(e),
            }

            let delay = self.cache.poll_window(record.cluster.as_deref()).sample();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.cancelled() => return Err(self.interrupted(record, &job_id)),
            }
        }
    }

    fn interrupted(&self, record: &JobRecord, job_id: &str) -> JobwaitError {
        info!(dir = ?record.directory, job_id = %job_id, "shutdown requested; job left running");
        JobwaitError::Interrupted {
            directory: record.directory.clone(),
        }
    }

    /// Fold one observation into the record, saving it when anything changed.
    fn apply(&self, record: &mut JobRecord, observation: &Observation) -> Result<()> {
        let current = record.state();
        let timing = Timing {
            unlisted_timeout: self.state.unlisted_timeout,
            time_margin: self.state.time_margin,
            submitted_at: record.submitted_at.unwrap_or_else(|| observation.fetched_at()),
            last_seen: record.last_seen,
        };
        let transition = state::next(current, observation, &timing);

        let mut changed = false;
        if transition.seen {
            let fetched_at = observation.fetched_at();
            if record.last_seen.is_none_or(|seen| fetched_at > seen) {
                record.last_seen = Some(fetched_at);
                changed = true;
            }
        }

        let (mut target, mut diagnostic) = (transition.state, transition.diagnostic);
        if target == JobState::Completed && current != JobState::Completed {
            let return_code = self.store.read_return_code(&record.directory);
            (target, diagnostic) = state::refine_completed(return_code);
            record.return_code = return_code;
        }

        if target != current {
            let pushed = record
                .push_state(self.clock.now(), target)
                .map_err(|e| self.inconsistency(&record.directory, format!("{e:?}")))?;
            if pushed {
                record.diagnostic = diagnostic;
                changed = true;
                info!(
                    dir = ?record.directory,
                    job_id = record.job_id.as_deref().unwrap_or_default(),
                    from = %current,
                    to = %target,
                    "job state changed"
                );
            }
        }

        if changed {
            self.store.save(record)?;
        }
        Ok(())
    }
}
