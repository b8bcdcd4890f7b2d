// src/controller/submit.rs

//! Submission with bounded, jittered retries.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SubmitConfig;
use crate::errors::{JobwaitError, Result};
use crate::exec::{SchedulerBackend, Submission, SubmitError, SubmitRequest};
use crate::joblog::{log_path, RETURN_CODE_FILE};

/// Build the script actually submitted.
///
/// It carries the job script's `#SBATCH` header, runs the job script, and
/// stores its exit code in the return-code file, since the scheduler's own
/// "completed" label does not say whether the workload succeeded.
pub fn render_wrapper(script_name: &str, header: &[String]) -> String {
    let mut out = String::from("#!/usr/bin/env bash\n");
    for line in header {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&format!(
        "\n: > '{ret}'\nchmod +x './{script}'\n'./{script}'\nRETURN_CODE=$?\necho $RETURN_CODE > '{ret}'\nexit $RETURN_CODE\n",
        ret = RETURN_CODE_FILE,
        script = script_name,
    ));
    out
}

/// Submit `request`, retrying transient failures.
///
/// Makes at most `config.retries` attempts. Each retry waits a delay drawn
/// uniformly from `config.retry_delay` (redrawn every time, no backoff). A
/// permanent failure ends the loop at once.
pub async fn submit_with_retries(
    backend: &dyn SchedulerBackend,
    request: &SubmitRequest,
    config: &SubmitConfig,
    shutdown: &CancellationToken,
) -> Result<Submission> {
    let directory = &request.directory;

    for attempt in 1..=config.retries {
        match backend.submit(request).await {
            Ok(submission) => {
                info!(
                    dir = ?directory,
                    job_id = %submission.job_id,
                    attempt,
                    "submission accepted"
                );
                return Ok(submission);
            }
            Err(SubmitError::Permanent(message)) => {
                return Err(JobwaitError::Submission {
                    directory: directory.clone(),
                    message,
                });
            }
            Err(SubmitError::Transient(message)) => {
                warn!(
                    dir = ?directory,
                    attempt,
                    max_attempts = config.retries,
                    error = %message,
                    "transient submission failure"
                );
                if attempt == config.retries {
                    break;
                }
                let delay = config.retry_delay.sample();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.cancelled() => {
                        return Err(JobwaitError::Interrupted { directory: directory.clone() });
                    }
                }
            }
        }
    }

    Err(JobwaitError::SubmissionExhausted {
        directory: directory.clone(),
        log: log_path(directory),
        attempts: config.retries,
    })
}

/// File name of the job script, for the wrapper.
pub(crate) fn script_name(script: &Path) -> String {
    script
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
