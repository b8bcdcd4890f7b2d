// src/joblog/record.rs

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exec::Submission;
use crate::types::{JobState, TerminalState};

/// Version written to every new log.
pub const LOG_FORMAT: u32 = 1;

/// One `(timestamp, state)` step of a job's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub at: DateTime<Utc>,
    pub state: JobState,
}

/// Durable record of one submitted job, keyed by its directory.
///
/// Serialized as TOML into `<directory>/jobwait.log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub format: u32,
    pub directory: PathBuf,
    pub input_digest: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    /// Time of the submission as recorded by us, seconds resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,

    /// Fetch time of the last listing that mentioned the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,

    /// Why the job ended up in its terminal state, when that is not obvious.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,

    #[serde(default)]
    pub history: Vec<StateEntry>,
}

/// Rejected history update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// A state past `NEW` was pushed before a job id was known.
    MissingJobId(JobState),
}

impl JobRecord {
    /// Record for a job the scheduler just accepted.
    pub fn submitted(
        directory: impl Into<PathBuf>,
        input_digest: impl Into<String>,
        submission: Submission,
        at: DateTime<Utc>,
    ) -> Self {
        let at = truncate_to_seconds(at);
        JobRecord {
            format: LOG_FORMAT,
            directory: directory.into(),
            input_digest: input_digest.into(),
            cluster: submission.cluster,
            job_id: Some(submission.job_id),
            submitted_at: Some(at),
            last_seen: None,
            return_code: None,
            diagnostic: None,
            history: vec![StateEntry {
                at,
                state: JobState::Submitted,
            }],
        }
    }

    /// Latest recorded state (`NEW` for an empty history).
    pub fn state(&self) -> JobState {
        self.history
            .last()
            .map(|entry| entry.state)
            .unwrap_or(JobState::New)
    }

    pub fn terminal(&self) -> Option<TerminalState> {
        self.state().terminal()
    }

    /// Append a state to the history.
    ///
    /// Returns `Ok(false)` without touching the history when the new state is
    /// the current one, would move backwards, or follows a terminal state.
    pub fn push_state(&mut self, at: DateTime<Utc>, state: JobState) -> Result<bool, HistoryError> {
        if state != JobState::New && self.job_id.is_none() {
            return Err(HistoryError::MissingJobId(state));
        }
        let current = self.state();
        if current.is_terminal() || state == current || state.rank() < current.rank() {
            return Ok(false);
        }
        self.history.push(StateEntry {
            at: truncate_to_seconds(at),
            state,
        });
        Ok(true)
    }
}

fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}
