// src/types.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Policy applied when the inputs of a previously submitted job have changed.
///
/// - `Raise` (default): fail and leave the running job alone.
/// - `Resubmit`: cancel the old job, discard its log and submit again.
/// - `Ignore`: keep waiting on the old job as if nothing changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OnChangePolicy {
    #[default]
    Raise,
    Resubmit,
    Ignore,
}

impl FromStr for OnChangePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raise" => Ok(OnChangePolicy::Raise),
            "resubmit" => Ok(OnChangePolicy::Resubmit),
            "ignore" => Ok(OnChangePolicy::Ignore),
            other => Err(format!(
                "invalid onchange policy: {other} (expected \"raise\", \"resubmit\" or \"ignore\")"
            )),
        }
    }
}

impl fmt::Display for OnChangePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OnChangePolicy::Raise => "raise",
            OnChangePolicy::Resubmit => "resubmit",
            OnChangePolicy::Ignore => "ignore",
        };
        f.write_str(s)
    }
}

/// Lifecycle state of a job as recorded in its log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    New,
    Submitted,
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Position in the lifecycle ordering. All terminal states share a rank.
    pub fn rank(self) -> u8 {
        match self {
            JobState::New => 0,
            JobState::Submitted => 1,
            JobState::Pending => 2,
            JobState::Running => 3,
            JobState::Completed | JobState::Failed | JobState::Cancelled => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.terminal().is_some()
    }

    pub fn terminal(self) -> Option<TerminalState> {
        match self {
            JobState::Completed => Some(TerminalState::Completed),
            JobState::Failed => Some(TerminalState::Failed),
            JobState::Cancelled => Some(TerminalState::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::New => "NEW",
            JobState::Submitted => "SUBMITTED",
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
            JobState::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NEW" => Ok(JobState::New),
            "SUBMITTED" => Ok(JobState::Submitted),
            "PENDING" => Ok(JobState::Pending),
            "RUNNING" => Ok(JobState::Running),
            "COMPLETED" => Ok(JobState::Completed),
            "FAILED" => Ok(JobState::Failed),
            "CANCELLED" => Ok(JobState::Cancelled),
            other => Err(format!("unknown job state: {other}")),
        }
    }
}

/// The states handed back to the workflow engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalState {
    Completed,
    Failed,
    Cancelled,
}

impl TerminalState {
    pub fn is_success(self) -> bool {
        self == TerminalState::Completed
    }

    /// Failed and cancelled jobs are the ones the remove sweep targets.
    pub fn is_unsuccessful(self) -> bool {
        !self.is_success()
    }
}

impl From<TerminalState> for JobState {
    fn from(state: TerminalState) -> Self {
        match state {
            TerminalState::Completed => JobState::Completed,
            TerminalState::Failed => JobState::Failed,
            TerminalState::Cancelled => JobState::Cancelled,
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        JobState::from(*self).fmt(f)
    }
}

/// What the status cache knows about one job id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The scheduler listed the job with this raw state label.
    Listed {
        raw: String,
        fetched_at: DateTime<Utc>,
    },
    /// The scheduler listing did not mention the job at all.
    Unlisted { fetched_at: DateTime<Utc> },
}

impl Observation {
    pub fn fetched_at(&self) -> DateTime<Utc> {
        match self {
            Observation::Listed { fetched_at, .. } | Observation::Unlisted { fetched_at } => {
                *fetched_at
            }
        }
    }
}
