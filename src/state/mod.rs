// src/state/mod.rs

//! Pure job state machine.
//!
//! This module turns raw scheduler observations into lifecycle states. It
//! performs no IO and holds no state of its own, so every rule (monotonic
//! progress, absorbing terminal states, the unlisted timeout, exit-status
//! refinement) is unit tested without a runtime, a filesystem or a
//! scheduler.

pub mod classify;

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{JobState, Observation};

pub use classify::classify_raw_state;

/// Diagnostic attached when the unlisted timeout fires.
pub const VANISHED_DIAGNOSTIC: &str =
    "job vanished from the scheduler queue without a terminal status being observed";

/// Diagnostic attached when the wrapper left no exit code behind.
pub const NO_RETURN_CODE_DIAGNOSTIC: &str =
    "job did not record a return code (it may have been killed or cancelled)";

/// Verdict for one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State to record (equal to the current one when nothing changed).
    pub state: JobState,
    /// Whether the job was present in the listing.
    pub seen: bool,
    pub diagnostic: Option<String>,
}

impl Transition {
    fn unchanged(state: JobState, seen: bool) -> Self {
        Self {
            state,
            seen,
            diagnostic: None,
        }
    }
}

/// Inputs of [`next`] that come from configuration and the job log.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub unlisted_timeout: Duration,
    pub time_margin: Duration,
    /// When the job was handed to the scheduler.
    pub submitted_at: DateTime<Utc>,
    /// Fetch time of the last listing that mentioned the job.
    pub last_seen: Option<DateTime<Utc>>,
}

impl Timing {
    /// Time the job has gone unlisted as of `now`.
    ///
    /// Counted from the later of the last sighting and the submission, so a
    /// job that was never listed gets the full timeout after submission.
    pub fn elapsed_since_seen(&self, now: DateTime<Utc>) -> Duration {
        let reference = match self.last_seen {
            Some(seen) if seen > self.submitted_at => seen,
            _ => self.submitted_at,
        };
        (now - reference).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether a listing fetched at `fetched_at` postdates the submission by
    /// at least the time margin, and may therefore end the job.
    pub fn trusts(&self, fetched_at: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(self.time_margin)
            .ok()
            .and_then(|margin| self.submitted_at.checked_add_signed(margin))
            .is_some_and(|trusted_from| fetched_at >= trusted_from)
    }
}

/// Compute the next state of a job from one observation.
///
/// - terminal states are absorbing;
/// - a listed job moves forward to the classified state, never backwards,
///   and unknown labels leave the state alone;
/// - an unlisted job keeps its state until it has been unlisted for longer
///   than the timeout, then fails with [`VANISHED_DIAGNOSTIC`];
/// - a terminal verdict from a listing fetched before `submitted_at +
///   time_margin` is not trusted.
pub fn next(current: JobState, observation: &Observation, timing: &Timing) -> Transition {
    if current.is_terminal() {
        return Transition::unchanged(current, matches!(observation, Observation::Listed { .. }));
    }

    match observation {
        Observation::Listed { raw, fetched_at } => {
            let Some(observed) = classify_raw_state(raw) else {
                return Transition::unchanged(current, true);
            };
            if observed.is_terminal() && !timing.trusts(*fetched_at) {
                return Transition::unchanged(current, true);
            }
            let state = if observed.rank() > current.rank() {
                observed
            } else {
                current
            };
            Transition::unchanged(state, true)
        }
        Observation::Unlisted { fetched_at } => {
            if timing.elapsed_since_seen(*fetched_at) > timing.unlisted_timeout {
                Transition {
                    state: JobState::Failed,
                    seen: false,
                    diagnostic: Some(VANISHED_DIAGNOSTIC.to_string()),
                }
            } else {
                Transition::unchanged(current, false)
            }
        }
    }
}

/// Refine a scheduler-level `COMPLETED` using the job script's exit code.
pub fn refine_completed(return_code: Option<i32>) -> (JobState, Option<String>) {
    match return_code {
        Some(0) => (JobState::Completed, None),
        Some(code) => (
            JobState::Failed,
            Some(format!("job script exited with code {code}")),
        ),
        None => (JobState::Failed, Some(NO_RETURN_CODE_DIAGNOSTIC.to_string())),
    }
}
