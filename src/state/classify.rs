// src/state/classify.rs

use crate::types::JobState;

/// Map a raw SLURM job state label onto the lifecycle.
///
/// Only the first word counts (`"CANCELLED by 1234"` is `CANCELLED`).
/// Returns `None` for labels we do not know; the caller keeps the current
/// state rather than guessing.
pub fn classify_raw_state(raw: &str) -> Option<JobState> {
    let label = raw.split_whitespace().next()?.trim_end_matches('+');
    let state = match label.to_ascii_uppercase().as_str() {
        "PENDING" | "CONFIGURING" | "REQUEUED" | "REQUEUE_FED" | "REQUEUE_HOLD" | "RESIZING"
        | "SUSPENDED" => JobState::Pending,
        "RUNNING" | "COMPLETING" | "STAGE_OUT" | "SIGNALING" => JobState::Running,
        "COMPLETED" => JobState::Completed,
        "CANCELLED" => JobState::Cancelled,
        "FAILED" | "TIMEOUT" | "NODE_FAIL" | "OUT_OF_MEMORY" | "BOOT_FAIL" | "DEADLINE"
        | "PREEMPTED" | "LAUNCH_FAILED" | "REVOKED" | "STOPPED" | "RECONFIG_FAIL"
        | "SPECIAL_EXIT" => JobState::Failed,
        _ => return None,
    };
    Some(state)
}
