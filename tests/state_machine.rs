// tests/state_machine.rs

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use jobwait::state::{next, refine_completed, Timing, NO_RETURN_CODE_DIAGNOSTIC, VANISHED_DIAGNOSTIC};
use jobwait::types::{JobState, Observation};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    t0() + chrono::Duration::seconds(secs)
}

fn timing(last_seen: Option<DateTime<Utc>>) -> Timing {
    Timing {
        unlisted_timeout: Duration::from_secs(60),
        time_margin: Duration::from_secs(5),
        submitted_at: t0(),
        last_seen,
    }
}

fn listed(raw: &str, secs: i64) -> Observation {
    Observation::Listed {
        raw: raw.to_string(),
        fetched_at: at(secs),
    }
}

fn unlisted(secs: i64) -> Observation {
    Observation::Unlisted { fetched_at: at(secs) }
}

#[test]
fn listed_job_moves_forward() {
    let tr = next(JobState::Submitted, &listed("PENDING", 10), &timing(None));
    assert_eq!(tr.state, JobState::Pending);
    assert!(tr.seen);

    let tr = next(JobState::Pending, &listed("RUNNING", 20), &timing(Some(at(10))));
    assert_eq!(tr.state, JobState::Running);
}

#[test]
fn listed_job_never_moves_backwards() {
    let tr = next(JobState::Running, &listed("PENDING", 30), &timing(Some(at(20))));
    assert_eq!(tr.state, JobState::Running);
    assert!(tr.seen);
}

#[test]
fn unknown_label_keeps_state() {
    let tr = next(JobState::Pending, &listed("SHAKEN", 30), &timing(None));
    assert_eq!(tr.state, JobState::Pending);
    assert!(tr.seen);
    assert_eq!(tr.diagnostic, None);
}

#[test]
fn terminal_states_absorb() {
    for terminal in [JobState::Completed, JobState::Failed, JobState::Cancelled] {
        assert_eq!(next(terminal, &listed("RUNNING", 30), &timing(None)).state, terminal);
        assert_eq!(next(terminal, &unlisted(100_000), &timing(None)).state, terminal);
    }
}

#[test]
fn terminal_label_inside_time_margin_is_not_trusted() {
    let tr = next(JobState::Submitted, &listed("COMPLETED", 2), &timing(None));
    assert_eq!(tr.state, JobState::Submitted);

    let tr = next(JobState::Submitted, &listed("COMPLETED", 5), &timing(None));
    assert_eq!(tr.state, JobState::Completed);
}

#[test]
fn huge_time_margin_never_trusts_a_terminal_label() {
    let timing = Timing {
        time_margin: Duration::from_secs(100_000_000 * 86_400),
        ..timing(None)
    };
    let tr = next(JobState::Running, &listed("COMPLETED", 3600), &timing);
    assert_eq!(tr.state, JobState::Running);
    assert!(tr.seen);
}

#[test]
fn unlisted_job_keeps_state_until_timeout() {
    let tr = next(JobState::Running, &unlisted(70), &timing(Some(at(20))));
    assert_eq!(tr.state, JobState::Running);
    assert!(!tr.seen);

    // Exactly at the timeout is not yet past it.
    let tr = next(JobState::Running, &unlisted(80), &timing(Some(at(20))));
    assert_eq!(tr.state, JobState::Running);
}

#[test]
fn unlisted_past_timeout_fails_with_diagnostic() {
    let tr = next(JobState::Running, &unlisted(81), &timing(Some(at(20))));
    assert_eq!(tr.state, JobState::Failed);
    assert_eq!(tr.diagnostic.as_deref(), Some(VANISHED_DIAGNOSTIC));
}

#[test]
fn never_listed_job_gets_full_timeout_after_submission() {
    let tr = next(JobState::Submitted, &unlisted(59), &timing(None));
    assert_eq!(tr.state, JobState::Submitted);
    let tr = next(JobState::Submitted, &unlisted(61), &timing(None));
    assert_eq!(tr.state, JobState::Failed);
}

#[test]
fn exit_status_refines_completion() {
    assert_eq!(refine_completed(Some(0)), (JobState::Completed, None));

    let (state, diag) = refine_completed(Some(3));
    assert_eq!(state, JobState::Failed);
    assert!(diag.unwrap().contains("code 3"));

    let (state, diag) = refine_completed(None);
    assert_eq!(state, JobState::Failed);
    assert_eq!(diag.as_deref(), Some(NO_RETURN_CODE_DIAGNOSTIC));
}

fn observation_strategy() -> impl Strategy<Value = Observation> {
    let raw = prop_oneof![
        Just("PENDING"),
        Just("RUNNING"),
        Just("COMPLETED"),
        Just("FAILED"),
        Just("CANCELLED by 42"),
        Just("TIMEOUT"),
        Just("SHAKEN"),
    ];
    prop_oneof![
        (raw, 0i64..400).prop_map(|(raw, secs)| listed(raw, secs)),
        (0i64..400).prop_map(unlisted),
    ]
}

proptest! {
    /// Whatever the scheduler reports, the recorded state never moves
    /// backwards and never leaves a terminal state.
    #[test]
    fn state_sequence_is_monotonic(observations in proptest::collection::vec(observation_strategy(), 1..40)) {
        let mut state = JobState::Submitted;
        let mut last_seen = None;
        let mut failures = 0;
        for obs in &observations {
            let tr = next(state, obs, &timing(last_seen));
            prop_assert!(tr.state.rank() >= state.rank());
            if state.is_terminal() {
                prop_assert_eq!(tr.state, state);
            }
            if tr.seen {
                last_seen = Some(obs.fetched_at());
            }
            if tr.state != state && tr.diagnostic.as_deref() == Some(VANISHED_DIAGNOSTIC) {
                failures += 1;
            }
            state = tr.state;
        }
        prop_assert!(failures <= 1);
    }
}
