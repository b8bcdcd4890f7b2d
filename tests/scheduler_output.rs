// tests/scheduler_output.rs

use jobwait::exec::parse::{classify_submit_failure, is_valid_job_id, parse_sacct_out, parse_sbatch};
use jobwait::exec::{SlurmBackend, SchedulerBackend, SubmitError};
use jobwait::state::classify_raw_state;
use jobwait::types::JobState;

const SACCT_OUT: &str = "\
246748|CANCELLED by 2540019
246912|RUNNING
246913|COMPLETED
246914|FAILED
246916|COMPLETED
246917|COMPLETED
246918|COMPLETED
007|SHAKEN
";

#[test]
fn sacct_listing_is_parsed_per_job() {
    let listing = parse_sacct_out(SACCT_OUT).unwrap();
    assert_eq!(listing.len(), 8);
    assert_eq!(listing["246748"], "CANCELLED");
    assert_eq!(listing["246912"], "RUNNING");
    assert_eq!(listing["246913"], "COMPLETED");
    assert_eq!(listing["246914"], "FAILED");
    assert_eq!(listing["007"], "SHAKEN");
    assert!(!listing.contains_key("999999"));
}

#[test]
fn malformed_sacct_output_is_a_failure_not_an_empty_listing() {
    assert!(parse_sacct_out("blibli").is_err());
    let err = parse_sacct_out("246912|RUNNING\nslurm_load_jobs error\n").unwrap_err();
    assert!(err.contains("line 2"), "{err}");
}

#[test]
fn empty_sacct_output_lists_nothing() {
    assert!(parse_sacct_out("").unwrap().is_empty());
    assert!(parse_sacct_out("\n  \n").unwrap().is_empty());
}

#[test]
fn sbatch_parsable_output() {
    let plain = parse_sbatch("123\n").unwrap();
    assert_eq!(plain.job_id, "123");
    assert_eq!(plain.cluster, None);

    let clustered = parse_sbatch("123;clu").unwrap();
    assert_eq!(clustered.job_id, "123");
    assert_eq!(clustered.cluster.as_deref(), Some("clu"));

    assert!(parse_sbatch("Submitted batch job 123").is_err());
    assert!(parse_sbatch("").is_err());
    assert!(parse_sbatch("1;a;b").is_err());
}

#[test]
fn job_ids_are_numeric() {
    assert!(is_valid_job_id("1001"));
    assert!(!is_valid_job_id(""));
    assert!(!is_valid_job_id("12a"));
    assert!(!is_valid_job_id("-1"));
}

#[test]
fn submit_failures_are_classified() {
    assert!(matches!(
        classify_submit_failure(Some(1), "sbatch: error: Batch job submission failed: Socket timed out on send/recv operation"),
        SubmitError::Transient(_)
    ));
    assert!(matches!(
        classify_submit_failure(None, ""),
        SubmitError::Transient(_)
    ));
    assert!(matches!(
        classify_submit_failure(Some(1), "sbatch: error: invalid partition specified: nope"),
        SubmitError::Permanent(_)
    ));
    match classify_submit_failure(Some(2), "") {
        SubmitError::Permanent(msg) => assert!(msg.contains("code Some(2)"), "{msg}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn raw_labels_map_onto_the_lifecycle() {
    assert_eq!(classify_raw_state("PENDING"), Some(JobState::Pending));
    assert_eq!(classify_raw_state("REQUEUED"), Some(JobState::Pending));
    assert_eq!(classify_raw_state("RUNNING"), Some(JobState::Running));
    assert_eq!(classify_raw_state("COMPLETING"), Some(JobState::Running));
    assert_eq!(classify_raw_state("COMPLETED"), Some(JobState::Completed));
    assert_eq!(classify_raw_state("CANCELLED by 2540019"), Some(JobState::Cancelled));
    assert_eq!(classify_raw_state("CANCELLED+"), Some(JobState::Cancelled));
    assert_eq!(classify_raw_state("TIMEOUT"), Some(JobState::Failed));
    assert_eq!(classify_raw_state("OUT_OF_MEMORY"), Some(JobState::Failed));
    assert_eq!(classify_raw_state("SHAKEN"), None);
    assert_eq!(classify_raw_state(""), None);
}

#[test]
fn slurm_cancel_command_names_the_cluster() {
    let slurm = SlurmBackend::new();
    assert_eq!(slurm.cancel_command("123", None), "scancel 123");
    assert_eq!(slurm.cancel_command("123", Some("doduo")), "scancel -M doduo 123");
}
