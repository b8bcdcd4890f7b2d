// tests/job_log.rs

mod common;

use std::sync::Arc;

use chrono::Utc;

use jobwait::errors::JobwaitError;
use jobwait::exec::Submission;
use jobwait::fs::mock::MockFileSystem;
use jobwait::fs::RealFileSystem;
use jobwait::joblog::{
    log_path, parse_record, HistoryError, JobLogStore, JobRecord, LOG_FILE, RETURN_CODE_FILE,
    STDOUT_FILE,
};
use jobwait::types::{JobState, TerminalState};

use crate::common::builders::JobRecordBuilder;

fn real_store() -> JobLogStore {
    JobLogStore::new(Arc::new(RealFileSystem))
}

#[test]
fn record_survives_a_save_load_cycle_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = real_store();
    let saved = JobRecordBuilder::new(dir.path(), "1001")
        .cluster("doduo")
        .state(JobState::Pending)
        .state(JobState::Running)
        .save(&store);

    let text = std::fs::read_to_string(dir.path().join(LOG_FILE)).unwrap();
    assert!(text.contains("job_id = \"1001\""), "{text}");
    assert!(text.contains("RUNNING"), "{text}");

    let loaded = store.load(dir.path()).unwrap().unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(loaded.state(), JobState::Running);
    assert_eq!(loaded.terminal(), None);
}

#[test]
fn missing_log_is_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(real_store().load(dir.path()).unwrap().is_none());
}

#[test]
fn corrupt_log_is_an_inconsistency_naming_the_log() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(LOG_FILE), "format = 1\ndirectory = ").unwrap();

    match real_store().load(dir.path()) {
        Err(JobwaitError::Inconsistency { log, directory, .. }) => {
            assert_eq!(log, log_path(dir.path()));
            assert_eq!(directory, dir.path());
        }
        other => panic!("expected inconsistency, got {other:?}"),
    }
}

#[test]
fn unknown_format_version_is_rejected() {
    let mut record = JobRecordBuilder::new("/jobs/a", "7").build();
    record.format = 99;
    let text = toml::to_string_pretty(&record).unwrap();
    let err = parse_record(&text).unwrap_err();
    assert!(err.contains("format 99"), "{err}");
}

#[test]
fn save_leaves_no_temporary_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = real_store();
    JobRecordBuilder::new(dir.path(), "1").save(&store);
    JobRecordBuilder::new(dir.path(), "1").state(JobState::Running).save(&store);

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec![LOG_FILE.to_string()]);
}

#[test]
fn discard_removes_log_and_capture_files() {
    let fs = MockFileSystem::new();
    fs.add_file("/jobs/a/jobwait.log", "x");
    fs.add_file("/jobs/a/jobwait.out", "out");
    fs.add_file("/jobs/a/jobwait.ret", "0");
    fs.add_executable("/jobs/a/slurmjob.sh", "#!/bin/sh\n");
    let store = JobLogStore::new(Arc::new(fs.clone()));

    store.discard("/jobs/a".as_ref()).unwrap();

    use jobwait::fs::FileSystem;
    assert!(!fs.exists("/jobs/a/jobwait.log".as_ref()));
    assert!(!fs.exists(format!("/jobs/a/{STDOUT_FILE}").as_ref()));
    assert!(!fs.exists(format!("/jobs/a/{RETURN_CODE_FILE}").as_ref()));
    assert!(fs.exists("/jobs/a/slurmjob.sh".as_ref()));
}

#[test]
fn return_code_is_read_when_present() {
    let fs = MockFileSystem::new();
    fs.add_file("/jobs/a/jobwait.ret", "3\n");
    fs.add_file("/jobs/b/jobwait.ret", "");
    let store = JobLogStore::new(Arc::new(fs));

    assert_eq!(store.read_return_code("/jobs/a".as_ref()), Some(3));
    assert_eq!(store.read_return_code("/jobs/b".as_ref()), None);
    assert_eq!(store.read_return_code("/jobs/c".as_ref()), None);
}

#[test]
fn history_only_moves_forward() {
    let now = Utc::now();
    let mut record = JobRecord::submitted(
        "/jobs/a",
        "d",
        Submission {
            job_id: "5".into(),
            cluster: None,
        },
        now,
    );
    assert_eq!(record.state(), JobState::Submitted);

    assert!(record.push_state(now, JobState::Running).unwrap());
    assert!(!record.push_state(now, JobState::Running).unwrap());
    assert!(!record.push_state(now, JobState::Pending).unwrap());
    assert!(record.push_state(now, JobState::Cancelled).unwrap());
    assert!(!record.push_state(now, JobState::Completed).unwrap());

    let states: Vec<_> = record.history.iter().map(|e| e.state).collect();
    assert_eq!(
        states,
        vec![JobState::Submitted, JobState::Running, JobState::Cancelled]
    );
    assert_eq!(record.terminal(), Some(TerminalState::Cancelled));
}

#[test]
fn states_need_a_job_id() {
    let mut record = JobRecordBuilder::new("/jobs/a", "5").build();
    record.job_id = None;
    assert_eq!(
        record.push_state(Utc::now(), JobState::Running),
        Err(HistoryError::MissingJobId(JobState::Running))
    );
}
