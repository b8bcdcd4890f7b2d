// tests/script_validation.rs

use std::path::Path;

use jobwait::controller::{render_wrapper, validate_job_script};
use jobwait::errors::JobwaitError;
use jobwait::fs::mock::MockFileSystem;

const DIR: &str = "/work/jobA";
const SCRIPT: &str = "/work/jobA/slurmjob.sh";

fn fs_with(script: &str) -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_executable(SCRIPT, script);
    fs
}

fn reason(result: Result<Vec<String>, JobwaitError>) -> String {
    match result {
        Err(JobwaitError::Validation { reason, .. }) => reason,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

fn check(fs: &MockFileSystem) -> Result<Vec<String>, JobwaitError> {
    validate_job_script(fs, Path::new(DIR), Path::new(SCRIPT))
}

#[test]
fn valid_script_yields_its_sbatch_header() {
    let fs = fs_with(
        "#!/usr/bin/env bash\n#SBATCH --job-name=a\n#SBATCH -N 1 --time=1:00:00\necho hi\n",
    );
    let header = check(&fs).unwrap();
    assert_eq!(
        header,
        vec!["#SBATCH --job-name=a", "#SBATCH -N 1 --time=1:00:00"]
    );
}

#[test]
fn missing_interpreter_line_is_rejected() {
    let fs = fs_with("#SBATCH -N 1\necho hi\n");
    assert!(reason(check(&fs)).contains("#!"));
}

#[test]
fn output_redirection_is_rejected() {
    for line in [
        "#SBATCH -o out.txt",
        "#SBATCH --output=out.txt",
        "#SBATCH --output out.txt",
        "#SBATCH -e err.txt",
        "#SBATCH --error=err.txt",
        "#SBATCH -oout.txt",
    ] {
        let fs = fs_with(&format!("#!/bin/bash\n{line}\n"));
        let r = reason(check(&fs));
        assert!(r.contains("redirection"), "{line}: {r}");
    }
}

#[test]
fn array_and_wait_requests_are_rejected() {
    for line in ["#SBATCH --array=1-10", "#SBATCH -a 1-3", "#SBATCH --wait", "#SBATCH -W"] {
        let fs = fs_with(&format!("#!/bin/bash\n{line}\n"));
        assert!(check(&fs).is_err(), "{line}");
    }
}

#[test]
fn similar_looking_options_are_allowed() {
    let fs = fs_with("#!/bin/bash\n#SBATCH --exclusive\n#SBATCH -A myaccount\n#SBATCH --open-mode=append\n");
    assert_eq!(check(&fs).unwrap().len(), 3);
}

#[test]
fn foreign_directives_are_rejected() {
    for line in ["#PBS -l nodes=1", "#BSUB -n 4", "#$ -cwd", "#COBALT -t 10", "#MSUB -l x"] {
        let fs = fs_with(&format!("#!/bin/bash\n{line}\n"));
        assert!(reason(check(&fs)).contains("not supported"), "{line}");
    }
}

#[test]
fn script_must_exist_and_be_executable() {
    let fs = MockFileSystem::new();
    assert!(reason(check(&fs)).contains("does not exist"));

    fs.add_file(SCRIPT, "#!/bin/bash\n");
    assert!(reason(check(&fs)).contains("not executable"));
}

#[test]
fn script_must_live_in_the_job_directory() {
    let fs = MockFileSystem::new();
    fs.add_executable("/work/jobA/sub/run.sh", "#!/bin/bash\n");
    let err = validate_job_script(&fs, Path::new(DIR), Path::new("/work/jobA/sub/run.sh"));
    assert!(reason(err).contains("job directory"));
}

#[test]
fn reserved_names_are_rejected() {
    let fs = MockFileSystem::new();
    fs.add_executable("/work/jobA/jobwait.log", "#!/bin/bash\n");
    let err = validate_job_script(&fs, Path::new(DIR), Path::new("/work/jobA/jobwait.log"));
    assert!(reason(err).contains("reserved"));
}

#[test]
fn wrapper_copies_header_and_records_exit_code() {
    let wrapper = render_wrapper(
        "slurmjob.sh",
        &["#SBATCH --job-name=a".to_string(), "#SBATCH -N 1".to_string()],
    );
    let lines: Vec<&str> = wrapper.lines().collect();
    assert_eq!(lines[0], "#!/usr/bin/env bash");
    assert_eq!(lines[1], "#SBATCH --job-name=a");
    assert_eq!(lines[2], "#SBATCH -N 1");
    assert!(wrapper.contains("'./slurmjob.sh'"));
    assert!(wrapper.contains("echo $RETURN_CODE > 'jobwait.ret'"));
    assert!(wrapper.trim_end().ends_with("exit $RETURN_CODE"));
}
