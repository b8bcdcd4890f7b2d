// src/exec/slurm.rs

//! SLURM implementation of [`SchedulerBackend`] on top of `sacct`, `sbatch`
//! and `scancel`.

use std::time::Duration;

use tracing::{info, warn};

use crate::errors::{JobwaitError, Result};
use crate::exec::backend::{
    BackendFuture, Listing, SchedulerBackend, Submission, SubmitError, SubmitRequest,
};
use crate::exec::parse::{classify_submit_failure, parse_sacct_out, parse_sbatch};
use crate::exec::process::run_command;

/// Names of the SLURM binaries, overridable for sites with wrappers.
#[derive(Debug, Clone)]
pub struct SlurmBackend {
    pub sacct: String,
    pub sbatch: String,
    pub scancel: String,
}

impl Default for SlurmBackend {
    fn default() -> Self {
        Self {
            sacct: "sacct".to_string(),
            sbatch: "sbatch".to_string(),
            scancel: "scancel".to_string(),
        }
    }
}

impl SlurmBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn sacct_args(cluster: Option<&str>, lookback: Duration) -> Vec<String> {
        let mut args = vec![
            "--allocations".to_string(),
            "--noheader".to_string(),
            "--parsable2".to_string(),
            "--format=JobID,State".to_string(),
            format!("--starttime=now-{}", lookback.as_secs().max(1)),
        ];
        if let Some(cluster) = cluster {
            args.push(format!("--clusters={cluster}"));
        }
        args
    }

    fn sbatch_command(&self, request: &SubmitRequest) -> String {
        let sbatch = format!(
            "{} --parsable -o '{}' -e '{}'",
            self.sbatch,
            request.stdout.display(),
            request.stderr.display()
        );
        match &request.pre_submit {
            Some(rc) => format!("{rc} < /dev/null && {sbatch}"),
            None => sbatch,
        }
    }

    async fn run_query(&self, cluster: Option<&str>, lookback: Duration) -> Result<Listing> {
        let args = Self::sacct_args(cluster, lookback);
        let out = run_command(&self.sacct, &args, None, None)
            .await
            .map_err(|e| JobwaitError::QueryFailure(format!("{e:#}")))?;
        if !out.success() {
            return Err(JobwaitError::QueryFailure(format!(
                "{} exited with code {:?}: {}",
                self.sacct,
                out.code,
                out.stderr.trim()
            )));
        }
        parse_sacct_out(&out.stdout).map_err(JobwaitError::QueryFailure)
    }

    async fn run_submit(
        &self,
        request: &SubmitRequest,
    ) -> std::result::Result<Submission, SubmitError> {
        let command = self.sbatch_command(request);
        let args = vec!["-c".to_string(), command];
        let out = run_command("sh", &args, Some(&request.directory), Some(&request.wrapper))
            .await
            .map_err(|e| SubmitError::Permanent(format!("{e:#}")))?;
        if !out.success() {
            let err = classify_submit_failure(out.code, &out.stderr);
            warn!(dir = ?request.directory, error = %err, "sbatch failed");
            return Err(err);
        }
        let submission = parse_sbatch(&out.stdout).map_err(SubmitError::Permanent)?;
        info!(
            dir = ?request.directory,
            job_id = %submission.job_id,
            cluster = ?submission.cluster,
            "job submitted"
        );
        Ok(submission)
    }

    async fn run_cancel(&self, job_id: &str, cluster: Option<&str>) -> Result<()> {
        let mut args = Vec::new();
        if let Some(cluster) = cluster {
            args.push(format!("--clusters={cluster}"));
        }
        args.push(job_id.to_string());
        let out = run_command(&self.scancel, &args, None, None).await?;
        if !out.success() {
            return Err(JobwaitError::Other(anyhow::anyhow!(
                "{} {} exited with code {:?}: {}",
                self.scancel,
                job_id,
                out.code,
                out.stderr.trim()
            )));
        }
        info!(job_id, cluster = ?cluster, "job cancelled");
        Ok(())
    }
}

impl SchedulerBackend for SlurmBackend {
    fn query<'a>(
        &'a self,
        cluster: Option<&'a str>,
        lookback: Duration,
    ) -> BackendFuture<'a, Result<Listing>> {
        Box::pin(self.run_query(cluster, lookback))
    }

    fn submit<'a>(
        &'a self,
        request: &'a SubmitRequest,
    ) -> BackendFuture<'a, std::result::Result<Submission, SubmitError>> {
        Box::pin(self.run_submit(request))
    }

    fn cancel<'a>(
        &'a self,
        job_id: &'a str,
        cluster: Option<&'a str>,
    ) -> BackendFuture<'a, Result<()>> {
        Box::pin(self.run_cancel(job_id, cluster))
    }

    fn cancel_command(&self, job_id: &str, cluster: Option<&str>) -> String {
        match cluster {
            Some(cluster) => format!("{} -M {} {}", self.scancel, cluster, job_id),
            None => format!("{} {}", self.scancel, job_id),
        }
    }
}
