// src/exec/parse.rs

//! Parsers for the text printed by the SLURM command line tools.

use std::sync::LazyLock;

use regex::Regex;

use crate::exec::backend::{Listing, Submission, SubmitError};

/// `sacct --parsable2 --noheader -o JobID,State` line, e.g.
/// `246748|CANCELLED by 2540019` or `246912_3|RUNNING`.
static SACCT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<id>[0-9][0-9A-Za-z_+.\[\]-]*)\|(?P<state>[A-Z_]+)\b").expect("valid sacct regex")
});

static JOB_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("valid job id regex"));

/// Fragments of sbatch error messages that indicate a temporary condition.
const TRANSIENT_MARKERS: &[&str] = &[
    "socket timed out",
    "unable to contact slurm controller",
    "resource temporarily unavailable",
    "temporarily unable",
    "try again",
    "connection refused",
    "zero bytes were transmitted",
    "slurm_persist_conn_open",
    "job submit/allocate failed: unexpected message",
];

/// Parse status listing output into a job id → state map.
///
/// Any non-empty line that does not look like `id|STATE` makes the whole
/// output invalid: a half-understood listing must not be mistaken for
/// "these jobs are unlisted".
pub fn parse_sacct_out(out: &str) -> Result<Listing, String> {
    let mut listing = Listing::new();
    for (lineno, line) in out.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let caps = SACCT_LINE
            .captures(line)
            .ok_or_else(|| format!("line {}: cannot parse '{}'", lineno + 1, line))?;
        listing.insert(caps["id"].to_string(), caps["state"].to_string());
    }
    Ok(listing)
}

/// Parse the `--parsable` output of sbatch: `<jobid>` or `<jobid>;<cluster>`.
pub fn parse_sbatch(stdout: &str) -> Result<Submission, String> {
    let trimmed = stdout.trim();
    let mut parts = trimmed.split(';');
    let job_id = parts.next().unwrap_or_default().trim();
    let cluster = parts.next().map(|c| c.trim().to_string());
    if parts.next().is_some() || !is_valid_job_id(job_id) {
        return Err(format!("cannot parse sbatch output: '{trimmed}'"));
    }
    Ok(Submission {
        job_id: job_id.to_string(),
        cluster: cluster.filter(|c| !c.is_empty()),
    })
}

pub fn is_valid_job_id(id: &str) -> bool {
    JOB_ID.is_match(id)
}

/// Decide whether a failed sbatch call is worth retrying.
///
/// A process killed by a signal (`code == None`) or a message matching one
/// of the known temporary conditions is transient; everything else is
/// permanent.
pub fn classify_submit_failure(code: Option<i32>, stderr: &str) -> SubmitError {
    let message = match stderr.trim() {
        "" => format!("sbatch exited with code {code:?}"),
        text => text.to_string(),
    };
    let lowered = message.to_lowercase();
    if code.is_none() || TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m)) {
        SubmitError::Transient(message)
    } else {
        SubmitError::Permanent(message)
    }
}
