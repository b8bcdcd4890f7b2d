// src/controller/validate.rs

//! Job script checks performed before anything is handed to the scheduler.

use std::path::Path;

use crate::errors::{JobwaitError, Result};
use crate::fs::FileSystem;
use crate::joblog::RESERVED_FILES;

const SBATCH_PREFIX: &str = "#SBATCH";

/// Directive prefixes of other batch systems.
const FOREIGN_DIRECTIVES: &[(&str, &str)] = &[
    ("#PBS", "PBS/Torque"),
    ("#BSUB", "LSF"),
    ("#$ ", "Grid Engine"),
    ("#COBALT", "Cobalt"),
    ("#MSUB", "Moab"),
    ("#FLUX:", "Flux"),
];

/// sbatch options the controller owns or does not support.
/// (short flag, long flag, reason)
const FORBIDDEN_OPTIONS: &[(&str, &str, &str)] = &[
    ("-o", "--output", "output redirection is managed by jobwait"),
    ("-e", "--error", "error redirection is managed by jobwait"),
    ("-a", "--array", "array jobs are not supported (one job per directory)"),
    ("-W", "--wait", "blocking submission is not supported"),
];

fn invalid(script: &Path, reason: impl Into<String>) -> JobwaitError {
    JobwaitError::Validation {
        script: script.to_path_buf(),
        reason: reason.into(),
    }
}

/// Validate `script` for submission from `directory`.
///
/// On success, returns the script's `#SBATCH` lines so they can be copied
/// into the submission wrapper.
pub fn validate_job_script(
    fs: &dyn FileSystem,
    directory: &Path,
    script: &Path,
) -> Result<Vec<String>> {
    if script.parent() != Some(directory) {
        return Err(invalid(
            script,
            format!(
                "job script must live directly in the job directory {:?} (one job per directory)",
                directory
            ),
        ));
    }
    let name = script
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| invalid(script, "job script has no usable file name"))?;
    if RESERVED_FILES.contains(&name) {
        return Err(invalid(
            script,
            format!("'{name}' is reserved for jobwait's own files"),
        ));
    }
    if !fs.is_file(script) {
        return Err(invalid(script, "job script does not exist"));
    }
    if !fs.is_executable(script) {
        return Err(invalid(script, "job script is not executable"));
    }

    let text = fs.read_to_string(script)?;
    if !text.starts_with("#!") {
        return Err(invalid(
            script,
            "job script must start with an interpreter line (#!)",
        ));
    }

    let mut header = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim_start();
        if let Some((_, scheduler)) = FOREIGN_DIRECTIVES
            .iter()
            .find(|(prefix, _)| trimmed.starts_with(prefix))
        {
            return Err(invalid(
                script,
                format!("line {}: {scheduler} directive is not supported: {trimmed}", idx + 1),
            ));
        }
        let Some(options) = trimmed.strip_prefix(SBATCH_PREFIX) else {
            continue;
        };
        for token in options.split_whitespace() {
            if let Some(reason) = forbidden_reason(token) {
                return Err(invalid(
                    script,
                    format!("line {}: '{token}': {reason}", idx + 1),
                ));
            }
        }
        header.push(trimmed.to_string());
    }

    Ok(header)
}

fn forbidden_reason(token: &str) -> Option<&'static str> {
    FORBIDDEN_OPTIONS.iter().find_map(|(short, long, reason)| {
        let long_match = token == *long || token.starts_with(&format!("{long}="));
        let short_match = !token.starts_with("--") && token.starts_with(short);
        (long_match || short_match).then_some(*reason)
    })
}
