// src/exec/process.rs

//! One-shot subprocess runner for the scheduler CLI tools.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run `program args...`, optionally in `cwd` and with `stdin` piped in,
/// and wait for it to exit.
///
/// Only spawning/IO problems are errors; a non-zero exit is reported through
/// [`CommandOutput::code`] so callers can classify it.
pub async fn run_command(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    stdin: Option<&str>,
) -> Result<CommandOutput> {
    debug!(program, ?args, ?cwd, "spawning scheduler command");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning '{program}'"))?;

    if let Some(input) = stdin {
        let mut pipe = child
            .stdin
            .take()
            .with_context(|| format!("no stdin pipe for '{program}'"))?;
        pipe.write_all(input.as_bytes())
            .await
            .with_context(|| format!("writing stdin of '{program}'"))?;
        // Dropping the pipe closes it so the child sees EOF.
        drop(pipe);
    }

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for '{program}'"))?;

    let result = CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    info!(
        program,
        exit_code = ?result.code,
        stdout_bytes = result.stdout.len(),
        "scheduler command exited"
    );
    if !result.stderr.trim().is_empty() {
        debug!(program, "stderr: {}", result.stderr.trim());
    }

    Ok(result)
}
