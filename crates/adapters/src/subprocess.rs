// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;

/// Default timeout for job, setup, and teardown commands.
/// Set to 10 minutes as a safety net for long-running user scripts.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// Default timeout for atomizer generator commands.
pub const GENERATOR_TIMEOUT: Duration = Duration::from_secs(120);

/// Default timeout for git remote operations (clone/fetch).
pub const GIT_REMOTE_TIMEOUT: Duration = Duration::from_secs(600);

/// Synthetic exit code recorded when a command exceeds its timeout.
/// Timeout expiry is treated exactly like a non-zero exit.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Errors from subprocess invocation. Note that a command *failing* is not
/// an error here — non-zero exits and timeouts come back as a
/// [`CommandOutcome`]; only the inability to run the shell at all errors.
#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("failed to spawn shell for {description}: {source}")]
    Spawn {
        description: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result of one shell invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub exit_code: i32,
    /// Combined stdout + stderr.
    pub output: String,
    pub duration: Duration,
}

impl CommandOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run a shell script with a timeout.
///
/// The script runs under `sh -c` with stderr folded into stdout. Timeout
/// expiry kills the child (tokio `kill_on_drop`) and yields a
/// [`CommandOutcome`] with [`TIMEOUT_EXIT_CODE`].
pub async fn run_shell(
    script: &str,
    cwd: Option<&Path>,
    env: &[(String, String)],
    timeout: Duration,
    description: &str,
) -> Result<CommandOutcome, SubprocessError> {
    // `exec 2>&1` folds stderr into the captured stdout stream so console
    // output lands in a single artifact file in execution order.
    let wrapped = format!("exec 2>&1\n{}", script);

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(wrapped)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }

    let started = Instant::now();
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(CommandOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            output: String::from_utf8_lossy(&output.stdout).into_owned(),
            duration: started.elapsed(),
        }),
        Ok(Err(io_err)) => Err(SubprocessError::Spawn {
            description: description.to_string(),
            source: io_err,
        }),
        Err(_elapsed) => {
            tracing::warn!(
                description,
                timeout_secs = timeout.as_secs(),
                "command timed out"
            );
            Ok(CommandOutcome {
                exit_code: TIMEOUT_EXIT_CODE,
                output: format!("{} timed out after {}s", description, timeout.as_secs()),
                duration: started.elapsed(),
            })
        }
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
