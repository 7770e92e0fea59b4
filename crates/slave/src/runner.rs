// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-atom command execution
//!
//! Commands run in a shell with `PROJECT_DIR`, `ARTIFACT_DIR`, and all atom
//! bindings exported, cwd at the project directory. Four meta files land in
//! the atom's artifact directory regardless of outcome.

use clusterrunner_adapters::subprocess::run_shell;
use clusterrunner_core::subjob::{
    COMMAND_FILENAME, CONSOLE_OUTPUT_FILENAME, EXIT_CODE_FILENAME, TIME_FILENAME,
};
use clusterrunner_core::Atom;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors writing artifacts or spawning the shell. A command *failing* is
/// not an error; the exit code is data.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("shell error: {0}")]
    Shell(String),
}

/// Run one atom's command script and persist the artifact contract files.
/// Returns the atom's exit code.
pub async fn run_atom(
    project_dir: &Path,
    artifact_dir: &Path,
    script: &str,
    atom: &Atom,
    timeout: Duration,
) -> Result<i32, RunnerError> {
    std::fs::create_dir_all(artifact_dir)?;

    let mut env: Vec<(String, String)> = vec![
        ("PROJECT_DIR".to_string(), project_dir.display().to_string()),
        (
            "ARTIFACT_DIR".to_string(),
            artifact_dir.display().to_string(),
        ),
    ];
    for (key, value) in &atom.env {
        env.push((key.clone(), value.clone()));
    }

    let outcome = run_shell(script, Some(project_dir), &env, timeout, "atom command")
        .await
        .map_err(|e| RunnerError::Shell(e.to_string()))?;

    std::fs::write(artifact_dir.join(COMMAND_FILENAME), format!("{}\n", script))?;
    std::fs::write(artifact_dir.join(CONSOLE_OUTPUT_FILENAME), &outcome.output)?;
    std::fs::write(
        artifact_dir.join(EXIT_CODE_FILENAME),
        format!("{}\n", outcome.exit_code),
    )?;
    std::fs::write(
        artifact_dir.join(TIME_FILENAME),
        format!("{:.3}\n", outcome.duration.as_secs_f64()),
    )?;

    Ok(outcome.exit_code)
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
