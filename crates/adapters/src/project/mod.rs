// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project-type capability: materializing and querying a build workspace

mod directory;
mod git;

pub use directory::DirectoryProject;
pub use git::{GitConfig, GitProject};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeProject;

use crate::subprocess::{self, CommandOutcome};
use async_trait::async_trait;
use clusterrunner_core::JobConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors from project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("command execution failed: {0}")]
    Command(String),
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability for one project workspace: fetch it, run commands in it, and
/// answer questions about its jobs. Implementations (git, local directory)
/// are pluggable; the scheduler only sees this interface.
#[async_trait]
pub trait ProjectType: Send + Sync {
    /// Materialize the working tree. Must be called before atomization.
    async fn fetch_project(&self) -> Result<(), ProjectError>;

    /// Run a shell command in the workspace with `PROJECT_DIR` exported.
    ///
    /// A non-zero exit is an outcome, not an error.
    async fn execute_command_in_project(
        &self,
        command: &str,
        cwd: Option<&Path>,
    ) -> Result<CommandOutcome, ProjectError>;

    /// Job description by name, as produced by the external config parser.
    fn job_config(&self, job_name: &str) -> Result<JobConfig, ProjectError>;

    /// Where historical per-atom timing data for a job lives.
    fn timing_file_path(&self, job_name: &str) -> PathBuf;

    /// Parameter overrides to apply when forwarding this project to a slave
    /// (e.g. pointing it at the master's cached repository).
    fn slave_param_overrides(&self) -> HashMap<String, String>;

    /// The workspace root commands execute in.
    fn project_directory(&self) -> &Path;
}

/// Builds a [`ProjectType`] from validated build request parameters.
pub trait ProjectTypeFactory: Send + Sync {
    fn create(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<Arc<dyn ProjectType>, ProjectError>;
}

/// Production factory covering the built-in project types.
///
/// The job catalog comes from the external config parser; it is injected
/// here rather than read from process globals.
pub struct StandardProjectFactory {
    git_config: GitConfig,
    jobs: HashMap<String, JobConfig>,
}

impl StandardProjectFactory {
    pub fn new(git_config: GitConfig, jobs: HashMap<String, JobConfig>) -> Self {
        Self { git_config, jobs }
    }
}

impl ProjectTypeFactory for StandardProjectFactory {
    fn create(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<Arc<dyn ProjectType>, ProjectError> {
        let kind = params
            .get("type")
            .map(String::as_str)
            .ok_or_else(|| ProjectError::Fetch("missing project type".to_string()))?;
        match kind {
            "git" => {
                let url = params
                    .get("url")
                    .ok_or_else(|| ProjectError::Fetch("missing git url".to_string()))?;
                Ok(Arc::new(GitProject::new(
                    url.clone(),
                    params.get("remote").cloned(),
                    params.get("branch").cloned(),
                    self.git_config.clone(),
                    self.jobs.clone(),
                )))
            }
            "directory" => {
                let dir = params.get("project_directory").ok_or_else(|| {
                    ProjectError::Fetch("missing project_directory".to_string())
                })?;
                Ok(Arc::new(DirectoryProject::new(
                    PathBuf::from(dir),
                    self.jobs.clone(),
                )))
            }
            other => Err(ProjectError::Fetch(format!(
                "unknown project type: {}",
                other
            ))),
        }
    }
}

/// Shared implementation of [`ProjectType::execute_command_in_project`].
///
/// The working directory is the project directory when it exists; before
/// the first fetch it may not, and the command then runs from the caller's
/// cwd (some commands, like `git clone`, create the directory themselves).
pub(crate) async fn execute_in_project_dir(
    project_dir: &Path,
    command: &str,
    cwd: Option<&Path>,
    timeout: std::time::Duration,
) -> Result<CommandOutcome, ProjectError> {
    let effective_cwd = match cwd {
        Some(dir) => Some(dir),
        None if project_dir.exists() => Some(project_dir),
        None => None,
    };
    let env = vec![(
        "PROJECT_DIR".to_string(),
        project_dir.display().to_string(),
    )];
    subprocess::run_shell(command, effective_cwd, &env, timeout, command)
        .await
        .map_err(|e| ProjectError::Command(e.to_string()))
}
