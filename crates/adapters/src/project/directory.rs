// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project type backed by an existing local directory

use super::{execute_in_project_dir, ProjectError, ProjectType};
use crate::subprocess::{CommandOutcome, DEFAULT_COMMAND_TIMEOUT};
use async_trait::async_trait;
use clusterrunner_core::JobConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A project that already exists on local disk. Fetch is a validation
/// no-op; useful for masters and slaves sharing a filesystem, and for
/// tests.
pub struct DirectoryProject {
    dir: PathBuf,
    jobs: HashMap<String, JobConfig>,
}

impl DirectoryProject {
    pub fn new(dir: PathBuf, jobs: HashMap<String, JobConfig>) -> Self {
        Self { dir, jobs }
    }
}

#[async_trait]
impl ProjectType for DirectoryProject {
    async fn fetch_project(&self) -> Result<(), ProjectError> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(ProjectError::Fetch(format!(
                "project directory does not exist: {}",
                self.dir.display()
            )))
        }
    }

    async fn execute_command_in_project(
        &self,
        command: &str,
        cwd: Option<&Path>,
    ) -> Result<CommandOutcome, ProjectError> {
        execute_in_project_dir(&self.dir, command, cwd, DEFAULT_COMMAND_TIMEOUT).await
    }

    fn job_config(&self, job_name: &str) -> Result<JobConfig, ProjectError> {
        self.jobs
            .get(job_name)
            .cloned()
            .ok_or_else(|| ProjectError::JobNotFound(job_name.to_string()))
    }

    fn timing_file_path(&self, job_name: &str) -> PathBuf {
        self.dir
            .join(".clusterrunner/timing")
            .join(format!("{}.timing.json", job_name))
    }

    fn slave_param_overrides(&self) -> HashMap<String, String> {
        // Slaves reach the same directory; nothing to redirect.
        HashMap::new()
    }

    fn project_directory(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
