// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake project type for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ProjectError, ProjectType};
use crate::subprocess::CommandOutcome;
use async_trait::async_trait;
use clusterrunner_core::JobConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

struct FakeProjectState {
    jobs: HashMap<String, JobConfig>,
    command_results: HashMap<String, CommandOutcome>,
    executed: Vec<String>,
    fetch_count: u32,
    fail_fetch: Option<String>,
    overrides: HashMap<String, String>,
}

/// Fake project type with scripted command results.
#[derive(Clone)]
pub struct FakeProject {
    dir: PathBuf,
    inner: Arc<Mutex<FakeProjectState>>,
}

impl FakeProject {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            inner: Arc::new(Mutex::new(FakeProjectState {
                jobs: HashMap::new(),
                command_results: HashMap::new(),
                executed: Vec::new(),
                fetch_count: 0,
                fail_fetch: None,
                overrides: HashMap::new(),
            })),
        }
    }

    pub fn add_job(&self, config: JobConfig) {
        let mut state = self.inner.lock();
        state.jobs.insert(config.name.clone(), config);
    }

    /// Script the outcome of one command string.
    pub fn set_command_result(&self, command: &str, exit_code: i32, output: &str) {
        self.inner.lock().command_results.insert(
            command.to_string(),
            CommandOutcome {
                exit_code,
                output: output.to_string(),
                duration: Duration::ZERO,
            },
        );
    }

    /// Script a generator command to emit one value per line.
    pub fn stub_generator(&self, command: &str, lines: &[&str]) {
        let mut output = lines.join("\n");
        output.push('\n');
        self.set_command_result(command, 0, &output);
    }

    pub fn set_fetch_failure(&self, message: &str) {
        self.inner.lock().fail_fetch = Some(message.to_string());
    }

    pub fn set_slave_param_overrides(&self, overrides: HashMap<String, String>) {
        self.inner.lock().overrides = overrides;
    }

    pub fn fetch_count(&self) -> u32 {
        self.inner.lock().fetch_count
    }

    /// Commands executed in the project, in order.
    pub fn executed_commands(&self) -> Vec<String> {
        self.inner.lock().executed.clone()
    }
}

#[async_trait]
impl ProjectType for FakeProject {
    async fn fetch_project(&self) -> Result<(), ProjectError> {
        let mut state = self.inner.lock();
        state.fetch_count += 1;
        match &state.fail_fetch {
            Some(msg) => Err(ProjectError::Fetch(msg.clone())),
            None => Ok(()),
        }
    }

    async fn execute_command_in_project(
        &self,
        command: &str,
        _cwd: Option<&Path>,
    ) -> Result<CommandOutcome, ProjectError> {
        let mut state = self.inner.lock();
        state.executed.push(command.to_string());
        Ok(state
            .command_results
            .get(command)
            .cloned()
            .unwrap_or(CommandOutcome {
                exit_code: 0,
                output: String::new(),
                duration: Duration::ZERO,
            }))
    }

    fn job_config(&self, job_name: &str) -> Result<JobConfig, ProjectError> {
        self.inner
            .lock()
            .jobs
            .get(job_name)
            .cloned()
            .ok_or_else(|| ProjectError::JobNotFound(job_name.to_string()))
    }

    fn timing_file_path(&self, job_name: &str) -> PathBuf {
        self.dir.join(format!("{}.timing.json", job_name))
    }

    fn slave_param_overrides(&self) -> HashMap<String, String> {
        self.inner.lock().overrides.clone()
    }

    fn project_directory(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
