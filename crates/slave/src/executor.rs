// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-side executor state machine
//!
//! ```text
//!                 start_setup
//!    IDLE  ──────────────────────►  RUNNING_SETUP
//!                                         │ setup commands complete
//!                                         ▼
//!                                  SETUP_COMPLETED
//!                       start_subjob │     ▲ subjob finished
//!                                    ▼     │ (more may follow)
//!                                    EXECUTING
//!                 teardown_build │         │ teardown done
//!                                ▼         ▼
//!                               RUNNING_TEARDOWN ──► IDLE
//! ```
//!
//! Out-of-order transitions are rejected as bad requests and leave the
//! state untouched. Per (build, slave) the guarantee is: at most one setup,
//! then subjobs in receive order, then exactly one teardown.

use crate::config::ExecutorConfig;
use crate::payload::pack_subjob_results;
use crate::runner::run_atom;
use clusterrunner_adapters::{ProjectError, ProjectType, ProjectTypeFactory};
use clusterrunner_core::{
    artifact_dir_name, join_script, BuildId, BuildSetup, JobConfig, SlaveState, Subjob,
    SubjobPayload,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors from executor operations
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Out-of-order transition or a subjob for the wrong build.
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("setup failed: {0}")]
    SetupFailed(String),
    #[error("teardown failed: {0}")]
    TeardownFailed(String),
    #[error("project error: {0}")]
    Project(#[from] ProjectError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("runner error: {0}")]
    Runner(#[from] crate::runner::RunnerError),
    #[error("payload error: {0}")]
    Payload(#[from] crate::payload::PayloadError),
}

struct ActiveBuild {
    build_id: BuildId,
    job_config: JobConfig,
    project: Arc<dyn ProjectType>,
}

struct ExecutorCell {
    state: SlaveState,
    build: Option<ActiveBuild>,
    active_subjobs: u32,
}

/// The state machine on one worker. Command execution happens outside the
/// state lock; the lock only guards the transitions.
pub struct SlaveExecutor {
    config: ExecutorConfig,
    num_executors: u32,
    project_factory: Arc<dyn ProjectTypeFactory>,
    cell: Mutex<ExecutorCell>,
}

impl SlaveExecutor {
    pub fn new(
        config: ExecutorConfig,
        num_executors: u32,
        project_factory: Arc<dyn ProjectTypeFactory>,
    ) -> Self {
        Self {
            config,
            num_executors: num_executors.max(1),
            project_factory,
            cell: Mutex::new(ExecutorCell {
                state: SlaveState::Idle,
                build: None,
                active_subjobs: 0,
            }),
        }
    }

    pub fn state(&self) -> SlaveState {
        self.cell.lock().state
    }

    pub fn current_build_id(&self) -> Option<BuildId> {
        self.cell.lock().build.as_ref().map(|b| b.build_id)
    }

    fn results_dir(&self, build_id: BuildId) -> PathBuf {
        self.config.results_root.join(format!("build_{}", build_id))
    }

    /// Materialize the workspace and run the build's setup commands.
    /// IDLE → RUNNING_SETUP → SETUP_COMPLETED.
    pub async fn run_setup(&self, setup: BuildSetup) -> Result<(), ExecutorError> {
        {
            let mut cell = self.cell.lock();
            if cell.state != SlaveState::Idle {
                return Err(ExecutorError::BadRequest(format!(
                    "cannot start setup in state {}",
                    cell.state
                )));
            }
            cell.state = SlaveState::RunningSetup;
        }
        tracing::info!(build = %setup.build_id, "running build setup");

        let result = self.run_setup_inner(&setup).await;
        match result {
            Ok(project) => {
                let mut cell = self.cell.lock();
                cell.build = Some(ActiveBuild {
                    build_id: setup.build_id,
                    job_config: setup.job_config,
                    project,
                });
                cell.state = SlaveState::SetupCompleted;
                Ok(())
            }
            Err(e) => {
                let mut cell = self.cell.lock();
                cell.state = SlaveState::Idle;
                cell.build = None;
                Err(e)
            }
        }
    }

    async fn run_setup_inner(
        &self,
        setup: &BuildSetup,
    ) -> Result<Arc<dyn ProjectType>, ExecutorError> {
        let project = self.project_factory.create(&setup.project_params)?;
        project.fetch_project().await?;
        std::fs::create_dir_all(self.results_dir(setup.build_id))?;

        if let Some(script) = join_script(&setup.job_config.setup_commands) {
            let outcome = project.execute_command_in_project(&script, None).await?;
            if !outcome.succeeded() {
                return Err(ExecutorError::SetupFailed(format!(
                    "setup exited {}: {}",
                    outcome.exit_code, outcome.output
                )));
            }
        }
        Ok(project)
    }

    /// Run one subjob's atoms sequentially and pack their artifacts.
    /// SETUP_COMPLETED ⇄ EXECUTING, bounded by the executor slot count.
    pub async fn run_subjob(&self, subjob: Subjob) -> Result<SubjobPayload, ExecutorError> {
        let (project, script, build_id) = {
            let mut cell = self.cell.lock();
            if !matches!(
                cell.state,
                SlaveState::SetupCompleted | SlaveState::Executing
            ) {
                return Err(ExecutorError::BadRequest(format!(
                    "cannot execute subjob in state {}",
                    cell.state
                )));
            }
            let build = match cell.build.as_ref() {
                Some(b) if b.build_id == subjob.build_id => b,
                Some(b) => {
                    return Err(ExecutorError::BadRequest(format!(
                        "subjob belongs to build {}, current build is {}",
                        subjob.build_id, b.build_id
                    )))
                }
                None => {
                    return Err(ExecutorError::BadRequest(
                        "no build is set up on this slave".to_string(),
                    ))
                }
            };
            if cell.active_subjobs >= self.num_executors {
                return Err(ExecutorError::BadRequest(
                    "all executor slots are busy".to_string(),
                ));
            }
            let script = join_script(&subjob.commands).unwrap_or_default();
            let project = Arc::clone(&build.project);
            let build_id = build.build_id;
            cell.active_subjobs += 1;
            cell.state = SlaveState::Executing;
            (project, script, build_id)
        };

        tracing::info!(
            build = %build_id,
            subjob = %subjob.subjob_id,
            atoms = subjob.atoms.len(),
            "executing subjob"
        );
        let result = self.run_subjob_inner(&subjob, &project, &script, build_id).await;

        {
            let mut cell = self.cell.lock();
            cell.active_subjobs = cell.active_subjobs.saturating_sub(1);
            if cell.active_subjobs == 0 && cell.state == SlaveState::Executing {
                cell.state = SlaveState::SetupCompleted;
            }
        }
        result
    }

    async fn run_subjob_inner(
        &self,
        subjob: &Subjob,
        project: &Arc<dyn ProjectType>,
        script: &str,
        build_id: BuildId,
    ) -> Result<SubjobPayload, ExecutorError> {
        let results_dir = self.results_dir(build_id);
        for (atom_index, atom) in subjob.atoms.iter().enumerate() {
            let artifact_dir =
                results_dir.join(artifact_dir_name(subjob.subjob_id, atom_index));
            let exit_code = run_atom(
                project.project_directory(),
                &artifact_dir,
                script,
                atom,
                self.config.command_timeout,
            )
            .await?;
            if exit_code != 0 {
                tracing::warn!(
                    build = %build_id,
                    subjob = %subjob.subjob_id,
                    atom = %atom.id,
                    exit_code,
                    "atom exited non-zero"
                );
            }
        }
        Ok(pack_subjob_results(&results_dir, subjob)?)
    }

    /// Run the build's teardown commands and return to idle.
    /// SETUP_COMPLETED → RUNNING_TEARDOWN → IDLE.
    pub async fn run_teardown(&self) -> Result<(), ExecutorError> {
        let (project, script, build_id) = {
            let mut cell = self.cell.lock();
            if cell.state != SlaveState::SetupCompleted {
                return Err(ExecutorError::BadRequest(format!(
                    "cannot tear down in state {}",
                    cell.state
                )));
            }
            let build = match cell.build.as_ref() {
                Some(b) => b,
                None => {
                    return Err(ExecutorError::BadRequest(
                        "no build is set up on this slave".to_string(),
                    ))
                }
            };
            let script = join_script(&build.job_config.teardown_commands);
            let project = Arc::clone(&build.project);
            let build_id = build.build_id;
            cell.state = SlaveState::RunningTeardown;
            (project, script, build_id)
        };

        tracing::info!(build = %build_id, "running build teardown");
        let mut failure = None;
        if let Some(script) = script {
            match project.execute_command_in_project(&script, None).await {
                Ok(outcome) if !outcome.succeeded() => {
                    failure = Some(format!(
                        "teardown exited {}: {}",
                        outcome.exit_code, outcome.output
                    ));
                }
                Ok(_) => {}
                Err(e) => failure = Some(e.to_string()),
            }
        }

        // The build is over either way; the executor goes back to idle.
        {
            let mut cell = self.cell.lock();
            cell.state = SlaveState::Idle;
            cell.build = None;
        }
        match failure {
            Some(msg) => Err(ExecutorError::TeardownFailed(msg)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
