// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Build aggregate: one end-to-end execution of a job
//!
//! A build owns its request, job config, subjobs, result state, and
//! artifact directory. All mutable state sits behind one mutex; methods
//! that talk to slaves compute a plan under the lock, release it, then
//! perform the I/O.

use crate::artifacts;
use crate::atomizer::atomize;
use crate::config::MasterConfig;
use crate::error::MasterError;
use crate::slave::Slave;
use clusterrunner_adapters::{with_retries, ProjectType};
use clusterrunner_core::{
    AtomId, BuildId, BuildRequest, BuildSetup, BuildState, Clock, JobConfig, SlaveId, SlaveState,
    Subjob, SubjobId, SubjobPayload,
};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

struct BuildInner {
    state: BuildState,
    job_config: Option<JobConfig>,
    project: Option<Arc<dyn ProjectType>>,
    /// Set once at PREPARED, never mutated thereafter.
    subjobs: Vec<Subjob>,
    /// Subjobs not yet handed to any slave, in atomization order.
    pending: VecDeque<SubjobId>,
    /// Subjobs currently running, with the slave carrying each.
    in_flight: HashMap<SubjobId, SlaveId>,
    /// Subjobs already re-enqueued once after losing their slave.
    requeued_once: HashSet<SubjobId>,
    /// Subjobs whose payload has been unpacked (exactly-once guard).
    unpacked: HashSet<SubjobId>,
    /// Subjobs counted complete (exactly-once guard for the counter).
    completed: HashSet<SubjobId>,
    subjobs_remaining: usize,
    allocated_slaves: HashMap<SlaveId, Arc<Slave>>,
    setup_completed_slaves: HashSet<SlaveId>,
    /// Slaves whose single teardown has been issued.
    torn_down_slaves: HashSet<SlaveId>,
    is_canceled: bool,
    failed_atom_ids: BTreeSet<AtomId>,
    artifact_dir: Option<PathBuf>,
    completion_ts_ms: Option<u64>,
    finish_started: bool,
    error: Option<String>,
}

/// Mutable aggregate root for one build.
pub struct Build {
    build_id: BuildId,
    request: BuildRequest,
    clock: Arc<dyn Clock>,
    config: Arc<MasterConfig>,
    inner: Mutex<BuildInner>,
}

impl Build {
    pub fn new(
        build_id: BuildId,
        request: BuildRequest,
        clock: Arc<dyn Clock>,
        config: Arc<MasterConfig>,
    ) -> Self {
        Self {
            build_id,
            request,
            clock,
            config,
            inner: Mutex::new(BuildInner {
                state: BuildState::Queued,
                job_config: None,
                project: None,
                subjobs: Vec::new(),
                pending: VecDeque::new(),
                in_flight: HashMap::new(),
                requeued_once: HashSet::new(),
                unpacked: HashSet::new(),
                completed: HashSet::new(),
                subjobs_remaining: 0,
                allocated_slaves: HashMap::new(),
                setup_completed_slaves: HashSet::new(),
                torn_down_slaves: HashSet::new(),
                is_canceled: false,
                failed_atom_ids: BTreeSet::new(),
                artifact_dir: None,
                completion_ts_ms: None,
                finish_started: false,
                error: None,
            }),
        }
    }

    pub fn build_id(&self) -> BuildId {
        self.build_id
    }

    pub fn request(&self) -> &BuildRequest {
        &self.request
    }

    pub fn state(&self) -> BuildState {
        self.inner.lock().state
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.lock().is_canceled
    }

    pub fn subjobs_remaining(&self) -> usize {
        self.inner.lock().subjobs_remaining
    }

    pub fn num_subjobs(&self) -> usize {
        self.inner.lock().subjobs.len()
    }

    pub fn num_atoms(&self) -> usize {
        self.inner.lock().subjobs.iter().map(|s| s.atoms.len()).sum()
    }

    pub fn subjob(&self, subjob_id: SubjobId) -> Option<Subjob> {
        self.inner
            .lock()
            .subjobs
            .get(subjob_id.value() as usize)
            .cloned()
    }

    pub fn artifact_directory(&self) -> Option<PathBuf> {
        self.inner.lock().artifact_dir.clone()
    }

    pub fn failed_atom_ids(&self) -> BTreeSet<AtomId> {
        self.inner.lock().failed_atom_ids.clone()
    }

    /// True when any atom exited non-zero (surfaced via failures.txt).
    pub fn expected_to_fail(&self) -> bool {
        !self.inner.lock().failed_atom_ids.is_empty()
    }

    pub fn completion_timestamp_ms(&self) -> Option<u64> {
        self.inner.lock().completion_ts_ms
    }

    pub fn error_message(&self) -> Option<String> {
        self.inner.lock().error.clone()
    }

    pub fn allocated_slave_ids(&self) -> Vec<SlaveId> {
        let mut ids: Vec<SlaveId> = self.inner.lock().allocated_slaves.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn setup_completed_slave_ids(&self) -> Vec<SlaveId> {
        let mut ids: Vec<SlaveId> = self
            .inner
            .lock()
            .setup_completed_slaves
            .iter()
            .copied()
            .collect();
        ids.sort();
        ids
    }

    pub fn pending_subjob_ids(&self) -> Vec<SubjobId> {
        self.inner.lock().pending.iter().copied().collect()
    }

    /// Fetch the project, read its job config, atomize, and construct
    /// subjobs. QUEUED → PREPARED (errors land in ERRORED).
    pub async fn prepare(&self, project: Arc<dyn ProjectType>) -> Result<(), MasterError> {
        {
            let mut inner = self.inner.lock();
            if inner.state != BuildState::Queued {
                return Err(MasterError::PreconditionFailed(format!(
                    "cannot prepare build {} in state {}",
                    self.build_id, inner.state
                )));
            }
            inner.state = BuildState::Preparing;
        }
        tracing::info!(build = %self.build_id, "preparing build");
        let result = self.prepare_inner(&project).await;
        if let Err(e) = &result {
            self.mark_errored(&e.to_string());
        }
        result
    }

    async fn prepare_inner(&self, project: &Arc<dyn ProjectType>) -> Result<(), MasterError> {
        let artifact_dir =
            artifacts::create_build_artifact_dir(&self.config.artifacts_root, self.build_id)?;
        project.fetch_project().await?;

        let job_name = self
            .request
            .job_name()
            .ok_or_else(|| MasterError::BadRequest("build request is missing job_name".into()))?
            .to_string();
        let job_config = project.job_config(&job_name)?;
        let atoms = atomize(&job_config, project.as_ref()).await?;

        // Simplest grouping policy: each atom becomes its own subjob.
        let subjobs: Vec<Subjob> = atoms
            .into_iter()
            .enumerate()
            .map(|(i, atom)| {
                Subjob::new(
                    self.build_id,
                    SubjobId::new(i as u64),
                    vec![atom],
                    job_config.commands.clone(),
                )
            })
            .collect();

        let mut inner = self.inner.lock();
        inner.artifact_dir = Some(artifact_dir);
        inner.project = Some(Arc::clone(project));
        inner.pending = subjobs.iter().map(|s| s.subjob_id).collect();
        inner.subjobs_remaining = subjobs.len();
        inner.subjobs = subjobs;
        inner.job_config = Some(job_config);
        if inner.subjobs.is_empty() {
            // Nothing to run; skip straight to awaiting finish.
            inner.state = BuildState::MarkedForCompletion;
            inner.completion_ts_ms = Some(self.clock.epoch_ms());
        } else {
            inner.state = BuildState::Prepared;
        }
        tracing::info!(
            build = %self.build_id,
            subjobs = inner.subjobs.len(),
            "build prepared"
        );
        Ok(())
    }

    /// Whether the scheduler should bind another slave to this build.
    pub fn needs_more_slaves(&self) -> bool {
        let inner = self.inner.lock();
        if inner.is_canceled
            || !matches!(inner.state, BuildState::Prepared | BuildState::Building)
        {
            return false;
        }
        let max_executors = inner
            .job_config
            .as_ref()
            .map(|c| c.max_executors as usize)
            .unwrap_or(0);
        inner.allocated_slaves.len() < max_executors.min(inner.subjobs_remaining)
    }

    /// Bind a slave to this build and start its per-slave setup.
    /// Idempotent per slave.
    pub async fn allocate_slave(&self, slave: &Arc<Slave>) -> Result<(), MasterError> {
        let setup = {
            let mut inner = self.inner.lock();
            if inner.allocated_slaves.contains_key(&slave.id()) {
                return Ok(());
            }
            if inner.is_canceled
                || !matches!(inner.state, BuildState::Prepared | BuildState::Building)
            {
                return Err(MasterError::PreconditionFailed(format!(
                    "build {} is not accepting slaves (state {})",
                    self.build_id, inner.state
                )));
            }
            if !slave.is_alive() || slave.current_build_id().is_some() {
                return Err(MasterError::PreconditionFailed(format!(
                    "slave {} is not free",
                    slave.id()
                )));
            }
            if inner.state == BuildState::Prepared {
                inner.state = BuildState::Building;
            }
            inner.allocated_slaves.insert(slave.id(), Arc::clone(slave));
            slave.set_current_build(Some(self.build_id));

            let job_config = inner.job_config.clone().ok_or_else(|| {
                MasterError::PreconditionFailed("build has no job config".into())
            })?;
            let overrides = inner
                .project
                .as_ref()
                .map(|p| p.slave_param_overrides())
                .unwrap_or_default();
            BuildSetup::new(
                self.build_id,
                job_config,
                self.request.params_with_overrides(&overrides),
            )
        };

        slave.set_executor_state(SlaveState::RunningSetup);
        tracing::info!(build = %self.build_id, slave = %slave.id(), "starting setup on slave");
        let transport = Arc::clone(slave.transport());
        with_retries(self.config.transport_attempts, || {
            let transport = Arc::clone(&transport);
            let setup = setup.clone();
            async move { transport.start_setup(&setup).await }
        })
        .await
        .map_err(MasterError::from)
    }

    /// Called when a slave reports SETUP_COMPLETED: fill its executor slots
    /// with subjobs, one call at a time.
    pub async fn begin_subjob_executions_on_slave(
        &self,
        slave: &Arc<Slave>,
    ) -> Result<(), MasterError> {
        {
            let mut inner = self.inner.lock();
            if !inner.allocated_slaves.contains_key(&slave.id()) {
                return Err(MasterError::PreconditionFailed(format!(
                    "slave {} is not allocated to build {}",
                    slave.id(),
                    self.build_id
                )));
            }
            inner.setup_completed_slaves.insert(slave.id());
        }
        while self.execute_next_subjob_on_slave(slave).await? {}
        Ok(())
    }

    /// Hand the next pending subjob to `slave`. Returns true when one was
    /// dispatched.
    ///
    /// When nothing is pending (or the build is canceled) and the slave has
    /// no in-flight subjobs left, this is also where the slave's single
    /// teardown is issued.
    pub async fn execute_next_subjob_on_slave(
        &self,
        slave: &Arc<Slave>,
    ) -> Result<bool, MasterError> {
        enum Plan {
            Dispatch(Subjob),
            Teardown,
            Nothing,
        }

        let plan = {
            let mut inner = self.inner.lock();
            if !inner.allocated_slaves.contains_key(&slave.id()) {
                return Ok(false);
            }
            let fenced = inner.is_canceled || inner.state.is_terminal();
            if fenced || inner.pending.is_empty() {
                let has_in_flight = inner.in_flight.values().any(|sid| *sid == slave.id());
                if !has_in_flight
                    && inner.setup_completed_slaves.contains(&slave.id())
                    && inner.torn_down_slaves.insert(slave.id())
                {
                    Plan::Teardown
                } else {
                    Plan::Nothing
                }
            } else {
                let cap = inner
                    .job_config
                    .as_ref()
                    .map(|c| c.max_executors_per_slave)
                    .unwrap_or(u32::MAX);
                if slave.claim_executor(cap) {
                    match inner.pending.pop_front() {
                        Some(subjob_id) => {
                            let subjob = inner.subjobs[subjob_id.value() as usize].clone();
                            inner.in_flight.insert(subjob_id, slave.id());
                            Plan::Dispatch(subjob)
                        }
                        None => {
                            slave.release_executor();
                            Plan::Nothing
                        }
                    }
                } else {
                    Plan::Nothing
                }
            }
        };

        match plan {
            Plan::Dispatch(subjob) => {
                let subjob_id = subjob.subjob_id;
                let transport = Arc::clone(slave.transport());
                let sent = with_retries(self.config.transport_attempts, || {
                    let transport = Arc::clone(&transport);
                    let subjob = subjob.clone();
                    async move { transport.start_subjob_execution(&subjob).await }
                })
                .await;
                match sent {
                    Ok(()) => {
                        slave.set_executor_state(SlaveState::Executing);
                        tracing::info!(
                            build = %self.build_id,
                            subjob = %subjob_id,
                            slave = %slave.id(),
                            "dispatched subjob"
                        );
                        Ok(true)
                    }
                    Err(e) => {
                        let mut inner = self.inner.lock();
                        inner.in_flight.remove(&subjob_id);
                        inner.pending.push_front(subjob_id);
                        slave.release_executor();
                        Err(MasterError::from(e))
                    }
                }
            }
            Plan::Teardown => {
                tracing::info!(build = %self.build_id, slave = %slave.id(), "starting teardown on slave");
                slave.set_executor_state(SlaveState::RunningTeardown);
                let transport = Arc::clone(slave.transport());
                let build_id = self.build_id;
                with_retries(self.config.transport_attempts, || {
                    let transport = Arc::clone(&transport);
                    async move { transport.teardown_build(build_id).await }
                })
                .await
                .map_err(MasterError::from)?;
                Ok(false)
            }
            Plan::Nothing => Ok(false),
        }
    }

    /// Unpack a subjob's artifact tarball into the build's artifact
    /// directory and record any atoms that exited non-zero.
    ///
    /// Payloads for canceled builds are dropped on the floor. Unpack
    /// failures transition the build to ERRORED.
    pub fn handle_subjob_payload(&self, payload: &SubjobPayload) -> Result<(), MasterError> {
        let (artifact_dir, subjob) = {
            let mut inner = self.inner.lock();
            if inner.is_canceled {
                return Ok(());
            }
            if inner.state.is_terminal()
                || matches!(inner.state, BuildState::Queued | BuildState::Preparing)
            {
                return Err(MasterError::PreconditionFailed(format!(
                    "subjob result reported for build {} in state {}",
                    self.build_id, inner.state
                )));
            }
            let subjob = inner
                .subjobs
                .get(payload.subjob_id.value() as usize)
                .cloned()
                .ok_or_else(|| {
                    MasterError::ItemNotFound(format!(
                        "build {} has no subjob {}",
                        self.build_id, payload.subjob_id
                    ))
                })?;
            if !inner.unpacked.insert(payload.subjob_id) {
                return Err(MasterError::PreconditionFailed(format!(
                    "duplicate payload for subjob {}",
                    payload.subjob_id
                )));
            }
            let artifact_dir = inner.artifact_dir.clone().ok_or_else(|| {
                MasterError::PreconditionFailed("build has no artifact directory".into())
            })?;
            (artifact_dir, subjob)
        };

        let unpacked = artifacts::unpack_subjob_payload(&artifact_dir, payload)
            .and_then(|()| artifacts::failed_atoms_in_payload(&artifact_dir, &subjob));
        match unpacked {
            Ok(failed) => {
                if !failed.is_empty() {
                    tracing::warn!(
                        build = %self.build_id,
                        subjob = %payload.subjob_id,
                        failed = failed.len(),
                        "subjob contained failing atoms"
                    );
                }
                let mut inner = self.inner.lock();
                for (atom_id, _) in failed {
                    inner.failed_atom_ids.insert(atom_id);
                }
                Ok(())
            }
            Err(e) => {
                self.mark_errored(&format!("payload ingestion failed: {}", e));
                Err(e.into())
            }
        }
    }

    /// Count one subjob as done. The zero-crossing happens exactly once and
    /// moves the build to MARKED_FOR_COMPLETION; the FINISHED transition
    /// waits for every allocated slave to be released.
    pub fn mark_subjob_complete(&self, subjob_id: SubjobId) -> Result<(), MasterError> {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return Err(MasterError::PreconditionFailed(format!(
                "subjob {} reported for build {} in terminal state {}",
                subjob_id, self.build_id, inner.state
            )));
        }
        if subjob_id.value() as usize >= inner.subjobs.len() {
            return Err(MasterError::ItemNotFound(format!(
                "build {} has no subjob {}",
                self.build_id, subjob_id
            )));
        }
        if !inner.completed.insert(subjob_id) {
            return Err(MasterError::PreconditionFailed(format!(
                "subjob {} already marked complete",
                subjob_id
            )));
        }
        if let Some(slave_id) = inner.in_flight.remove(&subjob_id) {
            if let Some(slave) = inner.allocated_slaves.get(&slave_id) {
                slave.release_executor();
            }
        }
        inner.subjobs_remaining = inner.subjobs_remaining.saturating_sub(1);
        tracing::debug!(
            build = %self.build_id,
            subjob = %subjob_id,
            remaining = inner.subjobs_remaining,
            "subjob complete"
        );
        if inner.subjobs_remaining == 0 && inner.state == BuildState::Building {
            inner.state = BuildState::MarkedForCompletion;
            inner.completion_ts_ms = Some(self.clock.epoch_ms());
            tracing::info!(build = %self.build_id, "all subjobs complete");
        }
        Ok(())
    }

    /// Latch cancellation: no further subjobs are dispatched, in-flight
    /// subjobs drain with their results discarded, and teardown still runs
    /// on every slave that completed setup.
    pub async fn cancel(&self) {
        let teardowns: Vec<Arc<Slave>> = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() || inner.is_canceled {
                return;
            }
            inner.is_canceled = true;
            tracing::info!(build = %self.build_id, "build canceled");

            let busy: HashSet<SlaveId> = inner.in_flight.values().copied().collect();
            let ready: Vec<Arc<Slave>> = inner
                .allocated_slaves
                .values()
                .filter(|s| {
                    !busy.contains(&s.id())
                        && inner.setup_completed_slaves.contains(&s.id())
                        && !inner.torn_down_slaves.contains(&s.id())
                })
                .cloned()
                .collect();
            for slave in &ready {
                inner.torn_down_slaves.insert(slave.id());
            }
            ready
        };

        for slave in teardowns {
            slave.set_executor_state(SlaveState::RunningTeardown);
            let transport = Arc::clone(slave.transport());
            let build_id = self.build_id;
            let result = with_retries(self.config.transport_attempts, || {
                let transport = Arc::clone(&transport);
                async move { transport.teardown_build(build_id).await }
            })
            .await;
            if let Err(e) = result {
                tracing::warn!(
                    build = %self.build_id,
                    slave = %slave.id(),
                    error = %e,
                    "teardown request failed"
                );
            }
        }
    }

    /// Drop a drained result for a canceled build and keep the slave's
    /// teardown moving. No payload handling, no counter update, no new
    /// dispatch.
    pub async fn discard_inflight_result(
        &self,
        subjob_id: SubjobId,
        slave: &Arc<Slave>,
    ) -> Result<(), MasterError> {
        let teardown = {
            let mut inner = self.inner.lock();
            if inner.in_flight.remove(&subjob_id).is_some() {
                slave.release_executor();
            }
            let has_in_flight = inner.in_flight.values().any(|sid| *sid == slave.id());
            inner.is_canceled
                && !has_in_flight
                && inner.allocated_slaves.contains_key(&slave.id())
                && inner.setup_completed_slaves.contains(&slave.id())
                && inner.torn_down_slaves.insert(slave.id())
        };
        if teardown {
            slave.set_executor_state(SlaveState::RunningTeardown);
            let transport = Arc::clone(slave.transport());
            let build_id = self.build_id;
            with_retries(self.config.transport_attempts, || {
                let transport = Arc::clone(&transport);
                async move { transport.teardown_build(build_id).await }
            })
            .await
            .map_err(MasterError::from)?;
        }
        Ok(())
    }

    /// Remove the slave from the build's allocation sets.
    pub fn release_slave(&self, slave: &Arc<Slave>) {
        let mut inner = self.inner.lock();
        inner.allocated_slaves.remove(&slave.id());
        inner.setup_completed_slaves.remove(&slave.id());
    }

    /// Recover the in-flight subjobs of a slave that died.
    ///
    /// Each lost subjob is re-enqueued once; losing it a second time marks
    /// its atoms failed and counts the subjob complete so the build can
    /// still terminate. Returns the ids that were re-enqueued.
    pub fn requeue_subjobs_from_slave(&self, slave_id: SlaveId) -> Vec<SubjobId> {
        let mut inner = self.inner.lock();
        let lost: Vec<SubjobId> = inner
            .in_flight
            .iter()
            .filter(|(_, sid)| **sid == slave_id)
            .map(|(subjob_id, _)| *subjob_id)
            .collect();

        let mut requeued = Vec::new();
        for subjob_id in lost {
            inner.in_flight.remove(&subjob_id);
            if inner.is_canceled {
                continue;
            }
            let retry =
                self.config.requeue_lost_subjobs && inner.requeued_once.insert(subjob_id);
            if retry {
                tracing::warn!(
                    build = %self.build_id,
                    subjob = %subjob_id,
                    slave = %slave_id,
                    "re-enqueueing subjob lost to dead slave"
                );
                inner.pending.push_back(subjob_id);
                requeued.push(subjob_id);
            } else {
                tracing::warn!(
                    build = %self.build_id,
                    subjob = %subjob_id,
                    "subjob lost again; marking its atoms failed"
                );
                let atom_ids: Vec<AtomId> = inner.subjobs[subjob_id.value() as usize]
                    .atoms
                    .iter()
                    .map(|a| a.id)
                    .collect();
                inner.failed_atom_ids.extend(atom_ids);
                if inner.completed.insert(subjob_id) {
                    inner.subjobs_remaining = inner.subjobs_remaining.saturating_sub(1);
                    if inner.subjobs_remaining == 0 && inner.state == BuildState::Building {
                        inner.state = BuildState::MarkedForCompletion;
                        inner.completion_ts_ms = Some(self.clock.epoch_ms());
                    }
                }
            }
        }
        requeued
    }

    /// True once the build only awaits its final archival step: all work
    /// accounted for (or canceled) and every allocated slave released.
    pub fn is_ready_to_finish(&self) -> bool {
        let inner = self.inner.lock();
        if inner.state.is_terminal() || inner.finish_started {
            return false;
        }
        if !inner.allocated_slaves.is_empty() {
            return false;
        }
        inner.is_canceled || inner.state == BuildState::MarkedForCompletion
    }

    /// Produce the final archive and fix the terminal state. Runs exactly
    /// once, after every per-slave teardown.
    pub async fn finish(&self) -> Result<(), MasterError> {
        let (artifact_dir, canceled, failed_dirs) = {
            let mut inner = self.inner.lock();
            if inner.finish_started || inner.state.is_terminal() {
                return Err(MasterError::PreconditionFailed(format!(
                    "build {} already finishing",
                    self.build_id
                )));
            }
            if inner.subjobs_remaining > 0 && !inner.is_canceled {
                return Err(MasterError::PreconditionFailed(format!(
                    "build {} still has {} subjobs outstanding",
                    self.build_id, inner.subjobs_remaining
                )));
            }
            inner.finish_started = true;

            let mut failed_dirs: Vec<(SubjobId, usize)> = Vec::new();
            for subjob in &inner.subjobs {
                for (atom_index, atom) in subjob.atoms.iter().enumerate() {
                    if inner.failed_atom_ids.contains(&atom.id) {
                        failed_dirs.push((subjob.subjob_id, atom_index));
                    }
                }
            }
            (
                inner.artifact_dir.clone(),
                inner.is_canceled,
                failed_dirs,
            )
        };

        if let Some(dir) = &artifact_dir {
            let archive = (|| {
                if !canceled && !failed_dirs.is_empty() {
                    artifacts::write_failures_file(dir, &failed_dirs)?;
                }
                artifacts::create_results_archive(dir)?;
                Ok::<(), artifacts::ArtifactError>(())
            })();
            if let Err(e) = archive {
                self.mark_errored(&format!("archival failed: {}", e));
                return Err(e.into());
            }
        }

        let final_state = if canceled {
            BuildState::Canceled
        } else {
            BuildState::Finished
        };
        {
            let mut inner = self.inner.lock();
            inner.state = final_state;
        }
        tracing::info!(build = %self.build_id, state = %final_state, "build finished");
        Ok(())
    }

    /// Validate an external update payload. Only cancellation is supported.
    pub fn validate_update_params(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<(), MasterError> {
        for (key, value) in params {
            match key.as_str() {
                "status" if value == "canceled" => {}
                "status" => {
                    return Err(MasterError::BadRequest(format!(
                        "cannot update build status to '{}'",
                        value
                    )))
                }
                other => {
                    return Err(MasterError::BadRequest(format!(
                        "unknown build update parameter: {}",
                        other
                    )))
                }
            }
        }
        Ok(())
    }

    /// Apply a validated update payload.
    pub async fn update_state(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<(), MasterError> {
        self.validate_update_params(params)?;
        if params.get("status").map(String::as_str) == Some("canceled") {
            self.cancel().await;
        }
        Ok(())
    }

    /// Move the build to ERRORED and remember why. No-op once terminal.
    pub fn mark_errored(&self, message: &str) {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return;
        }
        tracing::error!(build = %self.build_id, error = message, "build errored");
        inner.state = BuildState::Errored;
        inner.error = Some(message.to_string());
    }
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
