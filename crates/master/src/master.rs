// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ClusterMaster: accepts builds, binds slaves, routes slave reports
//!
//! The dispatch loop is an explicit task started with [`ClusterMaster::start`]
//! and stopped with [`ClusterMaster::shutdown`]; it parks on a capacity-1
//! wake channel that is signalled on every scheduling-relevant event (new
//! slave, new build, slave idle, subjob done, build cancel). Tests can call
//! [`ClusterMaster::prepare_next_build`] and [`ClusterMaster::dispatch_step`]
//! directly instead of racing the background task.

use crate::build::Build;
use crate::config::MasterConfig;
use crate::error::MasterError;
use crate::registry::{BuildRegistry, SlaveRegistry};
use crate::slave::Slave;
use clusterrunner_adapters::{ProjectTypeFactory, SlaveTransportFactory};
use clusterrunner_core::{
    BuildId, BuildRequest, Clock, SlaveId, SlaveState, SubjobPayload, UnknownSlaveState,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Adapter dependencies injected into the master.
pub struct MasterDeps {
    pub project_factory: Arc<dyn ProjectTypeFactory>,
    pub transport_factory: Arc<dyn SlaveTransportFactory>,
    pub clock: Arc<dyn Clock>,
}

/// The central coordinator.
pub struct ClusterMaster {
    config: Arc<MasterConfig>,
    deps: MasterDeps,
    slaves: SlaveRegistry,
    builds: BuildRegistry,
    wake_tx: mpsc::Sender<()>,
    wake_rx: Mutex<Option<mpsc::Receiver<()>>>,
    shutting_down: AtomicBool,
}

impl ClusterMaster {
    pub fn new(config: MasterConfig, deps: MasterDeps) -> Arc<Self> {
        let (wake_tx, wake_rx) = mpsc::channel(1);
        Arc::new(Self {
            config: Arc::new(config),
            deps,
            slaves: SlaveRegistry::new(),
            builds: BuildRegistry::new(),
            wake_tx,
            wake_rx: Mutex::new(Some(wake_rx)),
            shutting_down: AtomicBool::new(false),
        })
    }

    /// Non-blocking wake - if the channel is full, the loop is already
    /// awake.
    fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }

    /// Validate and enqueue a build request. Preparation happens
    /// asynchronously in the dispatch task.
    pub fn queue_build(&self, request: BuildRequest) -> Result<BuildId, MasterError> {
        request
            .validate()
            .map_err(|e| MasterError::BadRequest(e.to_string()))?;
        let build_id = self.builds.next_build_id();
        let build = Arc::new(Build::new(
            build_id,
            request,
            Arc::clone(&self.deps.clock),
            Arc::clone(&self.config),
        ));
        self.builds.add(build);
        tracing::info!(build = %build_id, "build queued");
        self.wake();
        Ok(build_id)
    }

    /// Register a newly connected worker and wake the dispatch loop.
    pub fn connect_new_slave(
        &self,
        url: &str,
        num_executors: u32,
    ) -> Result<SlaveId, MasterError> {
        if num_executors == 0 {
            return Err(MasterError::BadRequest(
                "num_executors must be at least 1".to_string(),
            ));
        }
        let transport = self
            .deps
            .transport_factory
            .create(url)
            .map_err(|e| MasterError::BadRequest(e.to_string()))?;
        let slave = self.slaves.register(url, num_executors, transport);
        tracing::info!(slave = %slave.id(), url, num_executors, "slave connected");
        self.wake();
        Ok(slave.id())
    }

    /// Exactly one of `slave_id` / `slave_url` must be given.
    pub fn get_slave(
        &self,
        slave_id: Option<SlaveId>,
        slave_url: Option<&str>,
    ) -> Result<Arc<Slave>, MasterError> {
        self.slaves.get_slave(slave_id, slave_url)
    }

    pub fn get_build(&self, build_id: BuildId) -> Result<Arc<Build>, MasterError> {
        self.builds.get(build_id)
    }

    /// React to a state change reported by a slave. Unknown state strings
    /// and slave-internal states are rejected as bad requests.
    pub async fn handle_slave_state_update(
        &self,
        slave_id: SlaveId,
        new_state: &str,
    ) -> Result<(), MasterError> {
        let slave = self.slaves.get_slave(Some(slave_id), None)?;
        let state: SlaveState = new_state
            .parse()
            .map_err(|e: UnknownSlaveState| MasterError::BadRequest(e.to_string()))?;
        tracing::debug!(slave = %slave_id, state = %state, "slave state update");
        match state {
            SlaveState::Idle => self.handle_slave_idle(&slave).await,
            SlaveState::SetupCompleted => self.handle_slave_setup_completed(&slave).await,
            SlaveState::Disconnected => self.handle_slave_lost(&slave, SlaveState::Disconnected),
            SlaveState::Shutdown => self.handle_slave_lost(&slave, SlaveState::Shutdown),
            other => Err(MasterError::BadRequest(format!(
                "slaves cannot be updated to state {}",
                other
            ))),
        }
    }

    /// A slave finished teardown (or connected fresh): release it from its
    /// build and finish the build if it was the last one out.
    async fn handle_slave_idle(&self, slave: &Arc<Slave>) -> Result<(), MasterError> {
        let build_id = slave.current_build_id();
        slave.reset_for_idle();

        if let Some(build_id) = build_id {
            if let Ok(build) = self.builds.get(build_id) {
                build.release_slave(slave);
                self.try_finish(&build).await?;
            }
        }
        self.wake();
        Ok(())
    }

    async fn handle_slave_setup_completed(&self, slave: &Arc<Slave>) -> Result<(), MasterError> {
        slave.set_executor_state(SlaveState::SetupCompleted);
        if let Some(build_id) = slave.current_build_id() {
            let build = self.builds.get(build_id)?;
            build.begin_subjob_executions_on_slave(slave).await?;
        }
        self.wake();
        Ok(())
    }

    /// Disconnection and shutdown share a path: the slave is dead to us
    /// either way, and its in-flight work is recovered onto the build.
    fn handle_slave_lost(
        &self,
        slave: &Arc<Slave>,
        final_state: SlaveState,
    ) -> Result<(), MasterError> {
        slave.mark_dead();
        slave.set_executor_state(final_state);
        let build_id = slave.current_build_id();
        slave.set_current_build(None);

        if let Some(build_id) = build_id {
            if let Ok(build) = self.builds.get(build_id) {
                build.release_slave(slave);
                let requeued = build.requeue_subjobs_from_slave(slave.id());
                if !requeued.is_empty() {
                    tracing::info!(
                        build = %build_id,
                        count = requeued.len(),
                        "recovered subjobs from lost slave"
                    );
                }
            }
        }
        self.wake();
        Ok(())
    }

    /// Externally update a build (cancellation). The payload is validated
    /// by the build itself.
    pub async fn handle_request_to_update_build(
        &self,
        build_id: BuildId,
        params: &HashMap<String, String>,
    ) -> Result<(), MasterError> {
        let build = self.builds.get(build_id)?;
        build.validate_update_params(params)?;
        build.update_state(params).await?;
        self.try_finish(&build).await?;
        self.wake();
        Ok(())
    }

    /// Route a subjob result from a slave into the owning build, then keep
    /// that slave's pipeline full. Results for canceled builds are dropped.
    pub async fn handle_result_reported_from_slave(
        &self,
        slave_url: &str,
        build_id: BuildId,
        payload: SubjobPayload,
    ) -> Result<(), MasterError> {
        let slave = self.slaves.get_slave(None, Some(slave_url))?;
        let build = self.builds.get(build_id)?;

        if build.is_canceled() {
            tracing::debug!(
                build = %build_id,
                subjob = %payload.subjob_id,
                "dropping result for canceled build"
            );
            build.discard_inflight_result(payload.subjob_id, &slave).await?;
            return Ok(());
        }

        build.handle_subjob_payload(&payload)?;
        build.mark_subjob_complete(payload.subjob_id)?;
        build.execute_next_subjob_on_slave(&slave).await?;
        self.wake();
        Ok(())
    }

    /// Finish the build if it is ready and no registered slave still
    /// carries it. `Build::finish` itself guarantees exactly-once.
    async fn try_finish(&self, build: &Arc<Build>) -> Result<(), MasterError> {
        if build.is_ready_to_finish() && self.slaves.count_with_build(build.build_id()) == 0 {
            build.finish().await?;
        }
        Ok(())
    }

    /// Prepare the oldest queued build, if any. Returns its id.
    ///
    /// Preparation failures are not this caller's errors: the build lands
    /// in ERRORED and the loop moves on.
    pub async fn prepare_next_build(&self) -> Option<BuildId> {
        let build = self.builds.take_next_to_prepare()?;
        let build_id = build.build_id();
        match self.deps.project_factory.create(build.request().params()) {
            Ok(project) => {
                if let Err(e) = build.prepare(project).await {
                    tracing::error!(build = %build_id, error = %e, "build preparation failed");
                }
            }
            Err(e) => {
                build.mark_errored(&format!("project construction failed: {}", e));
            }
        }
        self.wake();
        Some(build_id)
    }

    /// One pass of the allocation loop: bind idle slaves to the oldest
    /// builds that want more, and finish builds with nothing left to wait
    /// for. Returns true if any allocation was made.
    pub async fn dispatch_step(&self) -> bool {
        let mut did_work = false;
        loop {
            let candidate = self
                .builds
                .all_sorted()
                .into_iter()
                .find(|b| b.needs_more_slaves());
            let build = match candidate {
                Some(b) => b,
                None => break,
            };
            let slave = match self.slaves.idle_slaves().into_iter().next() {
                Some(s) => s,
                None => break,
            };
            match build.allocate_slave(&slave).await {
                Ok(()) => did_work = true,
                Err(MasterError::TransientIo(msg)) => {
                    tracing::warn!(
                        build = %build.build_id(),
                        slave = %slave.id(),
                        error = %msg,
                        "slave unreachable during setup"
                    );
                    let _ = self.handle_slave_lost(&slave, SlaveState::Disconnected);
                }
                Err(e) => {
                    tracing::error!(
                        build = %build.build_id(),
                        slave = %slave.id(),
                        error = %e,
                        "setup failed; erroring build"
                    );
                    build.mark_errored(&format!("setup failed: {}", e));
                    // Release every slave still carrying the errored build.
                    for carrier in self.slaves.all() {
                        if carrier.current_build_id() == Some(build.build_id()) {
                            if let Err(kill_err) = carrier.transport().kill_running_job().await {
                                tracing::warn!(
                                    slave = %carrier.id(),
                                    error = %kill_err,
                                    "kill request failed"
                                );
                            }
                            build.release_slave(&carrier);
                            carrier.reset_for_idle();
                        }
                    }
                }
            }
        }

        // Builds that ended with no slaves attached (canceled before
        // allocation, or atomized to nothing) still need their finish.
        for build in self.builds.all_sorted() {
            if let Err(e) = self.try_finish(&build).await {
                tracing::error!(build = %build.build_id(), error = %e, "finish failed");
            }
        }
        did_work
    }

    /// Run the dispatch loop until shutdown. Spawned by [`Self::start`].
    pub async fn run(self: Arc<Self>) {
        let mut wake_rx = match self.wake_rx.lock().take() {
            Some(rx) => rx,
            None => return, // already running
        };
        tracing::info!("dispatch loop started");
        loop {
            if self.shutting_down.load(Ordering::SeqCst) {
                break;
            }
            while self.prepare_next_build().await.is_some() {}
            self.dispatch_step().await;
            if wake_rx.recv().await.is_none() {
                break;
            }
        }
        tracing::info!("dispatch loop stopped");
    }

    /// Spawn the dispatch loop as an explicit background task.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run())
    }

    /// Ask the dispatch loop to exit after its current pass.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.wake();
    }
}

#[cfg(test)]
#[path = "master_tests.rs"]
mod tests;
