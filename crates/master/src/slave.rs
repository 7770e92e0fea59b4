// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master-side handle for one remote slave

use clusterrunner_adapters::SlaveTransport;
use clusterrunner_core::{BuildId, SlaveId, SlaveState};
use parking_lot::Mutex;
use std::sync::Arc;

struct SlaveCell {
    current_build_id: Option<BuildId>,
    is_alive: bool,
    executor_state: SlaveState,
    executors_in_use: u32,
}

/// Process-local view of one remote worker: identity, capacity, and the
/// transport for reaching it. Mutable status lives behind a mutex so the
/// handle can be shared between the registries and builds.
pub struct Slave {
    id: SlaveId,
    url: String,
    num_executors: u32,
    transport: Arc<dyn SlaveTransport>,
    cell: Mutex<SlaveCell>,
}

impl Slave {
    pub fn new(
        id: SlaveId,
        url: impl Into<String>,
        num_executors: u32,
        transport: Arc<dyn SlaveTransport>,
    ) -> Self {
        Self {
            id,
            url: url.into(),
            num_executors,
            transport,
            cell: Mutex::new(SlaveCell {
                current_build_id: None,
                is_alive: true,
                executor_state: SlaveState::Idle,
                executors_in_use: 0,
            }),
        }
    }

    pub fn id(&self) -> SlaveId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn num_executors(&self) -> u32 {
        self.num_executors
    }

    pub fn transport(&self) -> &Arc<dyn SlaveTransport> {
        &self.transport
    }

    pub fn current_build_id(&self) -> Option<BuildId> {
        self.cell.lock().current_build_id
    }

    pub fn set_current_build(&self, build_id: Option<BuildId>) {
        self.cell.lock().current_build_id = build_id;
    }

    pub fn is_alive(&self) -> bool {
        self.cell.lock().is_alive
    }

    /// Latch the slave dead. A reconnecting worker registers as a brand-new
    /// slave, so there is deliberately no way back from this.
    pub fn mark_dead(&self) {
        let mut cell = self.cell.lock();
        cell.is_alive = false;
        cell.executor_state = SlaveState::Disconnected;
        tracing::info!(slave = %self.id, url = %self.url, "slave marked dead");
    }

    pub fn executor_state(&self) -> SlaveState {
        self.cell.lock().executor_state
    }

    pub fn set_executor_state(&self, state: SlaveState) {
        self.cell.lock().executor_state = state;
    }

    pub fn setup_is_complete(&self) -> bool {
        matches!(
            self.executor_state(),
            SlaveState::SetupCompleted | SlaveState::Executing
        )
    }

    pub fn executors_in_use(&self) -> u32 {
        self.cell.lock().executors_in_use
    }

    /// Reserve an executor slot, bounded by `cap` (the smaller of the
    /// slave's capacity and the job's per-slave limit). Returns false when
    /// saturated.
    pub fn claim_executor(&self, cap: u32) -> bool {
        let mut cell = self.cell.lock();
        let limit = cap.min(self.num_executors);
        if cell.executors_in_use < limit {
            cell.executors_in_use += 1;
            true
        } else {
            false
        }
    }

    pub fn release_executor(&self) {
        let mut cell = self.cell.lock();
        cell.executors_in_use = cell.executors_in_use.saturating_sub(1);
    }

    /// Reset per-build status when the slave returns to the pool.
    pub fn reset_for_idle(&self) {
        let mut cell = self.cell.lock();
        cell.current_build_id = None;
        cell.executors_in_use = 0;
        if cell.is_alive {
            cell.executor_state = SlaveState::Idle;
        }
    }
}

#[cfg(test)]
#[path = "slave_tests.rs"]
mod tests;
