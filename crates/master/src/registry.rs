// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slave and build registries

use crate::build::Build;
use crate::error::MasterError;
use crate::slave::Slave;
use clusterrunner_adapters::SlaveTransport;
use clusterrunner_core::{BuildId, SeqIdSource, SlaveId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

struct SlaveRegistryInner {
    by_id: HashMap<SlaveId, Arc<Slave>>,
    by_url: HashMap<String, Arc<Slave>>,
}

/// Two indices over the same slave population. The indices always agree: a
/// slave is present under both its id and its url, or not at all.
pub struct SlaveRegistry {
    inner: Mutex<SlaveRegistryInner>,
    ids: SeqIdSource,
}

impl Default for SlaveRegistry {
    fn default() -> Self {
        Self {
            inner: Mutex::new(SlaveRegistryInner {
                by_id: HashMap::new(),
                by_url: HashMap::new(),
            }),
            ids: SeqIdSource::default(),
        }
    }
}

impl SlaveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly connected slave. A reconnect on a known url kills
    /// the old handle and registers a brand-new slave.
    pub fn register(
        &self,
        url: &str,
        num_executors: u32,
        transport: Arc<dyn SlaveTransport>,
    ) -> Arc<Slave> {
        let slave = Arc::new(Slave::new(
            SlaveId::new(self.ids.next()),
            url,
            num_executors,
            transport,
        ));
        let mut inner = self.inner.lock();
        if let Some(old) = inner.by_url.remove(url) {
            tracing::info!(url, old_id = %old.id(), "slave reconnected; replacing handle");
            old.mark_dead();
            inner.by_id.remove(&old.id());
        }
        inner.by_id.insert(slave.id(), Arc::clone(&slave));
        inner.by_url.insert(url.to_string(), Arc::clone(&slave));
        slave
    }

    /// Look a slave up by exactly one of id or url.
    ///
    /// Passing neither or both is a caller bug (`BadRequest`); an unknown
    /// key is `ItemNotFound`.
    pub fn get_slave(
        &self,
        slave_id: Option<SlaveId>,
        slave_url: Option<&str>,
    ) -> Result<Arc<Slave>, MasterError> {
        let inner = self.inner.lock();
        match (slave_id, slave_url) {
            (Some(id), None) => inner
                .by_id
                .get(&id)
                .cloned()
                .ok_or_else(|| MasterError::ItemNotFound(format!("slave id {}", id))),
            (None, Some(url)) => inner
                .by_url
                .get(url)
                .cloned()
                .ok_or_else(|| MasterError::ItemNotFound(format!("slave url {}", url))),
            _ => Err(MasterError::BadRequest(
                "exactly one of slave_id or slave_url must be given".to_string(),
            )),
        }
    }

    /// Alive slaves not currently bound to any build.
    pub fn idle_slaves(&self) -> Vec<Arc<Slave>> {
        let inner = self.inner.lock();
        let mut idle: Vec<Arc<Slave>> = inner
            .by_id
            .values()
            .filter(|s| s.is_alive() && s.current_build_id().is_none())
            .cloned()
            .collect();
        idle.sort_by_key(|s| s.id());
        idle
    }

    /// How many registered slaves currently carry this build.
    pub fn count_with_build(&self, build_id: BuildId) -> usize {
        let inner = self.inner.lock();
        inner
            .by_id
            .values()
            .filter(|s| s.current_build_id() == Some(build_id))
            .count()
    }

    pub fn all(&self) -> Vec<Arc<Slave>> {
        let mut slaves: Vec<Arc<Slave>> = self.inner.lock().by_id.values().cloned().collect();
        slaves.sort_by_key(|s| s.id());
        slaves
    }
}

struct BuildRegistryInner {
    by_id: BTreeMap<BuildId, Arc<Build>>,
    prepare_queue: VecDeque<BuildId>,
}

/// Build index plus the FIFO of builds awaiting preparation. The BTreeMap
/// keeps scheduling iteration in oldest-first order.
pub struct BuildRegistry {
    inner: Mutex<BuildRegistryInner>,
    ids: SeqIdSource,
}

impl Default for BuildRegistry {
    fn default() -> Self {
        Self {
            inner: Mutex::new(BuildRegistryInner {
                by_id: BTreeMap::new(),
                prepare_queue: VecDeque::new(),
            }),
            ids: SeqIdSource::default(),
        }
    }
}

impl BuildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_build_id(&self) -> BuildId {
        BuildId::new(self.ids.next())
    }

    /// Add a build and queue it for preparation.
    pub fn add(&self, build: Arc<Build>) {
        let mut inner = self.inner.lock();
        let id = build.build_id();
        inner.by_id.insert(id, build);
        inner.prepare_queue.push_back(id);
    }

    pub fn get(&self, build_id: BuildId) -> Result<Arc<Build>, MasterError> {
        self.inner
            .lock()
            .by_id
            .get(&build_id)
            .cloned()
            .ok_or_else(|| MasterError::ItemNotFound(format!("build id {}", build_id)))
    }

    /// Pop the oldest build still awaiting preparation.
    pub fn take_next_to_prepare(&self) -> Option<Arc<Build>> {
        let mut inner = self.inner.lock();
        while let Some(id) = inner.prepare_queue.pop_front() {
            if let Some(build) = inner.by_id.get(&id) {
                return Some(Arc::clone(build));
            }
        }
        None
    }

    /// All builds, oldest first.
    pub fn all_sorted(&self) -> Vec<Arc<Build>> {
        self.inner.lock().by_id.values().cloned().collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
