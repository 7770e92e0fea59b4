// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake slave transport for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{SlaveTransport, TransportError};
use async_trait::async_trait;
use clusterrunner_core::{BuildId, BuildSetup, Subjob};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Recorded transport call
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    StartSetup(BuildSetup),
    StartSubjob(Subjob),
    Teardown(BuildId),
    KillRunningJob,
}

struct FakeTransportState {
    calls: Vec<TransportCall>,
    queued_failures: VecDeque<TransportError>,
}

/// Fake slave transport that records calls and can be scripted to fail.
#[derive(Clone)]
pub struct FakeSlaveTransport {
    inner: Arc<Mutex<FakeTransportState>>,
}

impl Default for FakeSlaveTransport {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeTransportState {
                calls: Vec::new(),
                queued_failures: VecDeque::new(),
            })),
        }
    }
}

impl FakeSlaveTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<TransportCall> {
        self.inner.lock().calls.clone()
    }

    /// Queue an error to be returned by the next call.
    pub fn queue_failure(&self, err: TransportError) {
        self.inner.lock().queued_failures.push_back(err);
    }

    pub fn setup_count(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, TransportCall::StartSetup(_)))
            .count()
    }

    pub fn teardown_count(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, TransportCall::Teardown(_)))
            .count()
    }

    /// Subjobs handed to this slave, in receive order.
    pub fn dispatched_subjobs(&self) -> Vec<Subjob> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::StartSubjob(sj) => Some(sj.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: TransportCall) -> Result<(), TransportError> {
        let mut state = self.inner.lock();
        state.calls.push(call);
        match state.queued_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Factory handing out one [`FakeSlaveTransport`] per URL, retrievable by
/// tests after the master has connected the slave.
#[derive(Clone, Default)]
pub struct FakeTransportFactory {
    by_url: Arc<Mutex<std::collections::HashMap<String, FakeSlaveTransport>>>,
}

impl FakeTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The transport created for `url`, if any slave connected with it.
    pub fn transport_for(&self, url: &str) -> Option<FakeSlaveTransport> {
        self.by_url.lock().get(url).cloned()
    }
}

impl super::SlaveTransportFactory for FakeTransportFactory {
    fn create(
        &self,
        slave_url: &str,
    ) -> Result<Arc<dyn super::SlaveTransport>, super::TransportError> {
        let transport = self
            .by_url
            .lock()
            .entry(slave_url.to_string())
            .or_insert_with(FakeSlaveTransport::new)
            .clone();
        Ok(Arc::new(transport))
    }
}

#[async_trait]
impl SlaveTransport for FakeSlaveTransport {
    async fn start_setup(&self, setup: &BuildSetup) -> Result<(), TransportError> {
        self.record(TransportCall::StartSetup(setup.clone()))
    }

    async fn start_subjob_execution(&self, subjob: &Subjob) -> Result<(), TransportError> {
        self.record(TransportCall::StartSubjob(subjob.clone()))
    }

    async fn teardown_build(&self, build_id: BuildId) -> Result<(), TransportError> {
        self.record(TransportCall::Teardown(build_id))
    }

    async fn kill_running_job(&self) -> Result<(), TransportError> {
        self.record(TransportCall::KillRunningJob)
    }
}
