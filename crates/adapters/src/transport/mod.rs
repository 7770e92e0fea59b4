// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport to remote slave executors

mod http;

pub use http::HttpSlaveTransport;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSlaveTransport, FakeTransportFactory, TransportCall};

use async_trait::async_trait;
use clusterrunner_core::{BuildId, BuildSetup, Subjob};
use std::future::Future;
use thiserror::Error;

/// Default number of attempts for a retryable transport call.
pub const DEFAULT_TRANSPORT_ATTEMPTS: u32 = 3;

/// Errors from talking to a slave.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Broken pipe, timeout, connection refused. Worth retrying; after the
    /// final attempt the master treats the slave as disconnected.
    #[error("transient transport failure: {0}")]
    Transient(String),
    /// The slave understood the request and said no (e.g. it is mid-build
    /// for someone else). Not retryable.
    #[error("remote rejected request: {0}")]
    Rejected(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Transient(_))
    }
}

/// Narrow interface between the master and one remote slave executor.
///
/// All calls are fire-and-forget from the master's perspective: the slave
/// acknowledges receipt and reports progress later through state updates
/// and result posts.
#[async_trait]
pub trait SlaveTransport: Send + Sync {
    /// Hand the slave a build and tell it to run per-slave setup.
    async fn start_setup(&self, setup: &BuildSetup) -> Result<(), TransportError>;

    /// Queue one subjob onto the slave's executors.
    async fn start_subjob_execution(&self, subjob: &Subjob) -> Result<(), TransportError>;

    /// Tell the slave to run build teardown and return to idle.
    async fn teardown_build(&self, build_id: BuildId) -> Result<(), TransportError>;

    /// Abort whatever the slave is doing for its current build.
    async fn kill_running_job(&self) -> Result<(), TransportError>;
}

/// Builds a [`SlaveTransport`] for a newly connected slave's URL.
///
/// Injected into the master so tests can hand out in-process fakes instead
/// of HTTP clients.
pub trait SlaveTransportFactory: Send + Sync {
    fn create(&self, slave_url: &str) -> Result<std::sync::Arc<dyn SlaveTransport>, TransportError>;
}

/// Production factory producing HTTP transports.
pub struct HttpTransportFactory {
    request_timeout: std::time::Duration,
}

impl HttpTransportFactory {
    pub fn new(request_timeout: std::time::Duration) -> Self {
        Self { request_timeout }
    }
}

impl SlaveTransportFactory for HttpTransportFactory {
    fn create(&self, slave_url: &str) -> Result<std::sync::Arc<dyn SlaveTransport>, TransportError> {
        Ok(std::sync::Arc::new(HttpSlaveTransport::new(
            slave_url,
            self.request_timeout,
        )?))
    }
}

/// Run `op` up to `attempts` times, retrying transient failures.
///
/// Non-transient errors surface immediately; when every attempt fails
/// transiently, the last error is raised.
pub async fn with_retries<T, F, Fut>(attempts: u32, mut op: F) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let attempts = attempts.max(1);
    let mut last = TransportError::Transient("no attempts made".to_string());
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                tracing::warn!(attempt, attempts, error = %err, "transport call failed");
                last = err;
            }
            Err(err) => return Err(err),
        }
    }
    Err(last)
}

#[cfg(test)]
#[path = "../transport_tests.rs"]
mod tests;
