// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the master

use crate::artifacts::ArtifactError;
use crate::atomizer::AtomizerError;
use clusterrunner_adapters::{ProjectError, TransportError};
use thiserror::Error;

/// Errors surfaced by master operations.
///
/// `BadRequest` and `ItemNotFound` are reported to the caller and not
/// logged as errors; the rest indicate real trouble.
#[derive(Debug, Error)]
pub enum MasterError {
    /// Ill-formed input: unknown slave state, missing/both keys on slave
    /// lookup, invalid build update payload.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unknown build id, slave id, or slave url.
    #[error("not found: {0}")]
    ItemNotFound(String),
    /// State-machine-illegal transition or out-of-order report.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    /// Non-retryable failure from a slave; the owning build errors out.
    #[error("remote execution failed: {0}")]
    RemoteExecution(String),
    /// Exhausted retries talking to a slave; the slave is treated as
    /// disconnected.
    #[error("transient io failure: {0}")]
    TransientIo(String),
    #[error("atomizer failed: {0}")]
    Atomizer(#[from] AtomizerError),
    #[error("artifact handling failed: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("project error: {0}")]
    Project(#[from] ProjectError),
}

impl From<TransportError> for MasterError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Transient(msg) => MasterError::TransientIo(msg),
            TransportError::Rejected(msg) => MasterError::RemoteExecution(msg),
        }
    }
}
