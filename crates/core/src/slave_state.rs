// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slave identifier and executor states

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

crate::define_seq_id! {
    /// Identifier of a slave, assigned monotonically by the master.
    ///
    /// A reconnecting worker gets a fresh id; slave identities are never
    /// reused once marked dead.
    pub struct SlaveId;
}

/// Raised when a state string from the wire names no known slave state.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown slave state: {0}")]
pub struct UnknownSlaveState(pub String);

/// States of the worker-side executor, as reported to the master.
///
/// `RunningSetup`, `Executing`, and `RunningTeardown` are internal to the
/// slave; the master only accepts `Idle`, `SetupCompleted`, `Disconnected`,
/// and `Shutdown` as state updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlaveState {
    Idle,
    RunningSetup,
    SetupCompleted,
    Executing,
    RunningTeardown,
    Disconnected,
    Shutdown,
}

impl fmt::Display for SlaveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlaveState::Idle => write!(f, "IDLE"),
            SlaveState::RunningSetup => write!(f, "RUNNING_SETUP"),
            SlaveState::SetupCompleted => write!(f, "SETUP_COMPLETED"),
            SlaveState::Executing => write!(f, "EXECUTING"),
            SlaveState::RunningTeardown => write!(f, "RUNNING_TEARDOWN"),
            SlaveState::Disconnected => write!(f, "DISCONNECTED"),
            SlaveState::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}

impl FromStr for SlaveState {
    type Err = UnknownSlaveState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IDLE" => Ok(SlaveState::Idle),
            "RUNNING_SETUP" => Ok(SlaveState::RunningSetup),
            "SETUP_COMPLETED" => Ok(SlaveState::SetupCompleted),
            "EXECUTING" => Ok(SlaveState::Executing),
            "RUNNING_TEARDOWN" => Ok(SlaveState::RunningTeardown),
            "DISCONNECTED" => Ok(SlaveState::Disconnected),
            "SHUTDOWN" => Ok(SlaveState::Shutdown),
            other => Err(UnknownSlaveState(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "slave_state_tests.rs"]
mod tests;
