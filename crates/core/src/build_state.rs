// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build identifier and state machine

use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_seq_id! {
    /// Identifier of a build, assigned monotonically by the master.
    pub struct BuildId;
}

/// Lifecycle states of a build on the master.
///
/// `Finished`, `Canceled`, and `Errored` are terminal: once entered, the
/// build's collections are frozen and no further transitions occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildState {
    Queued,
    Preparing,
    Prepared,
    Building,
    MarkedForCompletion,
    Finished,
    Canceled,
    Errored,
}

impl BuildState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildState::Finished | BuildState::Canceled | BuildState::Errored
        )
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Any non-terminal state may move to `Canceled` or `Errored`; the
    /// forward path is strictly
    /// queued → preparing → prepared → building → marked-for-completion →
    /// finished.
    pub fn can_transition_to(&self, next: BuildState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, BuildState::Canceled | BuildState::Errored) {
            return true;
        }
        matches!(
            (self, next),
            (BuildState::Queued, BuildState::Preparing)
                | (BuildState::Preparing, BuildState::Prepared)
                | (BuildState::Prepared, BuildState::Building)
                | (BuildState::Building, BuildState::MarkedForCompletion)
                | (BuildState::MarkedForCompletion, BuildState::Finished)
        )
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildState::Queued => write!(f, "QUEUED"),
            BuildState::Preparing => write!(f, "PREPARING"),
            BuildState::Prepared => write!(f, "PREPARED"),
            BuildState::Building => write!(f, "BUILDING"),
            BuildState::MarkedForCompletion => write!(f, "MARKED_FOR_COMPLETION"),
            BuildState::Finished => write!(f, "FINISHED"),
            BuildState::Canceled => write!(f, "CANCELED"),
            BuildState::Errored => write!(f, "ERRORED"),
        }
    }
}

#[cfg(test)]
#[path = "build_state_tests.rs"]
mod tests;
