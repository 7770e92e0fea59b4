// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable description of one job

use serde::{Deserialize, Serialize};

/// A pair of `(variable_name, generator_command)`.
///
/// The generator command runs once in the project workspace; each non-empty
/// line of its stdout becomes one atom value bound to `env_var`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomizerSpec {
    pub env_var: String,
    pub command: String,
}

impl AtomizerSpec {
    pub fn new(env_var: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            command: command.into(),
        }
    }
}

/// Immutable description of one job: commands, setup, teardown, atomizers,
/// and executor limits. Produced by the external config parser; the core
/// consumes it read-only and never reparses the raw document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    /// Run once per slave before any subjob on that slave.
    pub setup_commands: Vec<String>,
    /// One template executed per atom with that atom's bindings exported.
    pub commands: Vec<String>,
    /// Run exactly once per slave after its last subjob.
    pub teardown_commands: Vec<String>,
    pub atomizers: Vec<AtomizerSpec>,
    /// Upper bound on concurrent slaves allocated to a single build.
    pub max_executors: u32,
    /// Cap on parallel atoms per slave.
    pub max_executors_per_slave: u32,
}

impl JobConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setup_commands: Vec::new(),
            commands: Vec::new(),
            teardown_commands: Vec::new(),
            atomizers: Vec::new(),
            max_executors: u32::MAX,
            max_executors_per_slave: u32::MAX,
        }
    }
}

/// Flatten an ordered command list into a single shell line.
///
/// Entries are joined with `&&` so that a non-zero exit stops the sequence
/// while variable assignments made by earlier entries remain visible to
/// later ones (both behaviors are relied on by real job configs).
///
/// Returns `None` for an empty list.
pub fn join_script(commands: &[String]) -> Option<String> {
    if commands.is_empty() {
        None
    } else {
        Some(commands.join(" && "))
    }
}

#[cfg(test)]
#[path = "job_config_tests.rs"]
mod tests;
