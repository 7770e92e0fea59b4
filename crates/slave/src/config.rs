// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slave executor configuration

use clusterrunner_adapters::subprocess::DEFAULT_COMMAND_TIMEOUT;
use std::path::PathBuf;
use std::time::Duration;

/// Explicit configuration for the worker-side executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Per-invocation timeout for setup, atom, and teardown commands.
    /// Expiry counts as a non-zero exit.
    pub command_timeout: Duration,
    /// Atom artifact directories are created under
    /// `<results_root>/build_<id>/`.
    pub results_root: PathBuf,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            results_root: PathBuf::from("/var/lib/clusterrunner/results"),
        }
    }
}
