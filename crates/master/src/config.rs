// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master configuration

use std::path::PathBuf;

/// Explicit configuration for the master, passed into constructors.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// Bounded attempts for retryable transport calls to slaves.
    pub transport_attempts: u32,
    /// Re-enqueue a disconnected slave's in-flight subjobs once; a second
    /// loss marks the subjob's atoms failed instead of retrying forever.
    pub requeue_lost_subjobs: bool,
    /// Per-build artifact directories are created under this root.
    pub artifacts_root: PathBuf,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            transport_attempts: clusterrunner_adapters::DEFAULT_TRANSPORT_ATTEMPTS,
            requeue_lost_subjobs: true,
            artifacts_root: PathBuf::from("/var/lib/clusterrunner/artifacts"),
        }
    }
}
