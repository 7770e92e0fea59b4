// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build setup handoff sent to a slave

use crate::build_state::BuildId;
use crate::job_config::JobConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything a slave needs to ready itself for a build: the job
/// description plus the project parameters to materialize a workspace.
///
/// `project_params` starts from the original build request with the master's
/// slave overrides applied (e.g. pointing the slave at the master-cached
/// repository instead of the upstream URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSetup {
    pub build_id: BuildId,
    pub job_config: JobConfig,
    pub project_params: HashMap<String, String>,
}

impl BuildSetup {
    pub fn new(
        build_id: BuildId,
        job_config: JobConfig,
        project_params: HashMap<String, String>,
    ) -> Self {
        Self {
            build_id,
            job_config,
            project_params,
        }
    }
}
