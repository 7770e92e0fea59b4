// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared by other crates' tests
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::atom::{Atom, AtomId};
use crate::build_request::BuildRequest;
use crate::build_state::BuildId;
use crate::job_config::{AtomizerSpec, JobConfig};
use crate::subjob::{Subjob, SubjobId};
use indexmap::IndexMap;
use std::collections::HashMap;

/// A directory-type build request pointing at `dir`.
pub fn directory_request(dir: &str, job_name: &str) -> BuildRequest {
    let mut params = HashMap::new();
    params.insert("type".to_string(), "directory".to_string());
    params.insert("project_directory".to_string(), dir.to_string());
    params.insert("job_name".to_string(), job_name.to_string());
    BuildRequest::new(params)
}

/// A job config with a single atomizer and a single command.
pub fn simple_job_config(name: &str, env_var: &str, generator: &str, command: &str) -> JobConfig {
    JobConfig {
        atomizers: vec![AtomizerSpec::new(env_var, generator)],
        commands: vec![command.to_string()],
        ..JobConfig::new(name)
    }
}

/// An atom binding a single variable.
pub fn atom(id: u64, var: &str, value: &str) -> Atom {
    let mut env = IndexMap::new();
    env.insert(var.to_string(), value.to_string());
    Atom::new(AtomId::new(id), env)
}

/// A one-atom subjob with the given command list.
pub fn one_atom_subjob(build_id: u64, subjob_id: u64, a: Atom, commands: &[&str]) -> Subjob {
    Subjob::new(
        BuildId::new(build_id),
        SubjobId::new(subjob_id),
        vec![a],
        commands.iter().map(|c| c.to_string()).collect(),
    )
}
