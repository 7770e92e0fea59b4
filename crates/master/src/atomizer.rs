// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomizer: expand atomizer specs into atoms

use clusterrunner_adapters::ProjectType;
use clusterrunner_core::{Atom, AtomId, JobConfig};
use indexmap::IndexMap;
use thiserror::Error;

/// A generator command misbehaved (non-zero exit or execution failure).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AtomizerError(pub String);

/// Run each atomizer spec's generator in the workspace and form the ordered
/// cross-product of their values.
///
/// Each non-empty stdout line of a generator is one value. Atom ids are
/// dense from 0 in product order (first spec's sequence outermost).
/// Atomization is pure with respect to the workspace snapshot; the caller
/// must have fetched the project first.
pub async fn atomize(
    job_config: &JobConfig,
    project: &dyn ProjectType,
) -> Result<Vec<Atom>, AtomizerError> {
    let mut value_lists: Vec<(String, Vec<String>)> = Vec::new();
    for spec in &job_config.atomizers {
        let outcome = project
            .execute_command_in_project(&spec.command, None)
            .await
            .map_err(|e| AtomizerError(format!("generator '{}' failed: {}", spec.command, e)))?;
        if !outcome.succeeded() {
            return Err(AtomizerError(format!(
                "generator '{}' exited {}: {}",
                spec.command, outcome.exit_code, outcome.output
            )));
        }
        let values: Vec<String> = outcome
            .output
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        tracing::debug!(
            env_var = %spec.env_var,
            count = values.len(),
            "atomizer generator produced values"
        );
        value_lists.push((spec.env_var.clone(), values));
    }

    // Ordered cross-product: first spec's sequence outermost.
    let mut bindings: Vec<IndexMap<String, String>> = vec![IndexMap::new()];
    for (env_var, values) in &value_lists {
        let mut expanded = Vec::with_capacity(bindings.len() * values.len());
        for base in &bindings {
            for value in values {
                let mut env = base.clone();
                env.insert(env_var.clone(), value.clone());
                expanded.push(env);
            }
        }
        bindings = expanded;
    }
    if value_lists.is_empty() {
        bindings.clear();
    }

    Ok(bindings
        .into_iter()
        .enumerate()
        .map(|(i, env)| Atom::new(AtomId::new(i as u64), env))
        .collect())
}

#[cfg(test)]
#[path = "atomizer_tests.rs"]
mod tests;
