// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subjob: the unit of dispatch

use crate::atom::Atom;
use crate::build_state::BuildId;
use serde::{Deserialize, Serialize};

crate::define_seq_id! {
    /// Identifier of a subjob, dense and 0-based within its build.
    pub struct SubjobId;
}

/// Exact command string executed for the atom.
pub const COMMAND_FILENAME: &str = "clusterrunner_command";
/// Combined stdout + stderr of the atom's commands.
pub const CONSOLE_OUTPUT_FILENAME: &str = "clusterrunner_console_output";
/// The atom's exit code.
pub const EXIT_CODE_FILENAME: &str = "clusterrunner_exit_code";
/// Wall time of the atom's commands, in seconds.
pub const TIME_FILENAME: &str = "clusterrunner_time";

/// Canonical artifact directory name for one atom of one subjob.
///
/// This naming is part of the on-disk artifact format: the master's final
/// archive and `failures.txt` both refer to these directory names.
pub fn artifact_dir_name(subjob_id: SubjobId, atom_index: usize) -> String {
    format!("artifact_{}_{}", subjob_id, atom_index)
}

/// A bundle of one or more atoms dispatched together to one slave.
///
/// Atoms within a subjob execute sequentially on the same slave; subjobs are
/// independent of each other. `atoms` is never empty and `commands` is the
/// job's command list copied out of the `JobConfig` so a subjob is
/// self-contained on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subjob {
    pub build_id: BuildId,
    pub subjob_id: SubjobId,
    pub atoms: Vec<Atom>,
    pub commands: Vec<String>,
}

impl Subjob {
    pub fn new(
        build_id: BuildId,
        subjob_id: SubjobId,
        atoms: Vec<Atom>,
        commands: Vec<String>,
    ) -> Self {
        Self {
            build_id,
            subjob_id,
            atoms,
            commands,
        }
    }

    /// Artifact directory names for this subjob's atoms, in atom order.
    pub fn artifact_dir_names(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.atoms.len()).map(|idx| artifact_dir_name(self.subjob_id, idx))
    }
}

#[cfg(test)]
#[path = "subjob_tests.rs"]
mod tests;
