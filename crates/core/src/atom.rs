// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atom: the smallest unit of executable work

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

crate::define_seq_id! {
    /// Identifier of an atom, unique within its build.
    ///
    /// Assigned densely from 0 in atomization order.
    pub struct AtomId;
}

/// One environment binding set plus the job's command list make up a unit of
/// work. The binding map preserves insertion order so the cross-product of
/// several atomizer specs exports variables deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    pub id: AtomId,
    pub env: IndexMap<String, String>,
}

impl Atom {
    pub fn new(id: AtomId, env: IndexMap<String, String>) -> Self {
        Self { id, env }
    }
}
