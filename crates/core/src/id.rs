// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation abstractions

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Define a newtype ID wrapper around `u64`.
///
/// Generates `new()`, `value()`, `Display`, `From<u64>`, and serde
/// implementations. ClusterRunner ids are assigned monotonically by the
/// master, so the integer form is part of the wire protocol.
///
/// ```ignore
/// define_seq_id! {
///     /// Doc comment for the ID type.
///     pub struct MyId;
/// }
/// ```
#[macro_export]
macro_rules! define_seq_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn new(n: u64) -> Self {
                Self(n)
            }

            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(n: u64) -> Self {
                Self(n)
            }
        }
    };
}

/// Hands out monotonically increasing ids.
///
/// Clones share the same counter, so a source can be handed to several
/// registries while keeping the sequence gap-free across them.
#[derive(Clone, Debug)]
pub struct SeqIdSource {
    counter: Arc<AtomicU64>,
}

impl SeqIdSource {
    /// Create a source whose first id is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(first)),
        }
    }

    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for SeqIdSource {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
