// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subjob result payload

use crate::subjob::SubjobId;
use serde::{Deserialize, Serialize};

/// The artifact bundle a slave posts back after finishing a subjob.
///
/// `tarball` is a gzip-compressed tar stream containing one
/// `artifact_<subjob_id>_<atom_index>` directory per atom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjobPayload {
    pub subjob_id: SubjobId,
    #[serde(with = "serde_bytes_hex")]
    pub tarball: Vec<u8>,
}

impl SubjobPayload {
    pub fn new(subjob_id: SubjobId, tarball: Vec<u8>) -> Self {
        Self { subjob_id, tarball }
    }
}

/// Serialize the tarball as a JSON-safe string of hex pairs.
///
/// Payloads only cross serde when the HTTP transport is in play; the
/// in-process path hands the `Vec<u8>` over directly.
mod serde_bytes_hex {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            out.push_str(&format!("{:02x}", b));
        }
        out.serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        if s.len() % 2 != 0 {
            return Err(serde::de::Error::custom("odd-length hex payload"));
        }
        (0..s.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&s[i..i + 2], 16)
                    .map_err(|e| serde::de::Error::custom(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
