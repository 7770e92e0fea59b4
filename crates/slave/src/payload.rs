// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Packing subjob results for the trip back to the master

use clusterrunner_core::{Subjob, SubjobPayload};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tar-gzip the subjob's atom artifact directories (as they sit under the
/// build's results directory) into the payload body posted to the master.
pub fn pack_subjob_results(
    build_results_dir: &Path,
    subjob: &Subjob,
) -> Result<SubjobPayload, PayloadError> {
    let mut tarball = Vec::new();
    {
        let encoder = GzEncoder::new(&mut tarball, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for dir_name in subjob.artifact_dir_names() {
            builder.append_dir_all(&dir_name, build_results_dir.join(&dir_name))?;
        }
        builder.into_inner()?.finish()?;
    }
    Ok(SubjobPayload::new(subjob.subjob_id, tarball))
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
