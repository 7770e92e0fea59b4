// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build artifact directory management
//!
//! Authoritative layout per build:
//!
//! ```text
//! <artifact_dir>/
//!   artifact_<subjob_id>_<atom_index>/
//!     clusterrunner_command
//!     clusterrunner_console_output
//!     clusterrunner_exit_code
//!     clusterrunner_time
//!     <user-produced files>
//!   results.tar.gz    # created at finish
//!   failures.txt      # present iff at least one atom failed
//! ```

use clusterrunner_core::{artifact_dir_name, AtomId, BuildId, Subjob, SubjobId, SubjobPayload};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const RESULTS_FILENAME: &str = "results.tar.gz";
pub const FAILURES_FILENAME: &str = "failures.txt";

pub use clusterrunner_core::subjob::EXIT_CODE_FILENAME;

/// Errors while ingesting or archiving artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("payload for subjob {subjob_id} is malformed: {message}")]
    MalformedPayload {
        subjob_id: SubjobId,
        message: String,
    },
    #[error("missing marker file: {0}")]
    MissingMarker(PathBuf),
}

/// Per-build artifact directory under the configured root.
pub fn build_artifact_dir(root: &Path, build_id: BuildId) -> PathBuf {
    root.join(format!("build_{}", build_id))
}

pub fn create_build_artifact_dir(
    root: &Path,
    build_id: BuildId,
) -> Result<PathBuf, ArtifactError> {
    let dir = build_artifact_dir(root, build_id);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Unpack a subjob's result tarball into the build's artifact directory,
/// producing the per-atom `artifact_<subjob_id>_<atom_index>` directories.
pub fn unpack_subjob_payload(
    artifact_dir: &Path,
    payload: &SubjobPayload,
) -> Result<(), ArtifactError> {
    let decoder = GzDecoder::new(&payload.tarball[..]);
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(artifact_dir)
        .map_err(|e| ArtifactError::MalformedPayload {
            subjob_id: payload.subjob_id,
            message: e.to_string(),
        })
}

/// Read each atom's `clusterrunner_exit_code` marker and return the atoms
/// that failed, as `(atom_id, atom_index)` pairs.
///
/// Every atom artifact directory carries the marker regardless of outcome;
/// a missing or unreadable marker means the payload was incomplete.
pub fn failed_atoms_in_payload(
    artifact_dir: &Path,
    subjob: &Subjob,
) -> Result<Vec<(AtomId, usize)>, ArtifactError> {
    let mut failed = Vec::new();
    for (atom_index, atom) in subjob.atoms.iter().enumerate() {
        let marker = artifact_dir
            .join(artifact_dir_name(subjob.subjob_id, atom_index))
            .join(EXIT_CODE_FILENAME);
        let raw = std::fs::read_to_string(&marker)
            .map_err(|_| ArtifactError::MissingMarker(marker.clone()))?;
        let exit_code: i32 = raw
            .trim()
            .parse()
            .map_err(|_| ArtifactError::MissingMarker(marker.clone()))?;
        if exit_code != 0 {
            failed.push((atom.id, atom_index));
        }
    }
    Ok(failed)
}

/// Write `failures.txt`: one artifact directory name per line, ascending
/// `(subjob_id, atom_index)`, no trailing newline.
pub fn write_failures_file(
    artifact_dir: &Path,
    failed: &[(SubjobId, usize)],
) -> Result<PathBuf, ArtifactError> {
    let mut ordered: Vec<&(SubjobId, usize)> = failed.iter().collect();
    ordered.sort();
    let body = ordered
        .iter()
        .map(|(subjob_id, atom_index)| artifact_dir_name(*subjob_id, *atom_index))
        .collect::<Vec<_>>()
        .join("\n");
    let path = artifact_dir.join(FAILURES_FILENAME);
    std::fs::write(&path, body)?;
    Ok(path)
}

/// Create `results.tar.gz` from everything in the artifact directory
/// (excluding the archive itself).
pub fn create_results_archive(artifact_dir: &Path) -> Result<PathBuf, ArtifactError> {
    let archive_path = artifact_dir.join(RESULTS_FILENAME);
    let file = File::create(&archive_path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut entries: Vec<_> = std::fs::read_dir(artifact_dir)?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let name = entry.file_name();
        if name.to_string_lossy() == RESULTS_FILENAME {
            continue;
        }
        let path = entry.path();
        let archived_name = PathBuf::from(&name);
        if path.is_dir() {
            builder.append_dir_all(&archived_name, &path)?;
        } else {
            builder.append_path_with_name(&path, &archived_name)?;
        }
    }
    builder.into_inner()?.finish()?;
    Ok(archive_path)
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
