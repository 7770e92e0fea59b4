// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incoming build request parameters

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by [`BuildRequest::validate`]. These map to the
/// `BadRequest` taxonomy: reported to the caller, never logged as errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("missing required parameter: {0}")]
    MissingParam(&'static str),
    #[error("unknown project type: {0}")]
    UnknownProjectType(String),
}

/// An immutable mapping of string keys to string values describing a
/// requested build (project type, URL, branch, job name, overrides).
///
/// Construction never fails; [`validate`](Self::validate) is called at the
/// API boundary before the request is turned into a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    params: HashMap<String, String>,
}

impl BuildRequest {
    pub fn new(params: HashMap<String, String>) -> Self {
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The declared project type ("git", "directory", ...).
    pub fn project_kind(&self) -> Option<&str> {
        self.get("type")
    }

    pub fn job_name(&self) -> Option<&str> {
        self.get("job_name")
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Return a copy of the parameters with `overrides` layered on top.
    ///
    /// Used when forwarding project parameters to a slave, where the master
    /// may redirect the slave at its own cached repository.
    pub fn params_with_overrides(
        &self,
        overrides: &HashMap<String, String>,
    ) -> HashMap<String, String> {
        let mut merged = self.params.clone();
        for (k, v) in overrides {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Check that the request carries everything needed to build it.
    pub fn validate(&self) -> Result<(), RequestError> {
        let kind = self
            .project_kind()
            .ok_or(RequestError::MissingParam("type"))?;
        match kind {
            "git" => {
                if self.get("url").is_none() {
                    return Err(RequestError::MissingParam("url"));
                }
            }
            "directory" => {
                if self.get("project_directory").is_none() {
                    return Err(RequestError::MissingParam("project_directory"));
                }
            }
            other => return Err(RequestError::UnknownProjectType(other.to_string())),
        }
        if self.job_name().is_none() {
            return Err(RequestError::MissingParam("job_name"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "build_request_tests.rs"]
mod tests;
