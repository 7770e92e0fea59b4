// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client transport to a slave's API

use super::{SlaveTransport, TransportError};
use async_trait::async_trait;
use clusterrunner_core::{BuildId, BuildSetup, Subjob};
use serde_json::json;
use std::time::Duration;

/// Talks to a slave over its HTTP API.
///
/// The master only ever POSTs; results and state changes flow back through
/// the master's own API, keeping each direction fire-and-forget.
#[derive(Clone)]
pub struct HttpSlaveTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSlaveTransport {
    /// `slave_url` is the externally-reachable address the slave registered
    /// with, e.g. `worker1.example.com:43001`.
    pub fn new(slave_url: &str, request_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Rejected(format!("client construction failed: {}", e)))?;
        let base_url = if slave_url.contains("://") {
            slave_url.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", slave_url.trim_end_matches('/'))
        };
        Ok(Self { client, base_url })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), TransportError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_server_error() {
            Err(TransportError::Transient(format!(
                "{} returned {}",
                url, status
            )))
        } else {
            Err(TransportError::Rejected(format!(
                "{} returned {}",
                url, status
            )))
        }
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        TransportError::Transient(err.to_string())
    } else {
        TransportError::Rejected(err.to_string())
    }
}

#[async_trait]
impl SlaveTransport for HttpSlaveTransport {
    async fn start_setup(&self, setup: &BuildSetup) -> Result<(), TransportError> {
        self.post(
            &format!("v1/build/{}/setup", setup.build_id),
            json!({
                "job_config": setup.job_config,
                "project_params": setup.project_params,
            }),
        )
        .await
    }

    async fn start_subjob_execution(&self, subjob: &Subjob) -> Result<(), TransportError> {
        self.post(
            &format!(
                "v1/build/{}/subjob/{}",
                subjob.build_id, subjob.subjob_id
            ),
            json!({
                "atoms": subjob.atoms,
                "commands": subjob.commands,
            }),
        )
        .await
    }

    async fn teardown_build(&self, build_id: BuildId) -> Result<(), TransportError> {
        self.post(&format!("v1/build/{}/teardown", build_id), json!({}))
            .await
    }

    async fn kill_running_job(&self) -> Result<(), TransportError> {
        self.post("v1/kill", json!({})).await
    }
}
