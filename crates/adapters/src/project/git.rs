// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git-backed project type
//!
//! The master keeps a cache of cloned repositories keyed by a sanitized
//! form of the remote URL. Remote git commands are interactive-aware: a
//! prompt matcher watches the child's output and answers host-key and
//! password prompts according to the injected policy.

use super::{execute_in_project_dir, ProjectError, ProjectType};
use crate::prompt::{classify_line, GitPromptPolicy, PromptAction, PromptEvent, PromptHandler};
use crate::subprocess::{CommandOutcome, DEFAULT_COMMAND_TIMEOUT, GIT_REMOTE_TIMEOUT};
use async_trait::async_trait;
use clusterrunner_core::JobConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

const DEFAULT_REMOTE: &str = "origin";
const DEFAULT_BRANCH: &str = "master";

/// Explicit git configuration, passed into the project constructor.
#[derive(Debug, Clone)]
pub struct GitConfig {
    /// Root of the master's repository cache.
    pub repo_directory: PathBuf,
    /// Root of the per-project timing data.
    pub timings_directory: PathBuf,
    /// Hostname slaves use to reach this master's repo cache over ssh.
    pub master_hostname: String,
    pub strict_host_key_checking: bool,
    /// Secret handed to password prompts, when configured.
    pub password: Option<String>,
    pub remote_command_timeout: Duration,
    pub remote_command_attempts: u32,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            repo_directory: PathBuf::from("/var/lib/clusterrunner/repos"),
            timings_directory: PathBuf::from("/var/lib/clusterrunner/timings"),
            master_hostname: "localhost".to_string(),
            strict_host_key_checking: false,
            password: None,
            remote_command_timeout: GIT_REMOTE_TIMEOUT,
            remote_command_attempts: 3,
        }
    }
}

/// Strip the scheme from a repo URL and drop characters that are unsafe in
/// cache paths. `:` removal folds `host:port` into one path segment:
/// `ssh://host.example:1234/x` becomes `host.example1234/x`.
fn url_to_cache_path(url: &str) -> String {
    let without_scheme = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };
    sanitize_path(without_scheme)
}

/// Keep only characters safe across filesystems and ssh URLs.
fn sanitize_path(path: &str) -> String {
    path.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '.'))
        .collect()
}

/// A shallow clone cannot serve as a fetch cache; it gets wiped and
/// recloned.
fn is_shallow_repo(repo_dir: &Path) -> bool {
    repo_dir.join(".git/shallow").is_file()
}

/// Ensure the repo cache directory exists, wiping any shallow clone first.
fn prepare_repo_dir(repo_dir: &Path) -> Result<(), ProjectError> {
    if repo_dir.exists() && is_shallow_repo(repo_dir) {
        tracing::info!(repo = %repo_dir.display(), "wiping shallow clone");
        std::fs::remove_dir_all(repo_dir)?;
    }
    std::fs::create_dir_all(repo_dir)?;
    Ok(())
}

enum RemoteError {
    Transient(String),
    Fatal(String),
}

/// Project fetched from a git remote into the master's repo cache.
pub struct GitProject {
    url: String,
    remote: String,
    branch: String,
    config: GitConfig,
    jobs: HashMap<String, JobConfig>,
    repo_dir: PathBuf,
    fetched_commit: Mutex<Option<String>>,
}

impl GitProject {
    pub fn new(
        url: String,
        remote: Option<String>,
        branch: Option<String>,
        config: GitConfig,
        jobs: HashMap<String, JobConfig>,
    ) -> Self {
        let repo_dir = config.repo_directory.join(url_to_cache_path(&url));
        Self {
            url,
            remote: remote.unwrap_or_else(|| DEFAULT_REMOTE.to_string()),
            branch: branch.unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            config,
            jobs,
            repo_dir,
            fetched_commit: Mutex::new(None),
        }
    }

    /// The on-disk cache location for this project's repository.
    pub fn repo_cache_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Directory holding timing files for this repository.
    pub fn timing_file_directory(&self) -> PathBuf {
        self.config
            .timings_directory
            .join(url_to_cache_path(&self.url))
    }

    fn prompt_policy(&self) -> GitPromptPolicy {
        GitPromptPolicy {
            strict_host_key_checking: self.config.strict_host_key_checking,
            password: self.config.password.clone(),
        }
    }

    /// Run a git command that may touch the network, with prompt handling
    /// and bounded retries. The last error is raised on final failure.
    async fn run_remote_git(
        &self,
        command: &str,
        cwd: Option<&Path>,
    ) -> Result<CommandOutcome, ProjectError> {
        let attempts = self.config.remote_command_attempts.max(1);
        let policy = self.prompt_policy();
        let mut last = String::new();
        for attempt in 1..=attempts {
            match run_interactive(command, cwd, &policy, self.config.remote_command_timeout).await
            {
                Ok(outcome) => return Ok(outcome),
                Err(RemoteError::Fatal(msg)) => return Err(ProjectError::Fetch(msg)),
                Err(RemoteError::Transient(msg)) => {
                    tracing::warn!(attempt, attempts, command, error = %msg, "remote git command failed");
                    last = msg;
                }
            }
        }
        Err(ProjectError::Fetch(last))
    }

    async fn run_remote_git_checked(
        &self,
        command: &str,
        cwd: Option<&Path>,
    ) -> Result<CommandOutcome, ProjectError> {
        let outcome = self.run_remote_git(command, cwd).await?;
        if outcome.succeeded() {
            Ok(outcome)
        } else {
            Err(ProjectError::Fetch(format!(
                "{} exited {}: {}",
                command, outcome.exit_code, outcome.output
            )))
        }
    }

    async fn run_local_git_checked(&self, command: &str) -> Result<CommandOutcome, ProjectError> {
        let outcome = self
            .execute_command_in_project(command, Some(&self.repo_dir))
            .await?;
        if outcome.succeeded() {
            Ok(outcome)
        } else {
            Err(ProjectError::Fetch(format!(
                "{} exited {}: {}",
                command, outcome.exit_code, outcome.output
            )))
        }
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn set_fetched_commit(&self, commit: &str) {
        *self.fetched_commit.lock() = Some(commit.to_string());
    }
}

#[async_trait]
impl ProjectType for GitProject {
    async fn fetch_project(&self) -> Result<(), ProjectError> {
        prepare_repo_dir(&self.repo_dir)?;

        if !self.repo_dir.join(".git").exists() {
            self.run_remote_git_checked(
                &format!("git clone {} {}", self.url, self.repo_dir.display()),
                None,
            )
            .await?;
        }
        self.run_remote_git_checked(
            &format!("git fetch {} {}", self.remote, self.branch),
            Some(&self.repo_dir),
        )
        .await?;

        let rev = self.run_local_git_checked("git rev-parse FETCH_HEAD").await?;
        let commit = rev.output.trim().to_string();
        // Publish the fetched commit under a stable ref so slaves can fetch
        // exactly this snapshot from the master's cache.
        self.run_local_git_checked(&format!(
            "git update-ref refs/clusterrunner/{} FETCH_HEAD",
            commit
        ))
        .await?;
        self.run_local_git_checked(&format!("git checkout --force {}", commit))
            .await?;

        tracing::info!(url = %self.url, commit = %commit, "fetched project");
        *self.fetched_commit.lock() = Some(commit);
        Ok(())
    }

    async fn execute_command_in_project(
        &self,
        command: &str,
        cwd: Option<&Path>,
    ) -> Result<CommandOutcome, ProjectError> {
        execute_in_project_dir(&self.repo_dir, command, cwd, DEFAULT_COMMAND_TIMEOUT).await
    }

    fn job_config(&self, job_name: &str) -> Result<JobConfig, ProjectError> {
        self.jobs
            .get(job_name)
            .cloned()
            .ok_or_else(|| ProjectError::JobNotFound(job_name.to_string()))
    }

    fn timing_file_path(&self, job_name: &str) -> PathBuf {
        self.timing_file_directory()
            .join(format!("{}.timing.json", job_name))
    }

    fn slave_param_overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        overrides.insert(
            "url".to_string(),
            format!(
                "ssh://{}{}",
                self.config.master_hostname,
                sanitize_path(&self.repo_dir.display().to_string())
            ),
        );
        if let Some(commit) = self.fetched_commit.lock().as_ref() {
            overrides.insert(
                "branch".to_string(),
                format!("refs/clusterrunner/{}", commit),
            );
        }
        overrides
    }

    fn project_directory(&self) -> &Path {
        &self.repo_dir
    }
}

/// Run one interactive remote command, answering prompts via `handler`.
///
/// The child's merged output is scanned chunk-by-chunk for prompt
/// patterns; responses are written to its stdin. Exceeding `timeout`
/// counts as a transient failure so the caller's retry loop applies.
async fn run_interactive(
    command: &str,
    cwd: Option<&Path>,
    handler: &dyn PromptHandler,
    timeout: Duration,
) -> Result<CommandOutcome, RemoteError> {
    let wrapped = format!("exec 2>&1\n{}", command);
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(wrapped)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let started = Instant::now();
    let interaction = async {
        let mut child = cmd
            .spawn()
            .map_err(|e| RemoteError::Transient(format!("spawn failed: {}", e)))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| RemoteError::Transient("child stdout unavailable".to_string()))?;
        let mut stdin = child.stdin.take();

        let mut output = String::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stdout
                .read(&mut buf)
                .await
                .map_err(|e| RemoteError::Transient(format!("read failed: {}", e)))?;
            if n == 0 {
                // PromptEvent::Eof: the command is wrapping up.
                break;
            }
            let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
            output.push_str(&chunk);

            let event = chunk.lines().find_map(classify_line);
            let action = match event {
                Some(PromptEvent::KnownHosts) => Some(handler.on_known_hosts()),
                Some(PromptEvent::Password) => Some(handler.on_password()),
                _ => None,
            };
            match action {
                Some(PromptAction::Respond(answer)) => {
                    if let Some(pipe) = stdin.as_mut() {
                        pipe.write_all(format!("{}\n", answer).as_bytes())
                            .await
                            .map_err(|e| {
                                RemoteError::Transient(format!("prompt response failed: {}", e))
                            })?;
                    }
                }
                Some(PromptAction::Fail(msg)) => {
                    let _ = child.kill().await;
                    return Err(RemoteError::Fatal(msg));
                }
                None => {}
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| RemoteError::Transient(format!("wait failed: {}", e)))?;
        Ok(CommandOutcome {
            exit_code: status.code().unwrap_or(-1),
            output,
            duration: started.elapsed(),
        })
    };

    match tokio::time::timeout(timeout, interaction).await {
        Ok(result) => result,
        Err(_elapsed) => Err(RemoteError::Transient(format!(
            "{} timed out after {}s",
            command,
            timeout.as_secs()
        ))),
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
