// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive prompt matching for remote git commands
//!
//! Remote git invocations can stop and ask questions (host key
//! verification, passwords). The executor watches the child's output for
//! known prompt patterns and consults an injected [`PromptHandler`] for the
//! answer, so policy lives with the caller instead of inside the process
//! loop.

/// Events the remote-command executor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptEvent {
    /// "Are you sure you want to continue connecting (yes/no)?"
    KnownHosts,
    /// "Password:" and friends.
    Password,
    /// Child closed its output stream.
    Eof,
    /// No output within the configured window.
    Timeout,
}

/// What to do when a prompt appears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptAction {
    /// Write this line to the child's stdin.
    Respond(String),
    /// Abort the command with this message.
    Fail(String),
}

/// Injected policy for interactive prompts.
pub trait PromptHandler: Send + Sync {
    fn on_known_hosts(&self) -> PromptAction;
    fn on_password(&self) -> PromptAction;
}

/// Classify one line of child output. Returns `None` for ordinary output.
pub fn classify_line(line: &str) -> Option<PromptEvent> {
    if line.contains("Are you sure you want to continue connecting") {
        return Some(PromptEvent::KnownHosts);
    }
    let lowered = line.trim().to_ascii_lowercase();
    if lowered == "password:"
        || lowered.ends_with("'s password:")
        || lowered.starts_with("password for ")
    {
        return Some(PromptEvent::Password);
    }
    None
}

/// Standard git policy: auto-accept unknown hosts unless strict checking is
/// on; supply a password only when one was configured.
#[derive(Debug, Clone, Default)]
pub struct GitPromptPolicy {
    pub strict_host_key_checking: bool,
    pub password: Option<String>,
}

impl PromptHandler for GitPromptPolicy {
    fn on_known_hosts(&self) -> PromptAction {
        if self.strict_host_key_checking {
            PromptAction::Fail("failed known_hosts check".to_string())
        } else {
            PromptAction::Respond("yes".to_string())
        }
    }

    fn on_password(&self) -> PromptAction {
        match &self.password {
            Some(secret) => PromptAction::Respond(secret.clone()),
            None => PromptAction::Fail("password requested but none configured".to_string()),
        }
    }
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
