// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! clusterrunner-adapters: Process, transport, and project-type adapters

pub mod project;
pub mod prompt;
pub mod subprocess;
pub mod transport;

pub use project::{
    DirectoryProject, GitConfig, GitProject, ProjectError, ProjectType, ProjectTypeFactory,
    StandardProjectFactory,
};
pub use prompt::{GitPromptPolicy, PromptAction, PromptEvent, PromptHandler};
pub use subprocess::{run_shell, CommandOutcome, SubprocessError, TIMEOUT_EXIT_CODE};
pub use transport::{
    with_retries, HttpSlaveTransport, HttpTransportFactory, SlaveTransport,
    SlaveTransportFactory, TransportError, DEFAULT_TRANSPORT_ATTEMPTS,
};

#[cfg(any(test, feature = "test-support"))]
pub use project::FakeProject;
#[cfg(any(test, feature = "test-support"))]
pub use transport::{FakeSlaveTransport, FakeTransportFactory, TransportCall};
