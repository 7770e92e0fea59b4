// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! clusterrunner-core: Domain types for the ClusterRunner build service

pub mod atom;
pub mod build_request;
pub mod build_state;
pub mod clock;
pub mod id;
pub mod job_config;
pub mod payload;
pub mod setup;
pub mod slave_state;
pub mod subjob;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use atom::{Atom, AtomId};
pub use build_request::{BuildRequest, RequestError};
pub use build_state::{BuildId, BuildState};
pub use clock::{Clock, FakeClock, SystemClock};
pub use id::SeqIdSource;
pub use job_config::{join_script, AtomizerSpec, JobConfig};
pub use payload::SubjobPayload;
pub use setup::BuildSetup;
pub use slave_state::{SlaveId, SlaveState, UnknownSlaveState};
pub use subjob::{artifact_dir_name, Subjob, SubjobId};
