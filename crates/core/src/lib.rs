// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rmake-core: shared data model for the rmake build farm

pub mod macros;

pub mod clock;
pub mod deptree;
pub mod file;
pub mod handshake;
pub mod id;
pub mod job;
pub mod logging;
pub mod request;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use deptree::{DepKind, DepTree, DepTreeError};
pub use file::File;
pub use handshake::HandshakeState;
pub use id::{BuilderId, InvalidSessionToken, SessionToken};
pub use job::{find_final_job, Job};
pub use request::{BuilderRequest, ResultAddress};

/// Wire protocol version. Builders must announce exactly this value.
pub const PROTOCOL_VERSION: u32 = 1;
