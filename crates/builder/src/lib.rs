// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rmake-builder: runs dispatched jobs and ships their outputs

pub mod blob;
pub mod engine;
pub mod env;
pub mod executor;
pub mod handshake;
mod node;
pub mod peer;
pub mod request_queue;
pub mod stats;
pub mod wait_registry;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub use blob::{BlobError, FsBlobStore};
pub use engine::{Engine, JobPhase};
pub use executor::{ExecError, ExecOutput, Executor, ProcessExecutor};
#[cfg(any(test, feature = "test-support"))]
pub use executor::{ExecCall, FakeExecutor};
pub use handshake::{Handshake, HandshakeError};
pub use node::BuilderNode;
pub use peer::{PeerDialer, PeerError, TcpDialer};
#[cfg(any(test, feature = "test-support"))]
pub use peer::{Delivery, FakeDialer};
pub use request_queue::RequestQueue;
#[cfg(any(test, feature = "test-support"))]
pub use stats::FakeSampler;
pub use stats::{LoadSample, LoadSampler, ProcStatSampler};
pub use wait_registry::{Arrival, FileSync, WaitRegistry};

/// Builder configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Manager to register with
    pub manager_addr: String,
    /// Bind address of the peer listener
    pub listen_addr: String,
    /// Address announced to the manager; derived from the listener if unset
    pub advertise_addr: Option<String>,
    /// Number of worker tasks
    pub procs: usize,
    /// Root of the per-session build directories
    pub build_root: PathBuf,
    /// Interval between status updates
    pub status_interval: Duration,
    /// Timeout for handshake replies, peer reads and deliveries
    pub ipc_timeout: Duration,
    /// Pause between reconnect attempts
    pub reconnect_delay: Duration,
    /// Reconnect attempts after losing the manager
    pub reconnect_attempts: u32,
    /// Bound on queued requests; `None` is unbounded
    pub queue_capacity: Option<usize>,
    /// Extra environment for every job
    pub env: Vec<(String, String)>,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Self {
        Self {
            manager_addr: env::manager_addr(),
            listen_addr: env::listen_addr(),
            advertise_addr: env::advertise_addr(),
            procs: env::procs(),
            build_root: env::build_root(),
            status_interval: env::status_interval(),
            ipc_timeout: env::ipc_timeout(),
            reconnect_delay: env::reconnect_delay(),
            reconnect_attempts: env::reconnect_attempts(),
            queue_capacity: env::queue_capacity(),
            env: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect to manager at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("lost the manager and {attempts} reconnect attempts failed")]
    ManagerLost { attempts: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
