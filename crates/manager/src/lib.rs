// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rmake-manager: builder registry, load queue and job dispatch

mod connection;
pub mod dispatch;
pub mod env;
mod handshake;
mod listener;
pub mod queue;
pub mod registry;

use std::time::Duration;

use thiserror::Error;

pub use connection::{BuilderConnection, ConnectionClosed, NOT_QUEUED};
pub use dispatch::{dispatch, plan, Assignment, DispatchError};
pub use handshake::Handshake;
pub use listener::{Manager, ManagerCtx};
pub use queue::{BuilderHeap, LoadQueue, QueueError};
pub use registry::{BuilderRegistry, RegistryError, SessionRegistry, UuidPool};

/// Manager configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address builders and clients connect to
    pub listen_addr: String,
    /// Deadline for the first message of a connection
    pub ipc_timeout: Duration,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Self {
        Self { listen_addr: env::listen_addr(), ipc_timeout: env::ipc_timeout() }
    }
}

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
