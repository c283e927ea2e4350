// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rmake-client: submit builds to a manager and collect their results.

pub mod env;
mod files;

use std::path::PathBuf;
use std::time::Duration;

use rmake_wire::{BuildStatus, FinalBuildResult, ManagerRequest, Message, ProtocolError};
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::debug;

pub use files::{load_sources, write_results};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot reach manager at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("unexpected reply from manager: {0}")]
    Unexpected(&'static str),

    #[error("path '{0}' is not relative to the build directory")]
    InvalidPath(String),

    #[error("{op} '{path}': {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Connection details for one manager.
#[derive(Debug, Clone)]
pub struct ManagerClient {
    addr: String,
    connect_timeout: Duration,
}

impl ManagerClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), connect_timeout: env::connect_timeout() }
    }

    /// Client for the manager named by the environment.
    pub fn from_env() -> Self {
        Self::new(env::manager_addr())
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Submit a build and wait for its final result.
    pub async fn build(&self, request: ManagerRequest) -> Result<FinalBuildResult, ClientError> {
        self.build_with_progress(request, |_| {}).await
    }

    /// Submit a build, reporting each progress message to `on_status`.
    ///
    /// A build that fails still returns `Ok`; check `success` on the result.
    /// Only transport problems are errors.
    pub async fn build_with_progress(
        &self,
        request: ManagerRequest,
        mut on_status: impl FnMut(&BuildStatus),
    ) -> Result<FinalBuildResult, ClientError> {
        let mut stream = self.connect().await?;
        debug!(manager = %self.addr, jobs = request.jobs.len(), output = %request.output, "submitting build");
        rmake_wire::write_message(&mut stream, &request.into()).await?;

        loop {
            match rmake_wire::read_message(&mut stream).await? {
                Message::BuildStatus(status) => {
                    debug!(percent = status.percent_complete, "{}", status.message);
                    on_status(&status);
                }
                Message::FinalBuildResult(result) => return Ok(result),
                other => return Self::reject(other),
            }
        }
    }

    async fn connect(&self) -> Result<TcpStream, ClientError> {
        let timed_out = || std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out");
        tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| ClientError::Connect { addr: self.addr.clone(), source: timed_out() })?
            .map_err(|source| ClientError::Connect { addr: self.addr.clone(), source })
    }

    fn reject<T>(message: Message) -> Result<T, ClientError> {
        Err(ClientError::Unexpected(message.kind()))
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
