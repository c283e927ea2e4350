// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for builder and client connections.
//!
//! Builders and clients share one port. The first message on a connection
//! decides what it is: a `BuilderAnnouncement` opens a persistent builder
//! session, a `ManagerRequest` opens a client session, and the session
//! scoped builder messages are also accepted as one-shot deliveries.

mod builders;
mod clients;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rmake_core::{Clock, SystemClock};
use rmake_wire::{Message, ProtocolError};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::queue::LoadQueue;
use crate::registry::{BuilderRegistry, SessionRegistry, UuidPool};
use crate::{Config, ManagerError};

/// Scheduler state shared by every connection task.
pub struct ManagerCtx<C: Clock = SystemClock> {
    pub queue: LoadQueue,
    pub builders: BuilderRegistry,
    pub uuids: UuidPool,
    pub sessions: SessionRegistry<C>,
    pub ipc_timeout: Duration,
}

impl<C: Clock> ManagerCtx<C> {
    pub fn new(clock: C, ipc_timeout: Duration) -> Self {
        Self {
            queue: LoadQueue::new(),
            builders: BuilderRegistry::new(),
            uuids: UuidPool::new(),
            sessions: SessionRegistry::new(clock),
            ipc_timeout,
        }
    }
}

/// A bound manager, ready to accept connections.
pub struct Manager<C: Clock = SystemClock> {
    listener: TcpListener,
    ctx: Arc<ManagerCtx<C>>,
}

impl Manager<SystemClock> {
    pub async fn bind(config: &Config) -> Result<Self, ManagerError> {
        Self::bind_with_clock(config, SystemClock).await
    }
}

impl<C: Clock> Manager<C> {
    pub async fn bind_with_clock(config: &Config, clock: C) -> Result<Self, ManagerError> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .map_err(|source| ManagerError::Bind { addr: config.listen_addr.clone(), source })?;
        let ctx = Arc::new(ManagerCtx::new(clock, config.ipc_timeout));
        Ok(Self { listener, ctx })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ManagerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn ctx(&self) -> Arc<ManagerCtx<C>> {
        Arc::clone(&self.ctx)
    }

    /// Accept connections forever, one task per connection.
    pub async fn run(self) {
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "manager listening");
        }
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(%addr, "accepted connection");
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = handle_connection(reader, writer, &ctx).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("accept error: {}", e),
            }
        }
    }
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub(crate) enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("unexpected {0} message")]
    Unexpected(&'static str),
}

fn log_connection_error(e: ConnectionError) {
    match e {
        ConnectionError::Protocol(ProtocolError::ConnectionClosed) => {
            debug!("peer disconnected")
        }
        ConnectionError::Protocol(ProtocolError::Timeout) => warn!("connection timeout"),
        _ => error!("connection error: {}", e),
    }
}

/// Route a new connection by its first message.
async fn handle_connection<R, W, C>(
    mut reader: R,
    writer: W,
    ctx: &ManagerCtx<C>,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    C: Clock,
{
    let first = rmake_wire::read_message_timeout(&mut reader, ctx.ipc_timeout).await?;
    debug!(kind = first.kind(), session = first.session().map(|s| s.short(8)), "first message");
    match first {
        Message::BuilderAnnouncement(ann) => builders::serve(ann, reader, writer, ctx).await,
        Message::ManagerRequest(request) => clients::serve(request, reader, writer, ctx).await,
        msg @ (Message::BuilderResult(_)
        | Message::JobFinishedMessage(_)
        | Message::RequiredFileMessage(_)) => {
            builders::handle_session_message(msg, ctx);
            Ok(())
        }
        other => Err(ConnectionError::Unexpected(other.kind())),
    }
}

/// Resolves once the peer closes its end (or sends anything unexpected).
async fn detect_disconnect<R: AsyncRead + Unpin>(reader: &mut R) {
    let mut buf = [0u8; 1];
    let _ = reader.read(&mut buf).await;
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
