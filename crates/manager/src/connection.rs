// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manager-side handle to one registered builder.

use std::sync::atomic::{AtomicUsize, Ordering};

use rmake_core::BuilderId;
use rmake_wire::Message;
use thiserror::Error;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Sentinel index for a connection that is not in the load queue.
pub const NOT_QUEUED: usize = usize::MAX;

#[derive(Debug, Error)]
#[error("builder {0} is no longer connected")]
pub struct ConnectionClosed(pub BuilderId);

/// A registered builder.
///
/// `num_jobs` and `index` belong to the [`LoadQueue`](crate::LoadQueue):
/// they are only written while the queue's lock is held, and `index` always
/// equals the connection's slot in the queue (or [`NOT_QUEUED`]).
#[derive(Debug)]
pub struct BuilderConnection {
    pub uuid: BuilderId,
    pub hostname: String,
    pub listener_addr: String,
    num_jobs: AtomicUsize,
    index: AtomicUsize,
    outgoing: mpsc::UnboundedSender<Message>,
}

impl BuilderConnection {
    pub fn new(
        uuid: BuilderId,
        hostname: impl Into<String>,
        listener_addr: impl Into<String>,
        outgoing: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self {
            uuid,
            hostname: hostname.into(),
            listener_addr: listener_addr.into(),
            num_jobs: AtomicUsize::new(0),
            index: AtomicUsize::new(NOT_QUEUED),
            outgoing,
        }
    }

    /// Current load heuristic.
    pub fn num_jobs(&self) -> usize {
        self.num_jobs.load(Ordering::Relaxed)
    }

    /// Position in the load queue.
    pub fn index(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    pub(crate) fn set_num_jobs(&self, n: usize) {
        self.num_jobs.store(n, Ordering::Relaxed);
    }

    pub(crate) fn set_index(&self, i: usize) {
        self.index.store(i, Ordering::Relaxed);
    }

    /// Queue a message for this builder's writer task. Never blocks.
    pub fn send(&self, message: impl Into<Message>) -> Result<(), ConnectionClosed> {
        self.outgoing.send(message.into()).map_err(|_| ConnectionClosed(self.uuid))
    }
}

/// Drain a builder's outbound channel onto its socket.
///
/// One writer per connection, so a slow builder only delays its own traffic.
pub(crate) async fn run_writer<W>(
    uuid: BuilderId,
    mut writer: W,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outgoing.recv().await {
        let kind = message.kind();
        if let Err(e) = rmake_wire::write_message(&mut writer, &message).await {
            warn!(builder = %uuid, kind, error = %e, "failed to write to builder");
            return;
        }
        debug!(builder = %uuid, kind, "sent to builder");
    }
}
