// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builder side of the manager handshake.

use std::time::Duration;

use rmake_core::{BuilderId, HandshakeState};
use rmake_wire::{BuilderAnnouncement, Message, ProtocolError};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("manager rejected builder: {0}")]
    Rejected(String),
}

/// One handshake attempt over a freshly connected stream.
#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

impl Handshake {
    pub fn new() -> Self {
        Self { state: HandshakeState::Connected }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    fn transition(&mut self, next: HandshakeState) {
        debug!(from = %self.state, to = %next, "handshake");
        self.state = next;
    }

    /// Announce and wait up to `timeout` for the acknowledgement.
    pub async fn run<S>(
        &mut self,
        stream: &mut S,
        ann: &BuilderAnnouncement,
        timeout: Duration,
    ) -> Result<BuilderId, HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let result = self.exchange(stream, ann, timeout).await;
        match &result {
            Ok(id) => self.transition(HandshakeState::Acknowledged(*id)),
            Err(HandshakeError::Rejected(_)) => self.transition(HandshakeState::Rejected),
            Err(HandshakeError::Protocol(_)) => self.transition(HandshakeState::Disconnected),
        }
        result
    }

    async fn exchange<S>(
        &mut self,
        stream: &mut S,
        ann: &BuilderAnnouncement,
        timeout: Duration,
    ) -> Result<BuilderId, HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        rmake_wire::write_message(stream, &ann.clone().into()).await?;
        self.transition(HandshakeState::Announced);

        let ack = match rmake_wire::read_message_timeout(stream, timeout).await? {
            Message::ManagerAcknowledge(ack) => ack,
            other => {
                return Err(ProtocolError::Unexpected {
                    expected: "ManagerAcknowledge",
                    got: other.kind(),
                }
                .into())
            }
        };
        match ack.uuid {
            Some(id) if ack.success => Ok(id),
            _ if ack.message.is_empty() => Err(HandshakeError::Rejected("no reason given".into())),
            _ => Err(HandshakeError::Rejected(ack.message)),
        }
    }
}

#[cfg(test)]
#[path = "handshake_tests.rs"]
mod tests;
