// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manager side of the builder handshake.

use rmake_core::{HandshakeState, PROTOCOL_VERSION};
use rmake_wire::{BuilderAnnouncement, ManagerAcknowledge};
use tracing::{info, warn};

use crate::registry::UuidPool;

/// Tracks one inbound builder connection through the handshake.
///
/// The id allocated for an acknowledged builder is owned by this value
/// until [`Handshake::on_disconnect`] hands it back to the pool.
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
    /// A freshly accepted connection.
    pub fn new() -> Self {
        Self { state: HandshakeState::Connected }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Answer a builder's announcement.
    ///
    /// An id is allocated before the version check and released again on
    /// rejection, so a rejected builder never holds an id.
    pub fn on_announcement(&mut self, ann: &BuilderAnnouncement, uuids: &UuidPool) -> ManagerAcknowledge {
        if self.state != HandshakeState::Connected {
            warn!(state = %self.state, "repeated announcement");
            return ManagerAcknowledge::rejected(format!("unexpected announcement in state {}", self.state));
        }
        self.state = HandshakeState::Announced;

        let uuid = uuids.allocate();
        if ann.protocol_version != PROTOCOL_VERSION {
            uuids.release(uuid);
            self.state = HandshakeState::Rejected;
            warn!(
                hostname = %ann.hostname,
                theirs = ann.protocol_version,
                ours = PROTOCOL_VERSION,
                "rejecting builder with mismatched protocol version",
            );
            return ManagerAcknowledge::rejected(format!(
                "protocol version {} not supported, manager speaks {}",
                ann.protocol_version, PROTOCOL_VERSION
            ));
        }

        self.state = HandshakeState::Acknowledged(uuid);
        info!(builder = %uuid, hostname = %ann.hostname, listener = %ann.listener_addr, "builder registered");
        ManagerAcknowledge::accepted(uuid)
    }

    /// The socket dropped. Releases the builder's id if it held one.
    pub fn on_disconnect(&mut self, uuids: &UuidPool) {
        if let Some(uuid) = self.state.builder_id() {
            uuids.release(uuid);
        }
        self.state = HandshakeState::Disconnected;
    }
}

#[cfg(test)]
#[path = "handshake_tests.rs"]
mod tests;
