// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builder/manager handshake states, shared by both ends.

use crate::BuilderId;

/// Where a builder connection stands in the handshake.
///
/// `Disconnected → Connected → Announced → Acknowledged | Rejected`, and
/// back to `Disconnected` when the socket drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Disconnected,
    Connected,
    Announced,
    Acknowledged(BuilderId),
    Rejected,
}

crate::simple_display! {
    HandshakeState {
        Disconnected => "disconnected",
        Connected => "connected",
        Announced => "announced",
        Acknowledged(..) => "acknowledged",
        Rejected => "rejected",
    }
}

impl HandshakeState {
    /// Identity held by an acknowledged connection.
    pub fn builder_id(&self) -> Option<BuilderId> {
        match self {
            HandshakeState::Acknowledged(id) => Some(*id),
            _ => None,
        }
    }
}
