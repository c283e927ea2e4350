// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol shared by clients, the manager and builders.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload. Every
//! payload is an internally tagged object, so a receiver can dispatch on
//! `"type"` without knowing what the connection is for.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod message;
mod wire;

pub use message::{
    BuildStatus, BuilderAnnouncement, BuilderResult, BuilderStatusUpdate, FinalBuildResult,
    JobFinishedMessage, ManagerAcknowledge, ManagerRequest, Message, RequiredFileMessage,
};
pub use rmake_core::BuilderRequest;
pub use wire::{
    decode, encode, read_frame, read_message, read_message_timeout, send_once, write_frame,
    write_message, ProtocolError, MAX_FRAME_LEN,
};
