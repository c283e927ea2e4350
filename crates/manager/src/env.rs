// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the manager crate.

use std::time::Duration;

/// Default listen address for builders and clients.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:11221";

/// Listen address: `RMAKE_MANAGER_LISTEN`, else [`DEFAULT_LISTEN_ADDR`].
pub fn listen_addr() -> String {
    std::env::var("RMAKE_MANAGER_LISTEN")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
}

/// Time allowed for the first message on a new connection (default 5s,
/// configurable via `RMAKE_IPC_TIMEOUT_MS`).
pub fn ipc_timeout() -> Duration {
    std::env::var("RMAKE_IPC_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}
