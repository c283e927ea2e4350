// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variable access for the client crate.

use std::time::Duration;

/// Manager address used when `RMAKE_MANAGER_ADDR` is unset.
pub const DEFAULT_MANAGER_ADDR: &str = "127.0.0.1:11221";

/// Manager to submit builds to: `RMAKE_MANAGER_ADDR`
pub fn manager_addr() -> String {
    std::env::var("RMAKE_MANAGER_ADDR")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_MANAGER_ADDR.to_string())
}

/// Connect timeout (default 5s, `RMAKE_IPC_TIMEOUT_MS`).
pub fn connect_timeout() -> Duration {
    std::env::var("RMAKE_IPC_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}
