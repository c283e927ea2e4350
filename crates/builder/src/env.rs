// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the builder crate.

use std::path::PathBuf;
use std::time::Duration;

/// Manager address used when `RMAKE_MANAGER_ADDR` is unset.
pub const DEFAULT_MANAGER_ADDR: &str = "127.0.0.1:11221";

/// Peer listener address used when `RMAKE_BUILDER_LISTEN` is unset.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:11222";

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn millis(name: &str) -> Option<Duration> {
    var(name).and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

/// Manager to register with: `RMAKE_MANAGER_ADDR`
pub fn manager_addr() -> String {
    var("RMAKE_MANAGER_ADDR").unwrap_or_else(|| DEFAULT_MANAGER_ADDR.to_string())
}

/// Peer listener bind address: `RMAKE_BUILDER_LISTEN`
pub fn listen_addr() -> String {
    var("RMAKE_BUILDER_LISTEN").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
}

/// Worker count: `RMAKE_PROCS`, else the number of available cores.
pub fn procs() -> usize {
    var("RMAKE_PROCS")
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
}

/// Root of per-session build directories: `RMAKE_BUILD_ROOT`, else `./builds`.
pub fn build_root() -> PathBuf {
    var("RMAKE_BUILD_ROOT").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("builds"))
}

/// Interval between status updates (default 60s, `RMAKE_STATUS_INTERVAL_MS`).
pub fn status_interval() -> Duration {
    millis("RMAKE_STATUS_INTERVAL_MS").unwrap_or(Duration::from_secs(60))
}

/// Timeout for handshake replies and peer deliveries (default 5s,
/// `RMAKE_IPC_TIMEOUT_MS`).
pub fn ipc_timeout() -> Duration {
    millis("RMAKE_IPC_TIMEOUT_MS").unwrap_or(Duration::from_secs(5))
}

/// Pause before reconnecting to a lost manager (default 5s,
/// `RMAKE_RECONNECT_DELAY_MS`).
pub fn reconnect_delay() -> Duration {
    millis("RMAKE_RECONNECT_DELAY_MS").unwrap_or(Duration::from_secs(5))
}

/// Reconnect attempts before giving up (default 1, `RMAKE_RECONNECT_ATTEMPTS`).
pub fn reconnect_attempts() -> u32 {
    var("RMAKE_RECONNECT_ATTEMPTS").and_then(|s| s.parse::<u32>().ok()).unwrap_or(1)
}

/// Request queue bound: `RMAKE_QUEUE_CAPACITY`. Unset means unbounded.
pub fn queue_capacity() -> Option<usize> {
    var("RMAKE_QUEUE_CAPACITY").and_then(|s| s.parse::<usize>().ok()).filter(|n| *n > 0)
}

/// Address announced to the manager and peers: `RMAKE_BUILDER_ADVERTISE`.
/// Unset means derive it from the bound listener.
pub fn advertise_addr() -> Option<String> {
    var("RMAKE_BUILDER_ADVERTISE")
}

/// This host's name, for announcements and derived listener addresses.
pub fn hostname() -> String {
    var("HOSTNAME")
        .or_else(|| {
            std::fs::read_to_string("/proc/sys/kernel/hostname")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}
