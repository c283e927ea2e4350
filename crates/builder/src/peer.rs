// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact delivery to peer builders.

use std::time::Duration;

use async_trait::async_trait;
use rmake_wire::{ProtocolError, RequiredFileMessage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("could not deliver to {addr}: {source}")]
    Unreachable {
        addr: String,
        #[source]
        source: ProtocolError,
    },
}

/// Adapter for sending an artifact to another builder's listener
#[async_trait]
pub trait PeerDialer: Clone + Send + Sync + 'static {
    async fn deliver(&self, addr: &str, message: RequiredFileMessage) -> Result<(), PeerError>;
}

/// Opens one TCP connection per delivery.
#[derive(Clone, Copy, Debug)]
pub struct TcpDialer {
    timeout: Duration,
}

impl TcpDialer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl PeerDialer for TcpDialer {
    async fn deliver(&self, addr: &str, message: RequiredFileMessage) -> Result<(), PeerError> {
        rmake_wire::send_once(addr, &message.into(), self.timeout)
            .await
            .map_err(|source| PeerError::Unreachable { addr: addr.to_string(), source })
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{PeerDialer, PeerError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rmake_wire::{ProtocolError, RequiredFileMessage};
    use std::collections::HashSet;
    use std::sync::Arc;

    /// Recorded delivery
    #[derive(Debug, Clone)]
    pub struct Delivery {
        pub addr: String,
        pub message: RequiredFileMessage,
    }

    #[derive(Default)]
    struct FakeDialerState {
        deliveries: Vec<Delivery>,
        unreachable: HashSet<String>,
    }

    /// Fake dialer that records deliveries instead of sending them
    #[derive(Clone, Default)]
    pub struct FakeDialer {
        inner: Arc<Mutex<FakeDialerState>>,
    }

    impl FakeDialer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make deliveries to `addr` fail.
        pub fn set_unreachable(&self, addr: &str) {
            self.inner.lock().unreachable.insert(addr.to_string());
        }

        /// Get all recorded deliveries
        pub fn deliveries(&self) -> Vec<Delivery> {
            self.inner.lock().deliveries.clone()
        }
    }

    #[async_trait]
    impl PeerDialer for FakeDialer {
        async fn deliver(&self, addr: &str, message: RequiredFileMessage) -> Result<(), PeerError> {
            let mut inner = self.inner.lock();
            if inner.unreachable.contains(addr) {
                return Err(PeerError::Unreachable {
                    addr: addr.to_string(),
                    source: ProtocolError::ConnectionClosed,
                });
            }
            inner.deliveries.push(Delivery { addr: addr.to_string(), message });
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{Delivery, FakeDialer};
