// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File wait registry.
//!
//! Jobs register for the artifacts they still need; deliveries from peer
//! builders are matched against those registrations. Either side may come
//! first: an artifact nobody is waiting for yet is buffered until a job asks.

use std::collections::HashMap;

use rmake_core::{File, SessionToken};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

type Key = (SessionToken, String);

/// What happened to an arriving artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// Handed to this many waiting jobs
    Delivered(usize),
    /// Kept until a job asks for it
    Buffered,
    /// Already buffered; the new copy was discarded
    Duplicate,
    /// The sender had no artifact to deliver
    Empty,
}

/// The registry state. Owned by a single [`FileSync`] task.
#[derive(Debug, Default)]
pub struct WaitRegistry {
    waiters: HashMap<Key, Vec<oneshot::Sender<File>>>,
    buffered: HashMap<Key, File>,
}

impl WaitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `reply` for `(session, path)`, answering at once if the
    /// artifact is already buffered.
    pub fn wait(&mut self, session: SessionToken, path: String, reply: oneshot::Sender<File>) {
        let key = (session, path);
        if let Some(file) = self.buffered.remove(&key) {
            match reply.send(file) {
                Ok(()) => debug!(session = %key.0.short(8), path = %key.1, "served buffered artifact"),
                // The waiter gave up; keep the artifact for the next one.
                Err(file) => {
                    self.buffered.insert(key, file);
                }
            }
            return;
        }
        self.waiters.entry(key).or_default().push(reply);
    }

    pub fn arrive(&mut self, session: SessionToken, payload: Option<File>) -> Arrival {
        let Some(file) = payload else {
            return Arrival::Empty;
        };
        let key = (session, file.path.clone());

        let mut delivered = 0;
        for reply in self.waiters.remove(&key).unwrap_or_default() {
            if reply.send(file.clone()).is_ok() {
                delivered += 1;
            }
        }
        if delivered > 0 {
            return Arrival::Delivered(delivered);
        }

        if self.buffered.contains_key(&key) {
            return Arrival::Duplicate;
        }
        self.buffered.insert(key, file);
        Arrival::Buffered
    }

    /// Keys with at least one registered waiter.
    pub fn pending(&self) -> usize {
        self.waiters.len()
    }

    pub fn buffered(&self) -> usize {
        self.buffered.len()
    }
}

enum Command {
    Wait { session: SessionToken, path: String, reply: oneshot::Sender<File> },
    Arrive { session: SessionToken, payload: Option<File> },
}

/// Handle to the task that owns the [`WaitRegistry`].
///
/// Waits and arrivals are applied in the order they reach the task, which
/// is what makes the wait/arrive race safe.
#[derive(Debug, Clone)]
pub struct FileSync {
    commands: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Wait { path, .. } => write!(f, "Wait({path})"),
            Command::Arrive { payload, .. } => {
                write!(f, "Arrive({:?})", payload.as_ref().map(|p| p.path.as_str()))
            }
        }
    }
}

impl FileSync {
    /// Start the registry task. It stops once every handle is dropped.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut registry = WaitRegistry::new();
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    Command::Wait { session, path, reply } => registry.wait(session, path, reply),
                    Command::Arrive { session, payload } => {
                        let path = payload.as_ref().map(|p| p.path.clone()).unwrap_or_default();
                        match registry.arrive(session.clone(), payload) {
                            Arrival::Delivered(n) => {
                                info!(session = %session.short(8), %path, waiters = n, "artifact delivered")
                            }
                            Arrival::Buffered => {
                                debug!(session = %session.short(8), %path, "artifact buffered")
                            }
                            Arrival::Duplicate => {
                                warn!(session = %session.short(8), %path, "duplicate artifact discarded")
                            }
                            Arrival::Empty => {
                                warn!(session = %session.short(8), "artifact delivery without payload")
                            }
                        }
                    }
                }
            }
        });
        Self { commands: tx }
    }

    /// Ask for an artifact. The receiver resolves when it arrives.
    pub fn wait_for(&self, session: &SessionToken, path: &str) -> oneshot::Receiver<File> {
        let (reply, rx) = oneshot::channel();
        let _ = self.commands.send(Command::Wait {
            session: session.clone(),
            path: path.to_string(),
            reply,
        });
        rx
    }

    /// Hand over an artifact received from a peer.
    pub fn deliver(&self, session: SessionToken, payload: Option<File>) {
        let _ = self.commands.send(Command::Arrive { session, payload });
    }
}

#[cfg(test)]
#[path = "wait_registry_tests.rs"]
mod tests;
