// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builder identities, live builder connections and client sessions.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rmake_core::{BuilderId, Clock, File, SessionToken};
use rmake_wire::{BuildStatus, FinalBuildResult, JobFinishedMessage, Message};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::connection::BuilderConnection;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown session {0}")]
    UnknownSession(SessionToken),
    #[error("client for session {0} has gone away")]
    ClientGone(SessionToken),
}

// ── Builder identities ──────────────────────────────────────────────────

#[derive(Debug, Default)]
struct UuidState {
    free: VecDeque<BuilderId>,
    next: u32,
}

/// Allocator for builder ids. Released ids are reused oldest first.
#[derive(Debug, Default)]
pub struct UuidPool {
    state: Mutex<UuidState>,
}

impl UuidPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> BuilderId {
        let mut state = self.state.lock();
        if let Some(id) = state.free.pop_front() {
            return id;
        }
        let id = BuilderId(state.next);
        state.next += 1;
        id
    }

    pub fn release(&self, id: BuilderId) {
        let mut state = self.state.lock();
        if id.0 >= state.next || state.free.contains(&id) {
            warn!(builder = %id, "release of an id that is not allocated");
            return;
        }
        state.free.push_back(id);
    }

    /// Number of ids currently handed out.
    pub fn in_use(&self) -> usize {
        let state = self.state.lock();
        state.next as usize - state.free.len()
    }
}

// ── Live builders ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct BuilderRegistry {
    builders: Mutex<HashMap<BuilderId, Arc<BuilderConnection>>>,
}

impl BuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bc: Arc<BuilderConnection>) {
        self.builders.lock().insert(bc.uuid, bc);
    }

    pub fn remove(&self, id: BuilderId) -> Option<Arc<BuilderConnection>> {
        self.builders.lock().remove(&id)
    }

    pub fn get(&self, id: BuilderId) -> Option<Arc<BuilderConnection>> {
        self.builders.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.builders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.lock().is_empty()
    }
}

// ── Client sessions ─────────────────────────────────────────────────────

struct Session {
    reply: mpsc::UnboundedSender<Message>,
    total_jobs: usize,
    finished: usize,
    first_error: Option<String>,
    stdout: String,
    artifacts: Vec<File>,
    started: Instant,
}

/// Open client sessions keyed by token.
///
/// Each session owns the sending half of its client's reply channel and the
/// bookkeeping needed to build the final result.
pub struct SessionRegistry<C: Clock> {
    sessions: Mutex<HashMap<SessionToken, Session>>,
    clock: C,
}

impl<C: Clock> SessionRegistry<C> {
    pub fn new(clock: C) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), clock }
    }

    /// Register a session expecting `total_jobs` job reports.
    pub fn new_session(&self, total_jobs: usize) -> (SessionToken, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sessions = self.sessions.lock();
        let mut token = SessionToken::generate();
        while sessions.contains_key(&token) {
            token = SessionToken::generate();
        }
        sessions.insert(
            token.clone(),
            Session {
                reply: tx,
                total_jobs,
                finished: 0,
                first_error: None,
                stdout: String::new(),
                artifacts: Vec::new(),
                started: self.clock.now(),
            },
        );
        (token, rx)
    }

    pub fn contains(&self, token: &SessionToken) -> bool {
        self.sessions.lock().contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    pub fn send_to_client(
        &self,
        token: &SessionToken,
        message: impl Into<Message>,
    ) -> Result<(), RegistryError> {
        let sessions = self.sessions.lock();
        let session =
            sessions.get(token).ok_or_else(|| RegistryError::UnknownSession(token.clone()))?;
        session.reply.send(message.into()).map_err(|_| RegistryError::ClientGone(token.clone()))
    }

    /// Drop a session. Returns `false` if it was already gone.
    pub fn release_session(&self, token: &SessionToken) -> bool {
        self.sessions.lock().remove(token).is_some()
    }

    /// Account for one finished job and produce the progress update for the
    /// client.
    pub fn job_finished(
        &self,
        token: &SessionToken,
        msg: &JobFinishedMessage,
    ) -> Result<BuildStatus, RegistryError> {
        let mut sessions = self.sessions.lock();
        let session =
            sessions.get_mut(token).ok_or_else(|| RegistryError::UnknownSession(token.clone()))?;
        session.finished += 1;
        session.stdout.push_str(&msg.stdout);
        if !msg.success && session.first_error.is_none() {
            let error = if msg.error.is_empty() { "job failed".to_string() } else { msg.error.clone() };
            session.first_error = Some(error);
        }

        let percent_complete = if session.total_jobs == 0 {
            100.0
        } else {
            (100.0 * session.finished as f32 / session.total_jobs as f32).min(100.0)
        };
        let message = match &session.first_error {
            Some(error) => format!(
                "{}/{} jobs finished, failure: {}",
                session.finished, session.total_jobs, error
            ),
            None => format!("{}/{} jobs finished", session.finished, session.total_jobs),
        };
        Ok(BuildStatus { message, percent_complete, session: token.clone() })
    }

    /// Keep an artifact a builder sent straight to the manager.
    pub fn attach_artifact(&self, token: &SessionToken, file: File) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock();
        let session =
            sessions.get_mut(token).ok_or_else(|| RegistryError::UnknownSession(token.clone()))?;
        session.artifacts.push(file);
        Ok(())
    }

    /// Close a session with the terminal artifacts, sending the final result
    /// to the client.
    pub fn complete(
        &self,
        token: &SessionToken,
        results: Vec<File>,
    ) -> Result<FinalBuildResult, RegistryError> {
        let session = self
            .sessions
            .lock()
            .remove(token)
            .ok_or_else(|| RegistryError::UnknownSession(token.clone()))?;

        let mut files = session.artifacts;
        files.extend(results);
        let (success, error) = match session.first_error {
            Some(error) => (false, error),
            None if files.is_empty() => (false, "no output produced".to_string()),
            None => (true, String::new()),
        };
        let result = FinalBuildResult {
            session: token.clone(),
            success,
            error,
            stdout: session.stdout,
            results: files,
            build_time: self.clock.since(session.started),
        };
        debug!(session = %token.short(8), success, "build complete");
        session
            .reply
            .send(result.clone().into())
            .map_err(|_| RegistryError::ClientGone(token.clone()))?;
        Ok(result)
    }

    /// Close a session with an error.
    pub fn fail(&self, token: &SessionToken, error: impl Into<String>) -> Result<(), RegistryError> {
        let session = self
            .sessions
            .lock()
            .remove(token)
            .ok_or_else(|| RegistryError::UnknownSession(token.clone()))?;
        let mut result = FinalBuildResult::failure(token.clone(), error);
        result.build_time = self.clock.since(session.started);
        result.stdout = session.stdout;
        session.reply.send(result.into()).map_err(|_| RegistryError::ClientGone(token.clone()))
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
