// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job execution engine.
//!
//! Workers pull requests off the [`RequestQueue`] and carry each one through
//! its phases: inputs are written to the session directory, missing
//! dependencies are awaited, the command runs, the manager is told how it
//! went and the output is forwarded wherever the request says.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rmake_core::{BuilderRequest, File, ResultAddress, SessionToken};
use rmake_wire::{BuilderResult, JobFinishedMessage, Message, RequiredFileMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::blob::FsBlobStore;
use crate::executor::Executor;
use crate::peer::PeerDialer;
use crate::request_queue::RequestQueue;
use crate::wait_registry::FileSync;

/// Where a job is in its life on this builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Queued,
    MaterializingInputs,
    WaitingOnDeps,
    Executing,
    Reporting,
    Forwarding,
    Done,
}

rmake_core::simple_display! {
    JobPhase {
        Queued => "queued",
        MaterializingInputs => "materializing",
        WaitingOnDeps => "waiting",
        Executing => "executing",
        Reporting => "reporting",
        Forwarding => "forwarding",
        Done => "done",
    }
}

/// Per-job phase tracker that logs every transition.
struct JobTrace<'a> {
    session: &'a SessionToken,
    output: &'a str,
    phase: JobPhase,
}

impl<'a> JobTrace<'a> {
    fn new(req: &'a BuilderRequest) -> Self {
        Self { session: &req.session, output: &req.build_job.output, phase: JobPhase::Queued }
    }

    fn enter(&mut self, phase: JobPhase) {
        debug!(session = %self.session.short(8), output = self.output, from = %self.phase, to = %phase, "job phase");
        self.phase = phase;
    }
}

/// Everything a worker needs to run jobs.
pub struct Engine<E: Executor, D: PeerDialer> {
    blobs: FsBlobStore,
    executor: E,
    dialer: D,
    files: FileSync,
    outbox: mpsc::UnboundedSender<Message>,
    env: Vec<(String, String)>,
    running: AtomicUsize,
}

impl<E: Executor, D: PeerDialer> Engine<E, D> {
    /// `outbox` carries messages for the manager; it outlives any single
    /// manager connection.
    pub fn new(
        blobs: FsBlobStore,
        executor: E,
        dialer: D,
        files: FileSync,
        outbox: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self { blobs, executor, dialer, files, outbox, env: Vec::new(), running: AtomicUsize::new(0) }
    }

    /// Extra environment for every command.
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    /// Jobs currently holding a worker.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::Relaxed)
    }

    pub fn files(&self) -> &FileSync {
        &self.files
    }

    pub fn blobs(&self) -> &FsBlobStore {
        &self.blobs
    }

    /// Start `procs` workers draining `queue`.
    pub fn spawn_workers(self: &Arc<Self>, queue: Arc<RequestQueue>, procs: usize) -> Vec<JoinHandle<()>> {
        (0..procs)
            .map(|worker| {
                let engine = Arc::clone(self);
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    loop {
                        let req = queue.pop().await;
                        engine.running.fetch_add(1, Ordering::Relaxed);
                        debug!(worker, output = %req.build_job.output, "worker picked up job");
                        engine.run_job(req).await;
                        engine.running.fetch_sub(1, Ordering::Relaxed);
                    }
                })
            })
            .collect()
    }

    /// Run one request to completion. Returns the report sent to the manager.
    pub async fn run_job(&self, req: BuilderRequest) -> JobFinishedMessage {
        let mut trace = JobTrace::new(&req);
        let session = &req.session;
        let job = &req.build_job;
        info!(session = %session.short(8), output = %job.output, command = %job.command_line(), "starting job");

        trace.enter(JobPhase::MaterializingInputs);
        let mut setup_error = None;
        let dir = match self.blobs.prepare(session).await {
            Ok(dir) => dir,
            Err(e) => {
                setup_error = Some(e.to_string());
                self.blobs.session_dir(session)
            }
        };
        for file in &req.input {
            if let Err(e) = self.blobs.save(session, file).await {
                warn!(session = %session.short(8), path = %file.path, error = %e, "failed to save input");
                setup_error.get_or_insert_with(|| e.to_string());
            }
        }

        trace.enter(JobPhase::WaitingOnDeps);
        if let Err(e) = self.await_deps(&req).await {
            setup_error.get_or_insert(e);
        }

        trace.enter(JobPhase::Executing);
        let report = match setup_error {
            Some(error) => JobFinishedMessage {
                stdout: String::new(),
                error,
                success: false,
                session: session.clone(),
            },
            None => self.execute(&req, dir).await,
        };

        trace.enter(JobPhase::Reporting);
        if report.success {
            info!(session = %session.short(8), output = %job.output, "job succeeded");
        } else {
            warn!(session = %session.short(8), output = %job.output, error = %report.error, "job failed");
        }
        self.send_to_manager(report.clone());

        trace.enter(JobPhase::Forwarding);
        self.forward(&req).await;

        trace.enter(JobPhase::Done);
        report
    }

    /// Register every dependency with the wait registry, then save each one
    /// as it arrives.
    async fn await_deps(&self, req: &BuilderRequest) -> Result<(), String> {
        let session = &req.session;
        let mut pending = Vec::with_capacity(req.wait.len());
        for path in &req.wait {
            info!(session = %session.short(8), %path, "waiting for dependency");
            pending.push((path, self.files.wait_for(session, path)));
        }

        for (path, reply) in pending {
            let file =
                reply.await.map_err(|_| format!("stopped waiting for '{path}': builder shutting down"))?;
            debug!(session = %session.short(8), %path, bytes = file.len(), "dependency arrived");
            self.blobs.save(session, &file).await.map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    async fn execute(&self, req: &BuilderRequest, dir: PathBuf) -> JobFinishedMessage {
        let job = &req.build_job;
        let (stdout, error, success) =
            match self.executor.run(&job.command, &job.args, &dir, &self.env).await {
                Ok(out) => {
                    let (error, success) = (out.error(), out.success());
                    (out.output, error, success)
                }
                Err(e) => (String::new(), e.to_string(), false),
            };
        JobFinishedMessage { stdout, error, success, session: req.session.clone() }
    }

    async fn load_output(&self, req: &BuilderRequest) -> Option<File> {
        match self.blobs.load(&req.session, &req.build_job.output).await {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(session = %req.session.short(8), output = %req.build_job.output, error = %e, "failed to load output");
                None
            }
        }
    }

    async fn forward(&self, req: &BuilderRequest) {
        let session = &req.session;
        match &req.result_address {
            ResultAddress::None => {
                info!(session = %session.short(8), output = %req.build_job.output, "output stays local");
            }
            ResultAddress::Manager => {
                let results = self.load_output(req).await.into_iter().collect();
                self.send_to_manager(BuilderResult { results, session: session.clone() });
            }
            ResultAddress::Peer(addr) => {
                let payload = self.load_output(req).await;
                let message = RequiredFileMessage { payload, session: session.clone() };
                match self.dialer.deliver(addr, message).await {
                    Ok(()) => debug!(session = %session.short(8), %addr, "output forwarded"),
                    Err(e) => warn!(session = %session.short(8), error = %e, "forwarding failed"),
                }
            }
        }
    }

    fn send_to_manager(&self, message: impl Into<Message>) {
        if self.outbox.send(message.into()).is_err() {
            warn!("manager outbox closed, dropping message");
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
