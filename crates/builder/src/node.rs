// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A running builder: manager session, peer listener, workers and status
//! publisher.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rmake_core::BuilderId;
use rmake_wire::{BuilderAnnouncement, BuilderStatusUpdate, Message, ProtocolError};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::blob::FsBlobStore;
use crate::engine::Engine;
use crate::executor::{Executor, ProcessExecutor};
use crate::handshake::{Handshake, HandshakeError};
use crate::peer::{PeerDialer, TcpDialer};
use crate::request_queue::RequestQueue;
use crate::stats::{LoadSampler, ProcStatSampler};
use crate::wait_registry::FileSync;
use crate::{env, BuilderError, Config};

/// A bound builder, ready to register with its manager.
pub struct BuilderNode<E: Executor, D: PeerDialer, S: LoadSampler> {
    config: Config,
    listener: TcpListener,
    advertise: String,
    hostname: String,
    engine: Arc<Engine<E, D>>,
    queue: Arc<RequestQueue>,
    sampler: S,
    outbox: mpsc::UnboundedReceiver<Message>,
}

impl BuilderNode<ProcessExecutor, TcpDialer, ProcStatSampler> {
    pub async fn bind(config: Config) -> Result<Self, BuilderError> {
        let dialer = TcpDialer::new(config.ipc_timeout);
        Self::bind_with(config, ProcessExecutor, dialer, ProcStatSampler::new()).await
    }
}

/// Announced address for a listener bound to `local`.
fn advertised(local: SocketAddr, hostname: &str) -> String {
    if local.ip().is_unspecified() {
        format!("{hostname}:{}", local.port())
    } else {
        local.to_string()
    }
}

impl<E: Executor, D: PeerDialer, S: LoadSampler> BuilderNode<E, D, S> {
    pub async fn bind_with(
        config: Config,
        executor: E,
        dialer: D,
        sampler: S,
    ) -> Result<Self, BuilderError> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .map_err(|source| BuilderError::Bind { addr: config.listen_addr.clone(), source })?;
        let hostname = env::hostname();
        let advertise = match &config.advertise_addr {
            Some(addr) => addr.clone(),
            None => advertised(listener.local_addr()?, &hostname),
        };

        let (tx, outbox) = mpsc::unbounded_channel();
        let engine = Engine::new(
            FsBlobStore::new(&config.build_root),
            executor,
            dialer,
            FileSync::spawn(),
            tx,
        )
        .with_env(config.env.clone());
        let queue = Arc::new(RequestQueue::new(config.queue_capacity));

        Ok(Self { config, listener, advertise, hostname, engine: Arc::new(engine), queue, sampler, outbox })
    }

    /// Address peers and the manager use to reach this builder.
    pub fn listener_addr(&self) -> &str {
        &self.advertise
    }

    pub fn engine(&self) -> Arc<Engine<E, D>> {
        Arc::clone(&self.engine)
    }

    pub fn queue(&self) -> Arc<RequestQueue> {
        Arc::clone(&self.queue)
    }

    /// Register with the manager and serve until the manager is gone for
    /// good.
    ///
    /// Failing to reach the manager the first time is an error; later
    /// disconnects are retried per the reconnect policy.
    pub async fn run(self) -> Result<(), BuilderError> {
        let Self { config, listener, advertise, hostname, engine, queue, sampler, mut outbox } =
            self;
        let inbox = Inbox { engine: Arc::clone(&engine), queue: Arc::clone(&queue) };
        let status = StatusSource { engine: Arc::clone(&engine), queue: Arc::clone(&queue), sampler };
        let ann = BuilderAnnouncement::new(hostname, advertise);

        let peers = tokio::spawn(serve_peers(listener, inbox.clone(), config.ipc_timeout));
        let workers = engine.spawn_workers(Arc::clone(&queue), config.procs);
        info!(procs = config.procs, listener = %ann.listener_addr, manager = %config.manager_addr, "builder starting");

        let mut backlog = VecDeque::new();
        let result = match connect(&config, &ann).await {
            Ok(mut stream) => loop {
                serve_manager(stream, &inbox, &status, &mut outbox, &mut backlog, config.status_interval)
                    .await;
                match reconnect(&config, &ann).await {
                    Ok(next) => stream = next,
                    Err(e) => break Err(e),
                }
            },
            Err(e) => Err(e),
        };

        peers.abort();
        for worker in workers {
            worker.abort();
        }
        result
    }
}

async fn connect(config: &Config, ann: &BuilderAnnouncement) -> Result<TcpStream, BuilderError> {
    let addr = &config.manager_addr;
    let mut stream = tokio::time::timeout(config.ipc_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| BuilderError::Connect {
            addr: addr.clone(),
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
        })?
        .map_err(|source| BuilderError::Connect { addr: addr.clone(), source })?;
    let id: BuilderId = Handshake::new().run(&mut stream, ann, config.ipc_timeout).await?;
    info!(builder = %id, manager = %addr, "registered with manager");
    Ok(stream)
}

async fn reconnect(config: &Config, ann: &BuilderAnnouncement) -> Result<TcpStream, BuilderError> {
    let attempts = config.reconnect_attempts;
    for attempt in 1..=attempts {
        warn!(attempt, attempts, delay_ms = config.reconnect_delay.as_millis() as u64, "manager connection lost, reconnecting");
        tokio::time::sleep(config.reconnect_delay).await;
        match connect(config, ann).await {
            Ok(stream) => return Ok(stream),
            Err(e @ BuilderError::Handshake(HandshakeError::Rejected(_))) => return Err(e),
            Err(e) => warn!(attempt, error = %e, "reconnect failed"),
        }
    }
    error!(attempts, "giving up on the manager");
    Err(BuilderError::ManagerLost { attempts })
}

/// Pump one manager connection until it drops.
///
/// Messages that could not be written stay in `backlog` and go out first on
/// the next connection.
async fn serve_manager<E, D, S>(
    stream: TcpStream,
    inbox: &Inbox<E, D>,
    status: &StatusSource<E, D, S>,
    outbox: &mut mpsc::UnboundedReceiver<Message>,
    backlog: &mut VecDeque<Message>,
    status_interval: Duration,
) where
    E: Executor,
    D: PeerDialer,
    S: LoadSampler,
{
    let (mut reader, mut writer) = stream.into_split();
    let (in_tx, mut inbound) = mpsc::unbounded_channel();
    let reader_task = tokio::spawn(async move {
        loop {
            match rmake_wire::read_message(&mut reader).await {
                Ok(msg) => {
                    if in_tx.send(msg).is_err() {
                        return;
                    }
                }
                Err(ProtocolError::ConnectionClosed) => {
                    debug!("manager closed the connection");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read from manager");
                    return;
                }
            }
        }
    });

    while let Some(msg) = backlog.pop_front() {
        if let Err(e) = rmake_wire::write_message(&mut writer, &msg).await {
            warn!(error = %e, "failed to flush backlog to manager");
            backlog.push_front(msg);
            reader_task.abort();
            return;
        }
    }

    let mut ticker = interval_at(Instant::now() + status_interval, status_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            msg = outbox.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                if let Err(e) = rmake_wire::write_message(&mut writer, &msg).await {
                    warn!(kind = msg.kind(), error = %e, "failed to write to manager");
                    backlog.push_back(msg);
                    break;
                }
            }
            msg = inbound.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                inbox.handle(msg, "manager").await;
            }
            _ = ticker.tick() => {
                let update = status.sample();
                debug!(queued = update.queued_jobs, running = update.running_jobs, cpu = update.cpu_load, "sending status update");
                if let Err(e) = rmake_wire::write_message(&mut writer, &update.into()).await {
                    warn!(error = %e, "failed to send status update");
                    break;
                }
            }
        }
    }
    reader_task.abort();
}

/// Accept peer connections; each carries exactly one message.
async fn serve_peers<E: Executor, D: PeerDialer>(
    listener: TcpListener,
    inbox: Inbox<E, D>,
    timeout: Duration,
) {
    loop {
        match listener.accept().await {
            Ok((mut stream, addr)) => {
                let inbox = inbox.clone();
                tokio::spawn(async move {
                    match rmake_wire::read_message_timeout(&mut stream, timeout).await {
                        Ok(msg) => inbox.handle(msg, "peer").await,
                        Err(ProtocolError::ConnectionClosed) => debug!(%addr, "peer closed without sending"),
                        Err(e) => warn!(%addr, error = %e, "bad peer message"),
                    }
                });
            }
            Err(e) => error!("peer accept error: {}", e),
        }
    }
}

/// Routes inbound messages, whichever connection they came from.
struct Inbox<E: Executor, D: PeerDialer> {
    engine: Arc<Engine<E, D>>,
    queue: Arc<RequestQueue>,
}

impl<E: Executor, D: PeerDialer> Clone for Inbox<E, D> {
    fn clone(&self) -> Self {
        Self { engine: Arc::clone(&self.engine), queue: Arc::clone(&self.queue) }
    }
}

impl<E: Executor, D: PeerDialer> Inbox<E, D> {
    async fn handle(&self, msg: Message, from: &'static str) {
        match msg {
            Message::BuilderRequest(req) => {
                debug!(from, session = %req.session.short(8), output = %req.build_job.output, waits = req.wait.len(), "job queued");
                self.queue.push(req).await;
            }
            Message::RequiredFileMessage(file) => {
                self.engine.files().deliver(file.session, file.payload);
            }
            Message::BuilderResult(result) => {
                for file in &result.results {
                    if let Err(e) = self.engine.blobs().save(&result.session, file).await {
                        warn!(from, path = %file.path, error = %e, "failed to save result");
                    }
                }
            }
            other => warn!(from, kind = other.kind(), "unexpected message"),
        }
    }
}

struct StatusSource<E: Executor, D: PeerDialer, S: LoadSampler> {
    engine: Arc<Engine<E, D>>,
    queue: Arc<RequestQueue>,
    sampler: S,
}

impl<E: Executor, D: PeerDialer, S: LoadSampler> StatusSource<E, D, S> {
    fn sample(&self) -> BuilderStatusUpdate {
        let load = self.sampler.sample();
        BuilderStatusUpdate {
            queued_jobs: self.queue.len(),
            running_jobs: self.engine.running(),
            cpu_load: load.cpu_load,
            mem_use: load.mem_use,
        }
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
