// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent builder connections.

use std::sync::Arc;

use rmake_core::Clock;
use rmake_wire::{BuilderAnnouncement, Message};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{ConnectionError, ManagerCtx};
use crate::connection::{run_writer, BuilderConnection};
use crate::handshake::Handshake;

/// Run a builder connection from handshake to disconnect.
pub(super) async fn serve<R, W, C>(
    ann: BuilderAnnouncement,
    mut reader: R,
    mut writer: W,
    ctx: &ManagerCtx<C>,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    C: Clock,
{
    let mut handshake = Handshake::new();
    let ack = handshake.on_announcement(&ann, &ctx.uuids);
    let Some(uuid) = ack.uuid.filter(|_| ack.success) else {
        rmake_wire::write_message(&mut writer, &ack.into()).await?;
        return Ok(());
    };

    // The acknowledgement is queued ahead of any dispatched work, so the
    // builder sees it first even if a request lands right after the push.
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(ack.into());
    let bc = Arc::new(BuilderConnection::new(uuid, ann.hostname, ann.listener_addr, tx));
    ctx.builders.insert(Arc::clone(&bc));
    ctx.queue.push(Arc::clone(&bc));
    let writer_task = tokio::spawn(run_writer(uuid, writer, rx));

    let result = loop {
        let msg = match rmake_wire::read_message(&mut reader).await {
            Ok(msg) => msg,
            Err(e) => break Err(e.into()),
        };
        if let Err(e) = handle_builder_message(msg, &bc, ctx) {
            break Err(e);
        }
    };

    ctx.queue.remove_connection(&bc);
    ctx.builders.remove(uuid);
    handshake.on_disconnect(&ctx.uuids);
    writer_task.abort();
    info!(builder = %uuid, builders = ctx.builders.len(), "builder disconnected");
    result
}

/// Apply one message from a registered builder.
fn handle_builder_message<C: Clock>(
    msg: Message,
    bc: &Arc<BuilderConnection>,
    ctx: &ManagerCtx<C>,
) -> Result<(), ConnectionError> {
    match msg {
        Message::BuilderStatusUpdate(update) => {
            debug!(
                builder = %bc.uuid,
                queued = update.queued_jobs,
                running = update.running_jobs,
                cpu = update.cpu_load,
                mem = update.mem_use,
                "status update",
            );
            ctx.queue.set_load(bc, update.load());
            Ok(())
        }
        msg @ Message::JobFinishedMessage(_) => {
            ctx.queue.release(bc);
            handle_session_message(msg, ctx);
            Ok(())
        }
        msg @ (Message::BuilderResult(_) | Message::RequiredFileMessage(_)) => {
            handle_session_message(msg, ctx);
            Ok(())
        }
        other => Err(ConnectionError::Unexpected(other.kind())),
    }
}

/// Fold a session scoped builder message into its session.
///
/// Messages for sessions that are already closed are dropped.
pub(super) fn handle_session_message<C: Clock>(msg: Message, ctx: &ManagerCtx<C>) {
    match msg {
        Message::JobFinishedMessage(finished) => {
            let token = &finished.session;
            if !finished.success {
                warn!(session = %token.short(8), error = %finished.error, "job failed");
            }
            let sent = ctx
                .sessions
                .job_finished(token, &finished)
                .and_then(|status| ctx.sessions.send_to_client(token, status));
            if let Err(e) = sent {
                debug!(error = %e, "dropping job report");
                return;
            }
            // A failed job starves everything downstream of it: end the
            // build now instead of waiting for a result that never comes.
            if !finished.success {
                if let Err(e) = ctx.sessions.complete(token, Vec::new()) {
                    debug!(error = %e, "failed build already closed");
                }
            }
        }
        Message::BuilderResult(result) => {
            match ctx.sessions.complete(&result.session, result.results) {
                Ok(done) => info!(
                    session = %done.session.short(8),
                    success = done.success,
                    files = done.results.len(),
                    elapsed_ms = done.build_time.as_millis() as u64,
                    "build finished",
                ),
                Err(e) => debug!(error = %e, "dropping build result"),
            }
        }
        Message::RequiredFileMessage(file) => match file.payload {
            Some(payload) => {
                if let Err(e) = ctx.sessions.attach_artifact(&file.session, payload) {
                    debug!(error = %e, "dropping artifact");
                }
            }
            None => warn!(session = %file.session.short(8), "artifact delivery without payload"),
        },
        other => debug!(kind = other.kind(), "not a session message"),
    }
}
