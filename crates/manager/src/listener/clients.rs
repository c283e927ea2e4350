// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client build sessions.

use rmake_core::Clock;
use rmake_wire::{ManagerRequest, Message};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::{detect_disconnect, ConnectionError, ManagerCtx};
use crate::dispatch::dispatch;

/// Dispatch a client's build and stream its session back until the final
/// result has been written or the client goes away.
pub(super) async fn serve<R, W, C>(
    request: ManagerRequest,
    mut reader: R,
    mut writer: W,
    ctx: &ManagerCtx<C>,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    C: Clock,
{
    let (token, mut replies) = ctx.sessions.new_session(request.jobs.len());
    info!(
        session = %token.short(8),
        jobs = request.jobs.len(),
        files = request.files.len(),
        output = %request.output,
        arch = %request.arch,
        os = %request.os,
        "build requested",
    );

    if let Err(e) = dispatch(&request, &token, &ctx.queue) {
        warn!(session = %token.short(8), error = %e, "dispatch failed");
        if let Err(e) = ctx.sessions.fail(&token, e.to_string()) {
            debug!(error = %e, "could not report dispatch failure");
        }
    }

    let result: Result<(), ConnectionError> = async {
        loop {
            tokio::select! {
                reply = replies.recv() => {
                    let Some(msg) = reply else {
                        return Ok(());
                    };
                    let done = matches!(msg, Message::FinalBuildResult(_));
                    rmake_wire::write_message(&mut writer, &msg).await?;
                    if done {
                        return Ok(());
                    }
                }
                _ = detect_disconnect(&mut reader) => {
                    debug!(session = %token.short(8), "client disconnected");
                    return Ok(());
                }
            }
        }
    }
    .await;

    ctx.sessions.release_session(&token);
    result
}
