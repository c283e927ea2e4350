// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed JSON framing.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::Message;

/// Largest frame accepted from a peer (256 MiB).
pub const MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

/// Errors from reading or writing framed messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,

    #[error("Frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Unexpected message: expected {expected}, got {got}")]
    Unexpected { expected: &'static str, got: &'static str },
}

/// Serialize a message to JSON (no length prefix).
pub fn encode(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(message)?)
}

/// Deserialize a message from JSON (no length prefix).
pub fn decode(bytes: &[u8]) -> Result<Message, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read one length-prefixed frame.
///
/// EOF before the first byte of the prefix is a clean close.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge { len, max: MAX_FRAME_LEN });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Write one length-prefixed frame and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge { len: data.len(), max: MAX_FRAME_LEN });
    }
    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read and decode one message.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message, ProtocolError> {
    let bytes = read_frame(reader).await?;
    decode(&bytes)
}

/// Read one message, failing with [`ProtocolError::Timeout`] after `timeout`.
pub async fn read_message_timeout<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Message, ProtocolError> {
    tokio::time::timeout(timeout, read_message(reader)).await.map_err(|_| ProtocolError::Timeout)?
}

/// Encode and write one message.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<(), ProtocolError> {
    let bytes = encode(message)?;
    write_frame(writer, &bytes).await
}

/// Open a connection to `addr`, send a single message and close.
///
/// Used for builder-to-builder artifact delivery, where every transfer
/// gets its own connection.
pub async fn send_once(addr: &str, message: &Message, timeout: Duration) -> Result<(), ProtocolError> {
    let send = async {
        let mut stream = TcpStream::connect(addr).await?;
        write_message(&mut stream, message).await?;
        stream.shutdown().await?;
        Ok::<(), ProtocolError>(())
    };
    tokio::time::timeout(timeout, send).await.map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
