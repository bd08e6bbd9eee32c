// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed JSON framing.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame; protects against corrupt prefixes.
const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    ConnectionClosed,
    #[error("request timed out")]
    Timeout,
    #[error("frame of {0} bytes exceeds limit")]
    FrameTooLarge(u32),
    #[error("encode/decode error: {0}")]
    Json(String),
    #[error("io error: {0}")]
    Io(String),
}

/// Write one message: 4-byte big-endian length, then the JSON payload.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message).map_err(|e| ProtocolError::Json(e.to_string()))?;
    let len = payload.len() as u32;
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| ProtocolError::Io(e.to_string()))?;
    writer.write_all(&payload).await.map_err(|e| ProtocolError::Io(e.to_string()))?;
    writer.flush().await.map_err(|e| ProtocolError::Io(e.to_string()))?;
    Ok(())
}

/// Read one message. A clean EOF before the prefix is `ConnectionClosed`.
pub async fn read_message<R, T>(reader: &mut R) -> Result<T, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(ProtocolError::Io(e.to_string())),
    }
    let len = u32::from_be_bytes(prefix);
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| ProtocolError::Io(e.to_string()))?;
    serde_json::from_slice(&payload).map_err(|e| ProtocolError::Json(e.to_string()))
}
