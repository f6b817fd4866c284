// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed framing and messages for the supervisor↔worker pipe.

use crate::WireError;
use atlas_core::RequestId;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single pipe frame. Control messages are tiny; anything
/// larger indicates a desynchronised stream.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Control-pipe message between the pool supervisor and one worker.
///
/// Per task: the worker announces `open_task`, the supervisor answers `ok`
/// (proceed) or `close_task` (abort before starting); while running the
/// worker polls for `close_task`; on any end the worker sends `task_closed`
/// and the supervisor answers `ok`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipeMsg {
    Ok,
    OpenTask { request_id: RequestId },
    CloseTask { username: String },
    TaskClosed { request_id: RequestId },
}

impl PipeMsg {
    pub fn encode(&self) -> Vec<u8> {
        // Serialization of a plain enum cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// Write one frame: 4-byte big-endian length prefix + payload.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), WireError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(payload.len()));
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, WireError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

#[cfg(test)]
#[path = "pipe_tests.rs"]
mod tests;
