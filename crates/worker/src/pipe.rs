// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The command pipe: one framed Unix-socket connection per worker.
//!
//! Single producer, single consumer on each end. The read side runs on a
//! background task so the owner can both await the next message and poll
//! non-blockingly between progress publishes.

use crate::WorkerError;
use atlas_wire::{read_frame, write_frame, PipeMsg};
use tokio::io::AsyncWriteExt;
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

/// One endpoint of the supervisor↔worker command channel.
pub struct CommandPipe {
    incoming: Mutex<mpsc::UnboundedReceiver<PipeMsg>>,
    writer: Mutex<OwnedWriteHalf>,
}

impl CommandPipe {
    /// Wrap a connected stream. Spawns the reader task.
    pub fn new(stream: UnixStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut reader = read_half;
            loop {
                let frame = match read_frame(&mut reader).await {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::debug!(error = %err, "command pipe closed");
                        break;
                    }
                };
                match PipeMsg::decode(&frame) {
                    Ok(msg) => {
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping malformed pipe message");
                    }
                }
            }
        });

        Self { incoming: Mutex::new(rx), writer: Mutex::new(write_half) }
    }

    pub async fn send(&self, msg: &PipeMsg) -> Result<(), WorkerError> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, &msg.encode()).await?;
        writer.flush().await.map_err(atlas_wire::WireError::from)?;
        Ok(())
    }

    /// Await the next message; `None` once the peer hung up.
    pub async fn recv(&self) -> Option<PipeMsg> {
        self.incoming.lock().await.recv().await
    }

    /// Non-blocking poll used between progress publishes.
    pub fn try_recv(&self) -> Option<PipeMsg> {
        self.incoming.try_lock().ok()?.try_recv().ok()
    }
}

#[cfg(test)]
#[path = "pipe_tests.rs"]
mod tests;
