// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job context handed to handlers.

use crate::handler::JobError;
use crate::pipe::CommandPipe;
use async_trait::async_trait;
use atlas_broker::{topology, BrokerAdapter, BrokerError};
use atlas_core::RequestId;
use atlas_wire::{PipeMsg, Reply};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Where replies go. The host publishes to the broker; tests record.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn publish_reply(&self, reply: &Reply) -> Result<(), BrokerError>;

    /// Publish raw bytes on the reply route. Fault-injection hook used by
    /// the malformed-reply test consumer.
    async fn publish_raw(&self, body: &[u8]) -> Result<(), BrokerError>;
}

/// Publishes replies on the primary exchange with the request's reply route.
pub struct BrokerReplySink {
    pub adapter: BrokerAdapter,
    pub reply_to: String,
    pub request_id: RequestId,
}

#[async_trait]
impl ReplySink for BrokerReplySink {
    async fn publish_reply(&self, reply: &Reply) -> Result<(), BrokerError> {
        self.publish_raw(&reply.encode()).await
    }

    async fn publish_raw(&self, body: &[u8]) -> Result<(), BrokerError> {
        self.adapter
            .publish(topology::EXCHANGE, &self.reply_to, self.request_id, None, body)
            .await
    }
}

/// Handler-facing surface of one running job.
///
/// Every publish checks the command pipe afterwards; a close command either
/// raises (`raise_on_close` registrations) or latches the cooperative flag.
pub struct JobContext {
    request_id: RequestId,
    instance_id: usize,
    sink: Arc<dyn ReplySink>,
    pipe: Arc<CommandPipe>,
    raise_on_close: bool,
    close_requested: AtomicBool,
    close_username: Mutex<String>,
    progress: Mutex<f64>,
}

impl JobContext {
    pub fn new(
        request_id: RequestId,
        instance_id: usize,
        sink: Arc<dyn ReplySink>,
        pipe: Arc<CommandPipe>,
        raise_on_close: bool,
    ) -> Self {
        Self {
            request_id,
            instance_id,
            sink,
            pipe,
            raise_on_close,
            close_requested: AtomicBool::new(false),
            close_username: Mutex::new("unknown".into()),
            progress: Mutex::new(0.0),
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn instance_id(&self) -> usize {
        self.instance_id
    }

    /// Cooperative cancellation flag for handlers that do not raise.
    pub fn is_close_requested(&self) -> bool {
        self.poll_pipe();
        self.close_requested.load(Ordering::SeqCst)
    }

    /// Who asked the task to close (valid once the flag is set).
    pub fn close_username(&self) -> String {
        self.close_username.lock().clone()
    }

    /// Publish an in-progress reply with updated progress.
    pub async fn publish_progress(&self, progress: f64, message: &str) -> Result<(), JobError> {
        *self.progress.lock() = progress.clamp(0.0, 1.0);
        self.publish(message).await
    }

    /// Publish an in-progress reply at the current progress.
    pub async fn publish_message(&self, message: &str) -> Result<(), JobError> {
        self.publish(message).await
    }

    /// Publish raw bytes in place of a reply body (fault injection).
    pub async fn publish_raw(&self, body: &[u8]) -> Result<(), JobError> {
        self.sink
            .publish_raw(body)
            .await
            .map_err(|err| JobError::Failed(format!("failed to publish: {err}")))?;
        self.check_close()
    }

    async fn publish(&self, message: &str) -> Result<(), JobError> {
        let progress = *self.progress.lock();
        let reply = Reply::in_progress(self.request_id, progress, message);
        self.sink
            .publish_reply(&reply)
            .await
            .map_err(|err| JobError::Failed(format!("failed to publish progress: {err}")))?;
        self.check_close()
    }

    /// Drain pending pipe messages into the close flag.
    fn poll_pipe(&self) {
        while let Some(msg) = self.pipe.try_recv() {
            match msg {
                PipeMsg::CloseTask { username } => {
                    tracing::info!(
                        request = %self.request_id.short(),
                        username = %username,
                        "close requested mid-run"
                    );
                    *self.close_username.lock() = username;
                    self.close_requested.store(true, Ordering::SeqCst);
                }
                other => {
                    tracing::debug!(?other, "unexpected pipe message mid-run");
                }
            }
        }
    }

    fn check_close(&self) -> Result<(), JobError> {
        self.poll_pipe();
        if self.raise_on_close && self.close_requested.load(Ordering::SeqCst) {
            return Err(JobError::CloseRequested { username: self.close_username() });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
