// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-side RPC host: one process, one routing key, one job at a time.

use crate::context::{BrokerReplySink, JobContext, ReplySink};
use crate::handler::JobError;
use crate::pipe::CommandPipe;
use crate::registry::{HandlerCatalog, HandlerDescriptor};
use crate::WorkerError;
use atlas_broker::{topology, BrokerAdapter, BrokerMessage, ConsumeSpec};
use atlas_core::{RequestId, TaskInput};
use atlas_wire::{PipeMsg, Reply};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Delay before re-consuming after the work queue stream breaks.
const RECONSUME_DELAY: Duration = Duration::from_secs(2);

/// Consumes one work queue and runs the registered handler per delivery.
pub struct WorkerHost {
    descriptor: HandlerDescriptor,
    instance_id: usize,
    adapter: BrokerAdapter,
    pipe: Arc<CommandPipe>,
}

impl WorkerHost {
    /// Connect the control pipe and the broker, then serve deliveries until
    /// the broker consumer ends for good.
    pub async fn run(
        catalog: &HandlerCatalog,
        routing_key: &str,
        instance_id: usize,
        amqp_url: &str,
        control_socket: &Path,
    ) -> Result<(), WorkerError> {
        let descriptor = catalog
            .get(routing_key)
            .ok_or_else(|| WorkerError::UnknownRoutingKey(routing_key.to_string()))?
            .clone();

        let stream = tokio::net::UnixStream::connect(control_socket).await?;
        let pipe = Arc::new(CommandPipe::new(stream));
        let adapter = BrokerAdapter::connect(amqp_url).await?;

        let host = Self { descriptor, instance_id, adapter, pipe };
        host.serve(routing_key).await
    }

    async fn serve(&self, routing_key: &str) -> Result<(), WorkerError> {
        let tag = format!("{routing_key}-{}", self.instance_id);
        loop {
            let mut stream = self
                .adapter
                .consume(ConsumeSpec::WorkQueue { routing_key }, &tag)
                .await?;
            tracing::info!(routing_key, instance = self.instance_id, "worker ready");

            while let Some(delivery) = stream.next().await {
                match delivery {
                    Ok(message) => self.handle_delivery(message).await,
                    Err(err) => {
                        tracing::warn!(error = %err, "work queue delivery failed");
                        break;
                    }
                }
            }

            tracing::warn!(routing_key, "work queue stream ended, re-consuming");
            tokio::time::sleep(RECONSUME_DELAY).await;
        }
    }

    async fn handle_delivery(&self, mut message: BrokerMessage) {
        let Some(request_id) = message
            .correlation_id
            .as_deref()
            .and_then(|raw| RequestId::parse(raw).ok())
        else {
            tracing::error!("delivery without a usable correlation id, dropping");
            let _ = message.ack().await;
            return;
        };
        let reply_to = message
            .reply_to
            .clone()
            .unwrap_or_else(|| topology::REPLY_ROUTING_KEY.to_string());

        tracing::info!(
            request = %request_id.short(),
            routing_key = self.descriptor.routing_key,
            instance = self.instance_id,
            "job received"
        );

        // Open handshake: the supervisor either lets the job proceed or
        // aborts it before the handler starts.
        let proceed = self.open_task(request_id).await;
        let sink = Arc::new(BrokerReplySink {
            adapter: self.adapter.clone(),
            reply_to,
            request_id,
        });

        let terminal = match proceed {
            OpenOutcome::Aborted { username } => {
                Reply::failed(request_id, format!("task has been cancelled by user {username}"))
            }
            OpenOutcome::PipeLost => Reply::failed(request_id, "worker control pipe lost"),
            OpenOutcome::Proceed => {
                let ctx = JobContext::new(
                    request_id,
                    self.instance_id,
                    sink.clone(),
                    Arc::clone(&self.pipe),
                    self.descriptor.raise_on_close,
                );
                self.run_job(&ctx, &message.body, request_id).await
            }
        };

        if let Err(err) = sink.publish_reply(&terminal).await {
            tracing::error!(
                request = %request_id.short(),
                error = %err,
                "failed to publish terminal reply"
            );
        }
        if let Err(err) = message.ack().await {
            tracing::error!(request = %request_id.short(), error = %err, "ack failed");
        }
        self.close_task(request_id).await;
    }

    /// Decode, validate, run. Returns the single terminal reply.
    async fn run_job(&self, ctx: &JobContext, body: &[u8], request_id: RequestId) -> Reply {
        let input: TaskInput = match serde_json::from_slice(body) {
            Ok(input) => input,
            Err(err) => {
                tracing::error!(
                    routing_key = self.descriptor.routing_key,
                    error = %err,
                    "incorrect input data"
                );
                return Reply::failed(request_id, format!("incorrect input data: {err}"));
            }
        };

        if let Some(validator) = self.descriptor.validator {
            if let Err(msg) = validator(&input) {
                return Reply::failed(request_id, format!("incorrect input data: {msg}"));
            }
        }

        let handler = (self.descriptor.factory)();
        match handler.run(&input, ctx).await {
            Ok(message) => {
                let message = if message.is_empty() {
                    tracing::warn!(
                        routing_key = self.descriptor.routing_key,
                        "undefined complete message"
                    );
                    format!("{} has completed the task", self.descriptor.routing_key)
                } else {
                    message
                };
                Reply::completed(request_id, message)
            }
            Err(JobError::CloseRequested { username }) => {
                Reply::failed(request_id, format!("interrupted by {username}"))
            }
            Err(JobError::Failed(message)) => Reply::failed(request_id, message),
        }
    }

    async fn open_task(&self, request_id: RequestId) -> OpenOutcome {
        if let Err(err) = self.pipe.send(&PipeMsg::OpenTask { request_id }).await {
            tracing::error!(error = %err, "failed to announce task on the control pipe");
            return OpenOutcome::PipeLost;
        }
        loop {
            match self.pipe.recv().await {
                Some(PipeMsg::Ok) => return OpenOutcome::Proceed,
                Some(PipeMsg::CloseTask { username }) => {
                    return OpenOutcome::Aborted { username }
                }
                Some(other) => {
                    tracing::debug!(?other, "ignoring stale pipe message during open");
                }
                None => return OpenOutcome::PipeLost,
            }
        }
    }

    async fn close_task(&self, request_id: RequestId) {
        if let Err(err) = self.pipe.send(&PipeMsg::TaskClosed { request_id }).await {
            tracing::error!(error = %err, "failed to send closed notification");
            return;
        }
        // Drain until the supervisor's Ok (stale close commands may precede it)
        loop {
            match self.pipe.recv().await {
                Some(PipeMsg::Ok) | None => break,
                Some(other) => {
                    tracing::debug!(?other, "ignoring stale pipe message during close");
                }
            }
        }
    }
}

enum OpenOutcome {
    Proceed,
    Aborted { username: String },
    PipeLost,
}
