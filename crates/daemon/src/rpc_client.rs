// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler-side RPC client.

use crate::registry::CorrelationRegistry;
use async_trait::async_trait;
use atlas_broker::{topology, BrokerAdapter};
use atlas_core::{RequestId, RpcRecord, RpcStatus, TaskId, TaskInput};
use atlas_wire::{Command, Reply};
use atlas_worker::HandlerCatalog;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The RPC operations the task manager depends on.
///
/// Seam for tests: the production implementation publishes to the broker,
/// test doubles feed the shared registry directly.
#[async_trait]
pub trait RpcPort: Send + Sync {
    /// Publish a request. On success the record is `Waiting` and the
    /// receiver carries its replies; on failure the record explains why.
    async fn request(
        &self,
        task_id: TaskId,
        routing_key: &str,
        input: &TaskInput,
    ) -> (RpcRecord, Option<mpsc::UnboundedReceiver<Reply>>);

    /// Publish a close (or forced terminate) for one request.
    async fn close(&self, request_id: RequestId, username: &str, terminate: bool);

    /// Publish the closed notification for one request.
    async fn notify_closed(&self, request_id: RequestId, username: &str);
}

/// Production [`RpcPort`] over the broker adapter.
pub struct BrokerRpcClient {
    adapter: BrokerAdapter,
    registry: Arc<CorrelationRegistry>,
    catalog: Arc<HandlerCatalog>,
}

impl BrokerRpcClient {
    pub fn new(
        adapter: BrokerAdapter,
        registry: Arc<CorrelationRegistry>,
        catalog: Arc<HandlerCatalog>,
    ) -> Self {
        Self { adapter, registry, catalog }
    }
}

#[async_trait]
impl RpcPort for BrokerRpcClient {
    async fn request(
        &self,
        task_id: TaskId,
        routing_key: &str,
        input: &TaskInput,
    ) -> (RpcRecord, Option<mpsc::UnboundedReceiver<Reply>>) {
        let request_id = RequestId::new();

        // Defensive re-check; the scenario provider already validated the
        // scenario's keys at load
        if !self.catalog.contains(routing_key) {
            return (
                RpcRecord::new(request_id, routing_key, RpcStatus::Failed, "unknown routing key"),
                None,
            );
        }

        let body = serde_json::to_vec(input).unwrap_or_default();
        match self
            .adapter
            .publish(
                topology::EXCHANGE,
                routing_key,
                request_id,
                Some(topology::REPLY_ROUTING_KEY),
                &body,
            )
            .await
        {
            Ok(()) => {
                let rx = self.registry.register(request_id, task_id);
                tracing::debug!(
                    request = %request_id.short(),
                    routing_key,
                    "request published"
                );
                (
                    RpcRecord::new(
                        request_id,
                        routing_key,
                        RpcStatus::Waiting,
                        "the request has been sent",
                    ),
                    Some(rx),
                )
            }
            Err(err) => {
                tracing::error!(routing_key, error = %err, "request publish failed");
                (
                    RpcRecord::new(
                        request_id,
                        routing_key,
                        RpcStatus::Failed,
                        format!("failed to publish the request: {err}"),
                    ),
                    None,
                )
            }
        }
    }

    async fn close(&self, request_id: RequestId, username: &str, terminate: bool) {
        let command = if terminate {
            Command::terminate_task(request_id, username)
        } else {
            Command::close_task(request_id, username)
        };
        if let Err(err) = self
            .adapter
            .publish(
                topology::CMD_EXCHANGE,
                topology::CMD_ROUTING_KEY,
                request_id,
                None,
                &command.encode(),
            )
            .await
        {
            tracing::error!(
                request = %request_id.short(),
                terminate,
                error = %err,
                "close publish failed"
            );
        }
    }

    async fn notify_closed(&self, request_id: RequestId, username: &str) {
        let command = Command::notify_task_closed(request_id, username);
        if let Err(err) = self
            .adapter
            .publish(
                topology::CMD_EXCHANGE,
                topology::CMD_ROUTING_KEY,
                request_id,
                None,
                &command.encode(),
            )
            .await
        {
            tracing::error!(request = %request_id.short(), error = %err, "notify-closed failed");
        }
    }
}
