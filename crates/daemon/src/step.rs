// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-step run loop.

use crate::manager::{CloseSignal, ManagerInner};
use atlas_core::{RpcStatus, TaskId, TaskInput};
use atlas_wire::ReplyStatus;
use std::sync::Arc;
use std::time::Duration;

/// Fallback heartbeat bound for routing keys missing from the catalog
/// (cannot happen for requests that passed validation).
const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(60);

impl ManagerInner {
    /// Issue one step request and drive it to a boolean outcome.
    ///
    /// Timeout regime: `start` until the first reply (the request may sit
    /// in the work queue), then the routing key's heartbeat bound. On a
    /// heartbeat timeout the step is failed and task stop is requested,
    /// but the loop keeps draining so post-termination replies (including
    /// the tear-down synthetic) still complete the cleanup.
    pub(crate) async fn run_request(
        self: Arc<Self>,
        task_id: TaskId,
        routing_key: &str,
        input: TaskInput,
    ) -> bool {
        let username = {
            let tasks = self.tasks.lock();
            let Some(entry) = tasks.get(&task_id) else { return false };
            if entry.data.close_requested {
                tracing::debug!(
                    task = %task_id.short(),
                    routing_key,
                    "skipping step of a closing task"
                );
                return false;
            }
            entry.data.username.clone()
        };

        let (record, rx) = self.rpc.request(task_id, routing_key, &input).await;
        let request_id = record.uuid;
        let issued = record.status() == RpcStatus::Waiting;
        let failure_message = (!issued).then(|| record.message.clone());

        let known_task = self
            .with_task(task_id, |entry| {
                entry.data.push_request(record);
                match &failure_message {
                    None => entry.data.set_waiting(),
                    Some(message) => entry.data.set_failed(Some(message)),
                }
                self.events.update_task(&entry.data);
            })
            .is_some();
        if !known_task {
            self.registry.drop_request(request_id);
            return false;
        }

        let Some(mut rx) = rx else {
            self.events.error(&format!(
                "step {routing_key} of task {} could not be issued",
                task_id.short()
            ));
            return false;
        };

        let heartbeat = self
            .catalog
            .heartbeat_timeout(routing_key)
            .unwrap_or(DEFAULT_HEARTBEAT);
        let mut timeout = self.timeouts.start;
        let mut timed_out = false;

        loop {
            match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(Some(reply)) => {
                    timeout = heartbeat;
                    match reply.status {
                        ReplyStatus::InProgress => {
                            self.with_task(task_id, |entry| {
                                if let Some(rpc) = entry.data.record_mut(request_id) {
                                    rpc.note_reply();
                                    rpc.set_progress(reply.progress);
                                    rpc.message = reply.message.clone();
                                }
                                entry.data.set_in_progress();
                                self.events.update_task(&entry.data);
                                self.signal_close(entry, request_id, CloseSignal::InProgress);
                            });
                        }
                        ReplyStatus::Completed => {
                            self.with_task(task_id, |entry| {
                                if let Some(rpc) = entry.data.record_mut(request_id) {
                                    rpc.set_completed();
                                    rpc.message = reply.message.clone();
                                }
                                self.events.update_task(&entry.data);
                                self.signal_close(entry, request_id, CloseSignal::Terminal);
                            });
                            self.registry.drop_request(request_id);
                            // A completion after a heartbeat failure only
                            // finishes the cleanup; the step stays failed
                            return !timed_out;
                        }
                        ReplyStatus::Failed
                        | ReplyStatus::Timeout
                        | ReplyStatus::ConsumerNotFound => {
                            self.with_task(task_id, |entry| {
                                if let Some(rpc) = entry.data.record_mut(request_id) {
                                    rpc.set_failed(reply.message.clone());
                                }
                                entry.data.set_failed(Some(&reply.message));
                                self.events.update_task(&entry.data);
                                self.signal_close(entry, request_id, CloseSignal::Terminal);
                            });
                            self.registry.drop_request(request_id);
                            if let Err(err) =
                                Arc::clone(&self).request_stop(task_id, &username).await
                            {
                                tracing::debug!(error = %err, "stop after failure");
                            }
                            return false;
                        }
                    }
                }
                Ok(None) => {
                    // Channel dropped without a terminal reply (task torn down)
                    tracing::debug!(
                        request = %request_id.short(),
                        "reply channel closed mid-step"
                    );
                    return false;
                }
                Err(_) => {
                    if !timed_out {
                        timed_out = true;
                        let message = format!(
                            "heartbeat timeout: no reply from {routing_key} within {}s",
                            timeout.as_secs()
                        );
                        self.with_task(task_id, |entry| {
                            if let Some(rpc) = entry.data.record_mut(request_id) {
                                rpc.set_failed(message.clone());
                            }
                            entry.data.set_failed(Some(&message));
                            self.events.update_task(&entry.data);
                        });
                        self.events.warning(&message);
                        if let Err(err) =
                            Arc::clone(&self).request_stop(task_id, &username).await
                        {
                            tracing::debug!(error = %err, "stop after heartbeat timeout");
                        }
                        // Keep draining: the close driver escalates and
                        // eventually injects the tear-down reply
                        timeout = heartbeat;
                    }
                }
            }
        }
    }
}
