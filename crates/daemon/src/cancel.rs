// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation: close requests and their escalation drivers.

use crate::manager::{CloseSignal, ManagerInner};
use crate::SchedulerError;
use atlas_core::{CloseRequest, CloseRequestId, RequestId, RpcStatus, TaskId};
use atlas_wire::Reply;
use std::sync::Arc;
use tokio::sync::mpsc;

impl ManagerInner {
    /// Set the close-requested flag and spawn a close driver for every
    /// non-terminal RPC record that does not have one yet.
    pub(crate) async fn request_stop(
        self: Arc<Self>,
        task_id: TaskId,
        username: &str,
    ) -> Result<(), SchedulerError> {
        struct PendingClose {
            close_id: CloseRequestId,
            rpc_id: RequestId,
            was_waiting: bool,
            rx: mpsc::UnboundedReceiver<CloseSignal>,
        }

        let created = {
            let mut tasks = self.tasks.lock();
            let Some(entry) = tasks.get_mut(&task_id) else {
                return Err(SchedulerError::TaskNotFound(task_id));
            };

            if !entry.data.close_requested {
                entry.data.close_requested = true;
                tracing::info!(task = %task_id.short(), username, "task stop requested");
                self.events.update_task(&entry.data);
            }

            let mut created = Vec::new();
            for record in &entry.data.requests {
                if record.is_terminal() || entry.close_by_rpc.contains_key(&record.uuid) {
                    continue;
                }
                let request =
                    CloseRequest::new(task_id, record.uuid, entry.data.name.clone(), username);
                let close_id = request.uuid;
                let (tx, rx) = mpsc::unbounded_channel();
                entry.close_tx.insert(close_id, tx);
                entry.close_by_rpc.insert(record.uuid, close_id);
                self.events.update_close_request(&request);
                entry.closes.insert(close_id, request);
                created.push(PendingClose {
                    close_id,
                    rpc_id: record.uuid,
                    was_waiting: record.status() == RpcStatus::Waiting,
                    rx,
                });
            }
            created
        };

        for pending in created {
            self.rpc.close(pending.rpc_id, username, false).await;
            let inner = Arc::clone(&self);
            let username = username.to_string();
            tokio::spawn(async move {
                inner
                    .drive_close(
                        task_id,
                        pending.close_id,
                        pending.rpc_id,
                        username,
                        pending.was_waiting,
                        pending.rx,
                    )
                    .await;
            });
        }
        Ok(())
    }

    /// One close request's escalation loop.
    ///
    /// Windows: start-timeout while the target is still queued, then
    /// close-timeout; a silent window escalates to a forced terminate, a
    /// second one gives up and injects the tear-down reply so the step
    /// loop can finish.
    async fn drive_close(
        self: Arc<Self>,
        task_id: TaskId,
        close_id: CloseRequestId,
        rpc_id: RequestId,
        username: String,
        was_waiting: bool,
        mut rx: mpsc::UnboundedReceiver<CloseSignal>,
    ) {
        let mut timeout = if was_waiting { self.timeouts.start } else { self.timeouts.close };

        loop {
            match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(Some(CloseSignal::InProgress)) => {
                    self.update_close(task_id, close_id, |req| req.set_in_progress());
                    timeout = self.timeouts.close;
                }
                Ok(Some(CloseSignal::Terminal)) => {
                    // The target ended. A close that never escalated did its
                    // job; after a terminate it is accounted failed.
                    let escalated = self
                        .update_close(task_id, close_id, |req| {
                            if req.terminate_requested() {
                                req.set_failed();
                                true
                            } else {
                                req.set_completed();
                                false
                            }
                        })
                        .unwrap_or(false);
                    tracing::info!(
                        request = %rpc_id.short(),
                        escalated,
                        "close request finished"
                    );
                    self.rpc.notify_closed(rpc_id, &username).await;
                    self.remove_close(task_id, close_id, rpc_id);
                    return;
                }
                Ok(None) => {
                    // Task entry dropped; nothing left to account
                    return;
                }
                Err(_) => {
                    let escalated = self
                        .update_close(task_id, close_id, |req| req.terminate_requested())
                        .unwrap_or(false);
                    if !escalated {
                        tracing::warn!(
                            request = %rpc_id.short(),
                            "close window elapsed, terminating worker"
                        );
                        self.rpc.close(rpc_id, &username, true).await;
                        self.update_close(task_id, close_id, |req| {
                            req.set_terminate_requested()
                        });
                        timeout = self.timeouts.terminate;
                    } else {
                        // Terminate window elapsed too: tear the step down
                        tracing::error!(
                            request = %rpc_id.short(),
                            "terminate window elapsed, tearing down"
                        );
                        self.update_close(task_id, close_id, |req| req.set_failed());
                        self.rpc.notify_closed(rpc_id, &username).await;
                        self.registry.inject(Reply::failed(
                            rpc_id,
                            "task torn down by the scheduler",
                        ));
                        self.remove_close(task_id, close_id, rpc_id);
                        return;
                    }
                }
            }
        }
    }

    /// Mutate one close request and re-emit its event document.
    fn update_close<T>(
        &self,
        task_id: TaskId,
        close_id: CloseRequestId,
        f: impl FnOnce(&mut CloseRequest) -> T,
    ) -> Option<T> {
        self.with_task(task_id, |entry| {
            let request = entry.closes.get_mut(&close_id)?;
            let result = f(request);
            self.events.update_close_request(request);
            Some(result)
        })
        .flatten()
    }

    fn remove_close(&self, task_id: TaskId, close_id: CloseRequestId, rpc_id: RequestId) {
        self.with_task(task_id, |entry| {
            entry.close_tx.remove(&close_id);
            entry.close_by_rpc.remove(&rpc_id);
        });
    }
}
