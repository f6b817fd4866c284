// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task manager: per-task state and lifecycle.

use crate::context::TaskContext;
use crate::event_log::EventLog;
use crate::registry::{CorrelationRegistry, RouteOutcome};
use crate::rpc_client::RpcPort;
use crate::{SchedulerError, SCHEDULER_USER};
use atlas_core::{
    CloseRequest, CloseRequestId, EventLevel, RequestId, TaskData, TaskId, TaskPayload, TaskStatus,
    Timeouts,
};
use atlas_locks::EditLockManager;
use atlas_scenario::ScenarioProvider;
use atlas_wire::Reply;
use atlas_worker::HandlerCatalog;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Signal fed from the step loop into a close-request driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseSignal {
    /// The target RPC produced a reply (it is alive).
    InProgress,
    /// The target RPC reached a terminal state.
    Terminal,
}

/// Book-keeping of one active task.
pub(crate) struct TaskEntry {
    pub data: TaskData,
    /// Close drivers awaiting liveness signals, by close-request id.
    pub close_tx: HashMap<CloseRequestId, mpsc::UnboundedSender<CloseSignal>>,
    /// Which close request watches which RPC.
    pub close_by_rpc: HashMap<RequestId, CloseRequestId>,
    /// Close-request state, kept for event re-emission.
    pub closes: HashMap<CloseRequestId, CloseRequest>,
}

pub(crate) struct ManagerInner {
    pub timeouts: Timeouts,
    pub provider: ScenarioProvider,
    pub catalog: Arc<HandlerCatalog>,
    pub rpc: Arc<dyn RpcPort>,
    pub registry: Arc<CorrelationRegistry>,
    pub locks: EditLockManager,
    pub events: Arc<EventLog>,
    pub tasks: Mutex<HashMap<TaskId, TaskEntry>>,
}

impl ManagerInner {
    pub(crate) fn with_task<T>(
        &self,
        task_id: TaskId,
        f: impl FnOnce(&mut TaskEntry) -> T,
    ) -> Option<T> {
        self.tasks.lock().get_mut(&task_id).map(f)
    }

    /// Send a liveness signal to the close driver watching `request_id`.
    pub(crate) fn signal_close(&self, entry: &TaskEntry, request_id: RequestId, signal: CloseSignal) {
        if let Some(close_id) = entry.close_by_rpc.get(&request_id) {
            if let Some(tx) = entry.close_tx.get(close_id) {
                let _ = tx.send(signal);
            }
        }
    }

    /// The scenario root finished: finalise and drop the task.
    pub(crate) fn notify_task_closed(&self, task_id: TaskId) {
        let entry = self.tasks.lock().remove(&task_id);
        let Some(mut entry) = entry else {
            tracing::warn!(task = %task_id.short(), "closed notification for unknown task");
            return;
        };

        entry.data.set_closed();
        self.events.update_task(&entry.data);
        self.events.notify_task_closed(task_id);

        // A close driver may still be catching up on its final signal;
        // settle its document now so the log can flush it.
        for close in entry.closes.values_mut() {
            if !close.is_terminal() {
                if close.terminate_requested() {
                    close.set_failed();
                } else {
                    close.set_completed();
                }
                self.events.update_close_request(close);
            }
        }

        for record in &entry.data.requests {
            self.registry.drop_request(record.uuid);
        }
        tracing::info!(task = %task_id.short(), status = %entry.data.status(), "task closed");
        // Dropping the entry hangs up every close driver's signal channel
    }
}

/// The orchestration facade: create tasks, stop tasks, dispatch replies.
#[derive(Clone)]
pub struct TaskManager {
    pub(crate) inner: Arc<ManagerInner>,
}

impl TaskManager {
    pub fn new(
        timeouts: Timeouts,
        provider: ScenarioProvider,
        catalog: Arc<HandlerCatalog>,
        rpc: Arc<dyn RpcPort>,
        registry: Arc<CorrelationRegistry>,
        locks: EditLockManager,
        events: Arc<EventLog>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                timeouts,
                provider,
                catalog,
                rpc,
                registry,
                locks,
                events,
                tasks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create a task, validate its payload and launch the scenario driver.
    pub fn start_task(
        &self,
        scenario_id: atlas_core::ScenarioId,
        payload: TaskPayload,
    ) -> Result<TaskId, SchedulerError> {
        let scenario = match self.inner.provider.get(scenario_id) {
            Ok(scenario) => scenario,
            Err(err) => {
                self.inner.events.error(&format!("failed to start task: {err}"));
                return Err(err.into());
            }
        };

        if let Err(err) = scenario.check_input(&payload) {
            self.inner.events.error(&format!(
                "task {} rejected for {}: {err}",
                scenario.name, payload.username
            ));
            return Err(SchedulerError::StartRejected(err.to_string()));
        }

        let task_id = TaskId::new();
        let data = TaskData::new(task_id, scenario_id, &scenario.name, &payload.username);
        self.inner.events.update_task(&data);
        self.inner.tasks.lock().insert(
            task_id,
            TaskEntry {
                data,
                close_tx: HashMap::new(),
                close_by_rpc: HashMap::new(),
                closes: HashMap::new(),
            },
        );

        tracing::info!(task = %task_id.short(), scenario = %scenario.name, "task created");

        let context = TaskContext::new(Arc::clone(&self.inner), task_id, payload);
        tokio::spawn(async move {
            let success = scenario.execute(&context).await;
            tracing::debug!(task = %task_id.short(), success, "scenario driver finished");
        });

        Ok(task_id)
    }

    /// User-initiated cancellation of a whole task.
    pub async fn request_stop_task(
        &self,
        task_id: TaskId,
        username: &str,
    ) -> Result<(), SchedulerError> {
        Arc::clone(&self.inner).request_stop(task_id, username).await
    }

    /// Entry point of the reply pump: one raw broker message.
    pub async fn dispatch_reply(&self, body: &[u8], correlation_id: Option<&str>) {
        match Reply::decode(body) {
            Ok(reply) => {
                if self.inner.registry.route(&reply) == RouteOutcome::Unknown {
                    self.inner.events.message(
                        &format!("unknown RPC request {}", reply.request_id.short()),
                        EventLevel::Error,
                    );
                    // Defensive cleanup: whoever sent this should stop
                    self.inner.rpc.close(reply.request_id, SCHEDULER_USER, true).await;
                }
            }
            Err(err) => {
                self.inner
                    .events
                    .error(&format!("malformed reply on the feedback queue: {err}"));
                if let Some(request_id) =
                    correlation_id.and_then(|raw| RequestId::parse(raw).ok())
                {
                    self.inner.rpc.close(request_id, SCHEDULER_USER, true).await;
                }
            }
        }
    }

    pub fn task_status(&self, task_id: TaskId) -> Option<TaskStatus> {
        self.inner.tasks.lock().get(&task_id).map(|entry| entry.data.status())
    }

    pub fn active_tasks(&self) -> usize {
        self.inner.tasks.lock().len()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
