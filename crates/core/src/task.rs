// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task bookkeeping shared between the task manager and the event log.

use crate::id::{RequestId, ScenarioId, TaskId};
use crate::record::RpcRecord;
use crate::status::TaskStatus;

/// Mutable state of one submitted task: status, message and the ordered
/// sequence of RPC records its steps have issued.
///
/// Status moves forward only (inactive → waiting → in progress →
/// completed/failed); `Failed` absorbs everything except an already
/// completed task.
#[derive(Debug, Clone)]
pub struct TaskData {
    pub uuid: TaskId,
    pub scenario_id: ScenarioId,
    /// Scenario name, for event documents.
    pub name: String,
    pub username: String,
    status: TaskStatus,
    pub message: String,
    pub close_requested: bool,
    pub requests: Vec<RpcRecord>,
}

impl TaskData {
    pub fn new(
        uuid: TaskId,
        scenario_id: ScenarioId,
        name: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            uuid,
            scenario_id,
            name: name.into(),
            username: username.into(),
            status: TaskStatus::Inactive,
            message: String::new(),
            close_requested: false,
            requests: Vec::new(),
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn set_waiting(&mut self) {
        if self.status <= TaskStatus::Waiting {
            self.status = TaskStatus::Waiting;
            self.message = "waiting".into();
        }
    }

    pub fn set_in_progress(&mut self) {
        if self.status <= TaskStatus::InProgress {
            self.status = TaskStatus::InProgress;
            self.message = "in progress".into();
        }
    }

    /// The scenario finished: completed unless a step already failed it.
    pub fn set_closed(&mut self) {
        if self.status != TaskStatus::Failed {
            self.status = TaskStatus::Completed;
            self.message = "completed".into();
        }
    }

    pub fn set_failed(&mut self, message: Option<&str>) {
        if self.status == TaskStatus::Completed {
            tracing::warn!(task = %self.uuid.short(), "ignoring failure of a completed task");
            return;
        }
        self.status = TaskStatus::Failed;
        self.message = message.unwrap_or("failed").into();
    }

    pub fn push_request(&mut self, record: RpcRecord) {
        self.requests.push(record);
    }

    pub fn record(&self, request_id: RequestId) -> Option<&RpcRecord> {
        self.requests.iter().find(|r| r.uuid == request_id)
    }

    pub fn record_mut(&mut self, request_id: RequestId) -> Option<&mut RpcRecord> {
        self.requests.iter_mut().find(|r| r.uuid == request_id)
    }
}

impl std::fmt::Display for TaskData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task {}: {}", self.uuid.short(), self.status)
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
