// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Close requests: one per outstanding RPC when a task is asked to stop.

use crate::id::{CloseRequestId, RequestId, TaskId};
use crate::status::RpcStatus;

/// State of one user-initiated cancellation of one in-flight RPC.
///
/// Mirrors the RPC status space plus a terminate-requested flag set when the
/// graceful window elapses and the scheduler escalates to a forced kill.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseRequest {
    pub uuid: CloseRequestId,
    pub task_uuid: TaskId,
    pub rpc_uuid: RequestId,
    pub task_name: String,
    pub username: String,
    status: RpcStatus,
    pub message: String,
    pub progress: f64,
    terminate_requested: bool,
}

impl CloseRequest {
    pub fn new(
        task_uuid: TaskId,
        rpc_uuid: RequestId,
        task_name: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            uuid: CloseRequestId::new(),
            task_uuid,
            rpc_uuid,
            task_name: task_name.into(),
            username: username.into(),
            status: RpcStatus::Waiting,
            message: "waiting".into(),
            progress: 0.0,
            terminate_requested: false,
        }
    }

    pub fn status(&self) -> RpcStatus {
        self.status
    }

    pub fn in_progress(&self) -> bool {
        self.status == RpcStatus::InProgress
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn terminate_requested(&self) -> bool {
        self.terminate_requested
    }

    pub fn set_in_progress(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = RpcStatus::InProgress;
        self.message = "in progress".into();
    }

    pub fn set_terminate_requested(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.terminate_requested = true;
        self.status = RpcStatus::InProgress;
        self.message = "terminating".into();
    }

    pub fn set_completed(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = RpcStatus::Completed;
        self.message = "completed".into();
        self.progress = 1.0;
    }

    pub fn set_failed(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = RpcStatus::Failed;
        self.message = "failed".into();
        self.progress = 1.0;
    }
}

#[cfg(test)]
#[path = "close_tests.rs"]
mod tests;
