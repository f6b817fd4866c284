// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared status codes for tasks, RPC records and close requests.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an RPC record, a close request or a whole task.
///
/// The derived ordering matters: task status only moves forward
/// (`Inactive < Waiting < InProgress < Completed < Failed`), except that
/// `Failed` absorbs everything but `Completed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum RpcStatus {
    Inactive,
    Waiting,
    InProgress,
    Completed,
    Failed,
}

crate::int_enum! {
    RpcStatus: u8 {
        Inactive = 0,
        Waiting = 1,
        InProgress = 2,
        Completed = 3,
        Failed = 4,
    }
}

crate::simple_display! {
    RpcStatus {
        Inactive => "inactive",
        Waiting => "waiting",
        InProgress => "in progress",
        Completed => "completed",
        Failed => "failed",
    }
}

impl RpcStatus {
    pub fn code(self) -> u8 {
        self.into()
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RpcStatus::Completed | RpcStatus::Failed)
    }
}

/// Task status reuses the RPC status space.
pub type TaskStatus = RpcStatus;

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
