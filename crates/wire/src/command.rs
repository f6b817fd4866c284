// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler → worker-pool command bodies (fan-out exchange).

use crate::WireError;
use atlas_core::RequestId;
use serde::{Deserialize, Serialize};

/// Command code of a control message.
///
/// `LoadLog` is reserved: it parses but nothing emits or handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CommandCode {
    Ok,
    CloseTask,
    NotifyTaskClosed,
    LoadLog,
    TerminateTask,
}

atlas_core::int_enum! {
    CommandCode: u8 {
        Ok = 0,
        CloseTask = 1,
        NotifyTaskClosed = 2,
        LoadLog = 3,
        TerminateTask = 4,
    }
}

atlas_core::simple_display! {
    CommandCode {
        Ok => "ok",
        CloseTask => "close task",
        NotifyTaskClosed => "notify task closed",
        LoadLog => "load log",
        TerminateTask => "terminate task",
    }
}

/// One control message published on the command exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub cmd: CommandCode,
    pub request_id: RequestId,
    pub username: String,
}

impl Command {
    pub fn close_task(request_id: RequestId, username: impl Into<String>) -> Self {
        Self { cmd: CommandCode::CloseTask, request_id, username: username.into() }
    }

    pub fn terminate_task(request_id: RequestId, username: impl Into<String>) -> Self {
        Self { cmd: CommandCode::TerminateTask, request_id, username: username.into() }
    }

    pub fn notify_task_closed(request_id: RequestId, username: impl Into<String>) -> Self {
        Self { cmd: CommandCode::NotifyTaskClosed, request_id, username: username.into() }
    }

    pub fn encode(&self) -> Vec<u8> {
        // Serialization of a plain struct cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let cmd: Command = serde_json::from_slice(body)?;
        Ok(cmd)
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
