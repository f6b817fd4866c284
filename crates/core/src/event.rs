// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event documents published to observers and persisted to the event store.
//!
//! Three document shapes: `task` (full task state with step descriptors),
//! `cmd` (close-request state) and `event` (free-form message with a
//! severity level). Documents are plain JSON values; the event log owns
//! created timestamps and row ids.

use crate::close::CloseRequest;
use crate::record::RpcRecord;
use crate::task::TaskData;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Discriminates event rows in the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum EventKind {
    Event,
    Task,
    Cmd,
}

crate::int_enum! {
    EventKind: u8 {
        Event = 0,
        Task = 1,
        Cmd = 2,
    }
}

crate::simple_display! {
    EventKind {
        Event => "event",
        Task => "task",
        Cmd => "cmd",
    }
}

/// Severity of a free-form message event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum EventLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

crate::int_enum! {
    EventLevel: u8 {
        Trace = 0,
        Debug = 1,
        Info = 2,
        Warn = 3,
        Error = 4,
    }
}

crate::simple_display! {
    EventLevel {
        Trace => "trace",
        Debug => "debug",
        Info => "info",
        Warn => "warn",
        Error => "error",
    }
}

impl EventKind {
    pub fn code(self) -> u8 {
        self.into()
    }
}

impl EventLevel {
    pub fn code(self) -> u8 {
        self.into()
    }
}

/// One step line of a task document.
pub fn step_descriptor(rpc: &RpcRecord) -> Value {
    json!({
        "uuid": rpc.uuid.to_string(),
        "name": rpc.routing_key,
        "progress": rpc.progress(),
        "status": rpc.status().code(),
        "msg": rpc.message,
    })
}

/// Full task document, re-emitted on every state change.
pub fn task_descriptor(data: &TaskData) -> Value {
    json!({
        "type": EventKind::Task.code(),
        "uuid": data.uuid.to_string(),
        "name": data.name,
        "status": data.status().code(),
        "message": data.message,
        "username": data.username,
        "steps": data.requests.iter().map(step_descriptor).collect::<Vec<_>>(),
    })
}

/// Close-request document.
pub fn close_request_descriptor(req: &CloseRequest) -> Value {
    json!({
        "type": EventKind::Cmd.code(),
        "uuid": req.uuid.to_string(),
        "name": format!("Close task {} ({})", req.task_name, req.task_uuid.short()),
        "status": req.status().code(),
        "message": req.message,
        "username": req.username,
        "steps": Vec::<Value>::new(),
    })
}

/// Free-form message document.
pub fn message_descriptor(msg: &str, level: EventLevel) -> Value {
    json!({
        "type": EventKind::Event.code(),
        "level": level.code(),
        "msg": msg,
    })
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
