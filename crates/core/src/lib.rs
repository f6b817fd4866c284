// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! atlas-core: shared domain model for the Atlas task scheduler

pub mod macros;

pub mod close;
pub mod config;
pub mod event;
pub mod geo;
pub mod id;
pub mod input;
pub mod objects;
pub mod payload;
pub mod record;
pub mod status;
pub mod task;

pub use close::CloseRequest;
pub use config::{ConfigError, ServiceConfig, Timeouts};
pub use event::{
    close_request_descriptor, message_descriptor, step_descriptor, task_descriptor, EventKind,
    EventLevel,
};
pub use geo::{GeoError, QCell, Rect};
pub use id::{CloseRequestId, LockId, RequestId, ScenarioId, TaskId};
pub use input::{InputProducer, LockKind, LockedEntry, LockedView, TaskInput};
pub use objects::{IlSubtype, ObjectType, ResourceSelector};
pub use payload::TaskPayload;
pub use record::RpcRecord;
pub use status::{RpcStatus, TaskStatus};
pub use task::TaskData;
