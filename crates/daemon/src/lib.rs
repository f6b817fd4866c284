// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! atlas-daemon: the scheduler process.
//!
//! Owns the task lifecycle: scenario resolution, the per-step RPC loop with
//! heartbeat liveness, the cancellation state machine (close → terminate →
//! tear-down), the correlation registry routing broker replies into the
//! step drivers, and the event log feeding observers and the durable store.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod cancel;
mod context;
mod event_log;
mod lifecycle;
mod manager;
mod registry;
mod rpc_client;
mod step;
mod store;

pub use event_log::EventLog;
pub use lifecycle::{acquire_lock_file, Daemon};
pub use manager::TaskManager;
pub use registry::{CorrelationRegistry, RouteOutcome};
pub use rpc_client::{BrokerRpcClient, RpcPort};
pub use store::{EventRecord, EventStore, StoredEvent};

use atlas_core::TaskId;

/// Username attached to scheduler-initiated control actions.
pub const SCHEDULER_USER: &str = "scheduler";

/// Errors surfaced by the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Broker(#[from] atlas_broker::BrokerError),
    #[error(transparent)]
    Scenario(#[from] atlas_scenario::ScenarioError),
    #[error(transparent)]
    Lock(#[from] atlas_locks::LockError),
    #[error("event store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
    #[error("task rejected: {0}")]
    StartRejected(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
