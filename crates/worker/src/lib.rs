// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! atlas-worker: the worker side of the RPC layer.
//!
//! A pool supervisor spawns one OS process per (routing key, instance);
//! each process runs a [`WorkerHost`] that consumes its work queue,
//! invokes the registered handler and publishes progress and terminal
//! replies. Supervisor and worker talk over a Unix-socket command pipe.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod context;
mod handler;
mod host;
mod pipe;
mod pool;
mod registry;

pub use context::{JobContext, ReplySink};
pub use handler::{JobError, JobHandler};
pub use host::WorkerHost;
pub use pipe::CommandPipe;
pub use pool::{PoolConfig, PoolSupervisor};
pub use registry::{
    global_catalog, install_catalog, HandlerCatalog, HandlerCatalogBuilder, HandlerDescriptor,
    HandlerFactory, InputValidator,
};

/// Errors surfaced by the worker host and pool supervisor.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("unknown routing key: {0}")]
    UnknownRoutingKey(String),
    #[error("duplicate handler registration: {0}")]
    DuplicateHandler(String),
    #[error("handler catalog is already installed")]
    CatalogInstalled,
    #[error("control pipe closed")]
    PipeClosed,
    #[error(transparent)]
    Broker(#[from] atlas_broker::BrokerError),
    #[error(transparent)]
    Wire(#[from] atlas_wire::WireError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
