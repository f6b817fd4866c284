// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! atlas-broker: AMQP adapter.
//!
//! Thin layer over `lapin` that owns the broker topology, publisher
//! confirmation and reconnection. Message bodies are opaque byte sequences;
//! nothing here parses them.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod adapter;
pub mod topology;

pub use adapter::{BrokerAdapter, BrokerMessage, ConsumeSpec, MessageStream};

/// Errors surfaced by the broker adapter.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker i/o failed: {0}")]
    Amqp(#[from] lapin::Error),
    #[error("broker connection is closed")]
    NotRunning,
    #[error("broker rejected a publish")]
    Nack,
}
