// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker topology: exchange and queue names, declaration helpers.
//!
//! Work queues are deliberately non-durable: a broker restart loses queued
//! requests, and the scheduler's start-timeout surfaces that as step
//! failures instead of replaying stale work.

use crate::BrokerError;
use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, ExchangeKind};

/// Primary direct exchange carrying requests and replies.
pub const EXCHANGE: &str = "rpc_manager_exchange";
/// Fan-out exchange carrying close/terminate/closed control messages.
pub const CMD_EXCHANGE: &str = "rpc_manager_cmd_exchange";
/// Routing key the command queues bind with.
pub const CMD_ROUTING_KEY: &str = "rpc_manager_cmd";
/// The scheduler's reply queue.
pub const REPLY_QUEUE: &str = "reply-to-queue";
/// Routing key replies are published with (`reply_to` of every request).
pub const REPLY_ROUTING_KEY: &str = "feedback";
/// One un-acked delivery per worker.
pub const PREFETCH_COUNT: u16 = 1;

/// Queue name for one routing key's work queue.
pub fn queue_name(routing_key: &str) -> String {
    format!("{routing_key}_queue")
}

pub async fn declare_rpc_exchange(channel: &Channel) -> Result<(), BrokerError> {
    channel
        .exchange_declare(
            EXCHANGE,
            ExchangeKind::Direct,
            ExchangeDeclareOptions::default(),
            FieldTable::default(),
        )
        .await?;
    Ok(())
}

pub async fn declare_cmd_exchange(channel: &Channel) -> Result<(), BrokerError> {
    channel
        .exchange_declare(
            CMD_EXCHANGE,
            ExchangeKind::Fanout,
            ExchangeDeclareOptions { auto_delete: true, ..Default::default() },
            FieldTable::default(),
        )
        .await?;
    Ok(())
}

/// Declare and bind the work queue for one routing key.
pub async fn declare_work_queue(channel: &Channel, routing_key: &str) -> Result<String, BrokerError> {
    declare_rpc_exchange(channel).await?;
    let name = queue_name(routing_key);
    channel
        .queue_declare(&name, QueueDeclareOptions::default(), FieldTable::default())
        .await?;
    channel
        .queue_bind(&name, EXCHANGE, routing_key, QueueBindOptions::default(), FieldTable::default())
        .await?;
    Ok(name)
}

/// Declare and bind the scheduler's reply queue.
pub async fn declare_reply_queue(channel: &Channel) -> Result<String, BrokerError> {
    declare_rpc_exchange(channel).await?;
    channel
        .queue_declare(REPLY_QUEUE, QueueDeclareOptions::default(), FieldTable::default())
        .await?;
    channel
        .queue_bind(
            REPLY_QUEUE,
            EXCHANGE,
            REPLY_ROUTING_KEY,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;
    Ok(REPLY_QUEUE.to_string())
}

/// Declare an anonymous auto-delete queue bound to the command fan-out.
pub async fn declare_cmd_queue(channel: &Channel) -> Result<String, BrokerError> {
    declare_cmd_exchange(channel).await?;
    let queue = channel
        .queue_declare(
            "",
            QueueDeclareOptions { exclusive: true, auto_delete: true, ..Default::default() },
            FieldTable::default(),
        )
        .await?;
    let name = queue.name().as_str().to_string();
    channel
        .queue_bind(
            &name,
            CMD_EXCHANGE,
            CMD_ROUTING_KEY,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;
    Ok(name)
}

#[cfg(test)]
#[path = "topology_tests.rs"]
mod tests;
