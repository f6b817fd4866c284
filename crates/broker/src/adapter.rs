// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection management, publishing and consuming.

use crate::{topology, BrokerError};
use atlas_core::RequestId;
use futures_util::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Connection attempts before the adapter reports itself closed.
const CONNECT_ATTEMPTS: u32 = 3;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// What a consumer binds to. The adapter (re)declares the topology before
/// consuming, so a fresh broker works out of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeSpec<'a> {
    /// Work queue of one routing key; prefetch 1, manual ack.
    WorkQueue { routing_key: &'a str },
    /// The scheduler's reply queue; auto-ack.
    ReplyQueue,
    /// Anonymous auto-delete queue on the command fan-out; auto-ack.
    CommandQueue,
}

/// Shared AMQP connection with transparent reconnect.
#[derive(Clone)]
pub struct BrokerAdapter {
    inner: Arc<AdapterInner>,
}

struct AdapterInner {
    url: String,
    channel: Mutex<Option<Channel>>,
    running: AtomicBool,
}

impl BrokerAdapter {
    /// Connect eagerly. Startup fails fast when the broker is unreachable.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let adapter = Self {
            inner: Arc::new(AdapterInner {
                url: url.to_string(),
                channel: Mutex::new(None),
                running: AtomicBool::new(false),
            }),
        };
        adapter.reconnect().await?;
        Ok(adapter)
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Current channel, reconnecting if the old one died.
    async fn channel(&self) -> Result<Channel, BrokerError> {
        {
            let guard = self.inner.channel.lock();
            if let Some(channel) = guard.as_ref() {
                if channel.status().connected() {
                    return Ok(channel.clone());
                }
            }
        }
        self.reconnect().await
    }

    async fn reconnect(&self) -> Result<Channel, BrokerError> {
        let mut last_err = BrokerError::NotRunning;
        for attempt in 1..=CONNECT_ATTEMPTS {
            match Self::open_channel(&self.inner.url).await {
                Ok(channel) => {
                    *self.inner.channel.lock() = Some(channel.clone());
                    self.inner.running.store(true, Ordering::SeqCst);
                    if attempt > 1 {
                        tracing::info!(attempt, "broker connection re-established");
                    }
                    return Ok(channel);
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "broker connection failed");
                    last_err = err;
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
        self.inner.running.store(false, Ordering::SeqCst);
        Err(last_err)
    }

    async fn open_channel(url: &str) -> Result<Channel, BrokerError> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel.confirm_select(ConfirmSelectOptions::default()).await?;
        Ok(channel)
    }

    /// Publish one confirmed message.
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        correlation_id: RequestId,
        reply_to: Option<&str>,
        body: &[u8],
    ) -> Result<(), BrokerError> {
        let channel = self.channel().await?;

        let mut properties = BasicProperties::default()
            .with_content_type(ShortString::from("application/json"))
            .with_correlation_id(ShortString::from(correlation_id.to_string()));
        if let Some(route) = reply_to {
            properties = properties.with_reply_to(ShortString::from(route.to_string()));
        }

        let confirm = channel
            .basic_publish(exchange, routing_key, BasicPublishOptions::default(), body, properties)
            .await?
            .await?;
        if matches!(confirm, Confirmation::Nack(_)) {
            return Err(BrokerError::Nack);
        }
        Ok(())
    }

    /// Start consuming. Declares the queue's topology first.
    pub async fn consume(
        &self,
        spec: ConsumeSpec<'_>,
        consumer_tag: &str,
    ) -> Result<MessageStream, BrokerError> {
        let channel = self.channel().await?;

        let (queue, manual_ack) = match spec {
            ConsumeSpec::WorkQueue { routing_key } => {
                channel.basic_qos(topology::PREFETCH_COUNT, BasicQosOptions::default()).await?;
                (topology::declare_work_queue(&channel, routing_key).await?, true)
            }
            ConsumeSpec::ReplyQueue => (topology::declare_reply_queue(&channel).await?, false),
            ConsumeSpec::CommandQueue => (topology::declare_cmd_queue(&channel).await?, false),
        };

        let consumer = channel
            .basic_consume(
                &queue,
                consumer_tag,
                BasicConsumeOptions { no_ack: !manual_ack, ..Default::default() },
                FieldTable::default(),
            )
            .await?;

        tracing::debug!(queue = %queue, consumer_tag, "consuming");
        Ok(MessageStream { consumer, manual_ack })
    }
}

/// Stream of deliveries from one queue.
pub struct MessageStream {
    consumer: lapin::Consumer,
    manual_ack: bool,
}

impl MessageStream {
    /// Next delivery; `None` when the consumer is cancelled or the channel
    /// closed (the caller decides whether to re-consume).
    pub async fn next(&mut self) -> Option<Result<BrokerMessage, BrokerError>> {
        let delivery = self.consumer.next().await?;
        Some(delivery.map_err(BrokerError::from).map(|delivery| BrokerMessage {
            body: delivery.data,
            correlation_id: delivery
                .properties
                .correlation_id()
                .as_ref()
                .map(|s| s.as_str().to_string()),
            reply_to: delivery.properties.reply_to().as_ref().map(|s| s.as_str().to_string()),
            acker: self.manual_ack.then_some(delivery.acker),
        }))
    }
}

/// One delivery, with its routing metadata and (for work queues) its acker.
pub struct BrokerMessage {
    pub body: Vec<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    acker: Option<Acker>,
}

impl BrokerMessage {
    /// Acknowledge the delivery. No-op for auto-ack queues.
    pub async fn ack(&mut self) -> Result<(), BrokerError> {
        if let Some(acker) = self.acker.take() {
            acker.ack(BasicAckOptions::default()).await?;
        }
        Ok(())
    }
}
