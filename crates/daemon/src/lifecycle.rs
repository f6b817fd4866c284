// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup wiring and shutdown.

use crate::event_log::EventLog;
use crate::manager::TaskManager;
use crate::registry::CorrelationRegistry;
use crate::rpc_client::BrokerRpcClient;
use crate::store::EventStore;
use crate::SchedulerError;
use atlas_broker::{BrokerAdapter, ConsumeSpec};
use atlas_core::ServiceConfig;
use atlas_locks::EditLockManager;
use atlas_scenario::ScenarioProvider;
use atlas_worker::HandlerCatalog;
use fs2::FileExt;
use sqlx::postgres::PgPoolOptions;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Take the single-instance lock. The returned file must stay alive for
/// the daemon's lifetime; dropping it releases the lock.
pub fn acquire_lock_file(path: &Path) -> Result<std::fs::File, SchedulerError> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    file.try_lock_exclusive()?;
    Ok(file)
}

/// A fully wired scheduler.
pub struct Daemon {
    manager: TaskManager,
    events: Arc<EventLog>,
    store: EventStore,
    reply_pump: JoinHandle<()>,
}

impl Daemon {
    /// Load the scenario DB, connect broker and databases, reset stale edit
    /// locks and start the reply pump. Fails fast: a missing collaborator
    /// at startup is a configuration problem, not something to retry into.
    pub async fn start(
        config: &ServiceConfig,
        catalog: Arc<HandlerCatalog>,
    ) -> Result<Self, SchedulerError> {
        let provider = ScenarioProvider::load(&config.scenario_db, catalog.as_ref())?;

        let adapter = BrokerAdapter::connect(&config.amqp_url).await?;

        let history_pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&config.history_db)
            .await?;
        let locks = EditLockManager::new(history_pool);
        locks.reset_stale_locks().await?;

        let store = EventStore::open(&config.log_db).await?;
        let events = EventLog::with_store(store.clone());

        let registry = Arc::new(CorrelationRegistry::new());
        let rpc = Arc::new(BrokerRpcClient::new(
            adapter.clone(),
            Arc::clone(&registry),
            Arc::clone(&catalog),
        ));

        let manager = TaskManager::new(
            config.timeouts(),
            provider,
            catalog,
            rpc,
            registry,
            locks,
            Arc::clone(&events),
        );

        let reply_pump = spawn_reply_pump(adapter, manager.clone()).await?;

        tracing::info!("scheduler ready");
        Ok(Self { manager, events, store, reply_pump })
    }

    pub fn manager(&self) -> &TaskManager {
        &self.manager
    }

    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    /// Store handle for observer back-fill queries.
    pub fn event_store(&self) -> &EventStore {
        &self.store
    }

    /// Stop the reply pump and flush the event log.
    pub async fn shutdown(self) {
        self.reply_pump.abort();
        self.events.close().await;
        tracing::info!("scheduler stopped");
    }
}

/// Consume the reply queue and feed every body into the task manager.
async fn spawn_reply_pump(
    adapter: BrokerAdapter,
    manager: TaskManager,
) -> Result<JoinHandle<()>, SchedulerError> {
    let mut stream = adapter.consume(ConsumeSpec::ReplyQueue, "scheduler-replies").await?;
    Ok(tokio::spawn(async move {
        loop {
            match stream.next().await {
                Some(Ok(message)) => {
                    manager
                        .dispatch_reply(&message.body, message.correlation_id.as_deref())
                        .await;
                }
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "reply delivery failed");
                }
                None => {
                    tracing::warn!("reply stream ended, re-consuming");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    match adapter.consume(ConsumeSpec::ReplyQueue, "scheduler-replies").await {
                        Ok(new_stream) => stream = new_stream,
                        Err(err) => tracing::error!(error = %err, "reply re-consume failed"),
                    }
                }
            }
        }
    }))
}
