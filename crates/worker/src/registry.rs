// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static handler registry.
//!
//! Binaries build the catalog once at startup and install it process-wide;
//! nothing rebinds it afterwards. Both sides use it: workers resolve
//! handlers to run, the scheduler resolves heartbeat timeouts and validates
//! scenario routing keys.

use crate::handler::JobHandler;
use crate::WorkerError;
use atlas_core::TaskInput;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

pub type HandlerFactory = fn() -> Arc<dyn JobHandler>;
pub type InputValidator = fn(&TaskInput) -> Result<(), String>;

/// Registration of one routing key.
#[derive(Clone)]
pub struct HandlerDescriptor {
    pub routing_key: &'static str,
    pub factory: HandlerFactory,
    /// Maximum silence between replies before the scheduler fails the step.
    pub heartbeat_timeout: Duration,
    /// Whether a close command raises inside the handler on the next
    /// publish, instead of only setting the cooperative flag.
    pub raise_on_close: bool,
    pub validator: Option<InputValidator>,
}

impl std::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("routing_key", &self.routing_key)
            .field("heartbeat_timeout", &self.heartbeat_timeout)
            .field("raise_on_close", &self.raise_on_close)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// All registered handlers, keyed by routing key.
#[derive(Debug, Default)]
pub struct HandlerCatalog {
    entries: HashMap<&'static str, HandlerDescriptor>,
}

impl HandlerCatalog {
    pub fn builder() -> HandlerCatalogBuilder {
        HandlerCatalogBuilder { entries: HashMap::new() }
    }

    pub fn contains(&self, routing_key: &str) -> bool {
        self.entries.contains_key(routing_key)
    }

    pub fn get(&self, routing_key: &str) -> Option<&HandlerDescriptor> {
        self.entries.get(routing_key)
    }

    pub fn heartbeat_timeout(&self, routing_key: &str) -> Option<Duration> {
        self.entries.get(routing_key).map(|d| d.heartbeat_timeout)
    }

    pub fn routing_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl atlas_scenario::RoutingCatalog for HandlerCatalog {
    fn contains_key(&self, routing_key: &str) -> bool {
        self.contains(routing_key)
    }
}

pub struct HandlerCatalogBuilder {
    entries: HashMap<&'static str, HandlerDescriptor>,
}

impl HandlerCatalogBuilder {
    pub fn register(mut self, descriptor: HandlerDescriptor) -> Result<Self, WorkerError> {
        if self.entries.contains_key(descriptor.routing_key) {
            return Err(WorkerError::DuplicateHandler(descriptor.routing_key.to_string()));
        }
        tracing::debug!(routing_key = descriptor.routing_key, "registered RPC handler");
        self.entries.insert(descriptor.routing_key, descriptor);
        Ok(self)
    }

    pub fn build(self) -> HandlerCatalog {
        HandlerCatalog { entries: self.entries }
    }
}

static CATALOG: OnceLock<Arc<HandlerCatalog>> = OnceLock::new();

/// Install the process-wide catalog. Callable once.
pub fn install_catalog(catalog: HandlerCatalog) -> Result<Arc<HandlerCatalog>, WorkerError> {
    let catalog = Arc::new(catalog);
    CATALOG.set(Arc::clone(&catalog)).map_err(|_| WorkerError::CatalogInstalled)?;
    Ok(catalog)
}

/// The installed catalog, if any.
pub fn global_catalog() -> Option<Arc<HandlerCatalog>> {
    CATALOG.get().cloned()
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
