// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Correlation registry: request ids → in-flight reply channels.

use atlas_core::{RequestId, TaskId};
use atlas_wire::Reply;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Result of routing one reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Routed,
    Unknown,
}

struct Entry {
    task_id: TaskId,
    tx: mpsc::UnboundedSender<Reply>,
}

/// Maps correlation ids to the unbounded channels their step drivers await.
///
/// The broker callback writes into the channel; the driver reads on its own
/// task. Entries are non-owning: the driver drops its receiver when the
/// step ends and the entry is removed.
#[derive(Default)]
pub struct CorrelationRegistry {
    entries: Mutex<HashMap<RequestId, Entry>>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh request; the returned receiver is the step driver's
    /// end of the reply channel.
    pub fn register(
        &self,
        request_id: RequestId,
        task_id: TaskId,
    ) -> mpsc::UnboundedReceiver<Reply> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.entries.lock().insert(request_id, Entry { task_id, tx });
        rx
    }

    /// Route a reply into its request's channel.
    pub fn route(&self, reply: &Reply) -> RouteOutcome {
        let mut entries = self.entries.lock();
        match entries.get(&reply.request_id) {
            None => RouteOutcome::Unknown,
            Some(entry) => {
                if entry.tx.send(reply.clone()).is_err() {
                    // Driver is gone; the entry is stale
                    entries.remove(&reply.request_id);
                    return RouteOutcome::Unknown;
                }
                RouteOutcome::Routed
            }
        }
    }

    /// Inject a synthetic reply (tear-down path). Same delivery mechanism
    /// as [`route`](Self::route), named for intent.
    pub fn inject(&self, reply: Reply) -> RouteOutcome {
        self.route(&reply)
    }

    pub fn task_of(&self, request_id: RequestId) -> Option<TaskId> {
        self.entries.lock().get(&request_id).map(|entry| entry.task_id)
    }

    pub fn drop_request(&self, request_id: RequestId) {
        self.entries.lock().remove(&request_id);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
