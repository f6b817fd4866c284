// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task execution context: the scenario's view of the scheduler.

use crate::manager::ManagerInner;
use async_trait::async_trait;
use atlas_core::{InputProducer, LockId, LockKind, TaskId, TaskPayload};
use atlas_locks::LockedData;
use atlas_scenario::{AcquireError, LockerSpec, ScenarioDriver};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Bridges one running scenario tree to the task manager.
///
/// Holds the task's input producer and the locks currently attached to it;
/// lockers `begin`/`end` through [`ScenarioDriver::acquire`] and
/// [`ScenarioDriver::release`].
pub(crate) struct TaskContext {
    manager: Arc<ManagerInner>,
    task_id: TaskId,
    producer: Mutex<InputProducer>,
    held: Mutex<HashMap<LockId, LockedData>>,
}

impl TaskContext {
    pub(crate) fn new(manager: Arc<ManagerInner>, task_id: TaskId, payload: TaskPayload) -> Self {
        Self {
            manager,
            task_id,
            producer: Mutex::new(InputProducer::new(payload)),
            held: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ScenarioDriver for TaskContext {
    async fn run_request(&self, routing_key: &str) -> bool {
        let input = self.producer.lock().make_task_input();
        Arc::clone(&self.manager).run_request(self.task_id, routing_key, input).await
    }

    async fn acquire(&self, spec: &LockerSpec) -> Result<LockId, AcquireError> {
        let locked = match spec.kind {
            LockKind::Cells => self.manager.locks.get_affected_cells(&spec.resources).await,
            LockKind::Objects => self.manager.locks.get_affected_objects(&spec.resources).await,
        }
        .map_err(|err| {
            self.manager.events.error(&format!(
                "task {}: lock acquisition failed: {err}",
                self.task_id.short()
            ));
            AcquireError(err.to_string())
        })?;

        let lock_id = locked.lock_id();
        tracing::info!(
            task = %self.task_id.short(),
            %lock_id,
            locker = %spec,
            empty = locked.is_empty(),
            "lock acquired"
        );
        self.producer.lock().attach(lock_id, locked.view());
        self.held.lock().insert(lock_id, locked);
        Ok(lock_id)
    }

    async fn release(&self, lock_id: LockId, success: bool) {
        self.producer.lock().detach(lock_id);
        let locked = self.held.lock().remove(&lock_id);
        match locked {
            Some(locked) => {
                if let Err(err) = locked.unlock(success).await {
                    self.manager.events.error(&format!(
                        "task {}: lock {lock_id} release failed: {err}",
                        self.task_id.short()
                    ));
                }
            }
            None => {
                tracing::warn!(%lock_id, "release of a lock this task does not hold");
            }
        }
    }

    async fn task_closed(&self) {
        self.manager.notify_task_closed(self.task_id);
    }
}
