// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario tree model and execution semantics.

use crate::locker::LockerSpec;
use async_trait::async_trait;
use atlas_core::{LockId, LockKind, TaskPayload};
use futures_util::future::{join_all, BoxFuture};

/// Raised when a locker cannot acquire its rows.
#[derive(Debug, thiserror::Error)]
#[error("lock acquisition failed: {0}")]
pub struct AcquireError(pub String);

/// The seam a scenario executes against.
///
/// Implemented by the task manager's per-task context: leaves dispatch RPC
/// steps, lockers acquire and release history rows, and the root reports
/// scenario completion.
#[async_trait]
pub trait ScenarioDriver: Send + Sync {
    /// Dispatch one leaf step and await its boolean outcome.
    async fn run_request(&self, routing_key: &str) -> bool;

    /// Acquire the selected resources; the returned lock id is attached to
    /// the task input until released.
    async fn acquire(
        &self,
        spec: &LockerSpec,
    ) -> Result<LockId, AcquireError>;

    /// Release a held lock. `success` decides whether the underlying
    /// history rows are consumed or returned to the pool.
    async fn release(&self, lock_id: LockId, success: bool);

    /// The scenario tree finished executing.
    async fn task_closed(&self);
}

/// Expected payload shape of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Cells,
    Rect,
}

atlas_core::simple_display! {
    InputType {
        Cells => "cells",
        Rect => "rect",
    }
}

impl InputType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cells" => Some(Self::Cells),
            "rect" => Some(Self::Rect),
            _ => None,
        }
    }
}

/// Payload validation failures, reported before a task starts.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InputError {
    #[error("task input must contain a rect")]
    MissingRect,
    #[error("task input rect is degenerate or out of bounds")]
    InvalidRect,
    #[error("task input must contain a non-empty cell list")]
    MissingCells,
}

/// How a group runs its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    Consequent,
    Concurrent,
}

atlas_core::simple_display! {
    GroupMode {
        Consequent => "consequent",
        Concurrent => "concurrent",
    }
}

/// Inner tree node: a nested group or a `run` leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Group(GroupNode),
    Run(String),
}

impl Node {
    fn execute<'a>(&'a self, driver: &'a dyn ScenarioDriver) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            match self {
                Node::Run(routing_key) => driver.run_request(routing_key).await,
                Node::Group(group) => group.execute(driver).await,
            }
        })
    }

    fn collect_routing_keys<'a>(&'a self, keys: &mut Vec<&'a str>) {
        match self {
            Node::Run(routing_key) => keys.push(routing_key),
            Node::Group(group) => {
                for child in &group.children {
                    child.collect_routing_keys(keys);
                }
            }
        }
    }
}

/// Group-execution node with an optional lock scope.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupNode {
    pub mode: GroupMode,
    pub locker: Option<LockerSpec>,
    pub children: Vec<Node>,
}

impl GroupNode {
    /// Lock (if any), run children per mode, release with the group outcome.
    ///
    /// Consequent stops at the first failing child; concurrent awaits all
    /// children and succeeds iff every child succeeded. A failed lock
    /// acquisition fails the group without touching any child.
    pub async fn execute(&self, driver: &dyn ScenarioDriver) -> bool {
        let lock_id = match &self.locker {
            None => None,
            Some(spec) => match driver.acquire(spec).await {
                Ok(id) => Some(id),
                Err(err) => {
                    tracing::error!(locker = %spec, error = %err, "group lock failed");
                    return false;
                }
            },
        };

        let success = match self.mode {
            GroupMode::Consequent => {
                let mut success = true;
                for child in &self.children {
                    if !child.execute(driver).await {
                        success = false;
                        break;
                    }
                }
                success
            }
            GroupMode::Concurrent => {
                let results =
                    join_all(self.children.iter().map(|child| child.execute(driver))).await;
                results.into_iter().all(|ok| ok)
            }
        };

        if let Some(id) = lock_id {
            driver.release(id, success).await;
        }
        success
    }
}

/// Scenario root: a name, the expected input type, one group child.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub input_type: InputType,
    pub root: GroupNode,
}

impl Scenario {
    /// Validate a submission payload against the scenario's input type.
    pub fn check_input(&self, payload: &TaskPayload) -> Result<(), InputError> {
        match self.input_type {
            InputType::Rect => match &payload.rect {
                None => Err(InputError::MissingRect),
                Some(rect) if !rect.is_valid() => Err(InputError::InvalidRect),
                Some(_) => Ok(()),
            },
            InputType::Cells => match &payload.cells {
                Some(cells) if !cells.is_empty() => Ok(()),
                _ => Err(InputError::MissingCells),
            },
        }
    }

    /// Execute the tree and notify the driver that the task is closed.
    pub async fn execute(&self, driver: &dyn ScenarioDriver) -> bool {
        let success = self.root.execute(driver).await;
        driver.task_closed().await;
        success
    }

    /// Every routing key referenced by a `run` leaf, in document order.
    pub fn routing_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        for child in &self.root.children {
            child.collect_routing_keys(&mut keys);
        }
        keys
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
