// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task input: the value a worker receives for one step.
//!
//! The [`InputProducer`] merges the task's initial payload with the views of
//! every currently-held lock; each step dispatch snapshots the merge into a
//! [`TaskInput`].

use crate::geo::{QCell, Rect};
use crate::id::LockId;
use crate::objects::{IlSubtype, ObjectType};
use crate::payload::TaskPayload;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Which resource a lock covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Cells,
    Objects,
}

crate::simple_display! {
    LockKind {
        Cells => "cells",
        Objects => "objects",
    }
}

/// Snapshot of the rows one lock acquisition owns, grouped for merging.
///
/// Values are raw cell indices for `Cells` locks and object ids for
/// `Objects` locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedView {
    pub kind: LockKind,
    pub entries: BTreeMap<(ObjectType, Option<IlSubtype>), Vec<i64>>,
}

impl LockedView {
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|v| v.is_empty())
    }
}

/// One `(type, subtype, ids)` group of a task input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockedEntry(pub ObjectType, pub Option<IlSubtype>, pub Vec<i64>);

/// The merged value presented to a worker for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cells: Option<Vec<QCell>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locked_cells: Vec<LockedEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locked_objects: Vec<LockedEntry>,
}

impl TaskInput {
    pub fn cells_by_type(&self, obj_type: ObjectType) -> Vec<QCell> {
        Self::by_type(&self.locked_cells, obj_type)
            .filter_map(|raw| QCell::from_raw_index(raw).ok())
            .collect()
    }

    pub fn cells_by_subtype(&self, obj_type: ObjectType, subtype: IlSubtype) -> Vec<QCell> {
        Self::by_subtype(&self.locked_cells, obj_type, subtype)
            .filter_map(|raw| QCell::from_raw_index(raw).ok())
            .collect()
    }

    pub fn objects_by_type(&self, obj_type: ObjectType) -> Vec<i64> {
        Self::by_type(&self.locked_objects, obj_type).collect()
    }

    pub fn objects_by_subtype(&self, obj_type: ObjectType, subtype: IlSubtype) -> Vec<i64> {
        Self::by_subtype(&self.locked_objects, obj_type, subtype).collect()
    }

    fn by_type(entries: &[LockedEntry], obj_type: ObjectType) -> impl Iterator<Item = i64> + '_ {
        entries
            .iter()
            .filter(move |entry| entry.0 == obj_type)
            .flat_map(|entry| entry.2.iter().copied())
    }

    fn by_subtype(
        entries: &[LockedEntry],
        obj_type: ObjectType,
        subtype: IlSubtype,
    ) -> impl Iterator<Item = i64> + '_ {
        entries
            .iter()
            .filter(move |entry| entry.0 == obj_type && entry.1 == Some(subtype))
            .flat_map(|entry| entry.2.iter().copied())
    }
}

/// Builds [`TaskInput`] values from the initial payload plus attached locks.
#[derive(Debug)]
pub struct InputProducer {
    payload: TaskPayload,
    locked: HashMap<LockId, LockedView>,
}

impl InputProducer {
    pub fn new(payload: TaskPayload) -> Self {
        Self { payload, locked: HashMap::new() }
    }

    pub fn username(&self) -> &str {
        &self.payload.username
    }

    pub fn attach(&mut self, lock_id: LockId, view: LockedView) {
        self.locked.insert(lock_id, view);
    }

    pub fn detach(&mut self, lock_id: LockId) {
        self.locked.remove(&lock_id);
    }

    /// Merge payload and lock views. Groups sharing a `(type, subtype)` key
    /// are unioned and deduplicated.
    pub fn make_task_input(&self) -> TaskInput {
        TaskInput {
            username: self.payload.username.clone(),
            rect: self.payload.rect,
            cells: self.payload.cells.clone(),
            locked_cells: self.merge(LockKind::Cells),
            locked_objects: self.merge(LockKind::Objects),
        }
    }

    fn merge(&self, kind: LockKind) -> Vec<LockedEntry> {
        let mut merged: BTreeMap<(ObjectType, Option<IlSubtype>), BTreeSet<i64>> = BTreeMap::new();
        for view in self.locked.values().filter(|view| view.kind == kind) {
            for (key, ids) in &view.entries {
                merged.entry(*key).or_default().extend(ids.iter().copied());
            }
        }
        merged
            .into_iter()
            .map(|((obj_type, subtype), ids)| {
                LockedEntry(obj_type, subtype, ids.into_iter().collect())
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "input_tests.rs"]
mod tests;
