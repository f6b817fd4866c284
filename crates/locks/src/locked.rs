// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handles to acquired history rows.

use crate::manager::{decode_row, HistoryRow, LockCore};
use crate::LockError;
use atlas_core::{IlSubtype, LockId, LockKind, LockedView, ObjectType};
use std::collections::BTreeMap;
use std::sync::Arc;

type Groups = BTreeMap<(ObjectType, Option<IlSubtype>), Vec<i64>>;

/// Group acquired rows by `(type, subtype)` into sorted id lists.
pub(crate) fn group_rows(rows: &[HistoryRow]) -> Groups {
    let mut groups: Groups = BTreeMap::new();
    for row in rows {
        let Some(key) = decode_row(row) else {
            tracing::warn!(
                row = row.id,
                type_id = row.type_id,
                subtype_id = row.subtype_id,
                "skipping history row with unknown taxonomy codes"
            );
            continue;
        };
        groups.entry(key).or_default().push(row.qtree_id);
    }
    for ids in groups.values_mut() {
        ids.sort_unstable();
    }
    groups
}

/// A set of history rows owned by one lock id.
///
/// The rows stay stamped with the lock id until [`unlock`](Self::unlock);
/// success deletes them, failure frees them for re-locking.
pub struct LockedData {
    lock_id: LockId,
    kind: LockKind,
    groups: Groups,
    core: Arc<LockCore>,
}

impl LockedData {
    pub(crate) fn new(
        lock_id: LockId,
        kind: LockKind,
        groups: Groups,
        core: Arc<LockCore>,
    ) -> Self {
        Self { lock_id, kind, groups, core }
    }

    pub fn lock_id(&self) -> LockId {
        self.lock_id
    }

    pub fn kind(&self) -> LockKind {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(|ids| ids.is_empty())
    }

    /// Snapshot for merging into task inputs.
    pub fn view(&self) -> LockedView {
        LockedView { kind: self.kind, entries: self.groups.clone() }
    }

    /// Release the underlying rows. Consumes the handle: a lock can only be
    /// released once.
    pub async fn unlock(self, success: bool) -> Result<(), LockError> {
        self.core.release(self.lock_id, success).await
    }
}

impl std::fmt::Debug for LockedData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedData")
            .field("lock_id", &self.lock_id)
            .field("kind", &self.kind)
            .field("groups", &self.groups)
            .finish()
    }
}
