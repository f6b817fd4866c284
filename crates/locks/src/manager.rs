// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactional lock acquisition against the edit-history table.

use crate::locked::{group_rows, LockedData};
use crate::LockError;
use atlas_core::{IlSubtype, LockId, LockKind, ObjectType, ResourceSelector};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// One row of `edit_history_transient`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct HistoryRow {
    pub id: i64,
    pub qtree_id: i64,
    pub type_id: i16,
    pub subtype_id: Option<i16>,
    pub changed: DateTime<Utc>,
    pub lock_id: i64,
}

// The UPDATE filters on `lock_id = 0`, so two concurrent acquisitions can
// never own the same row: whichever statement runs first takes it, the
// other sees it locked.
const ACQUIRE_SQL: &str = r#"
WITH updated AS (
    UPDATE edit_history_transient
       SET lock_id = $1
     WHERE lock_id = 0
       AND ( (type_id, subtype_id) IN (SELECT t, s FROM UNNEST($2::int2[], $3::int2[]) AS u(t, s))
             OR type_id = ANY($4::int2[]) )
 RETURNING id, qtree_id, type_id, subtype_id, changed, lock_id
)
SELECT id, qtree_id, type_id, subtype_id, changed, lock_id FROM updated
"#;

const RESET_SQL: &str = "UPDATE edit_history_transient SET lock_id = 0 WHERE lock_id <> 0";

const RELEASE_CONSUME_SQL: &str = "DELETE FROM edit_history_transient WHERE lock_id = $1";

const RELEASE_FREE_SQL: &str =
    "UPDATE edit_history_transient SET lock_id = 0 WHERE lock_id = $1";

/// Pool plus the lock-id counter, shared by every handle.
pub(crate) struct LockCore {
    pool: PgPool,
    next_lock: AtomicI64,
}

impl LockCore {
    /// Release a lock: consume the owned rows on success, free them
    /// otherwise so the pending edits stay visible to a future task.
    pub(crate) async fn release(&self, lock_id: LockId, success: bool) -> Result<(), LockError> {
        let sql = if success { RELEASE_CONSUME_SQL } else { RELEASE_FREE_SQL };
        let result = sqlx::query(sql).bind(lock_id.0).execute(&self.pool).await?;
        tracing::debug!(
            %lock_id,
            success,
            rows = result.rows_affected(),
            "released edit lock"
        );
        Ok(())
    }
}

/// Hands out [`LockedData`] over history rows.
///
/// Cheap to clone; all handles share one pool and one monotone lock-id
/// counter. Rows left locked by a dead scheduler are freed by
/// [`reset_stale_locks`](Self::reset_stale_locks) at startup.
#[derive(Clone)]
pub struct EditLockManager {
    inner: Arc<LockCore>,
}

impl EditLockManager {
    pub fn new(pool: PgPool) -> Self {
        Self { inner: Arc::new(LockCore { pool, next_lock: AtomicI64::new(1) }) }
    }

    /// Free every row still carrying a lock id. Returns the row count.
    pub async fn reset_stale_locks(&self) -> Result<u64, LockError> {
        let result = sqlx::query(RESET_SQL).execute(&self.inner.pool).await?;
        let freed = result.rows_affected();
        if freed > 0 {
            tracing::warn!(rows = freed, "reset stale edit locks");
        }
        Ok(freed)
    }

    /// Lock every free cell row matching the selectors.
    pub async fn get_affected_cells(
        &self,
        selectors: &[ResourceSelector],
    ) -> Result<LockedData, LockError> {
        self.acquire(LockKind::Cells, selectors).await
    }

    /// Lock every free object row matching the selectors.
    pub async fn get_affected_objects(
        &self,
        selectors: &[ResourceSelector],
    ) -> Result<LockedData, LockError> {
        self.acquire(LockKind::Objects, selectors).await
    }

    async fn acquire(
        &self,
        kind: LockKind,
        selectors: &[ResourceSelector],
    ) -> Result<LockedData, LockError> {
        let lock_id = LockId(self.inner.next_lock.fetch_add(1, Ordering::SeqCst));
        let (pair_types, pair_subtypes, bare_types) = split_selectors(selectors);

        let rows: Vec<HistoryRow> = sqlx::query_as(ACQUIRE_SQL)
            .bind(lock_id.0)
            .bind(&pair_types)
            .bind(&pair_subtypes)
            .bind(&bare_types)
            .fetch_all(&self.inner.pool)
            .await?;

        tracing::debug!(%lock_id, %kind, rows = rows.len(), "acquired edit lock");
        Ok(LockedData::new(lock_id, kind, group_rows(&rows), Arc::clone(&self.inner)))
    }
}

/// Expand selectors into the bind arrays of [`ACQUIRE_SQL`]: explicit
/// `(type, subtype)` pairs plus bare types that match every subtype.
fn split_selectors(selectors: &[ResourceSelector]) -> (Vec<i16>, Vec<i16>, Vec<i16>) {
    let mut pair_types = Vec::new();
    let mut pair_subtypes = Vec::new();
    let mut bare_types = Vec::new();

    for selector in selectors {
        let type_code = u8::from(selector.object_type) as i16;
        match &selector.subtypes {
            None => bare_types.push(type_code),
            Some(subtypes) => {
                for subtype in subtypes {
                    pair_types.push(type_code);
                    pair_subtypes.push(u8::from(*subtype) as i16);
                }
            }
        }
    }
    (pair_types, pair_subtypes, bare_types)
}

/// Decode a row's taxonomy codes. Rows with codes this build does not know
/// are skipped (a newer editor may have written them).
pub(crate) fn decode_row(row: &HistoryRow) -> Option<(ObjectType, Option<IlSubtype>)> {
    let object_type = ObjectType::try_from(u8::try_from(row.type_id).ok()?).ok()?;
    let subtype = match row.subtype_id {
        None => None,
        Some(code) => Some(IlSubtype::try_from(u8::try_from(code).ok()?).ok()?),
    };
    Some((object_type, subtype))
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
