// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! atlas-locks: edit-lock manager.
//!
//! Guards concurrent landscape edits through the shared
//! `edit_history_transient` table: acquiring a lock atomically stamps a
//! fresh lock id into every matching free row, releasing either consumes
//! the rows (success) or frees them again for a later edit.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod locked;
mod manager;

pub use locked::LockedData;
pub use manager::{EditLockManager, HistoryRow};

/// Errors surfaced by the edit-lock manager.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("history database error: {0}")]
    Db(#[from] sqlx::Error),
}
