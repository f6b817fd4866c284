// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable event store (embedded SQLite).

use atlas_core::EventKind;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS event (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    username   TEXT    NOT NULL DEFAULT '',
    created    TEXT    NOT NULL,
    event_type INTEGER NOT NULL,
    status     INTEGER NOT NULL DEFAULT 0,
    json_data  TEXT    NOT NULL
)
"#;

/// One completed event on its way into the store.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub username: String,
    pub created: DateTime<Utc>,
    pub event_type: EventKind,
    pub status: u8,
    pub json_data: String,
}

/// One persisted row, as served to back-fill queries.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredEvent {
    pub id: i64,
    pub username: String,
    pub created: String,
    pub event_type: i64,
    pub status: i64,
    pub json_data: String,
}

/// Append-only store of completed events.
#[derive(Clone)]
pub struct EventStore {
    pool: SqlitePool,
}

impl EventStore {
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
        Self::with_options(options).await
    }

    /// In-memory store, for tests and ephemeral runs.
    pub async fn open_in_memory() -> Result<Self, sqlx::Error> {
        Self::with_options(SqliteConnectOptions::from_str("sqlite::memory:")?).await
    }

    async fn with_options(options: SqliteConnectOptions) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Insert one batch inside a transaction.
    pub async fn insert_batch(&self, records: &[EventRecord]) -> Result<(), sqlx::Error> {
        if records.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                "INSERT INTO event (username, created, event_type, status, json_data) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&record.username)
            .bind(record.created.to_rfc3339())
            .bind(record.event_type.code() as i64)
            .bind(record.status as i64)
            .bind(&record.json_data)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        tracing::trace!(count = records.len(), "events persisted");
        Ok(())
    }

    /// Newest-first page of history: rows with `id < less_than` (all rows
    /// when `None`), at most `limit`.
    pub async fn load_page(
        &self,
        less_than: Option<i64>,
        limit: i64,
    ) -> Result<Vec<StoredEvent>, sqlx::Error> {
        let rows = match less_than {
            Some(bound) => {
                sqlx::query_as::<_, StoredEvent>(
                    "SELECT id, username, created, event_type, status, json_data \
                     FROM event WHERE id < ? ORDER BY id DESC LIMIT ?",
                )
                .bind(bound)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, StoredEvent>(
                    "SELECT id, username, created, event_type, status, json_data \
                     FROM event ORDER BY id DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
