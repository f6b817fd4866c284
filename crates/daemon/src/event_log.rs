// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory event log with subscriber fan-out and batched persistence.
//!
//! Every state change re-emits the subject's full document to subscribers.
//! Documents stay in memory while their subject is active; completed
//! documents are flushed to the durable store in insertion order, in
//! batches of [`GROUP_SIZE`] (or on shutdown). An event is only flushed
//! once everything inserted before it has completed, so the store keeps
//! the emission order.

use crate::store::{EventRecord, EventStore};
use atlas_core::{
    close_request_descriptor, message_descriptor, task_descriptor, CloseRequest, EventKind,
    EventLevel, TaskData, TaskId,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Completed events per store write.
pub const GROUP_SIZE: usize = 50;

struct ActiveEvent {
    created: DateTime<Utc>,
    kind: EventKind,
    username: String,
    status: u8,
    /// Task or close-request uuid this document tracks; `None` for plain
    /// message events.
    subject: Option<String>,
    doc: Value,
    completed: bool,
}

impl ActiveEvent {
    fn rendered(&self) -> String {
        let mut doc = self.doc.clone();
        if let Some(object) = doc.as_object_mut() {
            object.insert("created".into(), Value::String(self.created.to_rfc3339()));
            object.insert("id".into(), Value::from(0));
        }
        doc.to_string()
    }

    fn to_record(&self) -> EventRecord {
        EventRecord {
            username: self.username.clone(),
            created: self.created,
            event_type: self.kind,
            status: self.status,
            json_data: self.rendered(),
        }
    }
}

#[derive(Default)]
struct LogInner {
    active: VecDeque<ActiveEvent>,
    pending: Vec<EventRecord>,
    subscribers: Vec<mpsc::UnboundedSender<String>>,
}

enum StoreJob {
    Batch(Vec<EventRecord>),
    Flush(oneshot::Sender<()>),
}

/// The scheduler's event log.
pub struct EventLog {
    inner: Mutex<LogInner>,
    store_tx: Option<mpsc::UnboundedSender<StoreJob>>,
}

impl EventLog {
    /// Without a store events are fan-out only (tests, ephemeral runs).
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self { inner: Mutex::new(LogInner::default()), store_tx: None })
    }

    /// With a store, completed events are persisted on a writer task.
    pub fn with_store(store: EventStore) -> Arc<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    StoreJob::Batch(records) => {
                        if let Err(err) = store.insert_batch(&records).await {
                            tracing::error!(error = %err, "event batch write failed");
                        }
                    }
                    StoreJob::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        });
        Arc::new(Self { inner: Mutex::new(LogInner::default()), store_tx: Some(tx) })
    }

    /// Attach an observer. All active documents are re-emitted to it
    /// immediately, oldest first; history back-fill is served separately
    /// from the store.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        for event in &inner.active {
            let _ = tx.send(event.rendered());
        }
        inner.subscribers.push(tx);
        rx
    }

    /// Upsert the task document.
    pub fn update_task(&self, data: &TaskData) {
        self.upsert(
            data.uuid.to_string(),
            EventKind::Task,
            data.username.clone(),
            data.status().code(),
            task_descriptor(data),
            false,
        );
    }

    /// Upsert the close-request document. Terminal requests complete their
    /// event so it can be flushed.
    pub fn update_close_request(&self, req: &CloseRequest) {
        self.upsert(
            req.uuid.to_string(),
            EventKind::Cmd,
            req.username.clone(),
            req.status().code(),
            close_request_descriptor(req),
            req.is_terminal(),
        );
    }

    /// Emit a free-form message event (completed immediately).
    pub fn message(&self, msg: &str, level: EventLevel) {
        let event = ActiveEvent {
            created: Utc::now(),
            kind: EventKind::Event,
            username: String::new(),
            status: 0,
            subject: None,
            doc: message_descriptor(msg, level),
            completed: true,
        };
        let mut inner = self.inner.lock();
        let rendered = event.rendered();
        inner.active.push_back(event);
        Self::send_all(&mut inner, &rendered);
        self.try_flush(&mut inner, false);
    }

    pub fn warning(&self, msg: &str) {
        tracing::warn!("{msg}");
        self.message(msg, EventLevel::Warn);
    }

    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
        self.message(msg, EventLevel::Error);
    }

    /// The task is gone: complete its document.
    pub fn notify_task_closed(&self, task_uuid: TaskId) {
        let uuid = task_uuid.to_string();
        let mut inner = self.inner.lock();
        match inner.active.iter_mut().find(|e| e.subject.as_deref() == Some(uuid.as_str())) {
            Some(event) => event.completed = true,
            None => {
                tracing::warn!(task = %task_uuid.short(), "closed notification for unknown task");
            }
        }
        self.try_flush(&mut inner, false);
    }

    /// Force out everything completed and wait for the writer.
    pub async fn close(&self) {
        let flush_rx = {
            let mut inner = self.inner.lock();
            self.try_flush(&mut inner, true);
            match &self.store_tx {
                None => None,
                Some(tx) => {
                    let (ack_tx, ack_rx) = oneshot::channel();
                    let _ = tx.send(StoreJob::Flush(ack_tx));
                    Some(ack_rx)
                }
            }
        };
        if let Some(rx) = flush_rx {
            let _ = rx.await;
        }
    }

    fn upsert(
        &self,
        subject: String,
        kind: EventKind,
        username: String,
        status: u8,
        doc: Value,
        completed: bool,
    ) {
        let mut inner = self.inner.lock();
        let rendered = match inner
            .active
            .iter_mut()
            .find(|e| e.subject.as_deref() == Some(subject.as_str()))
        {
            Some(event) => {
                event.doc = doc;
                event.status = status;
                event.completed = event.completed || completed;
                event.rendered()
            }
            None => {
                let event = ActiveEvent {
                    created: Utc::now(),
                    kind,
                    username,
                    status,
                    subject: Some(subject),
                    doc,
                    completed,
                };
                let rendered = event.rendered();
                inner.active.push_back(event);
                rendered
            }
        };
        Self::send_all(&mut inner, &rendered);
        self.try_flush(&mut inner, false);
    }

    fn send_all(inner: &mut LogInner, rendered: &str) {
        inner.subscribers.retain(|tx| tx.send(rendered.to_string()).is_ok());
    }

    /// Move the completed prefix into the pending batch and hand full (or
    /// forced) batches to the writer.
    fn try_flush(&self, inner: &mut LogInner, forced: bool) {
        while inner.active.front().is_some_and(|event| event.completed) {
            if let Some(event) = inner.active.pop_front() {
                inner.pending.push(event.to_record());
            }
        }

        if inner.pending.is_empty() || (inner.pending.len() < GROUP_SIZE && !forced) {
            return;
        }
        let batch = std::mem::take(&mut inner.pending);
        match &self.store_tx {
            Some(tx) => {
                let _ = tx.send(StoreJob::Batch(batch));
            }
            None => {
                tracing::trace!(count = batch.len(), "dropping events (no store configured)");
            }
        }
    }

    /// Count of documents still held in memory (incomplete suffix included).
    pub fn active_len(&self) -> usize {
        self.inner.lock().active.len()
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
