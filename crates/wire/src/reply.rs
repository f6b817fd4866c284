// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker → scheduler reply bodies.

use crate::WireError;
use atlas_core::RequestId;
use serde::{Deserialize, Serialize};

/// Status code of a reply body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ReplyStatus {
    InProgress,
    Completed,
    Failed,
    Timeout,
    ConsumerNotFound,
}

atlas_core::int_enum! {
    ReplyStatus: u8 {
        InProgress = 0,
        Completed = 1,
        Failed = 2,
        Timeout = 3,
        ConsumerNotFound = 4,
    }
}

atlas_core::simple_display! {
    ReplyStatus {
        InProgress => "in progress",
        Completed => "completed",
        Failed => "failed",
        Timeout => "timeout",
        ConsumerNotFound => "consumer not found",
    }
}

impl ReplyStatus {
    /// Completed is the only successful terminal; the three failure shapes
    /// (failed, timeout, consumer-not-found) all end the step.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReplyStatus::InProgress)
    }
}

/// One progress or terminal message published by a worker for a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub request_id: RequestId,
    pub status: ReplyStatus,
    pub progress: f64,
    pub message: String,
}

impl Reply {
    pub fn in_progress(request_id: RequestId, progress: f64, message: impl Into<String>) -> Self {
        Self { request_id, status: ReplyStatus::InProgress, progress, message: message.into() }
    }

    pub fn completed(request_id: RequestId, message: impl Into<String>) -> Self {
        Self { request_id, status: ReplyStatus::Completed, progress: 1.0, message: message.into() }
    }

    pub fn failed(request_id: RequestId, message: impl Into<String>) -> Self {
        Self { request_id, status: ReplyStatus::Failed, progress: 0.0, message: message.into() }
    }

    pub fn encode(&self) -> Vec<u8> {
        // Serialization of a plain struct cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Parse and validate a reply body. Unknown status codes, missing fields
    /// and non-numeric progress all fail here, before the scheduler touches
    /// any task state.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let reply: Reply = serde_json::from_slice(body)?;
        Ok(reply)
    }
}

#[cfg(test)]
#[path = "reply_tests.rs"]
mod tests;
