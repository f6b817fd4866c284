// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Initial task payload supplied by the intake surface.

use crate::geo::{QCell, Rect};
use serde::{Deserialize, Serialize};

/// Payload of a task submission: who asked, and for which region.
///
/// Depending on the scenario's input type either `rect` or `cells` must be
/// present; the scenario validates this before the task starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cells: Option<Vec<QCell>>,
}

impl TaskPayload {
    pub fn new(username: impl Into<String>) -> Self {
        Self { username: username.into(), rect: None, cells: None }
    }

    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }

    pub fn with_cells(mut self, cells: Vec<QCell>) -> Self {
        self.cells = Some(cells);
        self
    }
}
