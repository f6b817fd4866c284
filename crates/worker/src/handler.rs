// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The handler seam implemented by every generator.

use crate::context::JobContext;
use async_trait::async_trait;
use atlas_core::TaskInput;

/// Why a handler run did not complete.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum JobError {
    /// The scheduler asked the task to close and this handler's
    /// registration opted into raising.
    #[error("interrupted by {username}")]
    CloseRequested { username: String },
    /// Domain failure; the message becomes the failed reply.
    #[error("{0}")]
    Failed(String),
}

/// One registered generator.
///
/// Handlers report through the context (`publish_progress`,
/// `publish_message`) and finish by returning: `Ok(message)` becomes the
/// completed reply, an error the failed reply. Cooperative cancellation:
/// either propagate `CloseRequested` from the publish calls (raise-on-close
/// registrations) or poll [`JobContext::is_close_requested`].
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, input: &TaskInput, ctx: &JobContext) -> Result<String, JobError>;
}
