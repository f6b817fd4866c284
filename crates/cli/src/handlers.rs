// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in handler registrations.
//!
//! The production generators plug into the same catalog from their own
//! crates; what is registered here are the test consumers the end-to-end
//! scenarios run against: two well-behaved step consumers, one that
//! publishes a malformed reply, one that goes silent mid-run and one that
//! kills its own process.

use async_trait::async_trait;
use atlas_core::{IlSubtype, ObjectType, TaskInput};
use atlas_worker::{
    HandlerCatalog, HandlerDescriptor, JobContext, JobError, JobHandler, WorkerError,
};
use std::sync::Arc;
use std::time::Duration;

const STEP_COUNT: usize = 1000;

/// Dummy workload: sleep per step, publish every 10%.
struct StepConsumer {
    name: &'static str,
    step_delay: Duration,
    /// Step index at which the consumer stops replying (heartbeat tests).
    stall_at: Option<usize>,
}

#[async_trait]
impl JobHandler for StepConsumer {
    async fn run(&self, input: &TaskInput, ctx: &JobContext) -> Result<String, JobError> {
        ctx.publish_progress(
            0.0,
            &format!("starting the {}th {} consumer", ctx.instance_id(), self.name),
        )
        .await?;

        let locked_cells = input
            .cells_by_subtype(ObjectType::InfrastructureLine, IlSubtype::Road)
            .len();

        for step in 0..STEP_COUNT {
            tokio::time::sleep(self.step_delay).await;
            if self.stall_at == Some(step) {
                // Long past any heartbeat bound
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if (step + 1) % (STEP_COUNT / 10) == 0 {
                let progress = (step + 1) as f64 / STEP_COUNT as f64;
                ctx.publish_progress(progress, &format!("locked cell count: {locked_cells}"))
                    .await?;
            }
        }

        Ok(format!("the {}th {} completed the task", ctx.instance_id(), self.name))
    }
}

/// Publishes a body that is not JSON, then claims success.
struct InvalidResponseConsumer;

#[async_trait]
impl JobHandler for InvalidResponseConsumer {
    async fn run(&self, _input: &TaskInput, ctx: &JobContext) -> Result<String, JobError> {
        ctx.publish_raw(b"Hello").await?;
        Ok("published garbage".into())
    }
}

/// Aborts the worker process mid-task (supervised-restart tests).
struct CrashConsumer;

#[async_trait]
impl JobHandler for CrashConsumer {
    async fn run(&self, _input: &TaskInput, ctx: &JobContext) -> Result<String, JobError> {
        ctx.publish_progress(0.1, "about to crash").await?;
        std::process::abort();
    }
}

fn non_empty_username(input: &TaskInput) -> Result<(), String> {
    if input.username.trim().is_empty() {
        return Err("username must not be empty".into());
    }
    Ok(())
}

/// The built-in catalog.
pub fn build_catalog() -> Result<HandlerCatalog, WorkerError> {
    let builder = HandlerCatalog::builder()
        .register(HandlerDescriptor {
            routing_key: "consumer_A",
            factory: || {
                Arc::new(StepConsumer {
                    name: "consumer_A",
                    step_delay: Duration::from_millis(2),
                    stall_at: None,
                })
            },
            heartbeat_timeout: Duration::from_secs(2),
            raise_on_close: true,
            validator: Some(non_empty_username),
        })?
        .register(HandlerDescriptor {
            routing_key: "consumer_B",
            factory: || {
                Arc::new(StepConsumer {
                    name: "consumer_B",
                    step_delay: Duration::from_millis(3),
                    stall_at: None,
                })
            },
            heartbeat_timeout: Duration::from_secs(2),
            raise_on_close: true,
            validator: Some(non_empty_username),
        })?
        .register(HandlerDescriptor {
            routing_key: "invalid_response",
            factory: || Arc::new(InvalidResponseConsumer),
            heartbeat_timeout: Duration::from_secs(2),
            raise_on_close: false,
            validator: None,
        })?
        .register(HandlerDescriptor {
            routing_key: "timeout_error",
            factory: || {
                Arc::new(StepConsumer {
                    name: "timeout_error",
                    step_delay: Duration::from_millis(2),
                    stall_at: Some(100),
                })
            },
            heartbeat_timeout: Duration::from_secs(5),
            raise_on_close: true,
            validator: Some(non_empty_username),
        })?
        .register(HandlerDescriptor {
            routing_key: "crash",
            factory: || Arc::new(CrashConsumer),
            heartbeat_timeout: Duration::from_secs(3600),
            raise_on_close: false,
            validator: None,
        })?;
    Ok(builder.build())
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
