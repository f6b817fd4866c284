// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire schemas for the Atlas RPC layer.
//!
//! Two broker body shapes (worker replies and scheduler commands, both JSON
//! with integer codes) and the length-prefixed pipe framing used on the
//! supervisor↔worker command channel: 4-byte length prefix (big-endian) +
//! JSON payload.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod command;
mod pipe;
mod reply;

pub use command::{Command, CommandCode};
pub use pipe::{read_frame, write_frame, PipeMsg, MAX_FRAME_LEN};
pub use reply::{Reply, ReplyStatus};

/// Errors produced while encoding, decoding or framing wire messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("frame of {0} bytes exceeds the {max} byte limit", max = MAX_FRAME_LEN)]
    FrameTooLarge(usize),
    #[error("pipe i/o failed: {0}")]
    Io(#[from] std::io::Error),
}
