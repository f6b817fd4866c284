// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! atlas-scenario: executable scenario trees.
//!
//! A scenario is a named tree of consequent/concurrent groups over `run`
//! leaves, with optional resource-lock scopes on the groups. The provider
//! loads all scenarios from an XML document at startup and hands out
//! per-task copies.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod locker;
mod model;
mod parse;
mod provider;

pub use atlas_core::ResourceSelector;
pub use locker::LockerSpec;
pub use model::{
    AcquireError, GroupMode, GroupNode, InputError, InputType, Node, Scenario, ScenarioDriver,
};
pub use provider::{RoutingCatalog, ScenarioProvider};

use atlas_core::ScenarioId;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("scenario DB: {0}")]
    Parse(String),
    #[error("incorrect scenario {name}, unknown requests: {keys}")]
    UnknownRoutingKey { name: String, keys: String },
    #[error("unknown scenario {0}")]
    UnknownScenario(ScenarioId),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
