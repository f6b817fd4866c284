// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed identifiers.
//!
//! Tasks, requests, close requests and scenarios are identified by UUIDv4
//! values; [`define_id!`] generates a serde-transparent newtype per kind so
//! they cannot be mixed up. [`LockId`] is not a UUID: it is the monotone
//! integer the edit-lock manager stamps into history rows (0 = free).

use serde::{Deserialize, Serialize};

/// Define a newtype ID wrapper around [`uuid::Uuid`].
///
/// Generates `new()` (random v4), `from_uuid()`, `parse()`, `as_uuid()`,
/// `short()` plus `Display`, `FromStr`, `From<Uuid>` and transparent serde.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Generate a fresh random id.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            pub const fn from_uuid(id: uuid::Uuid) -> Self {
                Self(id)
            }

            /// Parse the hyphenated string form.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(uuid::Uuid::parse_str(s)?))
            }

            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }

            /// First 8 hex characters, for log lines.
            pub fn short(&self) -> String {
                self.0.to_string().chars().take(8).collect()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(id: uuid::Uuid) -> Self {
                Self(id)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

define_id! {
    /// Unique identifier of a submitted task.
    pub struct TaskId;
}

define_id! {
    /// Correlation id of a single request/reply exchange.
    pub struct RequestId;
}

define_id! {
    /// Identifier of a close request derived from an in-flight RPC.
    pub struct CloseRequestId;
}

define_id! {
    /// Stable identifier of a scenario in the scenario DB.
    pub struct ScenarioId;
}

/// Owner id stamped into history rows by the edit-lock manager.
///
/// Issued monotonically per manager; `FREE` (0) marks an unowned row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockId(pub i64);

impl LockId {
    pub const FREE: LockId = LockId(0);

    pub fn is_free(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for LockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
