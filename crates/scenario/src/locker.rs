// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource-locker specs attached to group-execution nodes.

use crate::ScenarioError;
use atlas_core::{LockKind, ObjectType, ResourceSelector};

/// What a group locks around its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockerSpec {
    pub kind: LockKind,
    pub resources: Vec<ResourceSelector>,
}

impl LockerSpec {
    /// Parse the locker attribute text: semicolon-separated selectors, each
    /// `type` or `type:sub1,sub2`.
    ///
    /// `"infrastructure_line:road,powerline;vegetation"` locks the road and
    /// powerline subtypes plus all vegetation.
    pub fn parse(kind: LockKind, text: &str) -> Result<Self, ScenarioError> {
        let mut resources = Vec::new();
        for item in text.split(';') {
            resources.push(Self::parse_selector(item.trim())?);
        }
        Ok(Self { kind, resources })
    }

    fn parse_selector(item: &str) -> Result<ResourceSelector, ScenarioError> {
        let (type_name, subtype_list) = match item.split_once(':') {
            Some((t, s)) => (t.trim(), Some(s)),
            None => (item, None),
        };

        let object_type = ObjectType::from_name(type_name).ok_or_else(|| {
            ScenarioError::Parse(format!("unknown landscape object type: {type_name}"))
        })?;

        let subtypes = match subtype_list {
            None => None,
            Some(list) => {
                let mut subtypes = Vec::new();
                for name in list.split(',') {
                    let name = name.trim();
                    let subtype = object_type.subtype_from_name(name).ok_or_else(|| {
                        ScenarioError::Parse(format!(
                            "unknown {object_type} subtype: {name}"
                        ))
                    })?;
                    subtypes.push(subtype);
                }
                Some(subtypes)
            }
        };

        Ok(ResourceSelector { object_type, subtypes })
    }
}

impl std::fmt::Display for LockerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lock {}: ", self.kind)?;
        for (idx, selector) in self.resources.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            match &selector.subtypes {
                None => write!(f, "{} (all)", selector.object_type)?,
                Some(subtypes) => {
                    let names: Vec<String> =
                        subtypes.iter().map(|s| s.to_string()).collect();
                    write!(f, "{} ({})", selector.object_type, names.join(", "))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "locker_tests.rs"]
mod tests;
