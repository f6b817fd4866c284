// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Landscape object taxonomy used by resource lockers and history rows.

use serde::{Deserialize, Serialize};

/// Top-level landscape object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ObjectType {
    InfrastructureLine,
    Vegetation,
    Building,
    Relief,
}

crate::int_enum! {
    ObjectType: u8 {
        InfrastructureLine = 0,
        Vegetation = 1,
        Building = 2,
        Relief = 3,
    }
}

crate::simple_display! {
    ObjectType {
        InfrastructureLine => "infrastructure_line",
        Vegetation => "vegetation",
        Building => "building",
        Relief => "relief",
    }
}

impl ObjectType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "infrastructure_line" => Some(Self::InfrastructureLine),
            "vegetation" => Some(Self::Vegetation),
            "building" => Some(Self::Building),
            "relief" => Some(Self::Relief),
            _ => None,
        }
    }

    /// Resolve a subtype name in the context of this type.
    ///
    /// Only infrastructure lines carry subtypes.
    pub fn subtype_from_name(self, name: &str) -> Option<IlSubtype> {
        match self {
            Self::InfrastructureLine => IlSubtype::from_name(name),
            _ => None,
        }
    }
}

/// Infrastructure-line subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum IlSubtype {
    Road,
    RoadLight,
    Fence,
    Powerline,
    Bridge,
}

crate::int_enum! {
    IlSubtype: u8 {
        Road = 0,
        RoadLight = 1,
        Fence = 2,
        Powerline = 3,
        Bridge = 4,
    }
}

crate::simple_display! {
    IlSubtype {
        Road => "road",
        RoadLight => "road_light",
        Fence => "fence",
        Powerline => "powerline",
        Bridge => "bridge",
    }
}

impl IlSubtype {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "road" => Some(Self::Road),
            "road_light" => Some(Self::RoadLight),
            "fence" => Some(Self::Fence),
            "powerline" => Some(Self::Powerline),
            "bridge" => Some(Self::Bridge),
            _ => None,
        }
    }
}

/// One `(type, optional subtypes)` selector of a resource locker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSelector {
    pub object_type: ObjectType,
    /// `None` selects every subtype of the object type.
    pub subtypes: Option<Vec<IlSubtype>>,
}

#[cfg(test)]
#[path = "objects_tests.rs"]
mod tests;
