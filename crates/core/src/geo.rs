// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Geographic primitives: lon/lat rectangles and quadtree cells.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Deepest quadtree level the editor addresses.
pub const MAX_LEVEL: u8 = 24;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GeoError {
    #[error("quadtree level {0} exceeds maximum {max}", max = MAX_LEVEL)]
    LevelOutOfRange(u8),
    #[error("cell index ({i}, {j}) does not fit level {level}")]
    IndexOutOfRange { level: u8, i: u32, j: u32 },
    #[error("malformed raw cell index {0}")]
    BadRawIndex(i64),
}

/// Geographic rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl Rect {
    pub fn is_valid(&self) -> bool {
        self.lon_min < self.lon_max
            && self.lat_min < self.lat_max
            && self.lon_min >= -180.0
            && self.lon_max <= 180.0
            && self.lat_min >= -90.0
            && self.lat_max <= 90.0
    }
}

/// Quadtree cell addressed by (level, hemisphere, i, j).
///
/// Serialized as the `[level, south, i, j]` array the intake surface sends.
/// The raw index packs the same address into an i64 for history rows and
/// worker payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QCell {
    pub level: u8,
    pub south: bool,
    pub i: u32,
    pub j: u32,
}

// Raw index layout, low to high: j (29 bits), i (29 bits), south (1 bit),
// level (5 bits). Fits non-negative i64 for levels up to MAX_LEVEL.
const INDEX_BITS: u32 = 29;
const INDEX_MASK: i64 = (1 << INDEX_BITS) - 1;

impl QCell {
    pub fn new(level: u8, south: bool, i: u32, j: u32) -> Result<Self, GeoError> {
        if level > MAX_LEVEL {
            return Err(GeoError::LevelOutOfRange(level));
        }
        let side = 1u32 << level;
        if i >= side || j >= side {
            return Err(GeoError::IndexOutOfRange { level, i, j });
        }
        Ok(Self { level, south, i, j })
    }

    pub fn raw_index(&self) -> i64 {
        ((self.level as i64) << (2 * INDEX_BITS + 1))
            | ((self.south as i64) << (2 * INDEX_BITS))
            | ((self.i as i64) << INDEX_BITS)
            | self.j as i64
    }

    pub fn from_raw_index(raw: i64) -> Result<Self, GeoError> {
        if raw < 0 {
            return Err(GeoError::BadRawIndex(raw));
        }
        let level = (raw >> (2 * INDEX_BITS + 1)) as u8;
        let south = (raw >> (2 * INDEX_BITS)) & 1 == 1;
        let i = ((raw >> INDEX_BITS) & INDEX_MASK) as u32;
        let j = (raw & INDEX_MASK) as u32;
        Self::new(level, south, i, j).map_err(|_| GeoError::BadRawIndex(raw))
    }
}

impl std::fmt::Display for QCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.level,
            if self.south { "south" } else { "north" },
            self.i,
            self.j
        )
    }
}

impl Serialize for QCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.level, self.south, self.i, self.j).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for QCell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (level, south, i, j) = <(u8, bool, u32, u32)>::deserialize(deserializer)?;
        QCell::new(level, south, i, j).map_err(D::Error::custom)
    }
}

#[cfg(test)]
#[path = "geo_tests.rs"]
mod tests;
