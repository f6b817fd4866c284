// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    origin = { 0, false, 0, 0 },
    mid_level = { 11, false, 980, 978 },
    southern = { 12, true, 2585, 1378 },
    deepest = { 24, false, (1 << 24) - 1, (1 << 24) - 1 },
)]
fn raw_index_roundtrip(level: u8, south: bool, i: u32, j: u32) {
    let cell = QCell::new(level, south, i, j).unwrap();
    let raw = cell.raw_index();
    assert!(raw >= 0);
    assert_eq!(QCell::from_raw_index(raw).unwrap(), cell);
}

#[test]
fn rejects_level_out_of_range() {
    assert_eq!(QCell::new(25, false, 0, 0), Err(GeoError::LevelOutOfRange(25)));
}

#[test]
fn rejects_index_outside_level() {
    // Level 3 has an 8x8 grid
    assert!(QCell::new(3, false, 8, 0).is_err());
    assert!(QCell::new(3, false, 0, 8).is_err());
    assert!(QCell::new(3, false, 7, 7).is_ok());
}

#[test]
fn rejects_negative_raw_index() {
    assert_eq!(QCell::from_raw_index(-5), Err(GeoError::BadRawIndex(-5)));
}

#[test]
fn distinct_cells_have_distinct_raw_indices() {
    let a = QCell::new(11, false, 980, 978).unwrap();
    let b = QCell::new(11, false, 980, 979).unwrap();
    let c = QCell::new(11, true, 980, 978).unwrap();
    assert_ne!(a.raw_index(), b.raw_index());
    assert_ne!(a.raw_index(), c.raw_index());
}

#[test]
fn cell_serde_uses_array_form() {
    let cell = QCell::new(11, false, 980, 978).unwrap();
    let json = serde_json::to_string(&cell).unwrap();
    assert_eq!(json, "[11,false,980,978]");

    let parsed: QCell = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, cell);
}

#[test]
fn cell_serde_validates_bounds() {
    let result: Result<QCell, _> = serde_json::from_str("[3,false,9,0]");
    assert!(result.is_err());
}

#[parameterized(
    valid = { Rect { lon_min: 53.0, lon_max: 53.1, lat_min: 27.0, lat_max: 27.1 }, true },
    inverted = { Rect { lon_min: 53.1, lon_max: 53.0, lat_min: 27.0, lat_max: 27.1 }, false },
    out_of_bounds = { Rect { lon_min: -200.0, lon_max: 0.0, lat_min: 0.0, lat_max: 1.0 }, false },
)]
fn rect_validity(rect: Rect, valid: bool) {
    assert_eq!(rect.is_valid(), valid);
}
