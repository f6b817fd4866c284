// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use atlas_core::IlSubtype;

#[test]
fn parses_type_with_subtypes() {
    let spec =
        LockerSpec::parse(LockKind::Cells, "infrastructure_line:road,powerline,fence").unwrap();
    assert_eq!(spec.kind, LockKind::Cells);
    assert_eq!(spec.resources.len(), 1);
    assert_eq!(spec.resources[0].object_type, ObjectType::InfrastructureLine);
    assert_eq!(
        spec.resources[0].subtypes,
        Some(vec![IlSubtype::Road, IlSubtype::Powerline, IlSubtype::Fence])
    );
}

#[test]
fn parses_bare_type_as_all_subtypes() {
    let spec = LockerSpec::parse(LockKind::Objects, "vegetation").unwrap();
    assert_eq!(spec.resources[0].object_type, ObjectType::Vegetation);
    assert_eq!(spec.resources[0].subtypes, None);
}

#[test]
fn parses_multiple_selectors() {
    let spec =
        LockerSpec::parse(LockKind::Cells, "infrastructure_line:bridge; vegetation").unwrap();
    assert_eq!(spec.resources.len(), 2);
    assert_eq!(spec.resources[1].object_type, ObjectType::Vegetation);
}

#[test]
fn tolerates_spaces_around_names() {
    let spec = LockerSpec::parse(LockKind::Cells, " infrastructure_line : road , fence ").unwrap();
    assert_eq!(
        spec.resources[0].subtypes,
        Some(vec![IlSubtype::Road, IlSubtype::Fence])
    );
}

#[test]
fn rejects_unknown_type() {
    let err = LockerSpec::parse(LockKind::Cells, "waterway").unwrap_err();
    assert!(err.to_string().contains("waterway"));
}

#[test]
fn rejects_unknown_subtype() {
    let err = LockerSpec::parse(LockKind::Cells, "infrastructure_line:canal").unwrap_err();
    assert!(err.to_string().contains("canal"));
}

#[test]
fn rejects_subtypes_on_types_without_them() {
    assert!(LockerSpec::parse(LockKind::Cells, "vegetation:road").is_err());
}

#[test]
fn display_names_the_resources() {
    let spec = LockerSpec::parse(LockKind::Cells, "infrastructure_line:road;building").unwrap();
    let text = spec.to_string();
    assert!(text.starts_with("lock cells:"));
    assert!(text.contains("infrastructure_line (road)"));
    assert!(text.contains("building (all)"));
}
