// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;

struct FixedCatalog(&'static [&'static str]);

impl RoutingCatalog for FixedCatalog {
    fn contains_key(&self, routing_key: &str) -> bool {
        self.0.contains(&routing_key)
    }
}

const CATALOG: FixedCatalog =
    FixedCatalog(&["road_osm_import", "road_generator", "consumer_A", "consumer_B"]);

fn document(scenarios: &str) -> String {
    format!("<config>{scenarios}</config>")
}

const ROADS: &str = r#"
<scenario name="import_roads" uuid="7a1e9f6e-3a43-4f92-8c7e-2f1f6f2d5a01" notify="road_osm_import">
  <input type="rect"/>
  <consequent>
    <run>road_osm_import</run>
    <run>road_generator</run>
  </consequent>
</scenario>
"#;

#[test]
fn loads_and_indexes_scenarios() {
    let provider = ScenarioProvider::from_document(&document(ROADS), &CATALOG).unwrap();
    assert_eq!(provider.len(), 1);

    let id = provider.scenario_id_by_name("Import_Roads").unwrap();
    assert_eq!(provider.scenario_id_by_notification("ROAD_OSM_IMPORT"), Some(id));
    assert_eq!(provider.notifications().collect::<Vec<_>>(), ["road_osm_import"]);

    let scenario = provider.get(id).unwrap();
    assert_eq!(scenario.name, "import_roads");
}

#[test]
fn unknown_scenario_id_is_an_error() {
    let provider = ScenarioProvider::from_document(&document(ROADS), &CATALOG).unwrap();
    let stray = ScenarioId::new();
    assert!(matches!(provider.get(stray), Err(ScenarioError::UnknownScenario(id)) if id == stray));
}

#[test]
fn lookups_return_independent_copies() {
    let provider = ScenarioProvider::from_document(&document(ROADS), &CATALOG).unwrap();
    let id = provider.scenario_id_by_name("import_roads").unwrap();

    let mut first = provider.get(id).unwrap();
    first.root.children.clear();

    let second = provider.get(id).unwrap();
    assert_eq!(second.root.children.len(), 2, "provider copy must be unaffected");
}

#[test]
fn unknown_routing_key_aborts_the_load() {
    let text = document(
        r#"
<scenario name="haunted" uuid="9b0d2c44-11aa-4e55-9f66-77c8d9e0a102">
  <input type="rect"/>
  <consequent><run>ghost</run></consequent>
</scenario>
"#,
    );
    let err = ScenarioProvider::from_document(&text, &CATALOG).unwrap_err();
    match err {
        ScenarioError::UnknownRoutingKey { name, keys } => {
            assert_eq!(name, "haunted");
            assert_eq!(keys, "ghost");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn duplicate_uuid_is_rejected() {
    let dup = r#"
<scenario name="one" uuid="7a1e9f6e-3a43-4f92-8c7e-2f1f6f2d5a01">
  <input type="rect"/>
  <consequent><run>consumer_A</run></consequent>
</scenario>
<scenario name="two" uuid="7a1e9f6e-3a43-4f92-8c7e-2f1f6f2d5a01">
  <input type="rect"/>
  <consequent><run>consumer_B</run></consequent>
</scenario>
"#;
    let err = ScenarioProvider::from_document(&document(dup), &CATALOG).unwrap_err();
    assert!(err.to_string().contains("duplicate scenario uuid"));
}

#[test]
fn duplicate_name_is_rejected() {
    let dup = r#"
<scenario name="same" uuid="7a1e9f6e-3a43-4f92-8c7e-2f1f6f2d5a01">
  <input type="rect"/>
  <consequent><run>consumer_A</run></consequent>
</scenario>
<scenario name="SAME" uuid="9b0d2c44-11aa-4e55-9f66-77c8d9e0a102">
  <input type="rect"/>
  <consequent><run>consumer_B</run></consequent>
</scenario>
"#;
    let err = ScenarioProvider::from_document(&document(dup), &CATALOG).unwrap_err();
    assert!(err.to_string().contains("duplicate scenario name"));
}

#[test]
fn duplicate_notify_binding_is_rejected() {
    let dup = r#"
<scenario name="one" uuid="7a1e9f6e-3a43-4f92-8c7e-2f1f6f2d5a01" notify="alias">
  <input type="rect"/>
  <consequent><run>consumer_A</run></consequent>
</scenario>
<scenario name="two" uuid="9b0d2c44-11aa-4e55-9f66-77c8d9e0a102" notify="Alias">
  <input type="rect"/>
  <consequent><run>consumer_B</run></consequent>
</scenario>
"#;
    let err = ScenarioProvider::from_document(&document(dup), &CATALOG).unwrap_err();
    assert!(err.to_string().contains("duplicate notify binding"));
}

#[test]
fn load_reads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(document(ROADS).as_bytes()).unwrap();

    let provider = ScenarioProvider::load(file.path(), &CATALOG).unwrap();
    assert_eq!(provider.len(), 1);

    let missing = ScenarioProvider::load(std::path::Path::new("/nonexistent.xml"), &CATALOG);
    assert!(matches!(missing, Err(ScenarioError::Io { .. })));
}
