// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! XML scenario-DB parser.
//!
//! Document shape:
//!
//! ```xml
//! <config>
//!   <scenario name="import_roads" uuid="…" notify="road_osm_import">
//!     <input type="rect"/>
//!     <consequent lock_cells="infrastructure_line:road">
//!       <run>road_osm_import</run>
//!       <concurrent>
//!         <run>road_generator</run>
//!         <run>road_light_generator</run>
//!       </concurrent>
//!     </consequent>
//!   </scenario>
//! </config>
//! ```

use crate::locker::LockerSpec;
use crate::model::{GroupMode, GroupNode, InputType, Node, Scenario};
use crate::ScenarioError;
use atlas_core::{LockKind, ScenarioId};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

/// One parsed `<scenario>` element.
#[derive(Debug, Clone)]
pub(crate) struct ParsedScenario {
    pub id: ScenarioId,
    pub notify: Option<String>,
    pub scenario: Scenario,
}

fn err(msg: impl Into<String>) -> ScenarioError {
    ScenarioError::Parse(msg.into())
}

fn attributes(start: &BytesStart<'_>) -> Result<HashMap<String, String>, ScenarioError> {
    let mut map = HashMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| err(format!("bad attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| err(format!("bad attribute value: {e}")))?
            .into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn locker_from_attrs(
    attrs: &HashMap<String, String>,
) -> Result<Option<LockerSpec>, ScenarioError> {
    if let Some(text) = attrs.get("lock_cells") {
        return Ok(Some(LockerSpec::parse(LockKind::Cells, text)?));
    }
    if let Some(text) = attrs.get("lock_objects") {
        return Ok(Some(LockerSpec::parse(LockKind::Objects, text)?));
    }
    Ok(None)
}

fn set_input_type(
    current: Option<&mut ScenarioFrame>,
    groups: &[GroupNode],
    attrs: &HashMap<String, String>,
) -> Result<(), ScenarioError> {
    let frame = current.ok_or_else(|| err("tag \"input\" outside of a \"scenario\""))?;
    if !groups.is_empty() {
        return Err(err("tag \"input\" may only be a direct child of \"scenario\""));
    }
    let type_name = attrs
        .get("type")
        .ok_or_else(|| err("attribute \"type\" missing on \"input\""))?;
    let input_type = InputType::from_name(type_name)
        .ok_or_else(|| err(format!("unknown input type: {type_name}")))?;
    frame.input_type = Some(input_type);
    Ok(())
}

/// Partially-built scenario while its element is open.
struct ScenarioFrame {
    id: ScenarioId,
    name: String,
    notify: Option<String>,
    input_type: Option<InputType>,
    root: Option<GroupNode>,
}

/// Parse a whole scenario-DB document.
pub(crate) fn parse_document(text: &str) -> Result<Vec<ParsedScenario>, ScenarioError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut scenarios = Vec::new();
    let mut current: Option<ScenarioFrame> = None;
    // Open group-execution elements, innermost last
    let mut groups: Vec<GroupNode> = Vec::new();
    let mut saw_config = false;

    loop {
        match reader.read_event()? {
            Event::Start(start) | Event::Empty(start) if start.name().as_ref() == b"config" => {
                saw_config = true;
            }
            Event::Start(start) => match start.name().as_ref() {
                b"scenario" => {
                    if !saw_config {
                        return Err(err("root tag of the scenario DB must be \"config\""));
                    }
                    if current.is_some() {
                        return Err(err("nested \"scenario\" tags are not allowed"));
                    }
                    let attrs = attributes(&start)?;
                    let name = attrs
                        .get("name")
                        .ok_or_else(|| err("attribute \"name\" missing on \"scenario\""))?
                        .to_lowercase();
                    let id = attrs
                        .get("uuid")
                        .ok_or_else(|| err("attribute \"uuid\" missing on \"scenario\""))
                        .and_then(|raw| {
                            ScenarioId::parse(raw)
                                .map_err(|_| err(format!("scenario {name}: bad uuid {raw:?}")))
                        })?;
                    current = Some(ScenarioFrame {
                        id,
                        name,
                        notify: attrs.get("notify").map(|n| n.to_lowercase()),
                        input_type: None,
                        root: None,
                    });
                }
                b"consequent" | b"concurrent" => {
                    if current.is_none() {
                        return Err(err("group tag outside of a \"scenario\""));
                    }
                    let mode = if start.name().as_ref() == b"consequent" {
                        GroupMode::Consequent
                    } else {
                        GroupMode::Concurrent
                    };
                    let locker = locker_from_attrs(&attributes(&start)?)?;
                    groups.push(GroupNode { mode, locker, children: Vec::new() });
                }
                b"input" => {
                    set_input_type(current.as_mut(), &groups, &attributes(&start)?)?;
                    reader.read_to_end(start.name())?;
                }
                b"run" => {
                    if groups.is_empty() {
                        return Err(err(
                            "tag \"run\" may only be a child of a group execution tag",
                        ));
                    }
                    let routing_key = reader
                        .read_text(start.name())
                        .map_err(ScenarioError::from)?
                        .trim()
                        .to_string();
                    if routing_key.is_empty() {
                        return Err(err("tag \"run\" must name a routing key"));
                    }
                    if let Some(group) = groups.last_mut() {
                        group.children.push(Node::Run(routing_key));
                    }
                }
                other => {
                    return Err(err(format!(
                        "unknown tag {:?}",
                        String::from_utf8_lossy(other)
                    )));
                }
            },
            Event::Empty(start) => match start.name().as_ref() {
                b"input" => set_input_type(current.as_mut(), &groups, &attributes(&start)?)?,
                other => {
                    return Err(err(format!(
                        "unknown tag {:?}",
                        String::from_utf8_lossy(other)
                    )));
                }
            },
            Event::End(end) => match end.name().as_ref() {
                b"consequent" | b"concurrent" => {
                    let group = match groups.pop() {
                        Some(group) => group,
                        None => return Err(err("unbalanced group tag")),
                    };
                    match groups.last_mut() {
                        Some(parent) => parent.children.push(Node::Group(group)),
                        None => {
                            let frame = current
                                .as_mut()
                                .ok_or_else(|| err("group tag outside of a \"scenario\""))?;
                            if frame.root.is_some() {
                                return Err(err(format!(
                                    "scenario {}: only one group execution child allowed",
                                    frame.name
                                )));
                            }
                            frame.root = Some(group);
                        }
                    }
                }
                b"scenario" => {
                    let frame = match current.take() {
                        Some(frame) => frame,
                        None => return Err(err("unbalanced \"scenario\" tag")),
                    };
                    let input_type = frame.input_type.ok_or_else(|| {
                        err(format!("scenario {}: missing \"input\" tag", frame.name))
                    })?;
                    let root = frame.root.ok_or_else(|| {
                        err(format!(
                            "scenario {}: missing group execution child",
                            frame.name
                        ))
                    })?;
                    scenarios.push(ParsedScenario {
                        id: frame.id,
                        notify: frame.notify,
                        scenario: Scenario { name: frame.name, input_type, root },
                    });
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_config {
        return Err(err("root tag of the scenario DB must be \"config\""));
    }
    Ok(scenarios)
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod tests;
