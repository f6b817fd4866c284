// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario provider: loads the scenario DB once at startup.

use crate::model::Scenario;
use crate::parse::parse_document;
use crate::ScenarioError;
use atlas_core::ScenarioId;
use std::collections::HashMap;
use std::path::Path;

/// The set of routing keys workers can actually serve.
///
/// Implemented by the worker handler catalog; the provider refuses to load
/// any scenario referencing an unregistered key, so a typo in the scenario
/// DB aborts startup instead of failing the first task.
pub trait RoutingCatalog {
    fn contains_key(&self, routing_key: &str) -> bool;
}

/// All loaded scenarios, addressable by id, name or notify alias.
#[derive(Debug, Default)]
pub struct ScenarioProvider {
    scenarios: HashMap<ScenarioId, Scenario>,
    names: HashMap<String, ScenarioId>,
    notify_bindings: HashMap<String, ScenarioId>,
}

impl ScenarioProvider {
    pub fn load(path: &Path, catalog: &dyn RoutingCatalog) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ScenarioError::Io { path: path.to_path_buf(), source })?;
        Self::from_document(&text, catalog)
    }

    pub fn from_document(
        text: &str,
        catalog: &dyn RoutingCatalog,
    ) -> Result<Self, ScenarioError> {
        let mut provider = Self::default();

        for parsed in parse_document(text)? {
            let name = parsed.scenario.name.clone();

            let unknown: Vec<&str> = parsed
                .scenario
                .routing_keys()
                .into_iter()
                .filter(|key| !catalog.contains_key(key))
                .collect();
            if !unknown.is_empty() {
                return Err(ScenarioError::UnknownRoutingKey {
                    name,
                    keys: unknown.join(","),
                });
            }

            if provider.scenarios.contains_key(&parsed.id) {
                return Err(ScenarioError::Parse(format!(
                    "duplicate scenario uuid: {}",
                    parsed.id
                )));
            }
            if provider.names.contains_key(&name) {
                return Err(ScenarioError::Parse(format!("duplicate scenario name: {name}")));
            }
            if let Some(notify) = &parsed.notify {
                if provider.notify_bindings.contains_key(notify) {
                    return Err(ScenarioError::Parse(format!(
                        "duplicate notify binding: {notify}"
                    )));
                }
                provider.notify_bindings.insert(notify.clone(), parsed.id);
            }

            provider.names.insert(name, parsed.id);
            provider.scenarios.insert(parsed.id, parsed.scenario);
        }

        tracing::info!(count = provider.scenarios.len(), "scenario DB loaded");
        Ok(provider)
    }

    /// Scenario by id. Returns an owned copy: tasks mutate per-node locker
    /// state while executing, so trees are never shared.
    pub fn get(&self, id: ScenarioId) -> Result<Scenario, ScenarioError> {
        self.scenarios
            .get(&id)
            .cloned()
            .ok_or(ScenarioError::UnknownScenario(id))
    }

    pub fn scenario_id_by_name(&self, name: &str) -> Option<ScenarioId> {
        self.names.get(&name.to_lowercase()).copied()
    }

    pub fn scenario_id_by_notification(&self, notify: &str) -> Option<ScenarioId> {
        self.notify_bindings.get(&notify.to_lowercase()).copied()
    }

    pub fn notifications(&self) -> impl Iterator<Item = &str> {
        self.notify_bindings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
