// ABOUTME: In-process registry of runnable agents and their scenario presets, keyed by unique name.
// ABOUTME: Last registration wins; entries keep registration order and are swapped atomically.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::runtime::Agent;

/// Errors returned by registry lookups.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("agent not found: {0}")]
    NotFound(String),
}

/// A named preset of dependency values for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default, alias = "settings", alias = "dependency")]
    pub dependencies: Map<String, Value>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, dependencies: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            dependencies,
        }
    }
}

/// A registered agent. Immutable once stored; re-registration replaces the whole record.
pub struct AgentRecord {
    pub name: String,
    pub agent: Arc<dyn Agent>,
    pub scenarios: Vec<Scenario>,
    /// Module that registered the agent, when known.
    pub module: Option<String>,
}

impl AgentRecord {
    pub fn new(name: impl Into<String>, agent: Arc<dyn Agent>, scenarios: Vec<Scenario>) -> Self {
        Self {
            name: name.into(),
            agent,
            scenarios,
            module: None,
        }
    }

    pub fn from_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
}

/// Name and scenarios of a registered agent, for listing.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSummary {
    pub name: String,
    pub scenarios: Vec<Scenario>,
}

#[derive(Default)]
struct Entries {
    order: Vec<Arc<AgentRecord>>,
    index: HashMap<String, usize>,
}

/// Shared, read-mostly registry of agents. Construct once at startup and share
/// through an `Arc`.
#[derive(Default)]
pub struct AgentRegistry {
    entries: RwLock<Entries>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under `name`. A duplicate name overwrites the earlier entry
    /// and logs a warning.
    pub fn register(&self, name: impl Into<String>, agent: Arc<dyn Agent>, scenarios: Vec<Scenario>) {
        self.register_record(AgentRecord::new(name, agent, scenarios));
    }

    /// Register a fully built record. See [`AgentRegistry::register`].
    pub fn register_record(&self, record: AgentRecord) {
        let module = record.module.clone().unwrap_or_default();
        let name = record.name.clone();
        let record = Arc::new(record);

        let mut entries = self.entries.write();
        match entries.index.get(&name).copied() {
            Some(idx) => {
                tracing::warn!(
                    agent = %name,
                    module = %module,
                    "duplicate agent name, overwriting previous agent"
                );
                entries.order[idx] = record;
            }
            None => {
                let idx = entries.order.len();
                entries.order.push(record);
                entries.index.insert(name.clone(), idx);
            }
        }
        drop(entries);

        tracing::info!(agent = %name, module = %module, "loaded agent");
    }

    /// Look up the runnable agent registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Agent>, RegistryError> {
        self.record(name).map(|record| Arc::clone(&record.agent))
    }

    /// Look up the full record registered under `name`.
    pub fn record(&self, name: &str) -> Result<Arc<AgentRecord>, RegistryError> {
        let entries = self.entries.read();
        entries
            .index
            .get(name)
            .map(|&idx| Arc::clone(&entries.order[idx]))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// All agents with their scenarios, in registration order.
    pub fn list_all(&self) -> Vec<AgentSummary> {
        self.entries
            .read()
            .order
            .iter()
            .map(|record| AgentSummary {
                name: record.name.clone(),
                scenarios: record.scenarios.clone(),
            })
            .collect()
    }

    /// Scenarios registered for `name`; empty when the agent is unknown.
    pub fn scenarios_for(&self, name: &str) -> Vec<Scenario> {
        self.record(name)
            .map(|record| record.scenarios.clone())
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .order
            .iter()
            .map(|record| record.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
