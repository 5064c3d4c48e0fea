// ABOUTME: Agent manifests: the declarative files that define and register playground agents.
// ABOUTME: ManifestImporter parses a manifest, builds the agent through a runtime factory, and registers it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use prism_agent::{ScriptStep, ScriptedAgent, TemplateTool};
use prism_core::{Agent, AgentRecord, AgentRegistry, Scenario, Tool, ToolSet, empty_schema};

/// File stem suffix that marks a module for discovery.
pub const MODULE_SUFFIX: &str = "__prism";

/// File extensions a module may use.
pub const MODULE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Errors that can occur while importing a single module.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown agent runtime: {0}")]
    UnknownRuntime(String),

    #[error("invalid manifest: {0}")]
    Invalid(String),
}

/// A discovered module: its dotted name and the file backing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub path: PathBuf,
}

impl Module {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// The last dotted segment, e.g. `support_agent__prism`.
    pub fn stem(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// Imports one module, registering whatever agents it defines. Returns the names
/// registered.
pub trait ModuleImporter: Send + Sync {
    fn import(&self, module: &Module, registry: &AgentRegistry) -> Result<Vec<String>, ImportError>;
}

fn default_runtime() -> String {
    "scripted".to_string()
}

/// The on-disk shape of an agent manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_runtime")]
    pub runtime: String,
    #[serde(default)]
    pub dependency_schema: Option<Value>,
    #[serde(default)]
    pub tools: Vec<ToolManifest>,
    #[serde(default)]
    pub script: Vec<StepManifest>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolManifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_schema")]
    pub parameters: Value,
    #[serde(default)]
    pub returns: Option<String>,
}

/// A script entry. Exactly one of `text`, `thinking` or `tool` must be set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StepManifest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl StepManifest {
    fn to_step(&self, index: usize) -> Result<ScriptStep, ImportError> {
        match (&self.text, &self.thinking, &self.tool) {
            (Some(text), None, None) => Ok(ScriptStep::Text(text.clone())),
            (None, Some(thinking), None) => Ok(ScriptStep::Thinking(thinking.clone())),
            (None, None, Some(tool)) => Ok(ScriptStep::ToolCall {
                tool: tool.clone(),
                arguments: self.arguments.clone(),
            }),
            _ => Err(ImportError::Invalid(format!(
                "script step {} must set exactly one of text, thinking or tool",
                index
            ))),
        }
    }
}

impl AgentManifest {
    /// Parse a manifest from YAML or JSON text.
    pub fn parse(raw: &str) -> Result<Self, ImportError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ImportError> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// The manifest's tools as a tool set.
    pub fn toolset(&self) -> Result<ToolSet, ImportError> {
        let mut set = ToolSet::new();
        for tool in &self.tools {
            if tool.name.trim().is_empty() {
                return Err(ImportError::Invalid("tool name must not be empty".to_string()));
            }
            if set.get(&tool.name).is_some() {
                return Err(ImportError::Invalid(format!(
                    "tool '{}' is declared twice",
                    tool.name
                )));
            }
            let mut built =
                TemplateTool::new(&tool.name, &tool.description, tool.parameters.clone());
            if let Some(returns) = &tool.returns {
                built = built.returning(returns);
            }
            set.insert(Arc::new(built) as Arc<dyn Tool>);
        }
        Ok(set)
    }

    pub fn steps(&self) -> Result<Vec<ScriptStep>, ImportError> {
        self.script
            .iter()
            .enumerate()
            .map(|(idx, step)| step.to_step(idx))
            .collect()
    }
}

/// Builds a runnable agent from a manifest for one runtime kind.
pub trait AgentFactory: Send + Sync {
    fn build(&self, name: &str, manifest: &AgentManifest) -> Result<Arc<dyn Agent>, ImportError>;
}

/// Factory for the built-in `scripted` runtime.
pub struct ScriptedFactory;

impl AgentFactory for ScriptedFactory {
    fn build(&self, name: &str, manifest: &AgentManifest) -> Result<Arc<dyn Agent>, ImportError> {
        let mut agent = ScriptedAgent::new(name, manifest.steps()?).with_tools(manifest.toolset()?);
        if let Some(description) = &manifest.description {
            agent = agent.with_description(description);
        }
        if let Some(schema) = &manifest.dependency_schema {
            if !schema.is_object() {
                return Err(ImportError::Invalid(
                    "dependency_schema must be an object".to_string(),
                ));
            }
            agent = agent.with_dependency_schema(schema.clone());
        }
        Ok(Arc::new(agent))
    }
}

/// The default importer: one manifest file defines one agent.
pub struct ManifestImporter {
    factories: HashMap<String, Arc<dyn AgentFactory>>,
}

impl Default for ManifestImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestImporter {
    pub fn new() -> Self {
        let mut factories: HashMap<String, Arc<dyn AgentFactory>> = HashMap::new();
        factories.insert("scripted".to_string(), Arc::new(ScriptedFactory));
        Self { factories }
    }

    /// Add or replace the factory used for manifests declaring `runtime: <kind>`.
    pub fn with_factory(mut self, kind: impl Into<String>, factory: Arc<dyn AgentFactory>) -> Self {
        self.factories.insert(kind.into(), factory);
        self
    }

    pub fn runtimes(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl ModuleImporter for ManifestImporter {
    fn import(&self, module: &Module, registry: &AgentRegistry) -> Result<Vec<String>, ImportError> {
        let manifest = AgentManifest::load(&module.path)?;

        let name = match &manifest.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            Some(_) => return Err(ImportError::Invalid("agent name must not be empty".to_string())),
            None => module
                .stem()
                .strip_suffix(MODULE_SUFFIX)
                .unwrap_or(module.stem())
                .to_string(),
        };

        let factory = self
            .factories
            .get(&manifest.runtime)
            .ok_or_else(|| ImportError::UnknownRuntime(manifest.runtime.clone()))?;
        let agent = factory.build(&name, &manifest)?;

        tracing::debug!(
            agent = %name,
            module = %module.name,
            runtime = %manifest.runtime,
            tools = agent.toolset().len(),
            scenarios = manifest.scenarios.len(),
            "built agent from manifest"
        );

        registry.register_record(
            AgentRecord::new(name.clone(), agent, manifest.scenarios).from_module(&module.name),
        );
        Ok(vec![name])
    }
}
