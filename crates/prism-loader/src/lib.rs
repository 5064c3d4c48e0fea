// ABOUTME: Package resolution and module discovery for prism, plus the agent manifest format.
// ABOUTME: Turns a dotted package identifier into registered agents in an AgentRegistry.

pub mod discovery;
pub mod manifest;

pub use discovery::{Discovery, DiscoveryError, DiscoveryReport, ImportedAgent, SkippedModule};
pub use manifest::{
    AgentFactory, AgentManifest, ImportError, ManifestImporter, Module, ModuleImporter,
    ScriptedFactory,
};
