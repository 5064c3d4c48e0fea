// ABOUTME: Agent-side library for prism: event translation, approval gating and the scripted runtime.
// ABOUTME: Sits between the registry's runnable agents and the chat endpoint's outward stream.

pub mod approval;
pub mod scripted;
pub mod template;
pub mod testing;
pub mod tools;
pub mod translate;

pub use approval::{ApprovalGated, toolset_for, wrap};
pub use scripted::{ScriptStep, ScriptedAgent};
pub use tools::TemplateTool;
pub use translate::{translate, translate_event};
