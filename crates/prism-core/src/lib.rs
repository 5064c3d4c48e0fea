// ABOUTME: Core library for prism, containing the agent registry and the agent runtime contract.
// ABOUTME: Also defines conversation history types and the outward event protocol shared by all crates.

pub mod event;
pub mod message;
pub mod registry;
pub mod runtime;
pub mod tool;

pub use event::{DoneStatus, OutwardEvent};
pub use message::{
    ArgsError, ConversationTurn, MessagePart, ModelMessage, ToolArgs, ToolCallPart,
    ToolCallRecord, build_message_history,
};
pub use registry::{AgentRecord, AgentRegistry, AgentSummary, RegistryError, Scenario};
pub use runtime::{Agent, PartDelta, RunError, RunEvent, RunRequest, RunStream};
pub use tool::{
    CallContext, PendingApproval, Tool, ToolDefinition, ToolError, ToolSet, ToolUseMode,
    empty_schema,
};
