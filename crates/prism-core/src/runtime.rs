// ABOUTME: Defines the Agent trait every runtime implements, plus the run request and run events.
// ABOUTME: RunEvent is the closed set of upstream events the translator turns into outward events.

use std::collections::HashMap;
use std::pin::Pin;

use futures::Stream;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::message::{ArgsError, MessagePart, ModelMessage, ToolCallPart};
use crate::tool::{PendingApproval, ToolSet};

/// Incremental change to a part that already started.
#[derive(Debug, Clone, PartialEq)]
pub enum PartDelta {
    Text { content_delta: String },
    Thinking { content_delta: String },
    ToolCallArgs { args_delta: String },
}

/// Events emitted while a single agent run executes, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// A new response part began streaming.
    PartStart { index: usize, part: MessagePart },

    PartDelta { index: usize, delta: PartDelta },

    /// The model produced the part that will become the run's output.
    FinalResult { tool_name: Option<String> },

    /// A tool call is about to execute.
    ToolCallStarted { part: ToolCallPart },

    ToolCallResult {
        tool_call_id: String,
        tool_name: String,
        result: Value,
    },

    /// The run finished. `pending` lists calls deferred for approval, if any.
    RunComplete { pending: Vec<PendingApproval> },
}

/// Errors that abort a run. They are reported in-band to the chat client.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    #[error(transparent)]
    Arguments(#[from] ArgsError),

    #[error("invalid dependencies: {0}")]
    InvalidDependencies(String),

    #[error("{0}")]
    Runtime(String),
}

/// The asynchronous event sequence of one run. Dropping it abandons the run.
pub type RunStream = Pin<Box<dyn Stream<Item = Result<RunEvent, RunError>> + Send + 'static>>;

/// Everything a runtime needs to start a run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub prompt: String,
    pub history: Vec<ModelMessage>,
    pub dependencies: Map<String, Value>,
    /// Tools for this run only. Overrides the agent's own set without mutating it.
    pub toolset: ToolSet,
    /// Approval decisions keyed by tool call id.
    pub approvals: HashMap<String, bool>,
}

impl RunRequest {
    pub fn new(prompt: impl Into<String>, toolset: ToolSet) -> Self {
        Self {
            prompt: prompt.into(),
            toolset,
            ..Self::default()
        }
    }

    pub fn history(mut self, history: Vec<ModelMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn dependencies(mut self, dependencies: Map<String, Value>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn approvals(mut self, approvals: HashMap<String, bool>) -> Self {
        self.approvals = approvals;
        self
    }

    /// The recorded decision for a call: `Some(true)` approved, `Some(false)` denied.
    pub fn approval_for(&self, tool_call_id: &str) -> Option<bool> {
        self.approvals.get(tool_call_id).copied()
    }
}

/// A runnable agent. Implementations own their decision logic; prism only starts
/// runs and consumes their events.
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    /// The agent's own tools. Runs receive a (possibly wrapped) copy in `RunRequest`.
    fn toolset(&self) -> &ToolSet;

    /// JSON schema for the dependency values a run accepts, when the runtime has one.
    fn dependency_schema(&self) -> Option<&Value> {
        None
    }

    /// Start a run. Work happens lazily as the returned stream is polled.
    fn run(&self, request: RunRequest) -> RunStream;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_lookup_distinguishes_denied_from_missing() {
        let mut approvals = HashMap::new();
        approvals.insert("call_0".to_string(), true);
        approvals.insert("call_1".to_string(), false);
        let req = RunRequest::new("hi", ToolSet::new()).approvals(approvals);

        assert_eq!(req.approval_for("call_0"), Some(true));
        assert_eq!(req.approval_for("call_1"), Some(false));
        assert_eq!(req.approval_for("call_2"), None);
    }

    #[test]
    fn run_error_messages_are_readable() {
        let err = RunError::Tool {
            tool: "lookup".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "tool 'lookup' failed: connection refused");
        assert_eq!(
            RunError::UnknownTool("nope".to_string()).to_string(),
            "unknown tool: nope"
        );
    }
}
