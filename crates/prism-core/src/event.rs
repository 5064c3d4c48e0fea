// ABOUTME: Defines the outward event protocol streamed to chat clients, one JSON object per line.
// ABOUTME: The serde tag and field names here are the wire contract the playground UI depends on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Terminal status carried by a `done` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneStatus {
    Complete,
    PendingApproval,
}

/// A normalized unit of streamed chat output. Every stream ends with exactly one
/// `Done`, preceded by at most one `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutwardEvent {
    TextDelta {
        delta: String,
    },
    ThinkingDelta {
        delta: String,
    },
    ToolCallExecuting {
        tool_call_id: String,
        tool_name: String,
        arguments: Map<String, Value>,
    },
    ToolResult {
        tool_call_id: String,
        result: Value,
    },
    Error {
        #[serde(rename = "error")]
        message: String,
    },
    Done {
        status: DoneStatus,
    },
}

impl OutwardEvent {
    pub fn text(delta: impl Into<String>) -> Self {
        Self::TextDelta {
            delta: delta.into(),
        }
    }

    pub fn thinking(delta: impl Into<String>) -> Self {
        Self::ThinkingDelta {
            delta: delta.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn done(status: DoneStatus) -> Self {
        Self::Done { status }
    }

    /// Returns true for the `done` event that closes a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    /// The wire discriminator for this event, matching the serialized `type` field.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text_delta",
            Self::ThinkingDelta { .. } => "thinking_delta",
            Self::ToolCallExecuting { .. } => "tool_call_executing",
            Self::ToolResult { .. } => "tool_result",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }

    /// Serialize as a single NDJSON line, including the trailing newline.
    pub fn to_ndjson_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
