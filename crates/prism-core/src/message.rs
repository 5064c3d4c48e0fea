// ABOUTME: Conversation turns as sent by chat clients and the runtime's model message history.
// ABOUTME: Provides build_message_history, which rebuilds prior turns into request/response messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A tool call recorded on a prior assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    #[serde(default)]
    pub tool_call_id: String,
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// One chat message as submitted by the client. Only `user`, `assistant` and `tool`
/// roles carry meaning; anything else is ignored when rebuilding history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallRecord>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.into()),
            tool_calls: Some(tool_calls),
            ..Self::default()
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, result: Value) -> Self {
        Self {
            role: "tool".to_string(),
            tool_call_id: Some(tool_call_id.into()),
            result: Some(result),
            ..Self::default()
        }
    }

    /// The turn's text, empty when absent or null.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Errors raised while reading tool call arguments.
#[derive(Debug, Error)]
pub enum ArgsError {
    #[error("tool arguments are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tool arguments must be a JSON object, got {0}")]
    NotAnObject(String),
}

/// Tool call arguments as produced by a model: either already structured or a raw
/// JSON string still to be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolArgs {
    Object(Map<String, Value>),
    Raw(String),
}

impl Default for ToolArgs {
    fn default() -> Self {
        Self::Object(Map::new())
    }
}

impl ToolArgs {
    /// Return the arguments as a JSON object. An empty raw string is an empty object.
    pub fn as_map(&self) -> Result<Map<String, Value>, ArgsError> {
        match self {
            Self::Object(map) => Ok(map.clone()),
            Self::Raw(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Self::Raw(raw) => match serde_json::from_str::<Value>(raw)? {
                Value::Object(map) => Ok(map),
                other => Err(ArgsError::NotAnObject(other.to_string())),
            },
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPart {
    pub tool_name: String,
    #[serde(default)]
    pub args: ToolArgs,
    pub tool_call_id: String,
}

impl ToolCallPart {
    pub fn new(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: Map<String, Value>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            args: ToolArgs::Object(args),
            tool_call_id: tool_call_id.into(),
        }
    }

    pub fn args_as_map(&self) -> Result<Map<String, Value>, ArgsError> {
        self.args.as_map()
    }
}

/// A single part of a model message, discriminated by `part_kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "part_kind", rename_all = "kebab-case")]
pub enum MessagePart {
    SystemPrompt {
        content: String,
    },
    UserPrompt {
        content: String,
        timestamp: DateTime<Utc>,
    },
    Text {
        content: String,
    },
    Thinking {
        content: String,
    },
    ToolCall(ToolCallPart),
    ToolReturn {
        tool_name: String,
        tool_call_id: String,
        content: Value,
        timestamp: DateTime<Utc>,
    },
}

impl MessagePart {
    pub fn user_prompt(content: impl Into<String>) -> Self {
        Self::UserPrompt {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }
}

/// A message in the runtime's history: requests go to the model, responses come from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelMessage {
    Request { parts: Vec<MessagePart> },
    Response { parts: Vec<MessagePart> },
}

impl ModelMessage {
    pub fn parts(&self) -> &[MessagePart] {
        match self {
            Self::Request { parts } | Self::Response { parts } => parts,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Self::Request { .. })
    }
}

/// Rebuild prior conversation turns into the runtime's message history.
///
/// - `user` becomes a request holding one user-prompt part.
/// - `assistant` becomes a response with an optional text part followed by one
///   tool-call part per recorded call; a turn with neither produces nothing.
/// - `tool` becomes a request holding one tool-return part. Both its `tool_call_id`
///   and its `tool_name` are the caller's tool call id, since clients do not send the
///   tool name on tool turns.
/// - Any other role is skipped.
pub fn build_message_history(turns: &[ConversationTurn]) -> Vec<ModelMessage> {
    let mut messages = Vec::with_capacity(turns.len());

    for turn in turns {
        match turn.role.as_str() {
            "user" => messages.push(ModelMessage::Request {
                parts: vec![MessagePart::user_prompt(turn.text())],
            }),
            "assistant" => {
                let mut parts = Vec::new();
                if !turn.text().is_empty() {
                    parts.push(MessagePart::text(turn.text()));
                }
                for call in turn.tool_calls.iter().flatten() {
                    parts.push(MessagePart::ToolCall(ToolCallPart::new(
                        call.tool_call_id.clone(),
                        call.tool_name.clone(),
                        call.arguments.clone(),
                    )));
                }
                if !parts.is_empty() {
                    messages.push(ModelMessage::Response { parts });
                }
            }
            "tool" => {
                let tool_call_id = turn.tool_call_id.clone().unwrap_or_default();
                messages.push(ModelMessage::Request {
                    parts: vec![MessagePart::ToolReturn {
                        tool_name: tool_call_id.clone(),
                        tool_call_id,
                        content: turn.result.clone().unwrap_or(Value::Null),
                        timestamp: Utc::now(),
                    }],
                });
            }
            other => {
                tracing::debug!(role = %other, "ignoring conversation turn with unknown role");
            }
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_tool_call_and_tool_turns_rebuild_to_three_messages() {
        let turns = vec![
            ConversationTurn::user("hi"),
            ConversationTurn::assistant(
                "",
                vec![ToolCallRecord {
                    tool_call_id: "1".to_string(),
                    tool_name: "f".to_string(),
                    arguments: Map::new(),
                }],
            ),
            ConversationTurn::tool("1", json!(42)),
        ];

        let history = build_message_history(&turns);
        assert_eq!(history.len(), 3);

        assert!(history[0].is_request());
        assert!(matches!(
            &history[0].parts()[0],
            MessagePart::UserPrompt { content, .. } if content == "hi"
        ));

        let assistant_parts = history[1].parts();
        assert!(!history[1].is_request());
        assert_eq!(
            assistant_parts
                .iter()
                .filter(|p| matches!(p, MessagePart::Text { .. }))
                .count(),
            0
        );
        assert_eq!(assistant_parts.len(), 1);
        match &assistant_parts[0] {
            MessagePart::ToolCall(part) => {
                assert_eq!(part.tool_call_id, "1");
                assert_eq!(part.tool_name, "f");
                assert!(part.args_as_map().unwrap().is_empty());
            }
            other => panic!("expected tool call part, got {:?}", other),
        }

        match &history[2].parts()[0] {
            MessagePart::ToolReturn {
                tool_name,
                tool_call_id,
                content,
                ..
            } => {
                assert_eq!(tool_call_id, "1");
                assert_eq!(tool_name, "1");
                assert_eq!(content, &json!(42));
            }
            other => panic!("expected tool return part, got {:?}", other),
        }
    }

    #[test]
    fn empty_assistant_turn_and_unknown_roles_are_skipped() {
        let turns = vec![
            ConversationTurn::assistant("", vec![]),
            ConversationTurn {
                role: "system".to_string(),
                content: Some("be nice".to_string()),
                ..ConversationTurn::default()
            },
            ConversationTurn::default(),
        ];

        assert!(build_message_history(&turns).is_empty());
    }

    #[test]
    fn assistant_text_precedes_tool_calls() {
        let turn = ConversationTurn::assistant(
            "let me check",
            vec![ToolCallRecord {
                tool_call_id: "a".to_string(),
                tool_name: "lookup".to_string(),
                arguments: json!({"q": "x"}).as_object().unwrap().clone(),
            }],
        );

        let history = build_message_history(&[turn]);
        let parts = history[0].parts();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], MessagePart::text("let me check"));
        assert!(matches!(&parts[1], MessagePart::ToolCall(p) if p.tool_name == "lookup"));
    }

    #[test]
    fn turns_deserialize_from_client_json() {
        let raw = json!([
            {"role": "user", "content": "hello"},
            {"role": "assistant", "content": null, "tool_calls": [
                {"tool_call_id": "c1", "tool_name": "f", "arguments": {"a": 1}}
            ]},
            {"role": "tool", "content": "", "tool_call_id": "c1", "result": {"ok": true}}
        ]);

        let turns: Vec<ConversationTurn> = serde_json::from_value(raw).unwrap();
        assert_eq!(turns[0].text(), "hello");
        assert_eq!(turns[1].text(), "");
        assert_eq!(turns[1].tool_calls.as_ref().unwrap()[0].arguments["a"], 1);
        assert_eq!(turns[2].result, Some(json!({"ok": true})));
    }

    #[test]
    fn raw_args_parse_into_objects() {
        assert!(ToolArgs::Raw(String::new()).as_map().unwrap().is_empty());

        let parsed = ToolArgs::Raw("{\"id\": 7}".to_string()).as_map().unwrap();
        assert_eq!(parsed["id"], 7);

        assert!(matches!(
            ToolArgs::Raw("[1, 2]".to_string()).as_map(),
            Err(ArgsError::NotAnObject(_))
        ));
        assert!(matches!(
            ToolArgs::Raw("{not json".to_string()).as_map(),
            Err(ArgsError::Json(_))
        ));
    }

    #[test]
    fn model_messages_serialize_with_kind_and_part_kind() {
        let message = ModelMessage::Response {
            parts: vec![MessagePart::ToolCall(ToolCallPart::new("1", "f", Map::new()))],
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["kind"], "response");
        assert_eq!(value["parts"][0]["part_kind"], "tool-call");
        assert_eq!(value["parts"][0]["tool_call_id"], "1");
    }
}
