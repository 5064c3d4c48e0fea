// ABOUTME: Chat API handler that runs one agent turn and streams its events as NDJSON.
// ABOUTME: Request errors are answered before streaming; run errors are reported inside the stream.

use std::collections::HashMap;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use ulid::Ulid;

use prism_agent::{toolset_for, translate};
use prism_core::{ConversationTurn, OutwardEvent, RunRequest, ToolUseMode, build_message_history};

use crate::app_state::SharedState;

/// Media type of the chat response body.
pub const NDJSON: &str = "application/x-ndjson";

/// Request body for a chat turn.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub agent: String,
    pub messages: Vec<ConversationTurn>,
    #[serde(default)]
    pub dependencies: Option<Map<String, Value>>,
    #[serde(default)]
    pub use_tools: Option<ToolUseMode>,
    /// Decisions for calls a previous turn left pending, keyed by tool call id.
    #[serde(default)]
    pub approvals: Option<HashMap<String, bool>>,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// POST /api/chat - Run the agent on the last message, with earlier messages as history.
pub async fn chat(State(state): State<SharedState>, Json(req): Json<ChatRequest>) -> Response {
    let Some((last, earlier)) = req.messages.split_last() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "messages must not be empty".to_string(),
        );
    };

    let agent = match state.registry.get(&req.agent) {
        Ok(agent) => agent,
        Err(e) => return error_response(StatusCode::NOT_FOUND, e.to_string()),
    };

    let mode = req.use_tools.unwrap_or_default();
    let approvals = approvals_for(mode, req.approvals.clone().unwrap_or_default(), &req.agent);
    let history = build_message_history(earlier);
    let request = RunRequest::new(last.text(), toolset_for(mode, agent.toolset()))
        .history(history)
        .dependencies(req.dependencies.clone().unwrap_or_default())
        .approvals(approvals);

    let run_id = Ulid::new();
    tracing::info!(
        run_id = %run_id,
        agent = %req.agent,
        mode = ?mode,
        history = request.history.len(),
        approvals = request.approvals.len(),
        "starting chat run"
    );

    let events = translate(agent.run(request), state.run_timeout);
    let lines = events.map(move |event| {
        log_event(&run_id, &event);
        event.to_ndjson_line()
    });

    (
        [
            (header::CONTENT_TYPE, NDJSON),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(lines),
    )
        .into_response()
}

/// Decisions only resolve calls deferred in approval mode; auto runs never defer,
/// so any decisions they carry are stale and dropped.
fn approvals_for(
    mode: ToolUseMode,
    approvals: HashMap<String, bool>,
    agent: &str,
) -> HashMap<String, bool> {
    match mode {
        ToolUseMode::RequestApproval => approvals,
        ToolUseMode::Auto => {
            if !approvals.is_empty() {
                tracing::debug!(
                    agent = %agent,
                    count = approvals.len(),
                    "ignoring approvals outside request_approval mode"
                );
            }
            HashMap::new()
        }
    }
}

fn log_event(run_id: &Ulid, event: &OutwardEvent) {
    match event {
        OutwardEvent::Error { message } => {
            tracing::warn!(run_id = %run_id, error = %message, "chat run reported an error");
        }
        OutwardEvent::Done { status } => {
            tracing::info!(run_id = %run_id, status = ?status, "chat run finished");
        }
        other => {
            tracing::trace!(run_id = %run_id, event = other.type_name(), "chat event");
        }
    }
}
