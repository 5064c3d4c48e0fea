// ABOUTME: Agent listing API handlers: every registered agent with its scenarios, and one agent's detail.
// ABOUTME: Scenarios are exposed under the wire name `dependencies` as `{name, data}` pairs.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::{Map, Value};

use prism_core::{Scenario, ToolDefinition};

use crate::app_state::SharedState;

/// A scenario as the UI consumes it.
#[derive(Debug, Serialize)]
pub struct ScenarioView {
    pub name: String,
    pub data: Map<String, Value>,
}

impl From<Scenario> for ScenarioView {
    fn from(scenario: Scenario) -> Self {
        Self {
            name: scenario.name,
            data: scenario.dependencies,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AgentListing {
    pub name: String,
    pub dependencies: Vec<ScenarioView>,
}

#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    pub agents: Vec<AgentListing>,
}

#[derive(Debug, Serialize)]
pub struct AgentDetail {
    pub name: String,
    pub description: Option<String>,
    pub dependency_schema: Option<Value>,
    pub tools: Vec<ToolDefinition>,
    pub dependencies: Vec<ScenarioView>,
}

/// GET /api/agents - List agents in registration order.
pub async fn list_agents(State(state): State<SharedState>) -> Json<AgentsResponse> {
    let agents = state
        .registry
        .list_all()
        .into_iter()
        .map(|summary| AgentListing {
            name: summary.name,
            dependencies: summary.scenarios.into_iter().map(ScenarioView::from).collect(),
        })
        .collect();

    Json(AgentsResponse { agents })
}

/// GET /api/agents/{name} - Describe one agent, its tools and scenarios.
pub async fn get_agent(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let record = match state.registry.record(&name) {
        Ok(record) => record,
        Err(e) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    Json(AgentDetail {
        name: record.name.clone(),
        description: record.agent.description().map(str::to_string),
        dependency_schema: record.agent.dependency_schema().cloned(),
        tools: record.agent.toolset().definitions(),
        dependencies: record
            .scenarios
            .iter()
            .cloned()
            .map(ScenarioView::from)
            .collect(),
    })
    .into_response()
}
