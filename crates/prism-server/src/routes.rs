// ABOUTME: Route definitions for the prism HTTP API.
// ABOUTME: Assembles API routes, the UI fallback, CORS and request tracing into a single Axum Router.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;
use crate::frontend::Frontend;

/// Build the complete Axum router with all routes and shared state.
pub fn create_router(state: SharedState, frontend: Option<Frontend>) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/api/agents", get(api::agents::list_agents))
        .route("/api/agents/{name}", get(api::agents::get_agent))
        .route("/api/chat", post(api::chat::chat))
        .with_state(state);

    let router = match frontend {
        Some(frontend) => frontend.attach(router),
        None => router,
    };

    router.layer(TraceLayer::new_for_http()).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// Mount `router` under `root_path` (already normalised; empty means the root).
pub fn mount(router: Router, root_path: &str) -> Router {
    if root_path.is_empty() {
        router
    } else {
        Router::new().nest(root_path, router)
    }
}

/// Health check handler. Returns 200 OK with a simple JSON body.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
