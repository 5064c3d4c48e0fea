// ABOUTME: HTTP server for prism, exposing registered agents and streaming chat runs as NDJSON.
// ABOUTME: Uses Axum with a shared agent registry, plus static or dev-proxied UI serving.

pub mod api;
pub mod app_state;
pub mod config;
pub mod frontend;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use config::{ConfigError, PrismConfig};
pub use frontend::Frontend;
pub use routes::{create_router, mount};
