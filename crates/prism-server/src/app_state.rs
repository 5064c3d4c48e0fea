// ABOUTME: Shared application state for the prism HTTP server.
// ABOUTME: Holds the agent registry populated at startup and the per-run time limit.

use std::sync::Arc;
use std::time::Duration;

use prism_core::AgentRegistry;

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub registry: Arc<AgentRegistry>,
    /// Runs still streaming after this long are cut off with an error event.
    pub run_timeout: Option<Duration>,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            run_timeout: None,
        }
    }

    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }
}
