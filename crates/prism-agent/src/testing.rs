// ABOUTME: Test utilities for prism, including a stub agent that replays canned run events.
// ABOUTME: Used in tests to drive the translator and chat endpoint without a real runtime.

use std::sync::Arc;

use futures::stream;
use parking_lot::Mutex;

use prism_core::{Agent, RunError, RunEvent, RunRequest, RunStream, ToolSet};

/// One item a [`StubAgent`] yields.
#[derive(Debug, Clone)]
pub enum StubStep {
    Event(RunEvent),
    /// Fail the run with a runtime error carrying this message.
    Fail(String),
}

/// An agent that replays a fixed sequence of run events on every run.
///
/// The most recent request is captured so tests can assert on the prompt,
/// history, dependencies and tool set the caller built.
pub struct StubAgent {
    name: String,
    tools: ToolSet,
    steps: Vec<StubStep>,
    last_request: Arc<Mutex<Option<RunRequest>>>,
}

impl StubAgent {
    pub fn new(name: &str, steps: Vec<StubStep>) -> Self {
        Self {
            name: name.to_owned(),
            tools: ToolSet::new(),
            steps,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// A stub whose runs only complete.
    pub fn done(name: &str) -> Self {
        Self::new(
            name,
            vec![StubStep::Event(RunEvent::RunComplete { pending: vec![] })],
        )
    }

    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }

    /// The request passed to the most recent run, if any.
    pub fn last_request(&self) -> Option<RunRequest> {
        self.last_request.lock().clone()
    }
}

impl Agent for StubAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn toolset(&self) -> &ToolSet {
        &self.tools
    }

    fn run(&self, request: RunRequest) -> RunStream {
        *self.last_request.lock() = Some(request);
        let items: Vec<Result<RunEvent, RunError>> = self
            .steps
            .iter()
            .map(|step| match step {
                StubStep::Event(event) => Ok(event.clone()),
                StubStep::Fail(message) => Err(RunError::Runtime(message.clone())),
            })
            .collect();
        Box::pin(stream::iter(items))
    }
}
