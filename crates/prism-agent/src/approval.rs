// ABOUTME: Wraps tools so that a call only executes once it has been explicitly approved.
// ABOUTME: Wrapping copies the tool set; the agent's own tools are never mutated.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use prism_core::{CallContext, Tool, ToolError, ToolSet, ToolUseMode};

/// A tool that defers to its inner tool only for approved calls. Unapproved calls
/// return `ToolError::ApprovalRequired` without running anything.
pub struct ApprovalGated {
    inner: Arc<dyn Tool>,
}

impl ApprovalGated {
    pub fn new(inner: Arc<dyn Tool>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Arc<dyn Tool> {
        &self.inner
    }
}

#[async_trait]
impl Tool for ApprovalGated {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn schema(&self) -> Value {
        self.inner.schema()
    }

    async fn call(&self, ctx: &CallContext, args: Map<String, Value>) -> Result<Value, ToolError> {
        if !ctx.approved {
            tracing::debug!(
                tool = %self.inner.name(),
                tool_call_id = %ctx.tool_call_id,
                "deferring tool call until approved"
            );
            return Err(ToolError::ApprovalRequired);
        }
        self.inner.call(ctx, args).await
    }
}

/// Return a new set in which every tool requires approval before it runs.
pub fn wrap(tools: &ToolSet) -> ToolSet {
    tools
        .iter()
        .map(|tool| Arc::new(ApprovalGated::new(Arc::clone(tool))) as Arc<dyn Tool>)
        .collect()
}

/// The tool set a run should use under `mode`.
pub fn toolset_for(mode: ToolUseMode, tools: &ToolSet) -> ToolSet {
    match mode {
        ToolUseMode::Auto => tools.clone(),
        ToolUseMode::RequestApproval => wrap(tools),
    }
}
