// ABOUTME: Deterministic agent runtime that replays a fixed script of text, thinking and tool steps.
// ABOUTME: Lets manifest-declared agents stream realistic run events without calling a model.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream;
use serde_json::{Map, Value};

use prism_core::{
    Agent, CallContext, MessagePart, PartDelta, PendingApproval, RunError, RunEvent, RunRequest,
    RunStream, ToolCallPart, ToolError, ToolSet,
};

use crate::template;

/// One scripted action.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Text(String),
    Thinking(String),
    ToolCall {
        tool: String,
        arguments: Map<String, Value>,
    },
}

/// The tool call id the scripted runtime assigns to the step at `index`.
pub fn call_id(index: usize) -> String {
    format!("call_{}", index)
}

/// Result reported for a call the user denied.
pub const DENIED_RESULT: &str = "The user denied this tool call.";

pub struct ScriptedAgent {
    name: String,
    description: Option<String>,
    tools: ToolSet,
    dependency_schema: Option<Value>,
    script: Arc<Vec<ScriptStep>>,
}

impl ScriptedAgent {
    pub fn new(name: impl Into<String>, script: Vec<ScriptStep>) -> Self {
        Self {
            name: name.into(),
            description: None,
            tools: ToolSet::new(),
            dependency_schema: None,
            script: Arc::new(script),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_dependency_schema(mut self, schema: Value) -> Self {
        self.dependency_schema = Some(schema);
        self
    }

    pub fn script(&self) -> &[ScriptStep] {
        &self.script
    }

    fn required_dependencies(&self) -> Vec<String> {
        self.dependency_schema
            .as_ref()
            .and_then(|schema| schema.get("required"))
            .and_then(Value::as_array)
            .map(|keys| {
                keys.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Where a run starts. A run carrying approval decisions resumes at the latest
    /// decided tool step. Decisions for earlier calls are ones a previous turn already
    /// acted on, so those calls never run twice.
    fn resume_index(&self, request: &RunRequest) -> usize {
        self.script
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, step)| matches!(step, ScriptStep::ToolCall { .. }))
            .map(|(idx, _)| idx)
            .find(|idx| request.approval_for(&call_id(*idx)).is_some())
            .unwrap_or(0)
    }
}

impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn toolset(&self) -> &ToolSet {
        &self.tools
    }

    fn dependency_schema(&self) -> Option<&Value> {
        self.dependency_schema.as_ref()
    }

    fn run(&self, request: RunRequest) -> RunStream {
        let missing: Vec<String> = self
            .required_dependencies()
            .into_iter()
            .filter(|key| !request.dependencies.contains_key(key))
            .collect();

        let mut vars = request.dependencies.clone();
        vars.insert("prompt".to_string(), Value::String(request.prompt.clone()));

        let start = self.resume_index(&request);
        tracing::debug!(
            agent = %self.name,
            steps = self.script.len(),
            start,
            history = request.history.len(),
            "starting scripted run"
        );

        let mut run = ScriptRun {
            script: Arc::clone(&self.script),
            request,
            vars,
            step: start,
            part_index: 0,
            queued: VecDeque::new(),
            pending: Vec::new(),
            finished: false,
        };

        if !missing.is_empty() {
            run.queued.push_back(Err(RunError::InvalidDependencies(format!(
                "missing required dependencies: {}",
                missing.join(", ")
            ))));
            run.finished = true;
        }

        Box::pin(stream::unfold(run, |mut run| async move {
            let item = run.next_event().await?;
            Some((item, run))
        }))
    }
}

struct ScriptRun {
    script: Arc<Vec<ScriptStep>>,
    request: RunRequest,
    vars: Map<String, Value>,
    step: usize,
    part_index: usize,
    queued: VecDeque<Result<RunEvent, RunError>>,
    pending: Vec<PendingApproval>,
    finished: bool,
}

impl ScriptRun {
    async fn next_event(&mut self) -> Option<Result<RunEvent, RunError>> {
        loop {
            if let Some(item) = self.queued.pop_front() {
                if item.is_err() {
                    self.queued.clear();
                    self.finished = true;
                }
                return Some(item);
            }
            if self.finished {
                return None;
            }

            let idx = self.step;
            let Some(step) = self.script.get(idx).cloned() else {
                self.finished = true;
                return Some(Ok(RunEvent::RunComplete {
                    pending: std::mem::take(&mut self.pending),
                }));
            };
            self.step += 1;

            match step {
                ScriptStep::Text(text) => self.stream_text(&text),
                ScriptStep::Thinking(text) => self.stream_thinking(&text),
                ScriptStep::ToolCall { tool, arguments } => {
                    self.call_tool(idx, tool, arguments).await
                }
            }
        }
    }

    fn next_part_index(&mut self) -> usize {
        let index = self.part_index;
        self.part_index += 1;
        index
    }

    fn stream_text(&mut self, text: &str) {
        let rendered = template::render(text, &self.vars);
        let mut chunks = rendered.split_inclusive(' ');
        let Some(first) = chunks.next() else {
            return;
        };

        let index = self.next_part_index();
        self.queued.push_back(Ok(RunEvent::PartStart {
            index,
            part: MessagePart::text(first),
        }));
        for chunk in chunks {
            self.queued.push_back(Ok(RunEvent::PartDelta {
                index,
                delta: PartDelta::Text {
                    content_delta: chunk.to_string(),
                },
            }));
        }
    }

    fn stream_thinking(&mut self, text: &str) {
        let rendered = template::render(text, &self.vars);
        let index = self.next_part_index();
        self.queued.push_back(Ok(RunEvent::PartStart {
            index,
            part: MessagePart::Thinking {
                content: String::new(),
            },
        }));
        for chunk in rendered.split_inclusive(' ') {
            self.queued.push_back(Ok(RunEvent::PartDelta {
                index,
                delta: PartDelta::Thinking {
                    content_delta: chunk.to_string(),
                },
            }));
        }
    }

    async fn call_tool(&mut self, step: usize, tool_name: String, arguments: Map<String, Value>) {
        let tool_call_id = call_id(step);
        let arguments: Map<String, Value> = arguments
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => (key, Value::String(template::render(&s, &self.vars))),
                other => (key, other),
            })
            .collect();

        let part = ToolCallPart::new(tool_call_id.clone(), tool_name.clone(), arguments.clone());
        let index = self.next_part_index();
        self.queued.push_back(Ok(RunEvent::PartStart {
            index,
            part: MessagePart::ToolCall(part.clone()),
        }));
        self.queued.push_back(Ok(RunEvent::ToolCallStarted { part }));

        let decision = self.request.approval_for(&tool_call_id);
        if decision == Some(false) {
            tracing::info!(tool = %tool_name, tool_call_id = %tool_call_id, "tool call denied");
            self.queued.push_back(Ok(RunEvent::ToolCallResult {
                tool_call_id,
                tool_name,
                result: Value::String(DENIED_RESULT.to_string()),
            }));
            return;
        }

        let Some(tool) = self.request.toolset.get(&tool_name).cloned() else {
            self.queued.push_back(Err(RunError::UnknownTool(tool_name)));
            return;
        };

        let ctx = CallContext {
            tool_call_id: tool_call_id.clone(),
            dependencies: self.request.dependencies.clone(),
            approved: decision == Some(true),
        };

        match tool.call(&ctx, arguments.clone()).await {
            Ok(result) => self.queued.push_back(Ok(RunEvent::ToolCallResult {
                tool_call_id,
                tool_name,
                result,
            })),
            Err(ToolError::ApprovalRequired) => {
                tracing::info!(
                    tool = %tool_name,
                    tool_call_id = %tool_call_id,
                    "tool call awaiting approval"
                );
                self.pending.push(PendingApproval {
                    tool_call_id,
                    tool_name,
                    arguments,
                });
                // The rest of the script waits for the decision.
                self.step = self.script.len();
            }
            Err(ToolError::Failed(e)) => {
                self.queued.push_back(Err(RunError::Tool {
                    tool: tool_name,
                    message: format!("{:#}", e),
                }));
            }
        }
    }
}
