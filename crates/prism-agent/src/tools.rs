// ABOUTME: Tools declared in agent manifests. Each answers with its template rendered over
// ABOUTME: the run's dependencies and the call arguments, so playground agents need no backend.

use async_trait::async_trait;
use serde_json::{Map, Value};

use prism_core::{CallContext, Tool, ToolError};

use crate::template;

/// A declarative tool. With a template the result is the rendered string; without
/// one the tool echoes its arguments.
pub struct TemplateTool {
    name: String,
    description: String,
    parameters: Value,
    template: Option<String>,
}

impl TemplateTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            template: None,
        }
    }

    pub fn returning(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
}

#[async_trait]
impl Tool for TemplateTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> Value {
        self.parameters.clone()
    }

    async fn call(&self, ctx: &CallContext, args: Map<String, Value>) -> Result<Value, ToolError> {
        match &self.template {
            Some(template) => {
                let vars = template::merged(&ctx.dependencies, &args);
                Ok(Value::String(template::render(template, &vars)))
            }
            None => Ok(Value::Object(args)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::empty_schema;
    use serde_json::json;

    #[tokio::test]
    async fn renders_arguments_over_dependencies() {
        let tool = TemplateTool::new("check_order_status", "Check an order", empty_schema())
            .returning("Order {order_id} ships from {company_name}.");
        let ctx = CallContext {
            tool_call_id: "call_2".to_string(),
            dependencies: json!({"company_name": "ACME", "order_id": "shadowed"})
                .as_object()
                .unwrap()
                .clone(),
            approved: false,
        };
        let args = json!({"order_id": "A-1001"}).as_object().unwrap().clone();

        let out = tool.call(&ctx, args).await.unwrap();
        assert_eq!(out, json!("Order A-1001 ships from ACME."));
    }

    #[tokio::test]
    async fn without_template_echoes_arguments() {
        let tool = TemplateTool::new("echo", "Echo back", empty_schema());
        let args = json!({"x": 1}).as_object().unwrap().clone();

        let out = tool.call(&CallContext::default(), args).await.unwrap();
        assert_eq!(out, json!({"x": 1}));
        assert_eq!(tool.schema(), empty_schema());
    }
}
