//! Tool registry and executor
//!
//! Tools are named async functions with declared argument names. The
//! [`ToolRegistry`] looks a [`ToolCall`] up by name and runs it, and it
//! never propagates a failure: an unknown name, missing arguments or an
//! error from the tool body all become an error-carrying [`ToolResult`]
//! that is fed back into the conversation like any other result.

use crate::messages::{Message, ToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Arguments passed to a tool
pub type ToolArgs = serde_json::Map<String, Value>;

/// Errors raised by tools or the registry
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolError {
    #[error("Tool '{0}' not found")]
    UnknownTool(String),

    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("{0}")]
    Execution(String),

    /// The input expression was rejected before evaluation
    #[error("{0}")]
    Expression(String),
}

impl ToolError {
    /// Text shown to the model for this failure
    pub fn to_content(&self) -> String {
        match self {
            ToolError::UnknownTool(_) => self.to_string(),
            ToolError::Expression(message) => format!("Error: {}", message),
            ToolError::InvalidArguments { .. } | ToolError::Execution(_) => {
                format!("Error executing tool: {}", self)
            }
        }
    }
}

/// A callable tool
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Required argument names
    fn arg_names(&self) -> &[&'static str];

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError>;
}

/// Outcome of one tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    /// Message appended to the conversation log
    pub fn to_message(&self) -> Message {
        Message::tool(self.content.clone(), self.call_id.clone(), self.name.clone())
    }
}

/// Fixed set of tools available to a graph
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// `- name(arg, ...): description` lines for prompts
    pub fn describe(&self) -> String {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                format!(
                    "- {}({}): {}",
                    tool.name(),
                    tool.arg_names().join(", "),
                    tool.description()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn try_execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;

        let missing: Vec<&str> = tool
            .arg_names()
            .iter()
            .copied()
            .filter(|arg| !call.args.contains_key(*arg))
            .collect();
        if !missing.is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: call.name.clone(),
                reason: format!("missing {}", missing.join(", ")),
            });
        }

        tool.execute(call.args.clone()).await
    }

    /// Run one call. Never fails; errors are carried in the result.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        debug!(tool = %call.name, call_id = %call.id, "Executing tool");
        match self.try_execute(call).await {
            Ok(content) => ToolResult {
                call_id: call.id.clone(),
                name: call.name.clone(),
                content,
                is_error: false,
            },
            Err(err) => {
                warn!(tool = %call.name, error = %err, "Tool call failed");
                ToolResult {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    content: err.to_content(),
                    is_error: true,
                }
            }
        }
    }

    /// Run several calls concurrently, results in call order
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        futures::future::join_all(calls.iter().map(|call| self.execute(call))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Repeat the input"
        }

        fn arg_names(&self) -> &[&'static str] {
            &["text"]
        }

        async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
            match args.get("text").and_then(Value::as_str) {
                Some("boom") => Err(ToolError::Execution("exploded".into())),
                Some(text) => Ok(text.to_string()),
                None => Err(ToolError::Execution("text must be a string".into())),
            }
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        registry
    }

    fn call(name: &str, args: Value) -> ToolCall {
        let args = match args {
            Value::Object(map) => map,
            _ => ToolArgs::new(),
        };
        ToolCall::new("call_1", name, args)
    }

    #[tokio::test]
    async fn test_successful_call() {
        let result = registry().execute(&call("echo", json!({"text": "hi"}))).await;
        assert!(!result.is_error);
        assert_eq!(result.content, "hi");
        assert_eq!(
            result.to_message(),
            Message::tool("hi", "call_1", "echo")
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_result() {
        let result = registry().execute(&call("nope", json!({}))).await;
        assert!(result.is_error);
        assert_eq!(result.content, "Tool 'nope' not found");
    }

    #[tokio::test]
    async fn test_failures_are_results() {
        let registry = registry();

        let failed = registry.execute(&call("echo", json!({"text": "boom"}))).await;
        assert_eq!(failed.content, "Error executing tool: exploded");

        let missing = registry.execute(&call("echo", json!({}))).await;
        assert!(missing.is_error);
        assert!(missing.content.starts_with("Error executing tool: Invalid arguments"));
    }

    #[tokio::test]
    async fn test_execute_all_keeps_order() {
        let calls = vec![
            call("echo", json!({"text": "a"})),
            call("missing", json!({})),
        ];
        let results = registry().execute_all(&calls).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "a");
        assert!(results[1].is_error);
    }

    #[test]
    fn test_describe() {
        assert_eq!(registry().describe(), "- echo(text): Repeat the input");
        assert_eq!(registry().names(), vec!["echo"]);
    }
}
