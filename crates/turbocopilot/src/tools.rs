//! Custom tools implemented by the host
//!
//! A [`Tool`] pairs the definition advertised at session creation with the
//! async function that runs when the runtime sends `tool.call`. Whatever the
//! handler does, the runtime gets a [`ToolResult`]: errors and panics become
//! `failure` results.

use crate::error::Result;
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use tracing::warn;
use turbocopilot_protocol::{ToolDefinition, ToolResult};

const FAILURE_TEXT: &str =
    "Invoking this tool produced an error. Detailed information is not available.";

/// Type alias for async tool handlers
pub type ToolHandler = Arc<
    dyn Fn(ToolInvocation) -> Pin<Box<dyn Future<Output = Result<ToolResult>> + Send>>
        + Send
        + Sync,
>;

/// One `tool.call` from the runtime
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    /// Session the call belongs to
    pub session_id: String,
    /// Runtime-assigned call id
    pub tool_call_id: String,
    /// Tool name
    pub tool_name: String,
    /// Arguments, always a JSON value (`{}` when absent)
    pub arguments: Value,
}

/// A host-implemented tool
#[derive(Clone)]
pub struct Tool {
    definition: ToolDefinition,
    handler: ToolHandler,
}

impl Tool {
    /// Create a tool from its name and handler
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ToolInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult>> + Send + 'static,
    {
        Self {
            definition: ToolDefinition {
                name: name.into(),
                description: None,
                parameters: None,
            },
            handler: Arc::new(move |invocation| Box::pin(handler(invocation))),
        }
    }

    /// Set the description shown to the model
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = Some(description.into());
        self
    }

    /// Set the JSON Schema of the arguments
    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.definition.parameters = Some(schema);
        self
    }

    /// Tool name
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Wire definition
    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Run the handler; never fails
    pub(crate) async fn call(&self, invocation: ToolInvocation) -> ToolResult {
        let tool_name = invocation.tool_name.clone();
        let Ok(pending) = std::panic::catch_unwind(AssertUnwindSafe(|| (self.handler)(invocation)))
        else {
            warn!(%tool_name, "Tool handler panicked");
            return ToolResult::failure(FAILURE_TEXT, "tool handler panicked");
        };

        match AssertUnwindSafe(pending).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(%tool_name, error = %err, "Tool handler failed");
                ToolResult::failure(FAILURE_TEXT, err.to_string())
            }
            Err(_) => {
                warn!(%tool_name, "Tool handler panicked");
                ToolResult::failure(FAILURE_TEXT, "tool handler panicked")
            }
        }
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("definition", &self.definition)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CopilotError;
    use serde_json::json;
    use turbocopilot_protocol::ToolResultType;

    fn invocation(arguments: Value) -> ToolInvocation {
        ToolInvocation {
            session_id: "s1".to_string(),
            tool_call_id: "call-1".to_string(),
            tool_name: "lookup".to_string(),
            arguments,
        }
    }

    #[test]
    fn test_definition() {
        let tool = Tool::new("lookup", |_| async { Ok(ToolResult::success("ok")) })
            .with_description("Look up an issue")
            .with_parameters(json!({"type": "object"}));

        assert_eq!(tool.name(), "lookup");
        assert_eq!(
            serde_json::to_value(tool.definition()).unwrap(),
            json!({
                "name": "lookup",
                "description": "Look up an issue",
                "parameters": {"type": "object"}
            })
        );
    }

    #[tokio::test]
    async fn test_call_passes_arguments() {
        let tool = Tool::new("lookup", |inv| async move {
            let id = inv.arguments["id"].as_str().unwrap_or_default().to_string();
            Ok(ToolResult::success(format!("issue {}", id)))
        });

        let result = tool.call(invocation(json!({"id": "12345"}))).await;
        assert_eq!(result.result_type, ToolResultType::Success);
        assert_eq!(result.text_result_for_llm, "issue 12345");
    }

    #[tokio::test]
    async fn test_error_becomes_failure() {
        let tool = Tool::new("lookup", |_| async {
            Err(CopilotError::Handler("database offline".to_string()))
        });

        let result = tool.call(invocation(json!({}))).await;
        assert_eq!(result.result_type, ToolResultType::Failure);
        assert!(result.error.unwrap().contains("database offline"));
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        async fn buggy(_: ToolInvocation) -> Result<ToolResult> {
            panic!("index out of bounds")
        }
        let tool = Tool::new("lookup", buggy);

        let result = tool.call(invocation(json!({}))).await;
        assert_eq!(result.result_type, ToolResultType::Failure);
    }
}
