//! Custom tool definitions and `tool.call` payloads

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool the host implements and advertises at session creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// What the tool does, shown to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema of the arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Params of a `tool.call` server call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallParams {
    /// Session the call belongs to
    pub session_id: String,

    /// Tool call id
    pub tool_call_id: String,

    /// Tool name
    pub tool_name: String,

    /// Arguments as an object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,

    /// Arguments as a JSON string (older runtimes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments_json: Option<String>,
}

impl ToolCallParams {
    /// Arguments normalized to a JSON value; unreadable input becomes `{}`
    pub fn arguments(&self) -> Value {
        let raw = match (&self.arguments, &self.arguments_json) {
            (Some(args), _) if !args.is_null() => args.clone(),
            (_, Some(json)) => Value::String(json.clone()),
            _ => Value::Null,
        };

        match raw {
            Value::String(s) => {
                serde_json::from_str(&s).unwrap_or_else(|_| Value::Object(Map::new()))
            }
            Value::Null => Value::Object(Map::new()),
            other => other,
        }
    }
}

/// How a tool invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolResultType {
    /// Ran and produced a result
    Success,
    /// Ran and failed
    Failure,
    /// Refused to run
    Rejected,
    /// Not permitted
    Denied,
}

/// Result returned for a `tool.call`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Text the model sees
    pub text_result_for_llm: String,

    /// Outcome
    pub result_type: ToolResultType,

    /// Error detail for failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Log line recorded in the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_log: Option<String>,

    /// Free-form telemetry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_telemetry: Option<Map<String, Value>>,
}

impl ToolResult {
    /// Successful result
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text_result_for_llm: text.into(),
            result_type: ToolResultType::Success,
            error: None,
            session_log: None,
            tool_telemetry: None,
        }
    }

    /// Failed result
    pub fn failure(text: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            text_result_for_llm: text.into(),
            result_type: ToolResultType::Failure,
            error: Some(error.into()),
            session_log: None,
            tool_telemetry: None,
        }
    }

    /// Result for a tool the host does not implement
    pub fn unsupported(tool_name: &str) -> Self {
        Self::failure(
            format!("Tool '{}' is not supported.", tool_name),
            format!("tool '{}' not supported", tool_name),
        )
    }
}

impl From<String> for ToolResult {
    fn from(text: String) -> Self {
        Self::success(text)
    }
}

impl From<&str> for ToolResult {
    fn from(text: &str) -> Self {
        Self::success(text)
    }
}
