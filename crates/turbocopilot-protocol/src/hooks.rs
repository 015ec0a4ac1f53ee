//! Hook payloads for `hooks.invoke`
//!
//! Hooks observe and shape a session at fixed points. Only `preToolUse` can
//! gate anything, through its [`PermissionDecision`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Hook points the runtime can invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookType {
    /// Before a tool runs
    PreToolUse,
    /// After a tool ran
    PostToolUse,
    /// A prompt was submitted
    UserPromptSubmitted,
    /// The session started or resumed
    SessionStart,
    /// The session ended
    SessionEnd,
    /// An error occurred
    ErrorOccurred,
}

impl HookType {
    /// Parse a wire name
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "preToolUse" => Some(Self::PreToolUse),
            "postToolUse" => Some(Self::PostToolUse),
            "userPromptSubmitted" => Some(Self::UserPromptSubmitted),
            "sessionStart" => Some(Self::SessionStart),
            "sessionEnd" => Some(Self::SessionEnd),
            "errorOccurred" => Some(Self::ErrorOccurred),
            _ => None,
        }
    }

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreToolUse => "preToolUse",
            Self::PostToolUse => "postToolUse",
            Self::UserPromptSubmitted => "userPromptSubmitted",
            Self::SessionStart => "sessionStart",
            Self::SessionEnd => "sessionEnd",
            Self::ErrorOccurred => "errorOccurred",
        }
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Params of a `hooks.invoke` server call
///
/// `hook_type` stays a string so an unknown hook can be reported by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookInvokeParams {
    /// Session the hook fires for
    pub session_id: String,
    /// Hook point name
    pub hook_type: String,
    /// Hook-specific input
    #[serde(default)]
    pub input: Value,
}

/// Permission decision for PreToolUse hooks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PermissionDecision {
    /// Allow the tool to execute
    Allow,
    /// Deny the tool execution
    Deny,
    /// Defer to the permission handler
    Ask,
}

/// `preToolUse` input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreToolUseInput {
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Working directory
    pub cwd: String,
    /// Tool about to run
    pub tool_name: String,
    /// Its arguments
    #[serde(default)]
    pub tool_args: Value,
    /// Tool call id, when the runtime supplies it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// `preToolUse` output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreToolUseOutput {
    /// Override the permission outcome for this call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_decision: Option<PermissionDecision>,
    /// Why
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_decision_reason: Option<String>,
    /// Replacement arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_args: Option<Value>,
    /// Extra context for the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    /// Hide tool output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress_output: Option<bool>,
}

impl PreToolUseOutput {
    /// Output carrying only a permission decision
    pub fn decide(decision: PermissionDecision) -> Self {
        Self {
            permission_decision: Some(decision),
            ..Default::default()
        }
    }

    /// Attach a reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.permission_decision_reason = Some(reason.into());
        self
    }
}

/// `postToolUse` input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostToolUseInput {
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Working directory
    pub cwd: String,
    /// Tool that ran
    pub tool_name: String,
    /// Its arguments
    #[serde(default)]
    pub tool_args: Value,
    /// Its result
    #[serde(default)]
    pub tool_result: Value,
}

/// `postToolUse` output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostToolUseOutput {
    /// Replacement result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_result: Option<Value>,
    /// Extra context for the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    /// Hide tool output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress_output: Option<bool>,
}

/// `userPromptSubmitted` input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPromptSubmittedInput {
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Working directory
    pub cwd: String,
    /// The prompt
    pub prompt: String,
}

/// `userPromptSubmitted` output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPromptSubmittedOutput {
    /// Replacement prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_prompt: Option<String>,
    /// Extra context for the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    /// Hide output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress_output: Option<bool>,
}

/// How a session came to start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStartSource {
    /// Runtime startup
    Startup,
    /// Resumed session
    Resume,
    /// Fresh session
    New,
}

/// `sessionStart` input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartInput {
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Working directory
    pub cwd: String,
    /// Start source
    pub source: SessionStartSource,
    /// First prompt, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_prompt: Option<String>,
}

/// `sessionStart` output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartOutput {
    /// Extra context for the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    /// Configuration overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_config: Option<Value>,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    /// Finished normally
    Complete,
    /// Failed
    Error,
    /// Aborted
    Abort,
    /// Timed out
    Timeout,
    /// The user exited
    UserExit,
}

/// `sessionEnd` input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndInput {
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Working directory
    pub cwd: String,
    /// End reason
    pub reason: SessionEndReason,
    /// Last assistant message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_message: Option<String>,
    /// Error text when `reason` is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `sessionEnd` output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndOutput {
    /// Hide output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress_output: Option<bool>,
    /// Cleanup steps for the runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_actions: Option<Vec<String>>,
    /// Summary to persist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_summary: Option<String>,
}

/// Where an error happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorContext {
    /// During a model call
    ModelCall,
    /// During tool execution
    ToolExecution,
    /// Inside the runtime
    System,
    /// While collecting user input
    UserInput,
}

/// `errorOccurred` input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOccurredInput {
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Working directory
    pub cwd: String,
    /// Error text
    pub error: String,
    /// Error location
    pub error_context: ErrorContext,
    /// Whether the runtime can continue
    pub recoverable: bool,
}

/// Requested error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorHandling {
    /// Retry the failed step
    Retry,
    /// Skip it
    Skip,
    /// Abort the turn
    Abort,
}

/// `errorOccurred` output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOccurredOutput {
    /// Hide output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress_output: Option<bool>,
    /// Requested handling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_handling: Option<ErrorHandling>,
    /// Retries to attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    /// Message to show the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_notification: Option<String>,
}
