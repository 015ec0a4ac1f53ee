//! Permission request and decision types
//!
//! The runtime asks before running a side-effecting tool. The answer is one of
//! a closed set of outcome kinds; programmatic denial and interactive denial by
//! a user are separate kinds and stay separate all the way to the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// What the tool wants to do
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PermissionKind {
    /// Run a shell command
    Shell,
    /// Write to the filesystem
    Write,
    /// Read from the filesystem
    Read,
    /// Call an MCP tool
    Mcp,
    /// Fetch a URL
    Url,
    /// Any kind this crate does not know
    Other(String),
}

impl PermissionKind {
    /// Wire name
    pub fn as_str(&self) -> &str {
        match self {
            Self::Shell => "shell",
            Self::Write => "write",
            Self::Read => "read",
            Self::Mcp => "mcp",
            Self::Url => "url",
            Self::Other(kind) => kind.as_str(),
        }
    }
}

impl From<String> for PermissionKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "shell" => Self::Shell,
            "write" => Self::Write,
            "read" => Self::Read,
            "mcp" => Self::Mcp,
            "url" => Self::Url,
            _ => Self::Other(kind),
        }
    }
}

impl From<PermissionKind> for String {
    fn from(kind: PermissionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A permission check issued by the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    /// Kind of access requested
    pub kind: PermissionKind,

    /// Tool call the check belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Kind-specific detail (command text, file path, tool name, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PermissionRequest {
    /// Request of `kind` with no detail
    pub fn new(kind: PermissionKind) -> Self {
        Self {
            kind,
            tool_call_id: None,
            extra: Map::new(),
        }
    }

    /// Look up a kind-specific field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Tool name when the runtime supplied one
    pub fn tool_name(&self) -> Option<&str> {
        self.field("toolName").and_then(Value::as_str)
    }
}

/// Params of a `permission.request` server call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequestParams {
    /// Session the request belongs to
    pub session_id: String,

    /// The check itself
    pub permission_request: PermissionRequest,
}

/// Outcome of a permission check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionResultKind {
    /// Allowed
    #[serde(rename = "approved")]
    Approved,
    /// Denied by a configured rule or by host code
    #[serde(rename = "denied-by-rules")]
    DeniedByRules,
    /// Nobody could be asked; the default when no handler exists
    #[serde(rename = "denied-no-approval-rule-and-could-not-request-from-user")]
    DeniedNoApprovalRule,
    /// A human said no
    #[serde(rename = "denied-interactively-by-user")]
    DeniedInteractivelyByUser,
    /// Blocked by a content exclusion policy
    #[serde(rename = "denied-by-content-exclusion-policy")]
    DeniedByContentExclusionPolicy,
}

impl PermissionResultKind {
    /// Whether this outcome allows the tool to run
    pub fn is_approved(self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// The decision returned for a `permission.request`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionResult {
    /// Outcome
    pub kind: PermissionResultKind,

    /// Rules that produced the outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Value>>,
}

impl PermissionResult {
    /// Allow the operation
    pub fn approved() -> Self {
        Self::of(PermissionResultKind::Approved)
    }

    /// The default denial used when no decision-maker is available
    pub fn denied() -> Self {
        Self::of(PermissionResultKind::DeniedNoApprovalRule)
    }

    /// Deny citing the rules responsible
    pub fn denied_by_rules(rules: Vec<Value>) -> Self {
        Self {
            kind: PermissionResultKind::DeniedByRules,
            rules: Some(rules),
        }
    }

    /// A human explicitly refused
    pub fn denied_interactively_by_user() -> Self {
        Self::of(PermissionResultKind::DeniedInteractivelyByUser)
    }

    /// Result with no rules attached
    pub fn of(kind: PermissionResultKind) -> Self {
        Self { kind, rules: None }
    }

    /// Whether the operation may proceed
    pub fn is_approved(&self) -> bool {
        self.kind.is_approved()
    }
}
