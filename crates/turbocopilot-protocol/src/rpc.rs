//! Method names and typed results for client-to-runtime calls

use crate::events::SessionEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Protocol version this SDK speaks; checked against the `ping` reply
pub const SDK_PROTOCOL_VERSION: u32 = 2;

/// JSON-RPC method names
pub mod methods {
    /// Liveness check and version handshake
    pub const PING: &str = "ping";
    /// Runtime version info
    pub const STATUS_GET: &str = "status.get";
    /// Authentication state
    pub const AUTH_GET_STATUS: &str = "auth.getStatus";
    /// Available models
    pub const MODELS_LIST: &str = "models.list";

    /// Create a session
    pub const SESSION_CREATE: &str = "session.create";
    /// Reattach an existing session
    pub const SESSION_RESUME: &str = "session.resume";
    /// Submit a prompt
    pub const SESSION_SEND: &str = "session.send";
    /// Abort the running turn
    pub const SESSION_ABORT: &str = "session.abort";
    /// Fetch persisted events
    pub const SESSION_GET_MESSAGES: &str = "session.getMessages";
    /// Release a session server-side
    pub const SESSION_DESTROY: &str = "session.destroy";
    /// List stored sessions
    pub const SESSION_LIST: &str = "session.list";
    /// Delete stored session data
    pub const SESSION_DELETE: &str = "session.delete";
    /// Most recently used session id
    pub const SESSION_GET_LAST_ID: &str = "session.getLastId";
    /// Session shown in the foreground
    pub const SESSION_GET_FOREGROUND: &str = "session.getForeground";
    /// Move a session to the foreground
    pub const SESSION_SET_FOREGROUND: &str = "session.setForeground";

    /// Notification: one session event
    pub const SESSION_EVENT: &str = "session.event";
    /// Notification: session lifecycle change
    pub const SESSION_LIFECYCLE: &str = "session.lifecycle";

    /// Server request: run a host tool
    pub const TOOL_CALL: &str = "tool.call";
    /// Server request: permission check
    pub const PERMISSION_REQUEST: &str = "permission.request";
    /// Server request: ask the user
    pub const USER_INPUT_REQUEST: &str = "userInput.request";
    /// Server request: run a hook
    pub const HOOKS_INVOKE: &str = "hooks.invoke";
}

/// `ping` params
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingParams {
    /// Echoed back by the runtime
    pub message: Option<String>,
}

/// `ping` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResult {
    /// Echo of the request message
    #[serde(default)]
    pub message: Option<String>,
    /// Server time in epoch milliseconds
    #[serde(default)]
    pub timestamp: i64,
    /// Protocol version the runtime speaks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<u32>,
}

/// `status.get` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    /// Runtime package version
    pub version: String,
    /// Protocol version
    pub protocol_version: u32,
}

/// `auth.getStatus` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    /// Whether a usable credential is present
    pub is_authenticated: bool,
    /// Credential source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,
    /// Host authenticated against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Account login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    /// Human-readable status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

/// A model the runtime can use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Model identifier
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Capability description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Value>,
    /// Policy state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Value>,
    /// Billing info
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing: Option<Value>,
    /// Supported reasoning efforts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_reasoning_efforts: Option<Vec<String>>,
    /// Default reasoning effort
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_reasoning_effort: Option<String>,
}

/// `models.list` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListModelsResult {
    /// Models
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// `session.create` / `session.resume` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResult {
    /// Id the runtime assigned
    pub session_id: String,
    /// Workspace directory for infinite sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<String>,
}

/// `session.send` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    /// Id of the submitted user message
    #[serde(default)]
    pub message_id: String,
}

/// `session.getMessages` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetMessagesResult {
    /// Persisted events, oldest first
    #[serde(default)]
    pub events: Vec<SessionEvent>,
}

/// A stored session as listed by the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    /// Session id
    pub session_id: String,
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Last activity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    /// Short summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Whether the session lives on a remote host
    #[serde(default)]
    pub is_remote: bool,
}

/// `session.list` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSessionsResult {
    /// Stored sessions
    #[serde(default)]
    pub sessions: Vec<SessionMetadata>,
}

/// `session.getLastId` result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSessionIdResult {
    /// Id, when any session exists
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `session.getForeground` result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForegroundSessionInfo {
    /// Foreground session, if any
    #[serde(default)]
    pub session_id: Option<String>,
    /// Its workspace
    #[serde(default)]
    pub workspace_path: Option<String>,
}

/// `session.setForeground` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetForegroundResult {
    /// Whether the switch happened
    pub success: bool,
    /// Why not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Kind of a `session.lifecycle` notification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionLifecycleEventType {
    /// `session.created`
    Created,
    /// `session.deleted`
    Deleted,
    /// `session.updated`
    Updated,
    /// `session.foreground`
    Foreground,
    /// `session.background`
    Background,
    /// Anything newer than this crate
    Other(String),
}

impl SessionLifecycleEventType {
    /// Wire name
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "session.created",
            Self::Deleted => "session.deleted",
            Self::Updated => "session.updated",
            Self::Foreground => "session.foreground",
            Self::Background => "session.background",
            Self::Other(name) => name.as_str(),
        }
    }
}

impl From<String> for SessionLifecycleEventType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "session.created" => Self::Created,
            "session.deleted" => Self::Deleted,
            "session.updated" => Self::Updated,
            "session.foreground" => Self::Foreground,
            "session.background" => Self::Background,
            _ => Self::Other(name),
        }
    }
}

impl From<SessionLifecycleEventType> for String {
    fn from(kind: SessionLifecycleEventType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for SessionLifecycleEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `session.lifecycle` notification params
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLifecycleEvent {
    /// What happened
    #[serde(rename = "type")]
    pub event_type: SessionLifecycleEventType,
    /// To which session
    pub session_id: String,
    /// Extra detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// `session.event` notification params
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEventNotification {
    /// Owning session
    pub session_id: String,
    /// The event
    pub event: SessionEvent,
}
