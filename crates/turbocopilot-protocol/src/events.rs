//! Session events streamed by the runtime
//!
//! Each `session.event` notification carries one [`SessionEvent`]. The
//! envelope is always typed; the `data` payload is kept as raw JSON and decoded
//! on demand through [`SessionEvent::payload`], so event types this crate does
//! not know about pass through untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type synthesized locally when the connection to the runtime is lost
pub const SESSION_DISCONNECTED: &str = "session.disconnected";

/// A single event in a session's stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    /// Unique event id
    pub id: String,

    /// When the runtime emitted the event
    pub timestamp: DateTime<Utc>,

    /// Id of the event this one follows from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Live-only events (deltas, progress) are not replayed on resume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<bool>,

    /// Wire type tag, e.g. `assistant.message`
    #[serde(rename = "type")]
    pub event_type: String,

    /// Type-specific payload
    #[serde(default)]
    pub data: Value,
}

impl SessionEvent {
    /// Create an event stamped with the current time
    pub fn new(id: impl Into<String>, event_type: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now(),
            parent_id: None,
            ephemeral: None,
            event_type: event_type.into(),
            data,
        }
    }

    /// Mark the event as ephemeral
    pub fn into_ephemeral(mut self) -> Self {
        self.ephemeral = Some(true);
        self
    }

    /// The local disconnection marker delivered once per session on teardown
    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self::new(
            format!("local-disconnect-{}", Utc::now().timestamp_millis()),
            SESSION_DISCONNECTED,
            serde_json::json!({ "reason": reason.into() }),
        )
        .into_ephemeral()
    }

    /// Typed view of the `type` tag
    pub fn kind(&self) -> SessionEventType {
        SessionEventType::from_wire(&self.event_type)
    }

    /// Whether the event is live-only
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral.unwrap_or(false)
    }

    /// Decode the payload; unknown types and unreadable payloads become
    /// [`SessionEventPayload::Other`]
    pub fn payload(&self) -> SessionEventPayload {
        fn decode<T: serde::de::DeserializeOwned>(
            data: &Value,
            wrap: fn(T) -> SessionEventPayload,
        ) -> Option<SessionEventPayload> {
            serde_json::from_value(data.clone()).ok().map(wrap)
        }

        let data = &self.data;
        let typed = match self.kind() {
            SessionEventType::UserMessage => decode(data, SessionEventPayload::UserMessage),
            SessionEventType::AssistantMessage => {
                decode(data, SessionEventPayload::AssistantMessage)
            }
            SessionEventType::AssistantMessageDelta => {
                decode(data, SessionEventPayload::AssistantMessageDelta)
            }
            SessionEventType::AssistantReasoning => {
                decode(data, SessionEventPayload::AssistantReasoning)
            }
            SessionEventType::AssistantReasoningDelta => {
                decode(data, SessionEventPayload::AssistantReasoningDelta)
            }
            SessionEventType::ToolExecutionStart => {
                decode(data, SessionEventPayload::ToolExecutionStart)
            }
            SessionEventType::ToolExecutionProgress => {
                decode(data, SessionEventPayload::ToolExecutionProgress)
            }
            SessionEventType::ToolExecutionComplete => {
                decode(data, SessionEventPayload::ToolExecutionComplete)
            }
            SessionEventType::SessionError => decode(data, SessionEventPayload::SessionError),
            SessionEventType::SessionIdle => Some(SessionEventPayload::SessionIdle),
            SessionEventType::Disconnected => decode(data, SessionEventPayload::Disconnected),
            _ => None,
        };

        typed.unwrap_or_else(|| SessionEventPayload::Other { data: data.clone() })
    }

    /// Text content of an `assistant.message`
    pub fn assistant_content(&self) -> Option<String> {
        match self.payload() {
            SessionEventPayload::AssistantMessage(msg) => Some(msg.content),
            _ => None,
        }
    }
}

macro_rules! event_types {
    ($($variant:ident => $wire:literal),* $(,)?) => {
        /// Known session event types
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum SessionEventType {
            $(
                #[doc = concat!("`", $wire, "`")]
                $variant,
            )*
            /// Any type this crate does not know
            Other(String),
        }

        impl SessionEventType {
            /// Map a wire tag to a type
            pub fn from_wire(tag: &str) -> Self {
                match tag {
                    $($wire => Self::$variant,)*
                    other => Self::Other(other.to_string()),
                }
            }

            /// Wire tag for this type
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $wire,)*
                    Self::Other(tag) => tag.as_str(),
                }
            }
        }
    };
}

event_types! {
    SessionStart => "session.start",
    SessionResume => "session.resume",
    SessionError => "session.error",
    SessionIdle => "session.idle",
    SessionInfo => "session.info",
    SessionModelChange => "session.model_change",
    SessionHandoff => "session.handoff",
    SessionTruncation => "session.truncation",
    SessionUsageInfo => "session.usage_info",
    SessionCompactionStart => "session.compaction_start",
    SessionCompactionComplete => "session.compaction_complete",
    UserMessage => "user.message",
    PendingMessagesModified => "pending_messages.modified",
    AssistantTurnStart => "assistant.turn_start",
    AssistantIntent => "assistant.intent",
    AssistantReasoning => "assistant.reasoning",
    AssistantReasoningDelta => "assistant.reasoning_delta",
    AssistantMessage => "assistant.message",
    AssistantMessageDelta => "assistant.message_delta",
    AssistantTurnEnd => "assistant.turn_end",
    AssistantUsage => "assistant.usage",
    Abort => "abort",
    ToolUserRequested => "tool.user_requested",
    ToolExecutionStart => "tool.execution_start",
    ToolExecutionPartialResult => "tool.execution_partial_result",
    ToolExecutionProgress => "tool.execution_progress",
    ToolExecutionComplete => "tool.execution_complete",
    SubagentStarted => "subagent.started",
    SubagentCompleted => "subagent.completed",
    SubagentFailed => "subagent.failed",
    SubagentSelected => "subagent.selected",
    HookStart => "hook.start",
    HookEnd => "hook.end",
    SystemMessage => "system.message",
    Disconnected => "session.disconnected",
}

/// Decoded payloads for the events the SDK reasons about
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEventPayload {
    /// `user.message`
    UserMessage(UserMessageData),
    /// `assistant.message`
    AssistantMessage(AssistantMessageData),
    /// `assistant.message_delta`
    AssistantMessageDelta(AssistantMessageDeltaData),
    /// `assistant.reasoning`
    AssistantReasoning(ReasoningData),
    /// `assistant.reasoning_delta`
    AssistantReasoningDelta(ReasoningDeltaData),
    /// `tool.execution_start`
    ToolExecutionStart(ToolExecutionStartData),
    /// `tool.execution_progress`
    ToolExecutionProgress(ToolExecutionProgressData),
    /// `tool.execution_complete`
    ToolExecutionComplete(ToolExecutionCompleteData),
    /// `session.error`
    SessionError(SessionErrorData),
    /// `session.idle`
    SessionIdle,
    /// Local `session.disconnected`
    Disconnected(DisconnectedData),
    /// Anything else, kept raw
    Other {
        /// Raw payload
        data: Value,
    },
}

/// `user.message` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessageData {
    /// Prompt text
    pub content: String,
    /// Prompt after runtime-side transformation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformed_content: Option<String>,
}

/// A tool invocation requested by the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRequest {
    /// Tool call id
    pub tool_call_id: String,
    /// Tool name
    pub name: String,
    /// Tool arguments
    #[serde(default)]
    pub arguments: Value,
}

/// `assistant.message` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMessageData {
    /// Message id
    pub message_id: String,
    /// Full message text
    #[serde(default)]
    pub content: String,
    /// Tools the assistant asked to run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_requests: Option<Vec<ToolRequest>>,
    /// Set when emitted by a sub-agent running inside a tool call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_call_id: Option<String>,
}

/// `assistant.message_delta` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMessageDeltaData {
    /// Message id the delta belongs to
    pub message_id: String,
    /// Incremental text
    pub delta_content: String,
    /// Bytes streamed so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_response_size_bytes: Option<f64>,
    /// Set when emitted by a sub-agent running inside a tool call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_call_id: Option<String>,
}

/// `assistant.reasoning` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningData {
    /// Reasoning block id
    pub reasoning_id: String,
    /// Full reasoning text
    #[serde(default)]
    pub content: String,
}

/// `assistant.reasoning_delta` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningDeltaData {
    /// Reasoning block id
    pub reasoning_id: String,
    /// Incremental text
    pub delta_content: String,
}

/// `tool.execution_start` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionStartData {
    /// Tool call id
    pub tool_call_id: String,
    /// Tool name
    pub tool_name: String,
    /// Tool arguments
    #[serde(default)]
    pub arguments: Value,
}

/// `tool.execution_progress` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionProgressData {
    /// Tool call id
    pub tool_call_id: String,
    /// Human-readable progress
    #[serde(default)]
    pub progress_message: String,
}

/// Error reported for a tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionError {
    /// Error message
    pub message: String,
    /// Error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Result content of a tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    /// Result text
    pub content: String,
}

/// `tool.execution_complete` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionCompleteData {
    /// Tool call id
    pub tool_call_id: String,
    /// Whether the tool succeeded
    #[serde(default)]
    pub success: bool,
    /// Result when successful
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolExecutionResult>,
    /// Error when failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolExecutionError>,
}

/// `session.error` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionErrorData {
    /// Error category
    #[serde(default)]
    pub error_type: String,
    /// Error message
    pub message: String,
    /// Stack trace, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Local `session.disconnected` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisconnectedData {
    /// Why the connection ended
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn event(event_type: &str, data: Value) -> SessionEvent {
        serde_json::from_value(json!({
            "id": "evt-1",
            "timestamp": "2025-01-01T00:00:00Z",
            "type": event_type,
            "data": data,
        }))
        .unwrap()
    }

    #[test]
    fn test_assistant_message_payload() {
        let evt = event(
            "assistant.message",
            json!({"messageId": "m1", "content": "2+2 is 4"}),
        );
        assert_eq!(evt.kind(), SessionEventType::AssistantMessage);
        assert_eq!(evt.assistant_content().as_deref(), Some("2+2 is 4"));
    }

    #[test]
    fn test_delta_payload() {
        let evt = event(
            "assistant.message_delta",
            json!({"messageId": "m1", "deltaContent": "2+"}),
        );
        match evt.payload() {
            SessionEventPayload::AssistantMessageDelta(delta) => {
                assert_eq!(delta.delta_content, "2+")
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_tolerated() {
        let evt = event("future.event_kind", json!({"anything": [1, 2]}));
        assert_eq!(
            evt.kind(),
            SessionEventType::Other("future.event_kind".to_string())
        );
        assert_eq!(
            evt.payload(),
            SessionEventPayload::Other {
                data: json!({"anything": [1, 2]})
            }
        );
    }

    #[test]
    fn test_malformed_known_payload_falls_back() {
        let evt = event("session.error", json!({"unexpected": true}));
        assert!(matches!(evt.payload(), SessionEventPayload::Other { .. }));
    }

    #[test]
    fn test_missing_data_defaults_to_null() {
        let evt: SessionEvent = serde_json::from_value(json!({
            "id": "evt-2",
            "timestamp": "2025-01-01T00:00:00Z",
            "type": "session.idle",
            "ephemeral": true
        }))
        .unwrap();
        assert!(evt.is_ephemeral());
        assert_eq!(evt.payload(), SessionEventPayload::SessionIdle);
    }

    #[rstest]
    #[case("session.idle", SessionEventType::SessionIdle)]
    #[case("tool.execution_complete", SessionEventType::ToolExecutionComplete)]
    #[case("assistant.reasoning_delta", SessionEventType::AssistantReasoningDelta)]
    #[case("session.disconnected", SessionEventType::Disconnected)]
    fn test_type_tags_round_trip(#[case] tag: &str, #[case] kind: SessionEventType) {
        assert_eq!(SessionEventType::from_wire(tag), kind);
        assert_eq!(kind.as_str(), tag);
    }

    #[test]
    fn test_disconnected_marker() {
        let evt = SessionEvent::disconnected("transport closed");
        assert!(evt.is_ephemeral());
        match evt.payload() {
            SessionEventPayload::Disconnected(data) => assert_eq!(data.reason, "transport closed"),
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
