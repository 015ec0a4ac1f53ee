//! JSON-RPC 2.0 envelopes
//!
//! Every frame on the wire is exactly one [`Message`]: a request (has `method`
//! and `id`), a notification (has `method`, no `id`), or a response (has
//! `result` or `error`).

use crate::error::{ProtocolError, Result};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Invalid JSON was received
pub const PARSE_ERROR: i64 = -32700;
/// The JSON sent is not a valid request object
pub const INVALID_REQUEST: i64 = -32600;
/// The method does not exist or is not available
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters
pub const INVALID_PARAMS: i64 = -32602;
/// Internal JSON-RPC error
pub const INTERNAL_ERROR: i64 = -32603;

/// The `"jsonrpc": "2.0"` marker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let version = String::deserialize(deserializer)?;
        if version == "2.0" {
            Ok(JsonRpcVersion)
        } else {
            Err(de::Error::custom(format!(
                "unsupported jsonrpc version: {version}"
            )))
        }
    }
}

/// Identifier correlating a request with its response
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id (the SDK allocates these)
    Number(u64),
    /// String id (the runtime may use these)
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self::String(id)
    }
}

/// A call expecting exactly one response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Protocol marker
    #[serde(default)]
    pub jsonrpc: JsonRpcVersion,

    /// Correlation id
    pub id: RequestId,

    /// Method name
    pub method: String,

    /// Method parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Create a new request
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// A one-way message; no response is produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Protocol marker
    #[serde(default)]
    pub jsonrpc: JsonRpcVersion,

    /// Method name
    pub method: String,

    /// Method parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    /// Create a new notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
        }
    }
}

/// The reply to a [`Request`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Protocol marker
    #[serde(default)]
    pub jsonrpc: JsonRpcVersion,

    /// Id of the request being answered (`null` when the request id was unreadable)
    pub id: Option<RequestId>,

    /// Success payload
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,

    /// Failure payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

// Distinguishes `"result": null` (Some(Null)) from an absent key (None).
fn present_value<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl Response {
    /// Successful response
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Error response
    pub fn failure(id: Option<RequestId>, error: RpcErrorObject) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Collapse into the call outcome; an error object wins over a result
    pub fn into_result(self) -> std::result::Result<Value, RpcErrorObject> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    /// Error code
    pub code: i64,

    /// Short description
    pub message: String,

    /// Additional error detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    /// Create a new error object
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured detail
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// `-32601` for an unhandled method
    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    /// `-32602` for unreadable params
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    /// `-32603` for a handler failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }
}

impl fmt::Display for RpcErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Any JSON-RPC 2.0 message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Call expecting a response
    Request(Request),
    /// Reply to a call
    Response(Response),
    /// One-way message
    Notification(Notification),
}

impl Message {
    /// Classify and decode a JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        let (has_method, has_id, has_outcome) = {
            let obj = value.as_object().ok_or_else(|| {
                ProtocolError::InvalidMessage("expected a JSON object".to_string())
            })?;
            (
                obj.contains_key("method"),
                obj.get("id").is_some_and(|id| !id.is_null()),
                obj.contains_key("result") || obj.contains_key("error"),
            )
        };

        let invalid = |e: serde_json::Error| ProtocolError::InvalidMessage(e.to_string());
        if has_method && has_id {
            serde_json::from_value(value).map(Message::Request).map_err(invalid)
        } else if has_method {
            serde_json::from_value(value)
                .map(Message::Notification)
                .map_err(invalid)
        } else if has_outcome {
            serde_json::from_value(value)
                .map(Message::Response)
                .map_err(invalid)
        } else {
            Err(ProtocolError::InvalidMessage(
                "message has neither a method nor a result/error".to_string(),
            ))
        }
    }

    /// Decode a complete frame body
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| ProtocolError::parse(&e, body))?;
        Self::from_value(value)
    }

    /// Encode as a JSON body (no framing)
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Method name for requests and notifications
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(r) => Some(&r.method),
            Self::Notification(n) => Some(&n.method),
            Self::Response(_) => None,
        }
    }

    /// Correlation id for requests and responses
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(r) => Some(&r.id),
            Self::Response(r) => r.id.as_ref(),
            Self::Notification(_) => None,
        }
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Request(r) => r.serialize(serializer),
            Self::Response(r) => r.serialize(serializer),
            Self::Notification(n) => n.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Message::from_value(value).map_err(de::Error::custom)
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<Notification> for Message {
    fn from(notification: Notification) -> Self {
        Self::Notification(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!({"jsonrpc": "2.0", "id": 1, "method": "ping", "params": {}}), "request")]
    #[case(json!({"jsonrpc": "2.0", "id": "abc", "method": "tool.call"}), "request")]
    #[case(json!({"jsonrpc": "2.0", "method": "session.event", "params": {}}), "notification")]
    #[case(json!({"jsonrpc": "2.0", "id": null, "method": "session.event"}), "notification")]
    #[case(json!({"jsonrpc": "2.0", "id": 7, "result": {"ok": true}}), "response")]
    #[case(json!({"jsonrpc": "2.0", "id": 7, "error": {"code": -1, "message": "x"}}), "response")]
    fn test_classification(#[case] value: Value, #[case] expected: &str) {
        let message = Message::from_value(value).unwrap();
        let kind = match message {
            Message::Request(_) => "request",
            Message::Response(_) => "response",
            Message::Notification(_) => "notification",
        };
        assert_eq!(kind, expected);
    }

    #[test]
    fn test_rejects_unclassifiable_object() {
        let err = Message::from_value(json!({"jsonrpc": "2.0", "id": 1})).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));

        let err = Message::from_value(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }

    #[test]
    fn test_rejects_wrong_version() {
        let err = Message::from_value(json!({"jsonrpc": "1.0", "id": 1, "method": "ping"}))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }

    #[test]
    fn test_null_result_survives_round_trip() {
        let message = Message::Response(Response::success(RequestId::Number(3), Value::Null));
        let bytes = message.to_vec().unwrap();
        assert_eq!(Message::from_slice(&bytes).unwrap(), message);
    }

    #[test]
    fn test_into_result_prefers_error() {
        let response = Response::failure(
            Some(RequestId::Number(1)),
            RpcErrorObject::method_not_found("nope"),
        );
        let err = response.into_result().unwrap_err();
        assert_eq!(err.code, METHOD_NOT_FOUND);
        assert!(err.message.contains("nope"));
    }

    #[test]
    fn test_request_id_forms() {
        let numeric: RequestId = serde_json::from_value(json!(42)).unwrap();
        let text: RequestId = serde_json::from_value(json!("req-1")).unwrap();
        assert_eq!(numeric, RequestId::Number(42));
        assert_eq!(text, RequestId::from("req-1"));
        assert_eq!(numeric.to_string(), "42");
    }

    #[test]
    fn test_parse_failure_is_parse_error() {
        let err = Message::from_slice(b"{\"jsonrpc\":").unwrap_err();
        assert!(matches!(err, ProtocolError::Parse { .. }));
    }
}
