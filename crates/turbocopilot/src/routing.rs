//! Routes runtime-initiated traffic to sessions
//!
//! One [`SessionRouter`] lives per connection. It owns the table of live
//! sessions and implements [`InboundHandler`]:
//! - `session.event` notifications go to the owning session's listeners
//! - `session.lifecycle` notifications go to client-level listeners
//! - `tool.call`, `permission.request`, `userInput.request`, and
//!   `hooks.invoke` requests go to the session's callbacks
//!
//! The defaults are safe: an unanswerable permission request is denied, an
//! unknown tool yields a failure result, and a missing hook yields a null
//! output.

use crate::connection::InboundHandler;
use crate::lifecycle::ListenerSet;
use crate::session::core::SessionShared;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};
use turbocopilot_protocol::hooks::HookInvokeParams;
use turbocopilot_protocol::permissions::PermissionRequestParams;
use turbocopilot_protocol::rpc::SessionEventNotification;
use turbocopilot_protocol::tools::ToolCallParams;
use turbocopilot_protocol::user_input::UserInputParams;
use turbocopilot_protocol::{
    HookType, PermissionResult, RpcErrorObject, SessionLifecycleEvent, ToolResult, methods,
};

type HandlerResult = std::result::Result<Value, RpcErrorObject>;

/// Session table and inbound dispatcher for one connection
pub(crate) struct SessionRouter {
    sessions: RwLock<HashMap<String, Arc<SessionShared>>>,
    lifecycle: ListenerSet<SessionLifecycleEvent>,
}

impl SessionRouter {
    /// Router publishing lifecycle events to `lifecycle`
    pub(crate) fn new(lifecycle: ListenerSet<SessionLifecycleEvent>) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            lifecycle,
        })
    }

    pub(crate) fn register(&self, session: Arc<SessionShared>) {
        let id = session.id();
        if let Ok(mut sessions) = self.sessions.write()
            && sessions.insert(id.clone(), session).is_some()
        {
            debug!(session_id = %id, "Replaced existing session registration");
        }
    }

    /// Move a session to the id the runtime settled on
    pub(crate) fn rekey(&self, old_id: &str, new_id: &str) {
        if let Ok(mut sessions) = self.sessions.write()
            && let Some(session) = sessions.remove(old_id)
        {
            session.set_id(new_id.to_string());
            sessions.insert(new_id.to_string(), session);
        }
    }

    pub(crate) fn unregister(&self, id: &str) -> Option<Arc<SessionShared>> {
        self.sessions.write().ok().and_then(|mut sessions| sessions.remove(id))
    }

    pub(crate) fn session(&self, id: &str) -> Option<Arc<SessionShared>> {
        self.sessions.read().ok().and_then(|sessions| sessions.get(id).cloned())
    }

    pub(crate) fn sessions(&self) -> Vec<Arc<SessionShared>> {
        self.sessions
            .read()
            .map(|sessions| sessions.values().cloned().collect())
            .unwrap_or_default()
    }

    async fn tool_call(&self, params: Option<Value>) -> HandlerResult {
        let params: ToolCallParams = decode(params)?;
        let result = match self.session(&params.session_id) {
            Some(session) => session.call_tool(params).await,
            None => {
                warn!(session_id = %params.session_id, "tool.call for unknown session");
                ToolResult::unsupported(&params.tool_name)
            }
        };
        encode(json!({ "result": result }))
    }

    async fn permission_request(&self, params: Option<Value>) -> HandlerResult {
        let result = match decode::<PermissionRequestParams>(params) {
            Ok(params) => match self.session(&params.session_id) {
                Some(session) => session.check_permission(params.permission_request).await,
                None => {
                    warn!(session_id = %params.session_id, "permission.request for unknown session");
                    PermissionResult::denied()
                }
            },
            Err(err) => {
                warn!(error = %err.message, "Malformed permission.request, denying");
                PermissionResult::denied()
            }
        };
        encode(json!({ "result": result }))
    }

    async fn user_input_request(&self, params: Option<Value>) -> HandlerResult {
        let params: UserInputParams = decode(params)?;
        let session = self.session(&params.session_id).ok_or_else(|| {
            RpcErrorObject::invalid_params(format!("unknown session {}", params.session_id))
        })?;
        let response = session
            .request_user_input(params.request)
            .await
            .map_err(|err| RpcErrorObject::internal(err.to_string()))?;
        encode(response)
    }

    async fn hooks_invoke(&self, params: Option<Value>) -> HandlerResult {
        let params: HookInvokeParams = decode(params)?;
        let Some(hook) = HookType::from_wire(&params.hook_type) else {
            debug!(hook_type = %params.hook_type, "Unknown hook type");
            return Ok(json!({ "output": null }));
        };
        let Some(session) = self.session(&params.session_id) else {
            debug!(session_id = %params.session_id, "hooks.invoke for unknown session");
            return Ok(json!({ "output": null }));
        };

        let output = session
            .invoke_hook(hook, params.input)
            .await
            .map_err(|err| RpcErrorObject::internal(err.to_string()))?;
        Ok(json!({ "output": output }))
    }
}

#[async_trait]
impl InboundHandler for SessionRouter {
    fn on_notification(&self, method: &str, params: Option<Value>) {
        match method {
            methods::SESSION_EVENT => {
                let notification: SessionEventNotification = match decode(params) {
                    Ok(notification) => notification,
                    Err(err) => {
                        warn!(error = %err.message, "Dropping malformed session.event");
                        return;
                    }
                };
                match self.session(&notification.session_id) {
                    Some(session) => session.deliver(&notification.event),
                    None => debug!(
                        session_id = %notification.session_id,
                        event_type = %notification.event.event_type,
                        "Event for unknown session"
                    ),
                }
            }
            methods::SESSION_LIFECYCLE => match decode::<SessionLifecycleEvent>(params) {
                Ok(event) => self.lifecycle.emit(&event),
                Err(err) => warn!(error = %err.message, "Dropping malformed session.lifecycle"),
            },
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    async fn on_request(&self, method: &str, params: Option<Value>) -> HandlerResult {
        match method {
            methods::TOOL_CALL => self.tool_call(params).await,
            methods::PERMISSION_REQUEST => self.permission_request(params).await,
            methods::USER_INPUT_REQUEST => self.user_input_request(params).await,
            methods::HOOKS_INVOKE => self.hooks_invoke(params).await,
            other => Err(RpcErrorObject::method_not_found(other)),
        }
    }

    fn on_close(&self, reason: &str) {
        let sessions: Vec<_> = self
            .sessions
            .write()
            .map(|mut sessions| sessions.drain().map(|(_, s)| s).collect())
            .unwrap_or_default();
        for session in sessions {
            session.disconnect(reason);
        }
    }
}

impl std::fmt::Debug for SessionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRouter")
            .field("sessions", &self.sessions().len())
            .field("lifecycle_listeners", &self.lifecycle.len())
            .finish()
    }
}

fn decode<T: DeserializeOwned>(params: Option<Value>) -> std::result::Result<T, RpcErrorObject> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|err| RpcErrorObject::invalid_params(err.to_string()))
}

fn encode<T: Serialize>(value: T) -> HandlerResult {
    serde_json::to_value(value).map_err(|err| RpcErrorObject::internal(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionCallbacks;
    use crate::connection::Connection;
    use crate::hooks::SessionHooks;
    use crate::permissions::approve_all;
    use crate::tools::Tool;
    use crate::user_input::user_input_handler;
    use std::sync::Mutex;
    use turbocopilot_protocol::hooks::PreToolUseOutput;
    use turbocopilot_protocol::{
        PermissionDecision, PermissionResultKind, SessionEvent, ToolResultType, UserInputResponse,
    };
    use turbocopilot_transport::InProcessTransport;

    struct Fixture {
        router: Arc<SessionRouter>,
        session: Arc<SessionShared>,
        // Keeps the peer open for the connection's lifetime
        _peer: InProcessTransport,
    }

    fn fixture(callbacks: SessionCallbacks) -> Fixture {
        let (client_end, peer) = InProcessTransport::pair();
        let router = SessionRouter::new(ListenerSet::new());
        let connection = Connection::start(
            Arc::new(client_end),
            Arc::clone(&router) as Arc<dyn InboundHandler>,
            None,
        );
        let session = SessionShared::new("s1".to_string(), connection, &router, callbacks);
        router.register(Arc::clone(&session));
        Fixture {
            router,
            session,
            _peer: peer,
        }
    }

    fn permission_params(session_id: &str, call_id: &str) -> Option<Value> {
        Some(json!({
            "sessionId": session_id,
            "permissionRequest": {"kind": "shell", "toolCallId": call_id, "fullCommandText": "rm -rf /"}
        }))
    }

    fn result_kind(value: &Value) -> PermissionResultKind {
        serde_json::from_value(value["result"]["kind"].clone()).unwrap()
    }

    #[tokio::test]
    async fn test_permission_default_deny() {
        let f = fixture(SessionCallbacks::default());
        let reply = f
            .router
            .on_request(methods::PERMISSION_REQUEST, permission_params("s1", "c1"))
            .await
            .unwrap();
        assert_eq!(result_kind(&reply), PermissionResultKind::DeniedNoApprovalRule);
    }

    #[tokio::test]
    async fn test_permission_unknown_session_denied() {
        let f = fixture(SessionCallbacks {
            permission: Some(approve_all()),
            ..Default::default()
        });
        let reply = f
            .router
            .on_request(methods::PERMISSION_REQUEST, permission_params("other", "c1"))
            .await
            .unwrap();
        assert_eq!(result_kind(&reply), PermissionResultKind::DeniedNoApprovalRule);
    }

    #[tokio::test]
    async fn test_permission_malformed_denied() {
        let f = fixture(SessionCallbacks {
            permission: Some(approve_all()),
            ..Default::default()
        });
        let reply = f
            .router
            .on_request(methods::PERMISSION_REQUEST, Some(json!({"bogus": true})))
            .await
            .unwrap();
        assert_eq!(result_kind(&reply), PermissionResultKind::DeniedNoApprovalRule);
    }

    #[tokio::test]
    async fn test_pre_tool_use_override_feeds_permission() {
        let f = fixture(SessionCallbacks {
            hooks: SessionHooks::new().on_pre_tool_use(|_, _| async {
                Ok(Some(PreToolUseOutput::decide(PermissionDecision::Allow)))
            }),
            ..Default::default()
        });

        let hook = f
            .router
            .on_request(
                methods::HOOKS_INVOKE,
                Some(json!({
                    "sessionId": "s1",
                    "hookType": "preToolUse",
                    "input": {"timestamp": 1, "cwd": "/w", "toolName": "bash", "toolArgs": {}, "toolCallId": "c1"}
                })),
            )
            .await
            .unwrap();
        assert_eq!(hook["output"]["permissionDecision"], "allow");

        let first = f
            .router
            .on_request(methods::PERMISSION_REQUEST, permission_params("s1", "c1"))
            .await
            .unwrap();
        assert_eq!(result_kind(&first), PermissionResultKind::Approved);

        let second = f
            .router
            .on_request(methods::PERMISSION_REQUEST, permission_params("s1", "c1"))
            .await
            .unwrap();
        assert_eq!(result_kind(&second), PermissionResultKind::DeniedNoApprovalRule);
    }

    #[tokio::test]
    async fn test_missing_hook_is_null() {
        let f = fixture(SessionCallbacks::default());
        let reply = f
            .router
            .on_request(
                methods::HOOKS_INVOKE,
                Some(json!({"sessionId": "s1", "hookType": "sessionEnd", "input": {}})),
            )
            .await
            .unwrap();
        assert_eq!(reply, json!({"output": null}));

        let unknown = f
            .router
            .on_request(
                methods::HOOKS_INVOKE,
                Some(json!({"sessionId": "s1", "hookType": "somethingNew", "input": {}})),
            )
            .await
            .unwrap();
        assert_eq!(unknown, json!({"output": null}));
    }

    #[tokio::test]
    async fn test_tool_call_routes_to_tool() {
        let tool = Tool::new("echo", |invocation| async move {
            Ok(ToolResult::success(invocation.arguments["text"].to_string()))
        });
        let f = fixture(SessionCallbacks {
            tools: vec![tool],
            ..Default::default()
        });

        let reply = f
            .router
            .on_request(
                methods::TOOL_CALL,
                Some(json!({
                    "sessionId": "s1",
                    "toolCallId": "c1",
                    "toolName": "echo",
                    "arguments": {"text": "hi"}
                })),
            )
            .await
            .unwrap();
        let result: ToolResult = serde_json::from_value(reply["result"].clone()).unwrap();
        assert_eq!(result.result_type, ToolResultType::Success);
        assert_eq!(result.text_result_for_llm, "\"hi\"");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failure_result() {
        let f = fixture(SessionCallbacks::default());
        let reply = f
            .router
            .on_request(
                methods::TOOL_CALL,
                Some(json!({"sessionId": "s1", "toolCallId": "c1", "toolName": "nope"})),
            )
            .await
            .unwrap();
        let result: ToolResult = serde_json::from_value(reply["result"].clone()).unwrap();
        assert_ne!(result.result_type, ToolResultType::Success);
    }

    #[tokio::test]
    async fn test_user_input_without_handler_is_error() {
        let f = fixture(SessionCallbacks::default());
        let err = f
            .router
            .on_request(
                methods::USER_INPUT_REQUEST,
                Some(json!({"sessionId": "s1", "question": "Continue?"})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, RpcErrorObject::internal("").code);
    }

    #[tokio::test]
    async fn test_user_input_answered() {
        let f = fixture(SessionCallbacks {
            user_input: Some(user_input_handler(|request, _| async move {
                assert_eq!(request.question, "Continue?");
                Ok(UserInputResponse::choice("yes"))
            })),
            ..Default::default()
        });
        let reply = f
            .router
            .on_request(
                methods::USER_INPUT_REQUEST,
                Some(json!({"sessionId": "s1", "question": "Continue?", "choices": ["yes", "no"]})),
            )
            .await
            .unwrap();
        assert_eq!(reply, json!({"answer": "yes", "wasFreeform": false}));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let f = fixture(SessionCallbacks::default());
        let err = f.router.on_request("mystery", None).await.unwrap_err();
        assert_eq!(err.code, -32601);
    }

    #[tokio::test]
    async fn test_events_routed_by_session() {
        let f = fixture(SessionCallbacks::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = f.session.listeners.add(Arc::new(move |event: &SessionEvent| {
            sink.lock().unwrap().push(event.event_type.clone());
        }));

        for (session_id, event_type) in [("s1", "session.idle"), ("s2", "assistant.message")] {
            f.router.on_notification(
                methods::SESSION_EVENT,
                Some(json!({
                    "sessionId": session_id,
                    "event": {"id": "e", "timestamp": "2025-01-01T00:00:00Z", "type": event_type, "data": {}}
                })),
            );
        }

        assert_eq!(*seen.lock().unwrap(), vec!["session.idle".to_string()]);
    }

    #[tokio::test]
    async fn test_close_disconnects_sessions_once() {
        let f = fixture(SessionCallbacks::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = f.session.listeners.add(Arc::new(move |event: &SessionEvent| {
            sink.lock().unwrap().push(event.event_type.clone());
        }));

        f.router.on_close("gone");
        f.router.on_close("gone again");

        assert_eq!(*seen.lock().unwrap(), vec!["session.disconnected".to_string()]);
        assert!(f.router.sessions().is_empty());
        assert!(f.session.ensure_active().is_err());
    }

    #[tokio::test]
    async fn test_rekey() {
        let f = fixture(SessionCallbacks::default());
        f.router.rekey("s1", "runtime-id");
        assert!(f.router.session("s1").is_none());
        assert_eq!(f.router.session("runtime-id").unwrap().id(), "runtime-id");
    }
}
