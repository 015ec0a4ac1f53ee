//! Testing utilities
//!
//! [`FakeRuntime`] plays the runtime's side of the protocol over an
//! [`InProcessTransport`], so a real [`CopilotClient`] can be exercised
//! without spawning the CLI. Tests can:
//! - script the answer to each client call
//! - push notifications and session events
//! - issue server-initiated requests and await the client's response
//! - inspect every call the client made
//!
//! Methods without a scripted answer get a plausible default (a fresh session
//! id for `session.create`, a matching protocol version for `ping`, and so
//! on); unknown methods get `-32601`.

use crate::client::CopilotClient;
use crate::config::ClientOptions;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use turbocopilot_protocol::{
    Message, Notification, Request, RequestId, Response, RpcErrorObject, SDK_PROTOCOL_VERSION,
    methods,
};
use turbocopilot_transport::{InProcessTransport, Transport};

/// Scripted answer to one client method
pub type Responder =
    Arc<dyn Fn(&Value, &FakeHandle) -> Result<Value, RpcErrorObject> + Send + Sync>;

/// One call the client made
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Method name
    pub method: String,
    /// Params as sent (`Null` when absent)
    pub params: Value,
}

struct FakeState {
    outbound: mpsc::UnboundedSender<Message>,
    calls: Mutex<Vec<RecordedCall>>,
    pending: Mutex<HashMap<RequestId, oneshot::Sender<Result<Value, RpcErrorObject>>>>,
    next_id: AtomicU64,
    transport: Arc<InProcessTransport>,
}

/// Handle given to responders for pushing traffic mid-call
///
/// Everything pushed through it reaches the client in push order, and before
/// the response of the call being answered.
#[derive(Clone)]
pub struct FakeHandle {
    state: Arc<FakeState>,
}

impl FakeHandle {
    /// Push a notification
    pub fn notify(&self, method: &str, params: Value) {
        let _ = self
            .state
            .outbound
            .send(Notification::new(method, Some(params)).into());
    }

    /// Push one `session.event`
    pub fn emit(&self, session_id: &str, event_type: &str, data: Value) {
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        self.notify(
            methods::SESSION_EVENT,
            json!({
                "sessionId": session_id,
                "event": {
                    "id": format!("evt-{}", id),
                    "timestamp": "2025-01-01T00:00:00Z",
                    "type": event_type,
                    "data": data,
                }
            }),
        );
    }

    /// Push a complete assistant turn: message then idle
    pub fn reply(&self, session_id: &str, content: &str) {
        self.emit(
            session_id,
            "assistant.message",
            json!({"messageId": "fake-message", "content": content}),
        );
        self.emit(session_id, "session.idle", json!({}));
    }

    /// Calls recorded so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state
            .calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

/// Builder for [`FakeRuntime`]
pub struct FakeRuntimeBuilder {
    script: Script,
    options: ClientOptions,
}

#[derive(Default)]
struct Script {
    responders: HashMap<String, Responder>,
    silent: HashSet<String>,
}

impl FakeRuntimeBuilder {
    /// Answer `method` with a fixed result
    pub fn respond(self, method: &str, result: Value) -> Self {
        self.on(method, move |_, _| Ok(result.clone()))
    }

    /// Answer `method` with an error
    pub fn fail(self, method: &str, error: RpcErrorObject) -> Self {
        self.on(method, move |_, _| Err(error.clone()))
    }

    /// Answer `method` with a closure over the params
    pub fn on<F>(mut self, method: &str, responder: F) -> Self
    where
        F: Fn(&Value, &FakeHandle) -> Result<Value, RpcErrorObject> + Send + Sync + 'static,
    {
        self.script
            .responders
            .insert(method.to_string(), Arc::new(responder));
        self
    }

    /// Record calls to `method` but never answer them
    pub fn silent(mut self, method: &str) -> Self {
        self.script.silent.insert(method.to_string());
        self
    }

    /// Options for the client built by [`FakeRuntime::client`]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Start the fake runtime; must be called inside a Tokio runtime
    pub fn build(self) -> FakeRuntime {
        let (client_end, server_end) = InProcessTransport::pair();
        let transport = Arc::new(server_end);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let state = Arc::new(FakeState {
            outbound,
            calls: Mutex::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            transport: Arc::clone(&transport),
        });
        let handle = FakeHandle {
            state: Arc::clone(&state),
        };

        tokio::spawn(write_loop(Arc::clone(&transport), outbound_rx));
        tokio::spawn(read_loop(handle.clone(), self.script));

        let client = CopilotClient::from_transport(Arc::new(client_end), self.options);
        FakeRuntime { handle, client }
    }
}

/// Scripted in-process runtime
pub struct FakeRuntime {
    handle: FakeHandle,
    client: CopilotClient,
}

impl FakeRuntime {
    /// Builder with default answers and default client options
    pub fn builder() -> FakeRuntimeBuilder {
        FakeRuntimeBuilder {
            script: Script::default(),
            options: ClientOptions::default(),
        }
    }

    /// The client wired to this runtime
    pub fn client(&self) -> CopilotClient {
        self.client.clone()
    }

    /// Handle for pushing traffic
    pub fn handle(&self) -> FakeHandle {
        self.handle.clone()
    }

    /// Push a notification
    pub fn notify(&self, method: &str, params: Value) {
        self.handle.notify(method, params);
    }

    /// Push one `session.event`
    pub fn emit(&self, session_id: &str, event_type: &str, data: Value) {
        self.handle.emit(session_id, event_type, data);
    }

    /// Send a server-initiated request and wait for the client's answer
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, RpcErrorObject> {
        let state = &self.handle.state;
        let id = RequestId::String(format!(
            "server-{}",
            state.next_id.fetch_add(1, Ordering::Relaxed)
        ));
        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = state.pending.lock() {
            pending.insert(id.clone(), tx);
        }

        let _ = state
            .outbound
            .send(Request::new(id, method, Some(params)).into());
        rx.await
            .unwrap_or_else(|_| Err(RpcErrorObject::internal("connection closed")))
    }

    /// Calls recorded so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.handle.calls()
    }

    /// Params of every call to `method`
    pub fn params_of(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .map(|call| call.params)
            .collect()
    }

    /// Number of calls to `method`
    pub fn calls_to(&self, method: &str) -> usize {
        self.params_of(method).len()
    }

    /// Drop the connection from the runtime's side
    pub async fn disconnect(&self) {
        if let Err(err) = self.handle.state.transport.close().await {
            warn!(error = %err, "Fake runtime close failed");
        }
    }
}

impl std::fmt::Debug for FakeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeRuntime")
            .field("calls", &self.calls().len())
            .finish()
    }
}

async fn write_loop(transport: Arc<InProcessTransport>, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = rx.recv().await {
        if transport.send(message).await.is_err() {
            break;
        }
    }
}

async fn read_loop(handle: FakeHandle, script: Script) {
    let transport = Arc::clone(&handle.state.transport);
    while let Ok(Some(message)) = transport.recv().await {
        match message {
            Message::Request(request) => {
                let params = request.params.clone().unwrap_or(Value::Null);
                if let Ok(mut calls) = handle.state.calls.lock() {
                    calls.push(RecordedCall {
                        method: request.method.clone(),
                        params: params.clone(),
                    });
                }

                if script.silent.contains(&request.method) {
                    continue;
                }
                let outcome = match script.responders.get(&request.method) {
                    Some(responder) => responder(&params, &handle),
                    None => default_answer(&request.method, &params, &handle),
                };
                let response = match outcome {
                    Ok(result) => Response::success(request.id, result),
                    Err(error) => Response::failure(Some(request.id), error),
                };
                let _ = handle.state.outbound.send(response.into());
            }
            Message::Response(response) => {
                let waiter = response.id.as_ref().and_then(|id| {
                    handle
                        .state
                        .pending
                        .lock()
                        .ok()
                        .and_then(|mut pending| pending.remove(id))
                });
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(response.into_result());
                    }
                    None => warn!("Fake runtime got an unmatched response"),
                }
            }
            Message::Notification(notification) => {
                debug!(method = %notification.method, "Fake runtime ignoring notification");
            }
        }
    }

    // Fail server requests still waiting on the client
    if let Ok(mut pending) = handle.state.pending.lock() {
        pending.clear();
    }
}

fn default_answer(method: &str, params: &Value, handle: &FakeHandle) -> Result<Value, RpcErrorObject> {
    let counter = || handle.state.next_id.fetch_add(1, Ordering::Relaxed);
    let echo_session = || params.get("sessionId").cloned().unwrap_or(Value::Null);

    match method {
        methods::PING => Ok(json!({
            "message": params.get("message").cloned().unwrap_or(Value::Null),
            "timestamp": 0,
            "protocolVersion": SDK_PROTOCOL_VERSION,
        })),
        methods::STATUS_GET => Ok(json!({
            "version": "0.0.0-fake",
            "protocolVersion": SDK_PROTOCOL_VERSION,
        })),
        methods::AUTH_GET_STATUS => Ok(json!({"isAuthenticated": true, "authType": "token"})),
        methods::MODELS_LIST => Ok(json!({"models": []})),
        methods::SESSION_CREATE => {
            let session_id = match echo_session() {
                Value::Null => json!(format!("fake-session-{}", counter())),
                id => id,
            };
            Ok(json!({"sessionId": session_id, "workspacePath": "/tmp/fake-workspace"}))
        }
        methods::SESSION_RESUME => Ok(json!({"sessionId": echo_session()})),
        methods::SESSION_SEND => Ok(json!({"messageId": format!("msg-{}", counter())})),
        methods::SESSION_GET_MESSAGES => Ok(json!({"events": []})),
        methods::SESSION_LIST => Ok(json!({"sessions": []})),
        methods::SESSION_GET_LAST_ID | methods::SESSION_GET_FOREGROUND => Ok(json!({})),
        methods::SESSION_SET_FOREGROUND => Ok(json!({"success": true})),
        methods::SESSION_ABORT | methods::SESSION_DESTROY | methods::SESSION_DELETE => {
            Ok(json!({}))
        }
        other => Err(RpcErrorObject::method_not_found(other)),
    }
}
