//! JSON-RPC connection to the runtime
//!
//! One [`Connection`] owns one transport and multiplexes every exchange over
//! it:
//! - outbound calls, correlated to their responses by id
//! - outbound notifications
//! - inbound notifications, handed to the [`InboundHandler`] in arrival order
//! - inbound requests, each run on its own task so a slow handler never stalls
//!   the read loop, and each answered with exactly one response
//!
//! States move `Connecting -> Ready -> Closing -> Closed`. Calls are accepted
//! only while `Ready`. On teardown every pending call fails with
//! [`CopilotError::ConnectionClosed`].

use crate::error::{CopilotError, Result};
use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use turbocopilot_protocol::{
    Message, Notification, Request, RequestId, Response, RpcErrorObject,
};
use turbocopilot_transport::Transport;

const READER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of a [`Connection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport attached, read loop not yet running
    Connecting,
    /// Accepting calls
    Ready,
    /// `close` in progress
    Closing,
    /// Torn down; every call fails with `ConnectionClosed`
    Closed,
}

/// Receives what the runtime sends on its own initiative
#[async_trait]
pub trait InboundHandler: Send + Sync {
    /// A notification arrived
    ///
    /// Runs on the read loop, so notifications are seen in arrival order. Must
    /// not block.
    fn on_notification(&self, method: &str, params: Option<Value>);

    /// A request arrived; the returned value or error becomes its response
    async fn on_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> std::result::Result<Value, RpcErrorObject>;

    /// The connection was torn down; called exactly once
    fn on_close(&self, reason: &str);
}

struct PendingCall {
    method: String,
    completion: oneshot::Sender<Result<Value>>,
}

struct PendingTable {
    calls: HashMap<RequestId, PendingCall>,
    // Cleared under the lock at teardown so no call can register afterwards
    open: bool,
}

struct Inner {
    transport: Arc<dyn Transport>,
    handler: Arc<dyn InboundHandler>,
    state: watch::Sender<ConnectionState>,
    pending: Mutex<PendingTable>,
    next_id: AtomicU64,
    request_timeout: Option<Duration>,
    reader: Mutex<Option<JoinHandle<()>>>,
    torn_down: AtomicBool,
}

/// Handle to a running connection; clones share it
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Attach to `transport` and start the read loop
    ///
    /// `request_timeout` bounds every [`call`](Self::call); `None` waits until
    /// the response arrives or the connection closes.
    pub fn start(
        transport: Arc<dyn Transport>,
        handler: Arc<dyn InboundHandler>,
        request_timeout: Option<Duration>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let inner = Arc::new(Inner {
            transport,
            handler,
            state,
            pending: Mutex::new(PendingTable {
                calls: HashMap::new(),
                open: true,
            }),
            next_id: AtomicU64::new(1),
            request_timeout,
            reader: Mutex::new(None),
            torn_down: AtomicBool::new(false),
        });

        let reader = tokio::spawn(read_loop(Arc::clone(&inner)));
        if let Ok(mut slot) = inner.reader.lock() {
            *slot = Some(reader);
        }
        // The reader may already have torn down on an instantly closed transport
        inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Ready;
                true
            } else {
                false
            }
        });

        Self { inner }
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Wait until the connection is closed
    pub async fn closed(&self) {
        let mut state = self.inner.state.subscribe();
        let _ = state.wait_for(|s| *s == ConnectionState::Closed).await;
    }

    /// Call `method` and decode its result
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let value = self.call_value(method, serde_json::to_value(params)?).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Call `method` with raw params and return the raw result
    ///
    /// Cancel safe: dropping the future removes the call from the in-flight
    /// table, and a late response is discarded as unknown.
    pub async fn call_value(&self, method: &str, params: Value) -> Result<Value> {
        let (id, completion) = self.inner.register(method)?;
        let _registration = Registration {
            inner: &self.inner,
            id: id.clone(),
        };

        let request = Request::new(id, method, Some(params));
        self.inner.transport.send(request.into()).await?;

        let outcome = match self.inner.request_timeout {
            Some(limit) => tokio::time::timeout(limit, completion)
                .await
                .map_err(|_| CopilotError::Timeout(limit))?,
            None => completion.await,
        };

        // A dropped sender means teardown raced the completion
        outcome.unwrap_or(Err(CopilotError::ConnectionClosed))
    }

    /// Send a notification; no response is expected
    pub async fn notify<P: Serialize>(&self, method: &str, params: P) -> Result<()> {
        if self.state() != ConnectionState::Ready {
            return Err(CopilotError::ConnectionClosed);
        }
        let notification = Notification::new(method, Some(serde_json::to_value(params)?));
        self.inner.transport.send(notification.into()).await?;
        Ok(())
    }

    /// Number of calls awaiting a response
    pub fn pending_calls(&self) -> usize {
        self.inner
            .pending
            .lock()
            .map(|table| table.calls.len())
            .unwrap_or(0)
    }

    /// Close the transport, fail pending calls, and stop the read loop
    pub async fn close(&self) {
        self.inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                false
            } else {
                *state = ConnectionState::Closing;
                true
            }
        });

        if let Err(err) = self.inner.transport.close().await {
            debug!(error = %err, "Transport close failed");
        }
        self.inner.teardown("connection closed by client");

        let reader = self.inner.reader.lock().ok().and_then(|mut slot| slot.take());
        if let Some(reader) = reader
            && tokio::time::timeout(READER_SHUTDOWN_TIMEOUT, reader)
                .await
                .is_err()
        {
            warn!("Read loop did not stop within {:?}", READER_SHUTDOWN_TIMEOUT);
        }
    }

    /// Tear down without waiting on the transport
    ///
    /// For drop paths where no runtime is available to drive `close`.
    pub fn abort(&self) {
        if let Some(reader) = self.inner.reader.lock().ok().and_then(|mut slot| slot.take()) {
            reader.abort();
        }
        self.inner.teardown("connection aborted");
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("pending_calls", &self.pending_calls())
            .finish()
    }
}

/// Removes a call from the in-flight table when its caller finishes or gives up
struct Registration<'a> {
    inner: &'a Inner,
    id: RequestId,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.inner.forget(&self.id);
    }
}

impl Inner {
    /// Allocate an id and register its completion slot
    fn register(&self, method: &str) -> Result<(RequestId, oneshot::Receiver<Result<Value>>)> {
        let mut table = self
            .pending
            .lock()
            .map_err(|_| CopilotError::ConnectionClosed)?;
        if !table.open || *self.state.borrow() != ConnectionState::Ready {
            return Err(CopilotError::ConnectionClosed);
        }

        let id = loop {
            let candidate = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
            if !table.calls.contains_key(&candidate) {
                break candidate;
            }
        };

        let (completion, receiver) = oneshot::channel();
        table.calls.insert(
            id.clone(),
            PendingCall {
                method: method.to_string(),
                completion,
            },
        );
        Ok((id, receiver))
    }

    fn forget(&self, id: &RequestId) {
        if let Ok(mut table) = self.pending.lock() {
            table.calls.remove(id);
        }
    }

    fn dispatch(&self, message: Message) {
        match message {
            Message::Response(response) => self.complete(response),
            Message::Notification(notification) => {
                debug!(method = %notification.method, "Inbound notification");
                self.handler
                    .on_notification(&notification.method, notification.params);
            }
            Message::Request(request) => {
                debug!(method = %request.method, id = %request.id, "Inbound request");
                self.spawn_request(request);
            }
        }
    }

    fn complete(&self, response: Response) {
        let Some(id) = response.id.clone() else {
            warn!(error = ?response.error, "Response without an id");
            return;
        };

        let call = self
            .pending
            .lock()
            .ok()
            .and_then(|mut table| table.calls.remove(&id));
        let Some(call) = call else {
            warn!(%id, "Response for unknown request id");
            return;
        };

        debug!(%id, method = %call.method, "Call completed");
        let outcome = response.into_result().map_err(CopilotError::from);
        // The caller may have timed out and gone away
        let _ = call.completion.send(outcome);
    }

    fn spawn_request(&self, request: Request) {
        let handler = Arc::clone(&self.handler);
        let transport = Arc::clone(&self.transport);

        tokio::spawn(async move {
            let Request {
                id, method, params, ..
            } = request;

            let outcome = AssertUnwindSafe(handler.on_request(&method, params))
                .catch_unwind()
                .await;
            let response = match outcome {
                Ok(Ok(result)) => Response::success(id, result),
                Ok(Err(error)) => Response::failure(Some(id), error),
                Err(_) => {
                    error!(%method, "Request handler panicked");
                    Response::failure(
                        Some(id),
                        RpcErrorObject::internal(format!("handler for {} panicked", method)),
                    )
                }
            };

            if let Err(err) = transport.send(response.into()).await {
                debug!(%method, error = %err, "Could not answer server request");
            }
        });
    }

    /// Fail pending calls and notify the handler; runs once
    fn teardown(&self, reason: &str) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let drained: Vec<PendingCall> = match self.pending.lock() {
            Ok(mut table) => {
                table.open = false;
                table.calls.drain().map(|(_, call)| call).collect()
            }
            Err(_) => Vec::new(),
        };
        self.state.send_replace(ConnectionState::Closed);

        info!(reason, failed_calls = drained.len(), "Connection closed");
        for call in drained {
            let _ = call.completion.send(Err(CopilotError::ConnectionClosed));
        }
        self.handler.on_close(reason);
    }
}

async fn read_loop(inner: Arc<Inner>) {
    let reason = loop {
        match inner.transport.recv().await {
            Ok(Some(message)) => inner.dispatch(message),
            Ok(None) => break "transport closed".to_string(),
            Err(err) if err.is_protocol() => {
                error!(error = %err, "Unrecoverable protocol error, closing connection");
                break err.to_string();
            }
            Err(err) => {
                warn!(error = %err, "Transport failed, closing connection");
                break err.to_string();
            }
        }
    };

    if let Err(err) = inner.transport.close().await {
        debug!(error = %err, "Transport close failed");
    }
    inner.teardown(&reason);
}
