//! Core session state and event delivery
//!
//! [`SessionShared`] is the half of a session the router sees: it receives
//! events and answers server requests. [`Session`] is the caller's handle to
//! the same state.

use crate::config::SessionCallbacks;
use crate::connection::Connection;
use crate::error::{CopilotError, Result};
use crate::hooks::{HookInvocation, SessionHooks, permission_override};
use crate::lifecycle::{ListenerSet, Subscription, SubscriptionGuard};
use crate::permissions::{PermissionGate, PermissionInvocation};
use crate::routing::SessionRouter;
use crate::session::state::SessionStatus;
use crate::tools::{Tool, ToolInvocation};
use crate::user_input::{UserInputHandler, UserInputInvocation};
use futures::Stream;
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tracing::debug;
use turbocopilot_protocol::tools::ToolCallParams;
use turbocopilot_protocol::{
    HookType, PermissionRequest, PermissionResult, SessionEvent, ToolResult, UserInputRequest,
    UserInputResponse,
};

/// State shared between a [`Session`] handle and the router
pub(crate) struct SessionShared {
    id: RwLock<String>,
    workspace_path: RwLock<Option<String>>,
    pub(crate) connection: Connection,
    router: Weak<SessionRouter>,
    pub(crate) status: watch::Sender<SessionStatus>,
    pub(crate) listeners: ListenerSet<SessionEvent>,
    permissions: PermissionGate,
    user_input: Option<UserInputHandler>,
    hooks: SessionHooks,
    tools: HashMap<String, Tool>,
    disconnected: AtomicBool,
}

impl SessionShared {
    pub(crate) fn new(
        id: String,
        connection: Connection,
        router: &Arc<SessionRouter>,
        callbacks: SessionCallbacks,
    ) -> Arc<Self> {
        let (status, _) = watch::channel(SessionStatus::Active);
        let tools = callbacks
            .tools
            .into_iter()
            .map(|tool| (tool.name().to_string(), tool))
            .collect();

        Arc::new(Self {
            id: RwLock::new(id),
            workspace_path: RwLock::new(None),
            connection,
            router: Arc::downgrade(router),
            status,
            listeners: ListenerSet::new(),
            permissions: PermissionGate::new(callbacks.permission),
            user_input: callbacks.user_input,
            hooks: callbacks.hooks,
            tools,
            disconnected: AtomicBool::new(false),
        })
    }

    pub(crate) fn id(&self) -> String {
        self.id.read().map(|id| id.clone()).unwrap_or_default()
    }

    pub(crate) fn set_id(&self, id: String) {
        if let Ok(mut slot) = self.id.write() {
            *slot = id;
        }
    }

    pub(crate) fn workspace_path(&self) -> Option<String> {
        self.workspace_path.read().ok().and_then(|path| path.clone())
    }

    pub(crate) fn set_workspace_path(&self, path: Option<String>) {
        if let Ok(mut slot) = self.workspace_path.write() {
            *slot = path;
        }
    }

    pub(crate) fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Fail fast unless the session can take new work
    pub(crate) fn ensure_active(&self) -> Result<()> {
        match self.status() {
            SessionStatus::Active => Ok(()),
            SessionStatus::Destroyed => Err(CopilotError::SessionDestroyed(self.id())),
            SessionStatus::Disconnected => Err(CopilotError::ConnectionClosed),
        }
    }

    /// Hand one runtime event to every listener
    pub(crate) fn deliver(&self, event: &SessionEvent) {
        if self.status().is_active() {
            self.listeners.emit(event);
        }
    }

    /// Tell listeners the connection is gone; happens at most once
    pub(crate) fn disconnect(&self, reason: &str) {
        if self.disconnected.swap(true, Ordering::SeqCst) || !self.status().is_active() {
            return;
        }
        debug!(session_id = %self.id(), reason, "Session disconnected");

        self.listeners.emit(&SessionEvent::disconnected(reason));
        self.status.send_if_modified(|status| {
            if *status == SessionStatus::Active {
                *status = SessionStatus::Disconnected;
                true
            } else {
                false
            }
        });
        self.release_listeners();
    }

    /// Mark destroyed and detach from the router
    ///
    /// Returns the status the session had before, so the caller knows
    /// whether a server-side destroy is still owed.
    pub(crate) fn release(&self) -> SessionStatus {
        let previous = self.status.send_replace(SessionStatus::Destroyed);
        if previous != SessionStatus::Destroyed {
            if let Some(router) = self.router.upgrade() {
                router.unregister(&self.id());
            }
            self.release_listeners();
        }
        previous
    }

    fn release_listeners(&self) {
        self.listeners.clear();
        self.permissions.clear_overrides();
    }

    /// Run a host tool; always yields a result for the runtime
    pub(crate) async fn call_tool(&self, params: ToolCallParams) -> ToolResult {
        let Some(tool) = self.tools.get(&params.tool_name) else {
            debug!(session_id = %params.session_id, tool = %params.tool_name, "Unknown tool");
            return ToolResult::unsupported(&params.tool_name);
        };

        let invocation = ToolInvocation {
            arguments: params.arguments(),
            session_id: params.session_id,
            tool_call_id: params.tool_call_id,
            tool_name: params.tool_name,
        };
        tool.call(invocation).await
    }

    pub(crate) async fn check_permission(&self, request: PermissionRequest) -> PermissionResult {
        let invocation = PermissionInvocation {
            session_id: self.id(),
        };
        self.permissions.check(request, invocation).await
    }

    pub(crate) async fn request_user_input(
        &self,
        request: UserInputRequest,
    ) -> Result<UserInputResponse> {
        let Some(handler) = &self.user_input else {
            return Err(CopilotError::Handler(
                "user input requested but no handler is registered".to_string(),
            ));
        };
        let invocation = UserInputInvocation {
            session_id: self.id(),
        };
        handler(request, invocation).await
    }

    /// Run a hook and remember any permission decision it made
    pub(crate) async fn invoke_hook(&self, hook: HookType, input: Value) -> Result<Value> {
        let invocation = HookInvocation {
            session_id: self.id(),
        };
        let output = self.hooks.invoke(hook, input.clone(), invocation).await?;

        if hook == HookType::PreToolUse
            && let Some((tool_call_id, decision)) = permission_override(&input, &output)
        {
            self.permissions.record_override(tool_call_id, decision);
        }
        Ok(output)
    }
}

impl std::fmt::Debug for SessionShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionShared")
            .field("id", &self.id())
            .field("status", &self.status())
            .field("listeners", &self.listeners.len())
            .field("tools", &self.tools.len())
            .finish()
    }
}

/// One conversation with the runtime
///
/// Cheap to clone; clones share the session. A session never outlives the
/// connection it was created on: when the client stops or the runtime goes
/// away, listeners receive one `session.disconnected` event and further
/// prompts fail with [`CopilotError::ConnectionClosed`].
#[derive(Clone, Debug)]
pub struct Session {
    pub(crate) shared: Arc<SessionShared>,
}

impl Session {
    pub(crate) fn new(shared: Arc<SessionShared>) -> Self {
        Self { shared }
    }

    /// Runtime-assigned session id
    pub fn session_id(&self) -> String {
        self.shared.id()
    }

    /// Workspace directory the runtime reported for this session
    pub fn workspace_path(&self) -> Option<String> {
        self.shared.workspace_path()
    }

    /// Current status
    pub fn status(&self) -> SessionStatus {
        self.shared.status()
    }

    /// Whether `destroy` has been called
    pub fn is_destroyed(&self) -> bool {
        self.shared.status() == SessionStatus::Destroyed
    }

    /// Receive every event for this session, in arrival order
    ///
    /// The listener runs on the connection's read loop and must not block.
    pub fn on<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.shared.listeners.add(Arc::new(listener))
    }

    /// Receive events as a [`Stream`]
    ///
    /// The stream ends when the session is destroyed or disconnected, after
    /// the final `session.disconnected` event.
    pub fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let guard = self
            .on(move |event| {
                let _ = tx.send(event.clone());
            })
            .into_guard();
        EventStream { rx, _guard: guard }
    }
}

/// Stream of one session's events; unsubscribes when dropped
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
    _guard: SubscriptionGuard,
}

impl EventStream {
    /// Next event, or `None` once the session is gone
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }
}

impl Stream for EventStream {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}
