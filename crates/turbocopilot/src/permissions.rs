//! Permission gating for tool execution
//!
//! The runtime asks before running a side-effecting tool. The answer comes
//! from, in order:
//! 1. a single-use decision left by a `preToolUse` hook for the same tool call
//! 2. the session's permission handler
//! 3. the default deny
//!
//! A handler error or panic is a deny. Nothing here ever approves by default.

use crate::error::Result;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use turbocopilot_protocol::{PermissionDecision, PermissionRequest, PermissionResult};

/// Type alias for async permission handlers
pub type PermissionHandler = Arc<
    dyn Fn(
            PermissionRequest,
            PermissionInvocation,
        ) -> Pin<Box<dyn Future<Output = Result<PermissionResult>> + Send>>
        + Send
        + Sync,
>;

/// Where a permission request came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionInvocation {
    /// Session the tool runs in
    pub session_id: String,
}

/// Wrap an async closure as a [`PermissionHandler`]
pub fn permission_handler<F, Fut>(handler: F) -> PermissionHandler
where
    F: Fn(PermissionRequest, PermissionInvocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PermissionResult>> + Send + 'static,
{
    Arc::new(move |request, invocation| Box::pin(handler(request, invocation)))
}

/// Handler that approves every request
pub fn approve_all() -> PermissionHandler {
    permission_handler(|_, _| async { Ok(PermissionResult::approved()) })
}

/// Single-use decisions recorded by `preToolUse` hooks, keyed by tool call id
#[derive(Debug, Default)]
pub(crate) struct PermissionOverrides {
    by_call: HashMap<String, PermissionDecision>,
}

impl PermissionOverrides {
    pub(crate) fn record(&mut self, tool_call_id: String, decision: PermissionDecision) {
        self.by_call.insert(tool_call_id, decision);
    }

    /// Consume the decision left for this tool call, if any
    pub(crate) fn take(&mut self, tool_call_id: Option<&str>) -> Option<PermissionDecision> {
        tool_call_id.and_then(|id| self.by_call.remove(id))
    }

    pub(crate) fn clear(&mut self) {
        self.by_call.clear();
    }
}

/// Per-session permission policy
pub(crate) struct PermissionGate {
    handler: Option<PermissionHandler>,
    overrides: Mutex<PermissionOverrides>,
}

impl PermissionGate {
    pub(crate) fn new(handler: Option<PermissionHandler>) -> Self {
        Self {
            handler,
            overrides: Mutex::new(PermissionOverrides::default()),
        }
    }

    pub(crate) fn record_override(&self, tool_call_id: String, decision: PermissionDecision) {
        if let Ok(mut overrides) = self.overrides.lock() {
            overrides.record(tool_call_id, decision);
        }
    }

    pub(crate) fn clear_overrides(&self) {
        if let Ok(mut overrides) = self.overrides.lock() {
            overrides.clear();
        }
    }

    /// Decide a request; always yields a result
    pub(crate) async fn check(
        &self,
        request: PermissionRequest,
        invocation: PermissionInvocation,
    ) -> PermissionResult {
        let decision = self
            .overrides
            .lock()
            .ok()
            .and_then(|mut overrides| overrides.take(request.tool_call_id.as_deref()));

        match decision {
            Some(PermissionDecision::Allow) => {
                debug!(session_id = %invocation.session_id, "Permission approved by preToolUse hook");
                return PermissionResult::approved();
            }
            Some(PermissionDecision::Deny) => {
                debug!(session_id = %invocation.session_id, "Permission denied by preToolUse hook");
                return PermissionResult::denied_by_rules(Vec::new());
            }
            Some(PermissionDecision::Ask) | None => {}
        }

        let Some(handler) = &self.handler else {
            debug!(
                session_id = %invocation.session_id,
                kind = request.kind.as_str(),
                "No permission handler registered, denying"
            );
            return PermissionResult::denied();
        };

        let session_id = invocation.session_id.clone();
        let Ok(pending) =
            std::panic::catch_unwind(AssertUnwindSafe(|| handler(request, invocation)))
        else {
            warn!(%session_id, "Permission handler panicked, denying");
            return PermissionResult::denied();
        };

        match AssertUnwindSafe(pending).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(%session_id, error = %err, "Permission handler failed, denying");
                PermissionResult::denied()
            }
            Err(_) => {
                warn!(%session_id, "Permission handler panicked, denying");
                PermissionResult::denied()
            }
        }
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}
