//! Session hooks
//!
//! Hooks observe and shape a session at six points (session start and end,
//! before and after a tool runs, prompt submission, errors). Each is optional;
//! a missing hook answers `null` and never blocks anything. Only `preToolUse`
//! can influence gating, through its `permissionDecision`.
//!
//! # Example
//!
//! ```ignore
//! let hooks = SessionHooks::new().on_pre_tool_use(|input, _| async move {
//!     if input.tool_name == "shell" {
//!         return Ok(Some(PreToolUseOutput::decide(PermissionDecision::Deny)));
//!     }
//!     Ok(None)
//! });
//! ```

use crate::error::{CopilotError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use turbocopilot_protocol::hooks::{
    ErrorOccurredInput, ErrorOccurredOutput, PostToolUseInput, PostToolUseOutput,
    PreToolUseInput, PreToolUseOutput, SessionEndInput, SessionEndOutput, SessionStartInput,
    SessionStartOutput, UserPromptSubmittedInput, UserPromptSubmittedOutput,
};
use turbocopilot_protocol::{HookType, PermissionDecision};

/// Where a hook invocation came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookInvocation {
    /// Session the hook fires for
    pub session_id: String,
}

/// Type alias for an async hook handler with typed input and output
///
/// Returning `Ok(None)` means "no opinion" and is sent as `null`.
pub type HookHandler<I, O> = Arc<
    dyn Fn(I, HookInvocation) -> Pin<Box<dyn Future<Output = Result<Option<O>>> + Send>>
        + Send
        + Sync,
>;

fn boxed<I, O, F, Fut>(handler: F) -> HookHandler<I, O>
where
    F: Fn(I, HookInvocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<O>>> + Send + 'static,
{
    Arc::new(move |input, invocation| Box::pin(handler(input, invocation)))
}

/// The hooks registered for one session
#[derive(Clone, Default)]
pub struct SessionHooks {
    pre_tool_use: Option<HookHandler<PreToolUseInput, PreToolUseOutput>>,
    post_tool_use: Option<HookHandler<PostToolUseInput, PostToolUseOutput>>,
    user_prompt_submitted: Option<HookHandler<UserPromptSubmittedInput, UserPromptSubmittedOutput>>,
    session_start: Option<HookHandler<SessionStartInput, SessionStartOutput>>,
    session_end: Option<HookHandler<SessionEndInput, SessionEndOutput>>,
    error_occurred: Option<HookHandler<ErrorOccurredInput, ErrorOccurredOutput>>,
}

impl SessionHooks {
    /// No hooks
    pub fn new() -> Self {
        Self::default()
    }

    /// Run before a tool executes
    pub fn on_pre_tool_use<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(PreToolUseInput, HookInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<PreToolUseOutput>>> + Send + 'static,
    {
        self.pre_tool_use = Some(boxed(handler));
        self
    }

    /// Run after a tool executes
    pub fn on_post_tool_use<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(PostToolUseInput, HookInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<PostToolUseOutput>>> + Send + 'static,
    {
        self.post_tool_use = Some(boxed(handler));
        self
    }

    /// Run when a prompt is submitted
    pub fn on_user_prompt_submitted<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(UserPromptSubmittedInput, HookInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<UserPromptSubmittedOutput>>> + Send + 'static,
    {
        self.user_prompt_submitted = Some(boxed(handler));
        self
    }

    /// Run when the session starts or resumes
    pub fn on_session_start<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(SessionStartInput, HookInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<SessionStartOutput>>> + Send + 'static,
    {
        self.session_start = Some(boxed(handler));
        self
    }

    /// Run when the session ends
    pub fn on_session_end<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(SessionEndInput, HookInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<SessionEndOutput>>> + Send + 'static,
    {
        self.session_end = Some(boxed(handler));
        self
    }

    /// Run when the runtime reports an error
    pub fn on_error_occurred<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(ErrorOccurredInput, HookInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ErrorOccurredOutput>>> + Send + 'static,
    {
        self.error_occurred = Some(boxed(handler));
        self
    }

    /// Whether no hook is registered
    pub fn is_empty(&self) -> bool {
        self.registered().is_empty()
    }

    /// Hook points with a handler
    pub fn registered(&self) -> Vec<HookType> {
        [
            (HookType::PreToolUse, self.pre_tool_use.is_some()),
            (HookType::PostToolUse, self.post_tool_use.is_some()),
            (
                HookType::UserPromptSubmitted,
                self.user_prompt_submitted.is_some(),
            ),
            (HookType::SessionStart, self.session_start.is_some()),
            (HookType::SessionEnd, self.session_end.is_some()),
            (HookType::ErrorOccurred, self.error_occurred.is_some()),
        ]
        .into_iter()
        .filter_map(|(hook, present)| present.then_some(hook))
        .collect()
    }

    /// Run the hook for `hook` against raw wire input
    ///
    /// Yields `Value::Null` when the hook is not registered or has no opinion.
    /// Input that does not match the hook's shape is a [`CopilotError::Handler`].
    pub async fn invoke(
        &self,
        hook: HookType,
        input: Value,
        invocation: HookInvocation,
    ) -> Result<Value> {
        match hook {
            HookType::PreToolUse => run(self.pre_tool_use.as_ref(), hook, input, invocation).await,
            HookType::PostToolUse => {
                run(self.post_tool_use.as_ref(), hook, input, invocation).await
            }
            HookType::UserPromptSubmitted => {
                run(self.user_prompt_submitted.as_ref(), hook, input, invocation).await
            }
            HookType::SessionStart => {
                run(self.session_start.as_ref(), hook, input, invocation).await
            }
            HookType::SessionEnd => run(self.session_end.as_ref(), hook, input, invocation).await,
            HookType::ErrorOccurred => {
                run(self.error_occurred.as_ref(), hook, input, invocation).await
            }
        }
    }
}

async fn run<I, O>(
    handler: Option<&HookHandler<I, O>>,
    hook: HookType,
    input: Value,
    invocation: HookInvocation,
) -> Result<Value>
where
    I: DeserializeOwned,
    O: Serialize,
{
    let Some(handler) = handler else {
        return Ok(Value::Null);
    };

    let input: I = serde_json::from_value(input)
        .map_err(|e| CopilotError::Handler(format!("invalid {} input: {}", hook, e)))?;

    match handler(input, invocation).await? {
        Some(output) => Ok(serde_json::to_value(output)?),
        None => Ok(Value::Null),
    }
}

/// The permission decision a `preToolUse` round trip asks for, with the tool
/// call it applies to. A decision without a call id has nothing to bind to.
pub(crate) fn permission_override(
    input: &Value,
    output: &Value,
) -> Option<(String, PermissionDecision)> {
    let tool_call_id = input.get("toolCallId").and_then(Value::as_str)?;
    let decision = output
        .get("permissionDecision")
        .cloned()
        .and_then(|d| serde_json::from_value::<PermissionDecision>(d).ok())?;
    Some((tool_call_id.to_string(), decision))
}

impl std::fmt::Debug for SessionHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHooks")
            .field("registered", &self.registered())
            .finish()
    }
}
