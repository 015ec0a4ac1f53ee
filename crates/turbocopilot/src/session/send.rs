//! Prompt submission and turn completion

use crate::error::{CopilotError, Result};
use crate::session::core::Session;
use crate::session::state::SessionStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use turbocopilot_protocol::rpc::SendResult;
use turbocopilot_protocol::session::SendParams;
use turbocopilot_protocol::{
    MessageOptions, SessionEvent, SessionEventPayload, SessionEventType, methods,
};

/// How long `send_and_wait` waits when the caller gives no timeout
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(60);

impl Session {
    /// Submit a prompt and return its message id without waiting
    ///
    /// Progress arrives as events; see [`on`](Self::on).
    pub async fn send(&self, options: impl Into<MessageOptions>) -> Result<String> {
        self.shared.ensure_active()?;

        let params = SendParams {
            session_id: self.session_id(),
            message: options.into(),
        };
        let result: SendResult = self
            .shared
            .connection
            .call(methods::SESSION_SEND, params)
            .await?;
        Ok(result.message_id)
    }

    /// Submit a prompt and wait for the turn to finish
    ///
    /// Resolves on `session.idle` with the last `assistant.message` of the
    /// turn, or `None` if the turn produced no message.
    ///
    /// # Errors
    ///
    /// - [`CopilotError::SessionError`] when the runtime reports `session.error`
    /// - [`CopilotError::Timeout`] after `timeout` (default 60 s), counted from
    ///   submission; the turn keeps running server-side and the session stays
    ///   usable
    /// - [`CopilotError::ConnectionClosed`] if the connection goes away
    /// - [`CopilotError::SessionDestroyed`] if the session is destroyed meanwhile
    pub async fn send_and_wait(
        &self,
        options: impl Into<MessageOptions>,
        timeout: Option<Duration>,
    ) -> Result<Option<SessionEvent>> {
        self.shared.ensure_active()?;

        // Subscribe first so no event of this turn can be missed
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _guard = self
            .shared
            .listeners
            .add(Arc::new(move |event: &SessionEvent| {
                let _ = tx.send(event.clone());
            }))
            .into_guard();
        let mut status = self.shared.status.subscribe();

        // Bounds submission as well as the turn
        let limit = timeout.unwrap_or(DEFAULT_SEND_TIMEOUT);
        let turn = async {
            let message_id = self.send(options).await?;
            debug!(session_id = %self.session_id(), %message_id, "Waiting for turn to finish");

            let mut last_message = None;
            loop {
                tokio::select! {
                    biased;
                    event = rx.recv() => {
                        let Some(event) = event else {
                            return Err(self.ended(*status.borrow()));
                        };
                        match event.kind() {
                            SessionEventType::AssistantMessage => last_message = Some(event),
                            SessionEventType::SessionIdle => return Ok(last_message),
                            SessionEventType::SessionError => return Err(session_error(&event)),
                            SessionEventType::Disconnected => {
                                return Err(CopilotError::ConnectionClosed);
                            }
                            _ => {}
                        }
                    }
                    changed = status.changed() => {
                        let current = *status.borrow_and_update();
                        if changed.is_err() || !current.is_active() {
                            return Err(self.ended(current));
                        }
                    }
                }
            }
        };

        tokio::time::timeout(limit, turn)
            .await
            .map_err(|_| CopilotError::Timeout(limit))?
    }

    fn ended(&self, status: SessionStatus) -> CopilotError {
        match status {
            SessionStatus::Destroyed => CopilotError::SessionDestroyed(self.session_id()),
            _ => CopilotError::ConnectionClosed,
        }
    }
}

fn session_error(event: &SessionEvent) -> CopilotError {
    match event.payload() {
        SessionEventPayload::SessionError(data) => CopilotError::SessionError {
            error_type: data.error_type,
            message: data.message,
        },
        _ => CopilotError::SessionError {
            error_type: "unknown".to_string(),
            message: event
                .data
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("session error")
                .to_string(),
        },
    }
}
