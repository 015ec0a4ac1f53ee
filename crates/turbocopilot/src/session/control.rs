//! Session control: abort, history, destroy

use crate::error::Result;
use crate::session::core::Session;
use crate::session::state::SessionStatus;
use serde_json::Value;
use tracing::{debug, info};
use turbocopilot_protocol::rpc::GetMessagesResult;
use turbocopilot_protocol::session::SessionIdParams;
use turbocopilot_protocol::{SessionEvent, methods};

impl Session {
    /// Abort the turn in progress
    ///
    /// The session stays usable; the runtime emits `abort` and `session.idle`.
    pub async fn abort(&self) -> Result<()> {
        self.shared.ensure_active()?;
        self.shared
            .connection
            .call::<_, Value>(methods::SESSION_ABORT, SessionIdParams::new(self.session_id()))
            .await?;
        Ok(())
    }

    /// Every persisted event of this session, oldest first
    pub async fn get_messages(&self) -> Result<Vec<SessionEvent>> {
        self.shared.ensure_active()?;
        let result: GetMessagesResult = self
            .shared
            .connection
            .call(
                methods::SESSION_GET_MESSAGES,
                SessionIdParams::new(self.session_id()),
            )
            .await?;
        Ok(result.events)
    }

    /// Release the session
    ///
    /// Listeners are dropped immediately and later prompts fail with
    /// [`SessionDestroyed`](crate::CopilotError::SessionDestroyed). Calling it
    /// again is a no-op. Conversation data stays on disk; use
    /// [`CopilotClient::delete_session`](crate::CopilotClient::delete_session)
    /// to remove it.
    pub async fn destroy(&self) -> Result<()> {
        let session_id = self.session_id();
        match self.shared.release() {
            SessionStatus::Destroyed => Ok(()),
            SessionStatus::Disconnected => {
                debug!(%session_id, "Session already disconnected, skipping server destroy");
                Ok(())
            }
            SessionStatus::Active => {
                self.shared
                    .connection
                    .call::<_, Value>(methods::SESSION_DESTROY, SessionIdParams::new(&session_id))
                    .await?;
                info!(%session_id, "Session destroyed");
                Ok(())
            }
        }
    }
}
