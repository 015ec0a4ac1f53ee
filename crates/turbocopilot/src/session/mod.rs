//! Sessions: one conversation each
//!
//! The session module is organized into focused sub-modules:
//!
//! - [`state`] - Session status
//! - [`core`] - The [`Session`] handle, event delivery, and callback dispatch
//! - [`send`] - Prompt submission and waiting for a turn to finish
//! - [`control`] - Abort, history, destroy
//!
//! # Examples
//!
//! ```no_run
//! # use turbocopilot::{CopilotClient, ClientOptions, SessionConfig};
//! # async fn example() -> turbocopilot::Result<()> {
//! let client = CopilotClient::new(ClientOptions::default())?;
//! let session = client
//!     .create_session(SessionConfig::new().with_model("gpt-5"))
//!     .await?;
//!
//! let _subscription = session.on(|event| println!("{}", event.event_type));
//! if let Some(reply) = session.send_and_wait("What is 2+2?", None).await? {
//!     println!("{}", reply.assistant_content().unwrap_or_default());
//! }
//! session.destroy().await?;
//! # Ok(())
//! # }
//! ```

pub mod control;
pub mod core;
pub mod send;
pub mod state;

pub use self::core::{EventStream, Session};
pub use self::send::DEFAULT_SEND_TIMEOUT;
pub use self::state::SessionStatus;
