//! Rust SDK for the Copilot agent runtime
//!
//! The runtime is an external process (the `copilot` CLI) spoken to over
//! JSON-RPC 2.0. This crate spawns or connects to it, manages sessions,
//! streams their events, and answers the requests the runtime sends back:
//! tool calls, permission checks, user-input prompts, and hooks.
//!
//! # Key Features
//!
//! - **Three transports**: stdio child process, TCP (spawned or existing
//!   server), and in-process
//! - **Concurrent sessions** multiplexed over one connection
//! - **Safe defaults**: permission requests are denied unless a handler
//!   approves them
//! - **Hooks** for tool use, prompts, session start/end, and errors
//! - **Custom tools** implemented as async closures
//!
//! # Architecture
//!
//! 1. **Protocol Layer** (`turbocopilot-protocol`): wire types, no I/O
//! 2. **Transport Layer** (`turbocopilot-transport`): framing, child
//!    processes, sockets
//! 3. **Client Layer** (this crate): connection, routing, sessions
//!
//! # Usage Example
//!
//! ```no_run
//! use turbocopilot::{ClientOptions, CopilotClient, SessionConfig, approve_all};
//!
//! #[tokio::main]
//! async fn main() -> turbocopilot::Result<()> {
//!     let client = CopilotClient::new(ClientOptions::from_env()?)?;
//!     client.start().await?;
//!
//!     let session = client
//!         .create_session(
//!             SessionConfig::new()
//!                 .with_model("gpt-5")
//!                 .with_permission_handler(approve_all()),
//!         )
//!         .await?;
//!
//!     let reply = session.send_and_wait("What is 2+2?", None).await?;
//!     if let Some(content) = reply.and_then(|event| event.assistant_content()) {
//!         println!("{}", content);
//!     }
//!
//!     client.stop().await;
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod hooks;
pub mod lifecycle;
pub mod permissions;
pub mod retry;
mod routing;
pub mod session;
pub mod testing;
pub mod tools;
pub mod user_input;

// Re-export commonly used types
pub use client::CopilotClient;
pub use config::{
    ClientOptions, ConnectionMode, ResumeSessionConfig, SessionCallbacks, SessionConfig,
};
pub use connection::{Connection, ConnectionState, InboundHandler};
pub use error::{BackoffStrategy, CopilotError, ErrorRecovery, Result};
pub use hooks::{HookInvocation, SessionHooks};
pub use lifecycle::{Subscription, SubscriptionGuard};
pub use permissions::{PermissionHandler, PermissionInvocation, approve_all, permission_handler};
pub use retry::{retry, retry_with_recovery};
pub use session::{EventStream, Session, SessionStatus};
pub use tools::{Tool, ToolInvocation};
pub use user_input::{UserInputHandler, UserInputInvocation, user_input_handler};

pub use turbocopilot_protocol::{
    MessageOptions, PermissionDecision, PermissionKind, PermissionRequest, PermissionResult,
    PermissionResultKind, SessionEvent, SessionEventPayload, SessionEventType,
    SessionLifecycleEvent, SystemMessageConfig, ToolResult, UserInputRequest, UserInputResponse,
};
