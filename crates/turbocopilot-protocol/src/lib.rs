//! Wire types for the Copilot agent runtime protocol
//!
//! The runtime speaks JSON-RPC 2.0 in both directions. This crate holds every
//! type that crosses that boundary so the transport and SDK layers can share a
//! single definition.
//!
//! # Type Organization
//!
//! - **Envelopes**: [`jsonrpc`] - requests, responses, notifications, error objects
//! - **Session events**: [`events`] - the streamed `session.event` payloads
//! - **Session configuration**: [`session`] - `session.create` / `session.resume` params
//! - **Callbacks**: [`permissions`], [`user_input`], [`hooks`], [`tools`]
//! - **Method results**: [`rpc`] - method names and typed results
//! - **Errors**: [`error`] - framing and parse failures
//!
//! # Design Principles
//!
//! - **Zero I/O**: All types are pure data structures
//! - **Tolerant reads**: unknown event and lifecycle types are preserved, not rejected

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod hooks;
pub mod jsonrpc;
pub mod permissions;
pub mod rpc;
pub mod session;
pub mod tools;
pub mod user_input;

pub use error::{ProtocolError, Result};
pub use events::{SessionEvent, SessionEventPayload, SessionEventType};
pub use hooks::{HookType, PermissionDecision};
pub use jsonrpc::{Message, Notification, Request, RequestId, Response, RpcErrorObject};
pub use permissions::{PermissionKind, PermissionRequest, PermissionResult, PermissionResultKind};
pub use rpc::{SDK_PROTOCOL_VERSION, SessionLifecycleEvent, methods};
pub use session::{
    CreateSessionParams, MessageOptions, ResumeSessionParams, SessionSettings,
    SystemMessageConfig,
};
pub use tools::{ToolDefinition, ToolResult, ToolResultType};
pub use user_input::{UserInputRequest, UserInputResponse};
