//! Error types for the Copilot SDK
//!
//! Errors carry recovery guidance through the [`ErrorRecovery`] trait:
//! - Retriability (should the caller try again?)
//! - Suggested user action
//! - Retry limits and backoff
//!
//! The SDK itself never retries. [`retry`](crate::retry()) applies the
//! guidance on the caller's side.

use serde_json::Value;
use std::fmt;
use std::time::Duration;
use turbocopilot_protocol::{ProtocolError, RpcErrorObject};
use turbocopilot_transport::TransportError;

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, CopilotError>;

/// Backoff strategy for retrying operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// No backoff (don't retry)
    None,

    /// Linear backoff: base_ms * attempt_number
    Linear {
        /// Base delay in milliseconds
        base_ms: u64,
    },

    /// Exponential backoff: base_ms * 2^(attempt-1), capped at max_ms
    Exponential {
        /// Base delay in milliseconds
        base_ms: u64,
        /// Maximum delay cap in milliseconds
        max_ms: u64,
    },
}

impl BackoffStrategy {
    /// Calculate delay for a given attempt number (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            BackoffStrategy::None => None,
            BackoffStrategy::Linear { base_ms } => {
                Some(Duration::from_millis(base_ms.saturating_mul(attempt as u64)))
            }
            BackoffStrategy::Exponential { base_ms, max_ms } => {
                let delay_ms =
                    base_ms.saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)));
                Some(Duration::from_millis(delay_ms.min(*max_ms)))
            }
        }
    }
}

/// Error recovery guidance
pub trait ErrorRecovery {
    /// Whether this error should be retried
    fn is_retriable(&self) -> bool;

    /// User-facing action to take
    fn suggested_action(&self) -> &str;

    /// Maximum number of retry attempts (None = don't retry)
    fn max_retries(&self) -> Option<u32>;

    /// Backoff strategy for retries
    fn backoff_strategy(&self) -> BackoffStrategy;
}

/// Errors surfaced by the client, connection and sessions
#[derive(Debug)]
pub enum CopilotError {
    /// Framing or parse failure; the connection has been torn down
    Protocol(ProtocolError),

    /// The connection closed before the call completed, or was already closed
    ConnectionClosed,

    /// The runtime answered with a JSON-RPC error
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message from the runtime
        message: String,
        /// Optional structured detail
        data: Option<Value>,
    },

    /// The runtime has no session with this id
    SessionNotFound(String),

    /// The local session was destroyed
    SessionDestroyed(String),

    /// A local wait gave up
    Timeout(Duration),

    /// Transport failure (spawn, connect, I/O on the channel)
    Transport(String),

    /// Invalid client or session configuration
    Config(String),

    /// A user callback failed
    Handler(String),

    /// The runtime reported `session.error` for the turn being awaited
    SessionError {
        /// Error category reported by the runtime
        error_type: String,
        /// Error message
        message: String,
    },

    /// The runtime speaks a different protocol version
    VersionMismatch {
        /// Version this SDK speaks
        expected: u32,
        /// Version the runtime reported
        got: u32,
    },

    /// I/O error
    Io(std::io::Error),
}

impl CopilotError {
    /// Whether the runtime reported that a session does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::SessionNotFound(_) => true,
            Self::Rpc { message, .. } => message.to_ascii_lowercase().contains("not found"),
            _ => false,
        }
    }

    /// JSON-RPC error code, for [`CopilotError::Rpc`]
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<RpcErrorObject> for CopilotError {
    fn from(err: RpcErrorObject) -> Self {
        Self::Rpc {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

impl PartialEq for CopilotError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Protocol(a), Self::Protocol(b)) => a == b,
            (Self::ConnectionClosed, Self::ConnectionClosed) => true,
            (
                Self::Rpc {
                    code: a_code,
                    message: a_message,
                    data: a_data,
                },
                Self::Rpc {
                    code: b_code,
                    message: b_message,
                    data: b_data,
                },
            ) => a_code == b_code && a_message == b_message && a_data == b_data,
            (Self::SessionNotFound(a), Self::SessionNotFound(b)) => a == b,
            (Self::SessionDestroyed(a), Self::SessionDestroyed(b)) => a == b,
            (Self::Timeout(a), Self::Timeout(b)) => a == b,
            (Self::Transport(a), Self::Transport(b)) => a == b,
            (Self::Config(a), Self::Config(b)) => a == b,
            (Self::Handler(a), Self::Handler(b)) => a == b,
            (
                Self::SessionError {
                    error_type: a_type,
                    message: a_message,
                },
                Self::SessionError {
                    error_type: b_type,
                    message: b_message,
                },
            ) => a_type == b_type && a_message == b_message,
            (
                Self::VersionMismatch {
                    expected: a_expected,
                    got: a_got,
                },
                Self::VersionMismatch {
                    expected: b_expected,
                    got: b_got,
                },
            ) => a_expected == b_expected && a_got == b_got,
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind() && a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl fmt::Display for CopilotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(err) => write!(f, "Protocol error: {}", err),
            Self::ConnectionClosed => write!(f, "Connection closed"),
            Self::Rpc { code, message, .. } => write!(f, "RPC error {}: {}", code, message),
            Self::SessionNotFound(id) => write!(f, "Session not found: {}", id),
            Self::SessionDestroyed(id) => write!(f, "Session destroyed: {}", id),
            Self::Timeout(after) => write!(f, "Timed out after {:?}", after),
            Self::Transport(msg) => write!(f, "Transport error: {}", msg),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Handler(msg) => write!(f, "Handler error: {}", msg),
            Self::SessionError {
                error_type,
                message,
            } => write!(f, "Session error ({}): {}", error_type, message),
            Self::VersionMismatch { expected, got } => write!(
                f,
                "Protocol version mismatch: SDK expects {}, runtime reports {}",
                expected, got
            ),
            Self::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for CopilotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Protocol(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CopilotError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ProtocolError> for CopilotError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<serde_json::Error> for CopilotError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(ProtocolError::from(err))
    }
}

impl From<TransportError> for CopilotError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Closed => Self::ConnectionClosed,
            TransportError::Protocol(err) => Self::Protocol(err),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl ErrorRecovery for CopilotError {
    fn is_retriable(&self) -> bool {
        match self {
            // Spawn and socket failures are often transient
            Self::Transport(_) => true,
            Self::ConnectionClosed => true,
            Self::Timeout(_) => true,
            Self::Io(err) => err.kind() == std::io::ErrorKind::Interrupted,
            _ => false,
        }
    }

    fn suggested_action(&self) -> &str {
        match self {
            Self::Protocol(_) => {
                "The byte stream from the runtime is corrupt. Restart the client; \
                check that nothing else writes to the runtime's stdout."
            }
            Self::ConnectionClosed => {
                "The runtime connection closed. Start the client again \
                and resume the session by id."
            }
            Self::Rpc { .. } => {
                "The runtime rejected the request. Check the error message \
                and the request parameters."
            }
            Self::SessionNotFound(_) => {
                "No session with this id exists. Create a new session \
                or list sessions to find a valid id."
            }
            Self::SessionDestroyed(_) => {
                "The session was destroyed. Create or resume a session \
                before sending."
            }
            Self::Timeout(_) => {
                "Waiting timed out. The turn may still be running; \
                listen for events or wait with a longer timeout."
            }
            Self::Transport(msg) => {
                if msg.contains("spawn") {
                    "Could not start the runtime. Check that the CLI is installed \
                    and cli_path points to it."
                } else {
                    "Transport error detected. Check the runtime process \
                    and network, then start the client again."
                }
            }
            Self::Config(_) => "Fix the client or session configuration and try again.",
            Self::Handler(_) => "A registered callback failed. Check the handler implementation.",
            Self::SessionError { .. } => {
                "The runtime reported an error for this turn. \
                Inspect the session events for details."
            }
            Self::VersionMismatch { .. } => {
                "The runtime speaks a different protocol version. \
                Upgrade the SDK or the CLI so they match."
            }
            Self::Io(err) => match err.kind() {
                std::io::ErrorKind::NotFound => "File not found. Check the path exists.",
                std::io::ErrorKind::PermissionDenied => {
                    "Permission denied. Check file permissions."
                }
                std::io::ErrorKind::Interrupted => "I/O operation interrupted. Retry.",
                _ => "I/O error occurred. Check the system logs.",
            },
        }
    }

    fn max_retries(&self) -> Option<u32> {
        match self {
            Self::Transport(_) | Self::ConnectionClosed => Some(3),
            Self::Timeout(_) => Some(2),
            Self::Io(err) if err.kind() == std::io::ErrorKind::Interrupted => Some(3),
            _ => None,
        }
    }

    fn backoff_strategy(&self) -> BackoffStrategy {
        match self {
            Self::Transport(_) => BackoffStrategy::Exponential {
                base_ms: 250,
                max_ms: 10_000,
            },
            Self::ConnectionClosed => BackoffStrategy::Exponential {
                base_ms: 500,
                max_ms: 10_000,
            },
            Self::Timeout(_) => BackoffStrategy::Linear { base_ms: 1000 },
            Self::Io(err) if err.kind() == std::io::ErrorKind::Interrupted => {
                BackoffStrategy::Linear { base_ms: 100 }
            }
            _ => BackoffStrategy::None,
        }
    }
}
