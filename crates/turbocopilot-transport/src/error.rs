//! Transport error types

use std::fmt;
use turbocopilot_protocol::ProtocolError;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur in transport operations
#[derive(Debug)]
pub enum TransportError {
    /// Could not establish the channel
    Connection(String),

    /// I/O error
    Io(std::io::Error),

    /// The channel is closed
    Closed,

    /// Process error (for subprocess transport)
    Process(String),

    /// Framing or parse failure; the stream cannot be resynchronized
    Protocol(ProtocolError),

    /// Timeout error
    Timeout,

    /// Generic transport error
    Other(String),
}

impl TransportError {
    /// Whether the byte stream itself is corrupt
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "Connection error: {}", msg),
            Self::Io(err) => write!(f, "I/O error: {}", err),
            Self::Closed => write!(f, "Transport closed"),
            Self::Process(msg) => write!(f, "Process error: {}", msg),
            Self::Protocol(err) => write!(f, "Protocol error: {}", err),
            Self::Timeout => write!(f, "Timeout"),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Protocol(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ProtocolError> for TransportError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(ProtocolError::from(err))
    }
}
