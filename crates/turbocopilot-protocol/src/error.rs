//! Error types for protocol operations
//!
//! Framing and parse failures are fatal to a connection: once a frame boundary
//! is lost the byte stream cannot be resynchronized.

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding protocol messages
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// Malformed `Content-Length` header or frame boundary
    #[error("Framing error: {0}")]
    Framing(String),

    /// A complete frame body that is not valid JSON
    #[error("Parse error: {message}")]
    Parse {
        /// Parser diagnostic
        message: String,
        /// Raw body, lossily decoded, for diagnostics
        body: String,
    },

    /// Valid JSON that is not a JSON-RPC 2.0 message
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Failure turning a value into JSON or back
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ProtocolError {
    /// Build a parse error from a raw frame body
    pub fn parse(err: &serde_json::Error, body: &[u8]) -> Self {
        Self::Parse {
            message: err.to_string(),
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// Whether this error is a framing or parse failure
    pub fn is_wire_corruption(&self) -> bool {
        matches!(self, Self::Framing(_) | Self::Parse { .. })
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
