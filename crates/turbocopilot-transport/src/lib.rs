//! Byte and message transports for the Copilot agent runtime
//!
//! Moves JSON-RPC [`Message`](turbocopilot_protocol::Message)s between the SDK
//! and the runtime. The connection layer above only sees the [`Transport`]
//! trait.
//!
//! # Architecture
//!
//! - **Wire framing**: [`WireFramer`] - `Content-Length` headers over a byte stream
//! - **Stream transport**: [`FramedTransport`] - framing over any reader/writer pair
//! - **Stdio transport**: [`StdioTransport`] - a spawned runtime's stdin/stdout
//! - **TCP transport**: [`TcpTransport`] - a socket, optionally owning a [`ServerProcess`]
//! - **In-process transport**: [`InProcessTransport`] - linked channel endpoints
//! - **Error handling**: [`TransportError`]
//!
//! # Usage
//!
//! ```ignore
//! use turbocopilot_transport::{ProcessConfig, StdioTransport, Transport};
//!
//! let config = ProcessConfig::new("copilot").with_args(["--headless", "--stdio"]);
//! let transport = StdioTransport::spawn(&config)?;
//! transport.send(message).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod framing;
pub mod in_process;
pub mod stream;
pub mod subprocess;
pub mod tcp;
pub mod traits;

// Re-export commonly used types
pub use error::{Result, TransportError};
pub use framing::WireFramer;
pub use in_process::InProcessTransport;
pub use stream::FramedTransport;
pub use subprocess::{PortAnnouncement, ProcessConfig, ProcessHandle, ServerProcess, StdioTransport};
pub use tcp::TcpTransport;
pub use traits::Transport;
