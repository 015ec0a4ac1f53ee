//! Runtime subprocess management
//!
//! The runtime is either driven over its own stdin/stdout
//! ([`StdioTransport`]) or spawned as a TCP server ([`ServerProcess`]) whose
//! port is read from its stdout.

pub mod port;
pub mod process;
pub mod server;
pub mod stdio;

pub use port::PortAnnouncement;
pub use process::{ProcessConfig, ProcessHandle};
pub use server::ServerProcess;
pub use stdio::StdioTransport;
