//! Stdio transport
//!
//! Frames JSON-RPC over the child's stdin/stdout. The child is owned by the
//! transport and terminated on close.

use super::process::{ProcessConfig, ProcessHandle};
use crate::error::Result;
use crate::stream::FramedTransport;
use crate::traits::Transport;
use async_trait::async_trait;
use tokio::process::{ChildStdin, ChildStdout};
use turbocopilot_protocol::Message;

/// Transport over a spawned runtime's standard streams
pub struct StdioTransport {
    inner: FramedTransport<ChildStdout, ChildStdin>,
    process: ProcessHandle,
}

impl StdioTransport {
    /// Spawn the runtime and attach to its stdin/stdout
    pub fn spawn(config: &ProcessConfig) -> Result<Self> {
        let (process, stdin, stdout) = ProcessHandle::spawn(config)?;
        Ok(Self {
            inner: FramedTransport::new(stdout, stdin),
            process,
        })
    }

    /// The owned child process
    pub fn process(&self) -> &ProcessHandle {
        &self.process
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, message: Message) -> Result<()> {
        self.inner.send(message).await
    }

    async fn recv(&self) -> Result<Option<Message>> {
        self.inner.recv().await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await?;
        self.process.terminate().await
    }

    async fn is_connected(&self) -> bool {
        self.inner.is_connected().await && self.process.is_alive().await
    }
}
