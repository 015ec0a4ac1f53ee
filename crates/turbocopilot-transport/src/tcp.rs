//! TCP transport
//!
//! Connects to a runtime listening on `host:port`. When the runtime was
//! spawned by us the transport owns the child and terminates it on close; a
//! server we merely connected to is left running.

use crate::error::{Result, TransportError};
use crate::stream::FramedTransport;
use crate::subprocess::ProcessHandle;
use crate::traits::Transport;
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::info;
use turbocopilot_protocol::Message;

/// Default time allowed for the TCP handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport over a TCP socket
pub struct TcpTransport {
    inner: FramedTransport<OwnedReadHalf, OwnedWriteHalf>,
    owned_process: Option<ProcessHandle>,
    peer: String,
}

impl TcpTransport {
    /// Connect to `host:port`
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let peer = format!("{}:{}", host, port);
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&peer))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Connection(format!("{}: {}", peer, e)))?;
        stream.set_nodelay(true)?;
        info!(peer = %peer, "Connected to runtime");

        let (reader, writer) = stream.into_split();
        Ok(Self {
            inner: FramedTransport::new(reader, writer),
            owned_process: None,
            peer,
        })
    }

    /// Take ownership of the server process behind this socket
    pub fn with_process(mut self, process: ProcessHandle) -> Self {
        self.owned_process = Some(process);
        self
    }

    /// Remote address as dialed
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Whether closing this transport also stops the server
    pub fn owns_process(&self) -> bool {
        self.owned_process.is_some()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, message: Message) -> Result<()> {
        self.inner.send(message).await
    }

    async fn recv(&self) -> Result<Option<Message>> {
        self.inner.recv().await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await?;
        if let Some(process) = &self.owned_process {
            process.terminate().await?;
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.inner.is_connected().await
    }
}
