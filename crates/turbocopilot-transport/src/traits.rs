//! Transport trait
//!
//! A transport moves whole JSON-RPC [`Message`]s across one physical channel.
//! Byte-stream transports frame them with [`WireFramer`](crate::WireFramer);
//! the in-process transport passes them as values.

use crate::error::Result;
use async_trait::async_trait;
use turbocopilot_protocol::Message;

/// Ordered, reliable message channel to the runtime
///
/// `send` and `recv` may be called concurrently from different tasks. `recv`
/// is expected to have a single consumer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one message
    async fn send(&self, message: Message) -> Result<()>;

    /// Read the next message; `Ok(None)` once the peer has closed the channel
    async fn recv(&self) -> Result<Option<Message>>;

    /// Close the channel and release the underlying resource
    ///
    /// Wakes a pending `recv`, which then returns `Ok(None)`. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Check if transport is connected
    async fn is_connected(&self) -> bool;
}
