//! In-process transport
//!
//! Two linked endpoints exchanging [`Message`] values over channels. No bytes
//! are framed, but the message contract is the same as on the wire.

use crate::error::{Result, TransportError};
use crate::traits::Transport;
use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};
use turbocopilot_protocol::Message;

/// One end of an in-process message channel
pub struct InProcessTransport {
    tx: std::sync::Mutex<Option<mpsc::UnboundedSender<Message>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Message>>,
    closed: watch::Sender<bool>,
}

impl InProcessTransport {
    /// Create two connected endpoints
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (Self::new(a_tx, b_rx), Self::new(b_tx, a_rx))
    }

    fn new(tx: mpsc::UnboundedSender<Message>, rx: mpsc::UnboundedReceiver<Message>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            tx: std::sync::Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
            closed,
        }
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<Message>> {
        self.tx.lock().ok().and_then(|tx| tx.clone())
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn send(&self, message: Message) -> Result<()> {
        let tx = self.sender().ok_or(TransportError::Closed)?;
        tx.send(message).map_err(|_| TransportError::Closed)
    }

    async fn recv(&self) -> Result<Option<Message>> {
        let mut rx = self.rx.lock().await;
        let mut closed = self.closed.subscribe();
        if *closed.borrow() {
            return Ok(None);
        }

        let message = tokio::select! {
            message = rx.recv() => message,
            _ = closed.wait_for(|closed| *closed) => None,
        };
        if message.is_none() {
            self.closed.send_replace(true);
        }
        Ok(message)
    }

    async fn close(&self) -> Result<()> {
        self.closed.send_replace(true);
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        !*self.closed.borrow() && self.sender().is_some_and(|tx| !tx.is_closed())
    }
}
