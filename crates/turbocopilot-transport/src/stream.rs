//! Framed transport over any async byte stream
//!
//! The reader and writer sit behind separate locks so a blocked `recv` never
//! holds up `send`.

use crate::error::{Result, TransportError};
use crate::framing::WireFramer;
use crate::traits::Transport;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, warn};
use turbocopilot_protocol::Message;

const READ_CHUNK: usize = 8 * 1024;

struct ReadState<R> {
    reader: R,
    framer: WireFramer,
    chunk: Box<[u8]>,
    eof: bool,
}

/// [`Transport`] that frames messages onto a reader/writer pair
pub struct FramedTransport<R, W> {
    reader: Mutex<ReadState<R>>,
    writer: Mutex<Option<W>>,
    closed: watch::Sender<bool>,
}

impl<R, W> FramedTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Wrap a reader/writer pair
    pub fn new(reader: R, writer: W) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            reader: Mutex::new(ReadState {
                reader,
                framer: WireFramer::new(),
                chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
                eof: false,
            }),
            writer: Mutex::new(Some(writer)),
            closed,
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[async_trait]
impl<R, W> Transport for FramedTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, message: Message) -> Result<()> {
        let bytes = WireFramer::encode(&message)?;

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Message>> {
        let mut guard = self.reader.lock().await;
        let ReadState {
            reader,
            framer,
            chunk,
            eof,
        } = &mut *guard;
        let mut closed = self.closed.subscribe();

        loop {
            match framer.next_message() {
                Ok(Some(message)) => return Ok(Some(message)),
                Ok(None) => {}
                Err(err) if err.is_wire_corruption() => {
                    error!(error = %err, "Unrecoverable framing error");
                    return Err(err.into());
                }
                Err(err) => {
                    warn!(error = %err, "Skipping frame that is not a JSON-RPC message");
                    continue;
                }
            }

            if *eof || *closed.borrow() {
                return Ok(None);
            }

            let read = tokio::select! {
                read = reader.read(chunk) => read?,
                _ = closed.wait_for(|closed| *closed) => return Ok(None),
            };

            if read == 0 {
                if framer.buffered() > 0 {
                    warn!(
                        buffered = framer.buffered(),
                        "Peer closed the stream mid-frame"
                    );
                }
                debug!("Stream reached EOF");
                *eof = true;
                self.closed.send_replace(true);
                return Ok(None);
            }
            framer.extend(&chunk[..read]);
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.send_replace(true);

        if let Some(mut writer) = self.writer.lock().await.take()
            && let Err(err) = writer.shutdown().await
        {
            debug!(error = %err, "Writer shutdown failed");
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        !self.is_closed()
    }
}
