//! `Content-Length` framing for JSON-RPC over byte streams
//!
//! Each message is `Content-Length: <n>\r\n\r\n<body>` where `n` is the byte
//! length of the UTF-8 JSON body. Other header lines (`Content-Type`) are
//! accepted and ignored.

use bytes::{Buf, Bytes, BytesMut};
use tracing::warn;
use turbocopilot_protocol::{Message, ProtocolError};

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const CONTENT_LENGTH: &str = "content-length";

/// Upper bound on a header block; anything longer is not a header
pub const MAX_HEADER_LEN: usize = 8 * 1024;

/// Incremental encoder/decoder for framed messages
///
/// The framer keeps only the bytes of an incomplete trailing frame. Each
/// [`feed`](Self::feed) yields just the frames completed by that call.
#[derive(Debug, Default)]
pub struct WireFramer {
    buffer: BytesMut,
    // Body length of a frame whose header has already been consumed
    pending_body: Option<usize>,
}

impl WireFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame a message for the wire
    pub fn encode(message: &Message) -> Result<Bytes, ProtocolError> {
        let body = message.to_vec()?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        let mut out = BytesMut::with_capacity(header.len() + body.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&body);
        Ok(out.freeze())
    }

    /// Append bytes and decode every frame they complete
    ///
    /// A framing or parse error leaves the framer in an undefined position;
    /// the caller must stop reading. A body that is valid JSON but not a
    /// JSON-RPC message is logged and skipped, so the frames around it still
    /// decode no matter how the bytes were split.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Message>, ProtocolError> {
        self.buffer.extend_from_slice(bytes);

        let mut messages = Vec::new();
        loop {
            match self.next_message() {
                Ok(Some(message)) => messages.push(message),
                Ok(None) => return Ok(messages),
                Err(err) if err.is_wire_corruption() => return Err(err),
                Err(err) => warn!(error = %err, "Skipping frame that is not a JSON-RPC message"),
            }
        }
    }

    /// Append bytes without decoding
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Decode one buffered frame, if a complete one is available
    pub fn next_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        let body_len = match self.pending_body {
            Some(len) => len,
            None => match self.take_header()? {
                Some(len) => {
                    self.pending_body = Some(len);
                    len
                }
                None => return Ok(None),
            },
        };

        if self.buffer.len() < body_len {
            return Ok(None);
        }

        self.pending_body = None;
        let body = self.buffer.split_to(body_len).freeze();
        Message::from_slice(&body).map(Some)
    }

    /// Bytes held for an incomplete frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn take_header(&mut self) -> Result<Option<usize>, ProtocolError> {
        let Some(end) = find(&self.buffer, HEADER_TERMINATOR) else {
            if self.buffer.len() > MAX_HEADER_LEN {
                return Err(ProtocolError::Framing(format!(
                    "no header terminator within {} bytes",
                    MAX_HEADER_LEN
                )));
            }
            return Ok(None);
        };

        let header = std::str::from_utf8(&self.buffer[..end])
            .map_err(|_| ProtocolError::Framing("header is not valid UTF-8".to_string()))?;

        let mut content_length = None;
        for line in header.split("\r\n") {
            let Some((name, value)) = line.split_once(':') else {
                return Err(ProtocolError::Framing(format!(
                    "malformed header line: {:?}",
                    line
                )));
            };
            if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                let len = value.trim().parse::<usize>().map_err(|_| {
                    ProtocolError::Framing(format!("invalid Content-Length: {:?}", value.trim()))
                })?;
                content_length = Some(len);
            }
        }

        let len = content_length
            .ok_or_else(|| ProtocolError::Framing("missing Content-Length header".to_string()))?;
        self.buffer.advance(end + HEADER_TERMINATOR.len());
        Ok(Some(len))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
