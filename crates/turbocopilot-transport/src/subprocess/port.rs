//! TCP port discovery from the runtime's stdout

use crate::error::{Result, TransportError};
use regex::Regex;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

const PORT_PATTERN: &str = r"(?i)listening on port (\d+)";

/// Extracts the announced port from runtime output lines
#[derive(Debug, Clone)]
pub struct PortAnnouncement {
    pattern: Regex,
}

impl PortAnnouncement {
    /// Compile the announcement pattern
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(PORT_PATTERN)
            .map_err(|e| TransportError::Other(format!("Invalid port pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Port announced on `line`, if any
    pub fn parse(&self, line: &str) -> Option<u16> {
        self.pattern
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|port| port.as_str().parse().ok())
    }

    /// Read lines until a port is announced
    ///
    /// Fails with [`TransportError::Timeout`] if nothing matches within
    /// `timeout`, or with a process error if the stream ends first.
    pub async fn wait_for_port<R>(&self, reader: &mut R, timeout: Duration) -> Result<u16>
    where
        R: AsyncBufRead + Unpin,
    {
        tokio::time::timeout(timeout, self.scan(reader))
            .await
            .map_err(|_| TransportError::Timeout)?
    }

    async fn scan<R>(&self, reader: &mut R) -> Result<u16>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Err(TransportError::Process(
                    "runtime exited before announcing its port".to_string(),
                ));
            }
            if let Some(port) = self.parse(&line) {
                return Ok(port);
            }
            debug!(line = line.trim_end(), "Runtime output");
        }
    }
}
