//! Runtime spawned in TCP server mode

use super::port::PortAnnouncement;
use super::process::{ProcessConfig, ProcessHandle};
use crate::error::Result;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

/// A runtime listening on a local TCP port
#[derive(Debug, Clone)]
pub struct ServerProcess {
    process: ProcessHandle,
    port: u16,
}

impl ServerProcess {
    /// Spawn the runtime and wait for it to announce its port
    ///
    /// The child is killed if no port is announced within `timeout`. After the
    /// announcement its stdout keeps being drained into debug logs.
    pub async fn spawn(config: &ProcessConfig, timeout: Duration) -> Result<Self> {
        let announcement = PortAnnouncement::new()?;
        let (process, stdin, stdout) = ProcessHandle::spawn(config)?;
        // The server takes no input over stdin
        drop(stdin);

        let mut stdout = BufReader::new(stdout);
        let port = match announcement.wait_for_port(&mut stdout, timeout).await {
            Ok(port) => port,
            Err(err) => {
                warn!(error = %err, "Runtime did not announce a port");
                if let Err(kill_err) = process.kill().await {
                    debug!(error = %kill_err, "Kill after failed start");
                }
                return Err(err);
            }
        };
        info!(port, "Runtime server listening");

        tokio::spawn(async move {
            let mut lines = stdout.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(line = %line, "Runtime output");
            }
        });

        Ok(Self { process, port })
    }

    /// Announced port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The child process
    pub fn process(&self) -> &ProcessHandle {
        &self.process
    }

    /// Split into the child handle and port
    pub fn into_parts(self) -> (ProcessHandle, u16) {
        (self.process, self.port)
    }
}
