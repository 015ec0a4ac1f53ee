//! Process management for the runtime subprocess

use crate::error::{Result, TransportError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Variables removed from (blanked in) the child environment
const BLANKED_ENV: &[&str] = &["NODE_DEBUG"];

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Configuration for spawning the runtime
#[derive(Clone, Debug)]
pub struct ProcessConfig {
    /// Path to the executable
    pub cli_path: String,

    /// Arguments to pass
    pub args: Vec<String>,

    /// Extra environment variables, layered over the inherited environment
    pub env: HashMap<String, String>,

    /// Working directory
    pub cwd: Option<PathBuf>,

    /// Grace period between SIGTERM and kill on shutdown
    pub shutdown_grace: Duration,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::new("copilot")
    }
}

impl ProcessConfig {
    /// Create a new process configuration
    pub fn new(cli_path: impl Into<String>) -> Self {
        Self {
            cli_path: cli_path.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            shutdown_grace: Duration::from_secs(2),
        }
    }

    /// Add an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the shutdown grace period
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.cli_path);
        cmd.args(&self.args);

        for key in BLANKED_ENV {
            cmd.env(key, "");
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());
        cmd.kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        cmd
    }
}

/// Handle to a running runtime process
///
/// Cloning shares the same child.
#[derive(Clone)]
pub struct ProcessHandle {
    child: Arc<Mutex<Child>>,
    pid: Option<u32>,
    grace: Duration,
}

impl ProcessHandle {
    /// Spawn the process with piped stdin/stdout and inherited stderr
    pub fn spawn(config: &ProcessConfig) -> Result<(Self, ChildStdin, ChildStdout)> {
        let mut child = config.command().spawn().map_err(|e| {
            TransportError::Process(format!("Failed to spawn {}: {}", config.cli_path, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Process("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Process("Failed to get stdout".to_string()))?;

        let pid = child.id();
        info!(cli_path = %config.cli_path, pid = ?pid, "Spawned runtime process");

        Ok((
            Self {
                child: Arc::new(Mutex::new(child)),
                pid,
                grace: config.shutdown_grace,
            },
            stdin,
            stdout,
        ))
    }

    /// OS process id
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Check if the process is still alive
    pub async fn is_alive(&self) -> bool {
        let mut child = self.child.lock().await;
        matches!(child.try_wait(), Ok(None))
    }

    /// Ask the process to exit, then kill it after the grace period
    pub async fn terminate(&self) -> Result<()> {
        let mut child = self.child.lock().await;
        if !matches!(child.try_wait(), Ok(None)) {
            return Ok(());
        }

        if self.signal_terminate() {
            match tokio::time::timeout(self.grace, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(?status, "Runtime process exited");
                    return Ok(());
                }
                Ok(Err(err)) => warn!(error = %err, "Waiting for runtime process failed"),
                Err(_) => warn!(pid = ?self.pid, "Runtime process ignored SIGTERM, killing"),
            }
        }

        child
            .kill()
            .await
            .map_err(|e| TransportError::Process(format!("Failed to kill process: {}", e)))
    }

    /// Kill the process immediately
    pub async fn kill(&self) -> Result<()> {
        let mut child = self.child.lock().await;
        child
            .kill()
            .await
            .map_err(|e| TransportError::Process(format!("Failed to kill process: {}", e)))
    }

    #[cfg(unix)]
    fn signal_terminate(&self) -> bool {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let Some(raw) = self.pid.and_then(|pid| i32::try_from(pid).ok()) else {
            return false;
        };
        match kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "SIGTERM failed");
                false
            }
        }
    }

    #[cfg(not(unix))]
    fn signal_terminate(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .finish()
    }
}
