//! Client and session configuration
//!
//! [`ClientOptions`] decides how the runtime is reached (spawned over stdio,
//! spawned on a TCP port, or an existing server) and how it authenticates.
//! [`SessionConfig`] and [`ResumeSessionConfig`] carry the wire settings for
//! `session.create` / `session.resume` together with the host callbacks.
//!
//! Unset values are omitted on the wire: an absent field means "runtime
//! default".

use crate::error::{CopilotError, Result};
use crate::hooks::SessionHooks;
use crate::permissions::{PermissionHandler, permission_handler};
use crate::tools::Tool;
use crate::user_input::{UserInputHandler, user_input_handler};
use secrecy::{ExposeSecret, SecretString};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use turbocopilot_protocol::session::{
    CustomAgentConfig, InfiniteSessionConfig, McpServerConfig, ProviderConfig, ReasoningEffort,
};
use turbocopilot_protocol::{
    CreateSessionParams, PermissionRequest, PermissionResult, ResumeSessionParams,
    SessionSettings, SystemMessageConfig, UserInputRequest, UserInputResponse,
};
use turbocopilot_transport::ProcessConfig;

/// Environment variable the token is handed to the child through
pub const AUTH_TOKEN_ENV: &str = "COPILOT_SDK_AUTH_TOKEN";

/// Token variables, in lookup order
const TOKEN_ENV_VARS: &[&str] = &["COPILOT_GITHUB_TOKEN", "GH_TOKEN", "GITHUB_TOKEN"];

/// How the client reaches the runtime
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    /// Spawn the CLI and talk over its stdin/stdout
    #[default]
    Stdio,

    /// Spawn the CLI listening on `port` (0 = pick a free port) and connect
    Tcp {
        /// Port to request
        port: u16,
    },

    /// Attach to a server someone else started; never spawned or killed here
    Connect {
        /// `host:port`, `port`, or `scheme://host:port[/...]`
        url: String,
    },
}

/// Configuration for [`CopilotClient`](crate::CopilotClient)
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Path to the CLI executable
    pub cli_path: String,

    /// Extra arguments placed before the SDK's own
    pub cli_args: Vec<String>,

    /// Working directory of the spawned CLI
    pub cwd: Option<PathBuf>,

    /// How to reach the runtime
    pub connection: ConnectionMode,

    /// CLI log level
    pub log_level: String,

    /// Extra environment for the spawned CLI
    pub env: HashMap<String, String>,

    /// Token handed to the spawned CLI
    pub github_token: Option<SecretString>,

    /// `Some(false)` stops the CLI from falling back to its stored login
    pub use_logged_in_user: Option<bool>,

    /// Start on first use instead of requiring an explicit `start()`
    pub auto_start: bool,

    /// Bound on each RPC call; `None` waits for the response or disconnect
    pub request_timeout: Option<Duration>,

    /// How long a TCP-mode CLI has to announce its port
    pub port_discovery_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            cli_path: "copilot".to_string(),
            cli_args: Vec::new(),
            cwd: None,
            connection: ConnectionMode::Stdio,
            log_level: "info".to_string(),
            env: HashMap::new(),
            github_token: None,
            use_logged_in_user: None,
            auto_start: true,
            request_timeout: None,
            port_discovery_timeout: Duration::from_secs(15),
        }
    }
}

impl ClientOptions {
    /// Defaults: spawn `copilot` over stdio
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    ///
    /// This will look for:
    /// - `COPILOT_CLI_PATH` for the executable
    /// - `COPILOT_CLI_URL` to attach to an existing server
    /// - `COPILOT_LOG_LEVEL` for the CLI log level
    /// - `COPILOT_GITHUB_TOKEN`, then `GH_TOKEN`, then `GITHUB_TOKEN` for the
    ///   token (ignored when attaching, since the server owns its auth)
    pub fn from_env() -> Result<Self> {
        use std::env;

        let mut options = Self::default();

        if let Ok(cli_path) = env::var("COPILOT_CLI_PATH")
            && !cli_path.is_empty()
        {
            options.cli_path = cli_path;
        }

        if let Ok(url) = env::var("COPILOT_CLI_URL")
            && !url.is_empty()
        {
            parse_cli_url(&url)?;
            options.connection = ConnectionMode::Connect { url };
        }

        if let Ok(level) = env::var("COPILOT_LOG_LEVEL")
            && !level.is_empty()
        {
            options.log_level = level;
        }

        if !matches!(options.connection, ConnectionMode::Connect { .. }) {
            options.github_token = TOKEN_ENV_VARS
                .iter()
                .filter_map(|name| env::var(name).ok())
                .find(|token| !token.is_empty())
                .map(|token| SecretString::new(token.into_boxed_str()));
        }

        Ok(options)
    }

    /// Set the CLI path
    pub fn with_cli_path(mut self, path: impl Into<String>) -> Self {
        self.cli_path = path.into();
        self
    }

    /// Add a CLI argument
    pub fn with_cli_arg(mut self, arg: impl Into<String>) -> Self {
        self.cli_args.push(arg.into());
        self
    }

    /// Set the working directory of the spawned CLI
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the connection mode
    pub fn with_connection(mut self, connection: ConnectionMode) -> Self {
        self.connection = connection;
        self
    }

    /// Attach to an existing server
    pub fn with_cli_url(self, url: impl Into<String>) -> Self {
        self.with_connection(ConnectionMode::Connect { url: url.into() })
    }

    /// Set the CLI log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set an environment variable for the spawned CLI
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the token handed to the spawned CLI
    pub fn with_github_token(mut self, token: impl Into<String>) -> Self {
        self.github_token = Some(SecretString::new(token.into().into_boxed_str()));
        self
    }

    /// Allow or forbid the CLI's stored login
    pub fn with_use_logged_in_user(mut self, enabled: bool) -> Self {
        self.use_logged_in_user = Some(enabled);
        self
    }

    /// Enable or disable auto-start
    pub fn with_auto_start(mut self, enabled: bool) -> Self {
        self.auto_start = enabled;
        self
    }

    /// Set the per-call timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the TCP port discovery timeout
    pub fn with_port_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.port_discovery_timeout = timeout;
        self
    }

    /// Reject contradictory settings
    pub fn validate(&self) -> Result<()> {
        if let ConnectionMode::Connect { url } = &self.connection {
            if self.github_token.is_some() || self.use_logged_in_user.is_some() {
                return Err(CopilotError::Config(
                    "github_token and use_logged_in_user cannot be used with cli_url: \
                    the external server manages its own auth"
                        .to_string(),
                ));
            }
            parse_cli_url(url)?;
        } else if self.cli_path.is_empty() {
            return Err(CopilotError::Config("cli_path is empty".to_string()));
        }

        if self.log_level.is_empty() {
            return Err(CopilotError::Config("log_level is empty".to_string()));
        }
        Ok(())
    }

    /// Command line for a spawned CLI
    ///
    /// `--stdio` in stdio mode, `--port <n>` in TCP mode.
    pub fn cli_command_args(&self) -> Vec<String> {
        let mut args = self.cli_args.clone();
        args.extend([
            "--headless".to_string(),
            "--log-level".to_string(),
            self.log_level.clone(),
        ]);

        match &self.connection {
            ConnectionMode::Tcp { port } => {
                args.extend(["--port".to_string(), port.to_string()]);
            }
            _ => args.push("--stdio".to_string()),
        }

        if self.github_token.is_some() {
            args.extend(["--auth-token-env".to_string(), AUTH_TOKEN_ENV.to_string()]);
        }
        if self.use_logged_in_user == Some(false) {
            args.push("--no-auto-login".to_string());
        }
        args
    }

    /// Process configuration for a spawned CLI
    pub fn process_config(&self) -> ProcessConfig {
        let mut config = ProcessConfig::new(&self.cli_path).with_args(self.cli_command_args());
        for (key, value) in &self.env {
            config = config.with_env(key, value);
        }
        if let Some(token) = &self.github_token {
            config = config.with_env(AUTH_TOKEN_ENV, token.expose_secret());
        }
        if let Some(cwd) = &self.cwd {
            config = config.with_cwd(cwd);
        }
        config
    }
}

/// Split a server address into host and port
///
/// Accepts `host:port`, a bare `port`, or `scheme://host:port[/path]`. An
/// empty host means `localhost`.
pub fn parse_cli_url(url: &str) -> Result<(String, u16)> {
    let trimmed = url.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    let authority = without_scheme.split('/').next().unwrap_or_default();

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (host, port),
        None => ("", authority),
    };

    let port = port
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| CopilotError::Config(format!("invalid port in cli_url {:?}", url)))?;
    let host = if host.is_empty() { "localhost" } else { host };

    Ok((host.to_string(), port))
}

/// Host callbacks bound to one session
#[derive(Clone, Default)]
pub struct SessionCallbacks {
    /// Answers `permission.request`; absent means deny
    pub permission: Option<PermissionHandler>,
    /// Answers `userInput.request`; absent means the request fails
    pub user_input: Option<UserInputHandler>,
    /// Hook handlers
    pub hooks: SessionHooks,
    /// Host-implemented tools
    pub tools: Vec<Tool>,
}

impl SessionCallbacks {
    /// Fill the wire flags and tool definitions these callbacks imply
    fn apply_to(&self, settings: &mut SessionSettings) {
        if self.permission.is_some() {
            settings.request_permission = Some(true);
        }
        if self.user_input.is_some() {
            settings.request_user_input = Some(true);
        }
        if !self.hooks.is_empty() {
            settings.hooks = Some(true);
        }
        settings
            .tools
            .extend(self.tools.iter().map(|tool| tool.definition().clone()));
    }
}

impl std::fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("permission", &self.permission.is_some())
            .field("user_input", &self.user_input.is_some())
            .field("hooks", &self.hooks)
            .field("tools", &self.tools)
            .finish()
    }
}

macro_rules! session_builders {
    () => {
        /// Replace all wire settings
        pub fn with_settings(mut self, settings: SessionSettings) -> Self {
            self.settings = settings;
            self
        }

        /// Set the model
        pub fn with_model(mut self, model: impl Into<String>) -> Self {
            self.settings.model = Some(model.into());
            self
        }

        /// Set the reasoning effort
        pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
            self.settings.reasoning_effort = Some(effort);
            self
        }

        /// Set the runtime config directory
        pub fn with_config_dir(mut self, dir: impl Into<String>) -> Self {
            self.settings.config_dir = Some(dir.into());
            self
        }

        /// Set the working directory for tool execution
        pub fn with_working_directory(mut self, dir: impl Into<String>) -> Self {
            self.settings.working_directory = Some(dir.into());
            self
        }

        /// Stream `assistant.message_delta` events
        pub fn with_streaming(mut self, streaming: bool) -> Self {
            self.settings.streaming = Some(streaming);
            self
        }

        /// Restrict the model to these tools
        pub fn with_available_tools<I, S>(mut self, tools: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.settings.available_tools = Some(tools.into_iter().map(Into::into).collect());
            self
        }

        /// Hide these tools from the model
        pub fn with_excluded_tools<I, S>(mut self, tools: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.settings.excluded_tools = Some(tools.into_iter().map(Into::into).collect());
            self
        }

        /// Set the system message
        pub fn with_system_message(mut self, message: SystemMessageConfig) -> Self {
            self.settings.system_message = Some(message);
            self
        }

        /// Route model calls to a custom provider
        pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
            self.settings.provider = Some(provider);
            self
        }

        /// Add an MCP server
        pub fn with_mcp_server(mut self, name: impl Into<String>, server: McpServerConfig) -> Self {
            self.settings
                .mcp_servers
                .get_or_insert_with(BTreeMap::new)
                .insert(name.into(), server);
            self
        }

        /// Add a custom agent
        pub fn with_custom_agent(mut self, agent: CustomAgentConfig) -> Self {
            self.settings
                .custom_agents
                .get_or_insert_with(Vec::new)
                .push(agent);
            self
        }

        /// Add a skill directory
        pub fn with_skill_directory(mut self, dir: impl Into<String>) -> Self {
            self.settings
                .skill_directories
                .get_or_insert_with(Vec::new)
                .push(dir.into());
            self
        }

        /// Disable a skill by name
        pub fn with_disabled_skill(mut self, name: impl Into<String>) -> Self {
            self.settings
                .disabled_skills
                .get_or_insert_with(Vec::new)
                .push(name.into());
            self
        }

        /// Configure infinite-session compaction
        pub fn with_infinite_sessions(mut self, config: InfiniteSessionConfig) -> Self {
            self.settings.infinite_sessions = Some(config);
            self
        }

        /// Register a host-implemented tool
        pub fn with_tool(mut self, tool: Tool) -> Self {
            self.callbacks.tools.push(tool);
            self
        }

        /// Set the permission handler
        pub fn with_permission_handler(mut self, handler: PermissionHandler) -> Self {
            self.callbacks.permission = Some(handler);
            self
        }

        /// Set the permission handler from an async closure
        pub fn on_permission_request<F, Fut>(self, handler: F) -> Self
        where
            F: Fn(PermissionRequest, crate::permissions::PermissionInvocation) -> Fut
                + Send
                + Sync
                + 'static,
            Fut: Future<Output = Result<PermissionResult>> + Send + 'static,
        {
            self.with_permission_handler(permission_handler(handler))
        }

        /// Set the user-input handler
        pub fn with_user_input_handler(mut self, handler: UserInputHandler) -> Self {
            self.callbacks.user_input = Some(handler);
            self
        }

        /// Set the user-input handler from an async closure
        pub fn on_user_input_request<F, Fut>(self, handler: F) -> Self
        where
            F: Fn(UserInputRequest, crate::user_input::UserInputInvocation) -> Fut
                + Send
                + Sync
                + 'static,
            Fut: Future<Output = Result<UserInputResponse>> + Send + 'static,
        {
            self.with_user_input_handler(user_input_handler(handler))
        }

        /// Set the hooks
        pub fn with_hooks(mut self, hooks: SessionHooks) -> Self {
            self.callbacks.hooks = hooks;
            self
        }
    };
}

/// Configuration for a new session
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Caller-chosen id; generated when absent
    pub session_id: Option<String>,

    /// Wire settings
    pub settings: SessionSettings,

    /// Host callbacks
    pub callbacks: SessionCallbacks,
}

impl SessionConfig {
    /// Runtime defaults, no callbacks
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose the session id
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    session_builders!();

    /// Split into wire params and callbacks
    pub fn into_parts(self) -> (CreateSessionParams, SessionCallbacks) {
        let mut settings = self.settings;
        self.callbacks.apply_to(&mut settings);
        (
            CreateSessionParams {
                session_id: self.session_id,
                settings,
            },
            self.callbacks,
        )
    }
}

/// Configuration for reattaching to an existing session
///
/// Settings given here override the stored ones; callbacks are never stored
/// by the runtime and must be supplied again.
#[derive(Debug, Clone)]
pub struct ResumeSessionConfig {
    /// Session to reattach
    pub session_id: String,

    /// Setting overrides
    pub settings: SessionSettings,

    /// Attach without emitting a `session.resume` event
    pub disable_resume: Option<bool>,

    /// Host callbacks
    pub callbacks: SessionCallbacks,
}

impl ResumeSessionConfig {
    /// Resume `session_id` with no overrides
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            settings: SessionSettings::default(),
            disable_resume: None,
            callbacks: SessionCallbacks::default(),
        }
    }

    /// Attach without emitting a `session.resume` event
    pub fn with_disable_resume(mut self, disable: bool) -> Self {
        self.disable_resume = Some(disable);
        self
    }

    session_builders!();

    /// Split into wire params and callbacks
    pub fn into_parts(self) -> (ResumeSessionParams, SessionCallbacks) {
        let mut settings = self.settings;
        self.callbacks.apply_to(&mut settings);
        (
            ResumeSessionParams {
                session_id: self.session_id,
                settings,
                disable_resume: self.disable_resume,
            },
            self.callbacks,
        )
    }
}
