//! Session configuration carried by `session.create` and `session.resume`
//!
//! Every field is optional on the wire. An absent field means "runtime
//! default"; the SDK never invents values for fields the caller did not set.

use crate::tools::ToolDefinition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Settings shared by session creation and resumption
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    /// Model name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Reasoning effort for models that support it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,

    /// Runtime configuration directory override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<String>,

    /// Working directory for tool execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,

    /// Emit `assistant.message_delta` events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming: Option<bool>,

    /// Custom tools implemented by the SDK host
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Allow-list of built-in tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_tools: Option<Vec<String>>,

    /// Deny-list of built-in tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_tools: Option<Vec<String>>,

    /// System message customization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<SystemMessageConfig>,

    /// Bring-your-own-key provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,

    /// MCP servers by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_servers: Option<BTreeMap<String, McpServerConfig>>,

    /// Custom agent personas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_agents: Option<Vec<CustomAgentConfig>>,

    /// Extra directories to load skills from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_directories: Option<Vec<String>>,

    /// Skills to disable by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_skills: Option<Vec<String>>,

    /// Automatic context compaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infinite_sessions: Option<InfiniteSessionConfig>,

    /// The host answers `permission.request`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_permission: Option<bool>,

    /// The host answers `userInput.request`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_user_input: Option<bool>,

    /// The host answers `hooks.invoke`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<bool>,
}

/// Params for `session.create`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionParams {
    /// Caller-chosen session id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Session settings
    #[serde(flatten)]
    pub settings: SessionSettings,
}

/// Params for `session.resume`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSessionParams {
    /// Session to reattach
    pub session_id: String,

    /// Setting overrides
    #[serde(flatten)]
    pub settings: SessionSettings,

    /// Attach without emitting a `session.resume` event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_resume: Option<bool>,
}

/// Reasoning effort level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    /// Low
    Low,
    /// Medium
    Medium,
    /// High
    High,
    /// Extra high
    Xhigh,
}

/// How the system message is combined with the runtime's own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SystemMessageConfig {
    /// Append to the runtime-managed system message
    Append {
        /// Text to append
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// Replace the system message entirely
    Replace {
        /// Full system message
        content: String,
    },
}

impl SystemMessageConfig {
    /// Append mode
    pub fn append(content: impl Into<String>) -> Self {
        Self::Append {
            content: Some(content.into()),
        }
    }

    /// Replace mode
    pub fn replace(content: impl Into<String>) -> Self {
        Self::Replace {
            content: content.into(),
        }
    }
}

/// Model provider override, keyed by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// OpenAI-compatible endpoint
    #[serde(rename = "openai")]
    OpenAi(ProviderEndpoint),
    /// Azure OpenAI
    Azure(AzureProvider),
    /// Anthropic-compatible endpoint
    Anthropic(ProviderEndpoint),
}

/// Connection details shared by every provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEndpoint {
    /// API base URL
    pub base_url: String,

    /// Wire API flavor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire_api: Option<WireApi>,

    /// API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Bearer token, takes precedence over the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

impl ProviderEndpoint {
    /// Endpoint at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the bearer token
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Set the wire API flavor
    pub fn with_wire_api(mut self, wire_api: WireApi) -> Self {
        self.wire_api = Some(wire_api);
        self
    }
}

/// Azure provider settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AzureProvider {
    /// Connection details
    #[serde(flatten)]
    pub endpoint: ProviderEndpoint,

    /// Azure-specific options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureOptions>,
}

/// Azure-specific options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureOptions {
    /// API version, e.g. `2024-10-21`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

/// Provider wire API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireApi {
    /// Chat completions
    Completions,
    /// Responses API
    Responses,
}

fn all_tools() -> Vec<String> {
    vec!["*".to_string()]
}

/// MCP server definition, keyed by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum McpServerConfig {
    /// Server spawned as a local process
    #[serde(rename = "local", alias = "stdio")]
    Local(McpLocalServer),
    /// Streamable HTTP server
    #[serde(rename = "http")]
    Http(McpRemoteServer),
    /// Server-sent events server
    #[serde(rename = "sse")]
    Sse(McpRemoteServer),
}

/// Local MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpLocalServer {
    /// Executable
    pub command: String,

    /// Arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,

    /// Working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    /// Exposed tools; `*` means all
    #[serde(default = "all_tools")]
    pub tools: Vec<String>,

    /// Call timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl McpLocalServer {
    /// Server launched with `command`, exposing all tools
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: None,
            cwd: None,
            tools: all_tools(),
            timeout: None,
        }
    }

    /// Append an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Remote MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpRemoteServer {
    /// Server URL
    pub url: String,

    /// Extra HTTP headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,

    /// Exposed tools; `*` means all
    #[serde(default = "all_tools")]
    pub tools: Vec<String>,

    /// Call timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl McpRemoteServer {
    /// Server at `url`, exposing all tools
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: None,
            tools: all_tools(),
            timeout: None,
        }
    }
}

/// Custom agent persona
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomAgentConfig {
    /// Unique agent name
    pub name: String,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// What the agent is for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Tools the agent may use; absent means all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,

    /// Agent prompt
    pub prompt: String,

    /// Agent-specific MCP servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_servers: Option<BTreeMap<String, McpServerConfig>>,

    /// Whether the runtime may pick this agent on its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infer: Option<bool>,
}

impl CustomAgentConfig {
    /// Agent with a name and prompt
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            tools: None,
            prompt: prompt.into(),
            mcp_servers: None,
            infer: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Infinite-session compaction thresholds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfiniteSessionConfig {
    /// Enable compaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Context fraction at which background compaction starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_compaction_threshold: Option<f64>,

    /// Context fraction at which the turn blocks until compaction finishes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_exhaustion_threshold: Option<f64>,
}

/// File or directory attached to a prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Attachment {
    /// Single file
    File {
        /// Path
        path: String,
        /// Label shown to the model
        #[serde(
            rename = "displayName",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        display_name: Option<String>,
    },
    /// Directory
    Directory {
        /// Path
        path: String,
        /// Label shown to the model
        #[serde(
            rename = "displayName",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        display_name: Option<String>,
    },
}

/// Delivery mode for a prompt sent while a turn is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageMode {
    /// Queue behind the current turn
    Enqueue,
    /// Inject into the current turn
    Immediate,
}

/// A prompt submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageOptions {
    /// Prompt text
    pub prompt: String,

    /// Attached files and directories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,

    /// Delivery mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<MessageMode>,
}

impl MessageOptions {
    /// Prompt with no attachments
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            attachments: None,
            mode: None,
        }
    }

    /// Attach a file
    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.attachments
            .get_or_insert_with(Vec::new)
            .push(Attachment::File {
                path: path.into(),
                display_name: None,
            });
        self
    }

    /// Set the delivery mode
    pub fn with_mode(mut self, mode: MessageMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

impl From<&str> for MessageOptions {
    fn from(prompt: &str) -> Self {
        Self::new(prompt)
    }
}

impl From<String> for MessageOptions {
    fn from(prompt: String) -> Self {
        Self::new(prompt)
    }
}

/// Params for `session.send`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendParams {
    /// Target session
    pub session_id: String,

    /// The prompt
    #[serde(flatten)]
    pub message: MessageOptions,
}

/// Params for methods that only name a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdParams {
    /// Target session
    pub session_id: String,
}

impl SessionIdParams {
    /// Params for `session_id`
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }
}
