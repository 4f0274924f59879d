//! Raw document types, exactly as written in YAML.
//!
//! The polymorphic entry forms live here; [`validate`](crate::SwarmDocument::validate)
//! collapses them into the normalized records of [`definition`](crate::AgentDefinition).

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::definition::{DisableDefaultTools, ToolPermissions};
use crate::error::{ConfigError, ConfigResult};
use crate::interpolate::interpolate_env;

/// The document version this build understands.
pub const SUPPORTED_VERSION: u32 = 2;

/// A parsed swarm document.
#[derive(Debug, Clone, Deserialize)]
pub struct SwarmDocument {
    /// Document version.
    pub version: u32,
    /// The swarm section.
    pub swarm: SwarmSection,
}

/// The `swarm:` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SwarmSection {
    /// Swarm name.
    pub name: String,
    /// Optional stable id (for composable swarms).
    #[serde(default)]
    pub id: Option<String>,
    /// Lead agent name.
    pub lead: String,
    /// Agent sections by name.
    pub agents: BTreeMap<String, AgentSection>,
}

/// One agent as written in the document.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    /// Required description.
    #[serde(default)]
    pub description: Option<String>,
    /// Model id.
    #[serde(default)]
    pub model: Option<String>,
    /// Provider name.
    #[serde(default)]
    pub provider: Option<String>,
    /// Custom base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// API flavor for OpenAI-compatible providers.
    #[serde(default)]
    pub api_version: Option<String>,
    /// Working directory.
    #[serde(default)]
    pub directory: Option<String>,
    /// Context-window override.
    #[serde(default)]
    pub context_window: Option<u64>,
    /// LLM parameters.
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    /// Extra request headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// LLM timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Select the coding base prompt.
    #[serde(default)]
    pub coding_agent: bool,
    /// Default-tool suppression.
    #[serde(default)]
    pub disable_default_tools: DisableDefaultTools,
    /// Tool entries.
    #[serde(default)]
    pub tools: Vec<ToolEntry>,
    /// Delegation entries.
    #[serde(default)]
    pub delegates_to: Vec<DelegateEntry>,
    /// MCP server entries.
    #[serde(default)]
    pub mcp_servers: Vec<McpServerEntry>,
    /// Hook entries keyed by event name.
    #[serde(default)]
    pub hooks: BTreeMap<String, Vec<HookEntry>>,
    /// One shared instance across all delegators.
    #[serde(default)]
    pub shared_across_delegations: bool,
    /// System prompt override.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// TodoWrite recency interval override.
    #[serde(default)]
    pub todowrite_reminder_interval: Option<usize>,
    /// Tool concurrency override.
    #[serde(default)]
    pub max_concurrent_tools: Option<usize>,
    /// Everything else is plugin configuration, keyed by plugin name.
    #[serde(flatten)]
    pub plugin_configs: BTreeMap<String, Value>,
}

/// A tool entry: `Read` or `{ Read: { allowed_paths: [...] } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolEntry {
    /// Bare tool name.
    Name(String),
    /// Tool name mapped to permissions.
    Configured(BTreeMap<String, ToolPermissions>),
}

/// A delegation entry: `other` or `{ agent: other, tool_name: ..., preserve_context: ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DelegateEntry {
    /// Bare target name.
    Name(String),
    /// Full form.
    Full {
        /// Target agent (or registered swarm) name.
        agent: String,
        /// Custom tool name.
        #[serde(default)]
        tool_name: Option<String>,
        /// Keep the delegate's conversation across calls.
        #[serde(default)]
        preserve_context: Option<bool>,
    },
}

/// A declarative hook entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookEntry {
    /// Optional tool-name matcher.
    #[serde(default)]
    pub matcher: Option<String>,
    /// Hook type; only `command` is supported declaratively.
    #[serde(rename = "type")]
    pub kind: String,
    /// The shell command.
    pub command: String,
    /// Timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// An MCP server entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerEntry {
    /// Server name.
    pub name: String,
    /// Transport: `stdio`, `sse`, or `http`/`streamable`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Command for stdio transport.
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments for stdio transport.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables (preserved verbatim; never interpolated).
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// URL for sse/http transports.
    #[serde(default)]
    pub url: Option<String>,
    /// Headers for sse/http transports.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Optimized-mode tool list; omit for discovery.
    #[serde(default)]
    pub tools: Option<Vec<String>>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl SwarmDocument {
    /// Parse a document from YAML text, interpolating environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed YAML and
    /// [`ConfigError::MissingEnvVar`] on unset `${VAR}` references.
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let mut raw: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        interpolate_env(&mut raw)?;
        serde_yaml::from_value(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parse a document from a file.
    ///
    /// # Errors
    ///
    /// As [`SwarmDocument::from_yaml_str`], plus [`ConfigError::Parse`] when
    /// the file cannot be read.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_yaml_str(&text)
    }
}
