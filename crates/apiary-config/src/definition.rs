//! Normalized agent definitions.
//!
//! Every polymorphic configuration form (`"Read"` vs `{Read: {...}}`, bare
//! delegate names vs tables) collapses into the plain records here. The same
//! types back the programmatic builder API, so a swarm assembled in code and
//! one loaded from YAML go through identical wiring.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use apiary_hooks::HookEvent;
use apiary_mcp::McpServerSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default number of trailing messages without a `TodoWrite` call before a
/// recency reminder is injected.
pub const DEFAULT_TODOWRITE_REMINDER_INTERVAL: usize = 6;

/// Context-usage percentages that trigger `context_limit_warning` events.
pub const DEFAULT_CONTEXT_WARNING_THRESHOLDS: [u8; 3] = [75, 85, 95];

/// Per-tool permission envelope as configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolPermissions {
    /// Globs (relative to the agent directory) the tool may touch.
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    /// Globs the tool must not touch. Deny wins.
    #[serde(default)]
    pub deny_paths: Vec<String>,
    /// Command words a shell tool may run. Empty means unrestricted.
    #[serde(default)]
    pub allowed_commands: Vec<String>,
}

/// A tool attached to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name (`Read`, `Write`, `Bash`, ...).
    pub name: String,
    /// Optional permission envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<ToolPermissions>,
}

impl ToolSpec {
    /// A tool spec without explicit permissions.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: None,
        }
    }

    /// Attach permissions.
    #[must_use]
    pub fn with_permissions(mut self, permissions: ToolPermissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Whether this is a write-class tool that gets the default envelope when
    /// none is configured.
    #[must_use]
    pub fn is_write_class(&self) -> bool {
        matches!(self.name.as_str(), "Write" | "Edit" | "MultiEdit")
    }
}

/// A delegation edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegateSpec {
    /// Target agent (or registered swarm) name.
    pub agent: String,
    /// Custom tool name; auto-generated (`WorkWith<Name>`) when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Keep the delegate's conversation across calls (default true).
    #[serde(default = "default_true")]
    pub preserve_context: bool,
}

fn default_true() -> bool {
    true
}

impl DelegateSpec {
    /// A delegation edge to `agent` with defaults.
    #[must_use]
    pub fn to(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            tool_name: None,
            preserve_context: true,
        }
    }

    /// Set a custom tool name.
    #[must_use]
    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = Some(name.into());
        self
    }

    /// Set `preserve_context`.
    #[must_use]
    pub fn preserve_context(mut self, preserve: bool) -> Self {
        self.preserve_context = preserve;
        self
    }
}

/// A declarative (shell) hook on an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookSpec {
    /// Event to fire on.
    pub event: HookEvent,
    /// Optional tool-name matcher.
    #[serde(default)]
    pub matcher: Option<String>,
    /// Shell command.
    pub command: String,
    /// Timeout in seconds (default 60).
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Which default tools to suppress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DisableDefaultTools {
    /// Keep all default tools.
    #[default]
    None,
    /// Disable all default tools (`true` in config).
    All(bool),
    /// Disable the listed tools.
    Named(Vec<String>),
}

impl DisableDefaultTools {
    /// Whether `tool` should be suppressed.
    #[must_use]
    pub fn disables(&self, tool: &str) -> bool {
        match self {
            Self::None => false,
            Self::All(flag) => *flag,
            Self::Named(names) => names.iter().any(|n| n == tool),
        }
    }
}

/// Declarative configuration for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Unique name (no `@`).
    pub name: String,
    /// Non-empty description; used in delegation tool descriptions.
    pub description: String,
    /// Model id.
    pub model: String,
    /// Provider name, when pinned.
    #[serde(default)]
    pub provider: Option<String>,
    /// Custom API base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// API flavor for OpenAI-compatible providers.
    #[serde(default)]
    pub api_version: Option<String>,
    /// Context-window override.
    #[serde(default)]
    pub context_window: Option<u64>,
    /// Working directory; must exist.
    pub directory: PathBuf,
    /// Tools, in order.
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    /// Delegation edges, in order.
    #[serde(default)]
    pub delegates_to: Vec<DelegateSpec>,
    /// MCP servers.
    #[serde(default)]
    pub mcp_servers: Vec<McpServerSpec>,
    /// LLM parameters.
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    /// Extra request headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// LLM request timeout.
    #[serde(default)]
    pub timeout: Option<Duration>,
    /// Select the coding base prompt.
    #[serde(default)]
    pub coding_agent: bool,
    /// Default-tool suppression.
    #[serde(default)]
    pub disable_default_tools: DisableDefaultTools,
    /// Declarative hooks.
    #[serde(default)]
    pub hooks: Vec<HookSpec>,
    /// One shared instance across all delegators.
    #[serde(default)]
    pub shared_across_delegations: bool,
    /// Opaque per-plugin configuration, keyed by plugin name.
    #[serde(default)]
    pub plugin_configs: HashMap<String, Value>,
    /// System prompt override.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Messages without a `TodoWrite` call before a recency reminder.
    #[serde(default = "default_todowrite_interval")]
    pub todowrite_reminder_interval: usize,
    /// Bound on concurrent tool executions within one assistant turn.
    #[serde(default = "default_max_concurrent_tools")]
    pub max_concurrent_tools: usize,
    /// Context-usage warning thresholds (percent).
    #[serde(default = "default_warning_thresholds")]
    pub context_warning_thresholds: Vec<u8>,
}

fn default_todowrite_interval() -> usize {
    DEFAULT_TODOWRITE_REMINDER_INTERVAL
}

fn default_max_concurrent_tools() -> usize {
    1
}

fn default_warning_thresholds() -> Vec<u8> {
    DEFAULT_CONTEXT_WARNING_THRESHOLDS.to_vec()
}

impl AgentDefinition {
    /// Start a definition with the required fields.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        model: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            model: model.into(),
            provider: None,
            base_url: None,
            api_version: None,
            context_window: None,
            directory: directory.into(),
            tools: Vec::new(),
            delegates_to: Vec::new(),
            mcp_servers: Vec::new(),
            parameters: HashMap::new(),
            headers: HashMap::new(),
            timeout: None,
            coding_agent: false,
            disable_default_tools: DisableDefaultTools::None,
            hooks: Vec::new(),
            shared_across_delegations: false,
            plugin_configs: HashMap::new(),
            system_prompt: None,
            todowrite_reminder_interval: DEFAULT_TODOWRITE_REMINDER_INTERVAL,
            max_concurrent_tools: 1,
            context_warning_thresholds: DEFAULT_CONTEXT_WARNING_THRESHOLDS.to_vec(),
        }
    }

    /// Add a tool.
    #[must_use]
    pub fn with_tool(mut self, tool: ToolSpec) -> Self {
        self.tools.push(tool);
        self
    }

    /// Add a delegation edge.
    #[must_use]
    pub fn with_delegate(mut self, delegate: DelegateSpec) -> Self {
        self.delegates_to.push(delegate);
        self
    }

    /// Add an MCP server.
    #[must_use]
    pub fn with_mcp_server(mut self, server: McpServerSpec) -> Self {
        self.mcp_servers.push(server);
        self
    }

    /// Set the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Mark the instance as shared across delegators.
    #[must_use]
    pub fn shared(mut self) -> Self {
        self.shared_across_delegations = true;
        self
    }

    /// Set the LLM timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the context-window override.
    #[must_use]
    pub fn with_context_window(mut self, window: u64) -> Self {
        self.context_window = Some(window);
        self
    }

    /// Add a declarative hook.
    #[must_use]
    pub fn with_hook(mut self, hook: HookSpec) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Set the tool concurrency bound.
    #[must_use]
    pub fn with_max_concurrent_tools(mut self, max: usize) -> Self {
        self.max_concurrent_tools = max.max(1);
        self
    }

    /// Inject the default write envelope into write-class tools that have no
    /// explicit permissions.
    pub fn apply_default_write_permissions(&mut self) {
        for tool in &mut self.tools {
            if tool.is_write_class() && tool.permissions.is_none() {
                tool.permissions = Some(ToolPermissions {
                    allowed_paths: vec!["**/*".to_string()],
                    deny_paths: Vec::new(),
                    allowed_commands: Vec::new(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let def = AgentDefinition::new("backend", "Backend dev", "gpt-5", "/tmp");
        assert_eq!(def.todowrite_reminder_interval, 6);
        assert_eq!(def.max_concurrent_tools, 1);
        assert!(!def.shared_across_delegations);
        assert_eq!(def.context_warning_thresholds, vec![75, 85, 95]);
    }

    #[test]
    fn test_default_write_permissions_injection() {
        let mut def = AgentDefinition::new("a", "d", "m", "/tmp")
            .with_tool(ToolSpec::named("Write"))
            .with_tool(ToolSpec::named("Read"))
            .with_tool(
                ToolSpec::named("Edit").with_permissions(ToolPermissions {
                    allowed_paths: vec!["src/**".to_string()],
                    ..Default::default()
                }),
            );
        def.apply_default_write_permissions();

        let write = &def.tools[0];
        assert_eq!(
            write.permissions.as_ref().unwrap().allowed_paths,
            vec!["**/*"]
        );
        // Read is not write-class.
        assert!(def.tools[1].permissions.is_none());
        // Explicit permissions are untouched.
        assert_eq!(
            def.tools[2].permissions.as_ref().unwrap().allowed_paths,
            vec!["src/**"]
        );
    }

    #[test]
    fn test_disable_default_tools_forms() {
        assert!(!DisableDefaultTools::None.disables("Read"));
        assert!(DisableDefaultTools::All(true).disables("Read"));
        assert!(!DisableDefaultTools::All(false).disables("Read"));
        let named = DisableDefaultTools::Named(vec!["Bash".to_string()]);
        assert!(named.disables("Bash"));
        assert!(!named.disables("Read"));
    }

    #[test]
    fn test_delegate_spec_builder() {
        let spec = DelegateSpec::to("researcher")
            .with_tool_name("AskResearcher")
            .preserve_context(false);
        assert_eq!(spec.agent, "researcher");
        assert_eq!(spec.tool_name.as_deref(), Some("AskResearcher"));
        assert!(!spec.preserve_context);
    }
}
