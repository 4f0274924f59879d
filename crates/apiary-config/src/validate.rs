//! Validation and normalization of swarm documents.

use std::collections::HashMap;
use std::time::Duration;

use apiary_core::validate_agent_name;
use apiary_hooks::HookEvent;
use apiary_mcp::{McpServerSpec, McpTransport, ReconnectPolicy, DEFAULT_MCP_TIMEOUT};

use crate::definition::{AgentDefinition, DelegateSpec, HookSpec, ToolSpec};
use crate::document::{
    AgentSection, DelegateEntry, HookEntry, McpServerEntry, SwarmDocument, ToolEntry,
    SUPPORTED_VERSION,
};
use crate::error::{ConfigError, ConfigResult};

/// A validated, normalized swarm configuration.
#[derive(Debug, Clone)]
pub struct SwarmSpec {
    /// Swarm name.
    pub name: String,
    /// Optional stable id.
    pub id: Option<String>,
    /// Lead agent name.
    pub lead: String,
    /// Agent definitions, alphabetical by name.
    pub agents: Vec<AgentDefinition>,
}

impl SwarmDocument {
    /// Validate and normalize the document.
    ///
    /// Delegation targets must be agents in this document; use
    /// [`SwarmDocument::validate_with_externals`] when external swarms are
    /// registered under known names.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found; nothing is partially built.
    pub fn validate(self) -> ConfigResult<SwarmSpec> {
        self.validate_with_externals(&[])
    }

    /// Validate, additionally accepting the listed external swarm names as
    /// delegation targets.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate_with_externals(self, externals: &[String]) -> ConfigResult<SwarmSpec> {
        if self.version != SUPPORTED_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                expected: SUPPORTED_VERSION,
            });
        }

        let section = self.swarm;
        if !section.agents.contains_key(&section.lead) {
            return Err(ConfigError::UnknownLead {
                name: section.lead.clone(),
            });
        }

        let known: Vec<String> = section.agents.keys().cloned().collect();
        let mut agents = Vec::with_capacity(section.agents.len());
        for (name, agent) in &section.agents {
            agents.push(validate_agent(name, agent, &known, externals)?);
        }

        Ok(SwarmSpec {
            name: section.name,
            id: section.id,
            lead: section.lead,
            agents,
        })
    }
}

fn validate_agent(
    name: &str,
    section: &AgentSection,
    known: &[String],
    externals: &[String],
) -> ConfigResult<AgentDefinition> {
    validate_agent_name(name).map_err(|e| ConfigError::InvalidAgent {
        agent: name.to_string(),
        reason: e.to_string(),
    })?;

    let description = section
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| invalid(name, "description is required"))?;

    let model = section
        .model
        .as_deref()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| invalid(name, "model is required"))?;

    let directory = section
        .directory
        .as_deref()
        .ok_or_else(|| invalid(name, "directory is required"))?;
    let directory = std::path::PathBuf::from(directory);
    if !directory.is_dir() {
        return Err(invalid(
            name,
            &format!("directory {} does not exist", directory.display()),
        ));
    }

    if let Some(api_version) = section.api_version.as_deref() {
        if !matches!(api_version, "v1/chat/completions" | "v1/responses") {
            return Err(invalid(name, &format!("invalid api_version {api_version:?}")));
        }
        let openai_compatible =
            section.provider.as_deref() == Some("openai") || section.base_url.is_some();
        if !openai_compatible {
            return Err(invalid(
                name,
                "api_version is only valid for OpenAI-compatible providers",
            ));
        }
    }

    let mut definition = AgentDefinition::new(name, description, model, &directory);
    definition.provider.clone_from(&section.provider);
    definition.base_url.clone_from(&section.base_url);
    definition.api_version.clone_from(&section.api_version);
    definition.context_window = section.context_window;
    definition.parameters.clone_from(&section.parameters);
    definition.headers.clone_from(&section.headers);
    definition.timeout = section.timeout.map(Duration::from_secs);
    definition.coding_agent = section.coding_agent;
    definition.disable_default_tools = section.disable_default_tools.clone();
    definition.shared_across_delegations = section.shared_across_delegations;
    definition.system_prompt.clone_from(&section.system_prompt);
    if let Some(interval) = section.todowrite_reminder_interval {
        definition.todowrite_reminder_interval = interval.max(1);
    }
    if let Some(max) = section.max_concurrent_tools {
        definition.max_concurrent_tools = max.max(1);
    }

    for entry in &section.tools {
        definition.tools.push(normalize_tool(name, entry)?);
    }

    for entry in &section.delegates_to {
        let delegate = normalize_delegate(entry);
        let target_known =
            known.contains(&delegate.agent) || externals.contains(&delegate.agent);
        if !target_known {
            return Err(ConfigError::UnknownDelegate {
                agent: name.to_string(),
                target: delegate.agent,
            });
        }
        definition.delegates_to.push(delegate);
    }

    for entry in &section.mcp_servers {
        definition.mcp_servers.push(normalize_mcp(name, entry)?);
    }

    for (event_name, entries) in &section.hooks {
        let event: HookEvent = event_name
            .parse()
            .map_err(|_| ConfigError::UnknownHookEvent {
                agent: name.to_string(),
                event: event_name.clone(),
            })?;
        for entry in entries {
            definition.hooks.push(normalize_hook(name, event, entry)?);
        }
    }

    definition.plugin_configs = section
        .plugin_configs
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect::<HashMap<_, _>>();

    definition.apply_default_write_permissions();
    Ok(definition)
}

fn normalize_tool(agent: &str, entry: &ToolEntry) -> ConfigResult<ToolSpec> {
    match entry {
        ToolEntry::Name(name) => Ok(ToolSpec::named(name.clone())),
        ToolEntry::Configured(map) => {
            if map.len() != 1 {
                return Err(invalid(
                    agent,
                    "a configured tool entry must have exactly one key",
                ));
            }
            let (name, permissions) = map
                .iter()
                .next()
                .unwrap_or_else(|| unreachable!("len checked above"));
            Ok(ToolSpec::named(name.clone()).with_permissions(permissions.clone()))
        }
    }
}

fn normalize_delegate(entry: &DelegateEntry) -> DelegateSpec {
    match entry {
        DelegateEntry::Name(name) => DelegateSpec::to(name.clone()),
        DelegateEntry::Full {
            agent,
            tool_name,
            preserve_context,
        } => {
            let mut spec = DelegateSpec::to(agent.clone());
            spec.tool_name.clone_from(tool_name);
            spec.preserve_context = preserve_context.unwrap_or(true);
            spec
        }
    }
}

fn normalize_hook(agent: &str, event: HookEvent, entry: &HookEntry) -> ConfigResult<HookSpec> {
    if entry.kind != "command" {
        return Err(invalid(
            agent,
            &format!("unsupported hook type {:?} (only \"command\")", entry.kind),
        ));
    }
    Ok(HookSpec {
        event,
        matcher: entry.matcher.clone(),
        command: entry.command.clone(),
        timeout: entry.timeout,
    })
}

fn normalize_mcp(agent: &str, entry: &McpServerEntry) -> ConfigResult<McpServerSpec> {
    let transport = match entry.kind.as_str() {
        "stdio" => {
            let command = entry.command.clone().ok_or_else(|| mcp_err(
                agent,
                &entry.name,
                "stdio transport requires command",
            ))?;
            McpTransport::Stdio {
                command,
                args: entry.args.clone(),
                env: entry.env.clone(),
            }
        }
        "sse" => McpTransport::Sse {
            url: require_url(agent, entry)?,
            headers: entry.headers.clone(),
        },
        "http" | "streamable" => McpTransport::Streamable {
            url: require_url(agent, entry)?,
            headers: entry.headers.clone(),
        },
        other => {
            return Err(mcp_err(
                agent,
                &entry.name,
                &format!("unknown transport type {other:?}"),
            ))
        }
    };

    if let Some(tools) = &entry.tools {
        if tools.is_empty() {
            return Err(mcp_err(
                agent,
                &entry.name,
                "tools: [] is invalid; omit the key for discovery mode",
            ));
        }
    }

    Ok(McpServerSpec {
        name: entry.name.clone(),
        transport,
        tools: entry.tools.clone(),
        timeout: entry.timeout.map_or(DEFAULT_MCP_TIMEOUT, Duration::from_secs),
        reconnect: ReconnectPolicy::default(),
    })
}

fn require_url(agent: &str, entry: &McpServerEntry) -> ConfigResult<String> {
    entry
        .url
        .clone()
        .ok_or_else(|| mcp_err(agent, &entry.name, "this transport requires url"))
}

fn invalid(agent: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidAgent {
        agent: agent.to_string(),
        reason: reason.to_string(),
    }
}

fn mcp_err(agent: &str, server: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidMcpServer {
        agent: agent.to_string(),
        server: server.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(agents_yaml: &str, lead: &str) -> String {
        format!("version: 2\nswarm:\n  name: demo\n  lead: {lead}\n  agents:\n{agents_yaml}")
    }

    fn minimal_agent(name: &str, dir: &std::path::Path) -> String {
        format!(
            "    {name}:\n      description: d\n      model: m\n      directory: {}\n",
            dir.display()
        )
    }

    #[test]
    fn test_minimal_document_validates() {
        let dir = TempDir::new().unwrap();
        let text = doc(&minimal_agent("solo", dir.path()), "solo");
        let spec = SwarmDocument::from_yaml_str(&text).unwrap().validate().unwrap();
        assert_eq!(spec.lead, "solo");
        assert_eq!(spec.agents.len(), 1);
    }

    #[test]
    fn test_wrong_version_rejected() {
        let dir = TempDir::new().unwrap();
        let text = doc(&minimal_agent("solo", dir.path()), "solo").replace("version: 2", "version: 1");
        let err = SwarmDocument::from_yaml_str(&text).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { found: 1, .. }));
    }

    #[test]
    fn test_unknown_lead_rejected() {
        let dir = TempDir::new().unwrap();
        let text = doc(&minimal_agent("solo", dir.path()), "ghost");
        let err = SwarmDocument::from_yaml_str(&text).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownLead { .. }));
    }

    #[test]
    fn test_missing_directory_rejected() {
        let text = doc(
            "    solo:\n      description: d\n      model: m\n      directory: /does/not/exist\n",
            "solo",
        );
        let err = SwarmDocument::from_yaml_str(&text).unwrap().validate().unwrap_err();
        match err {
            ConfigError::InvalidAgent { reason, .. } => assert!(reason.contains("does not exist")),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_api_version_requires_openai_compatible() {
        let dir = TempDir::new().unwrap();
        let text = doc(
            &format!(
                "    solo:\n      description: d\n      model: m\n      directory: {}\n      provider: anthropic\n      api_version: v1/responses\n",
                dir.path().display()
            ),
            "solo",
        );
        let err = SwarmDocument::from_yaml_str(&text).unwrap().validate().unwrap_err();
        match err {
            ConfigError::InvalidAgent { reason, .. } => {
                assert!(reason.contains("OpenAI-compatible"));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_unknown_delegate_rejected_and_externals_accepted() {
        let dir = TempDir::new().unwrap();
        let agent = format!(
            "    solo:\n      description: d\n      model: m\n      directory: {}\n      delegates_to: [helper]\n",
            dir.path().display()
        );
        let text = doc(&agent, "solo");

        let err = SwarmDocument::from_yaml_str(&text).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDelegate { .. }));

        let spec = SwarmDocument::from_yaml_str(&text)
            .unwrap()
            .validate_with_externals(&["helper".to_string()])
            .unwrap();
        assert_eq!(spec.agents[0].delegates_to[0].agent, "helper");
    }

    #[test]
    fn test_unknown_hook_event_rejected() {
        let dir = TempDir::new().unwrap();
        let agent = format!(
            "    solo:\n      description: d\n      model: m\n      directory: {}\n      hooks:\n        on_fire:\n          - type: command\n            command: echo hi\n",
            dir.path().display()
        );
        let err = SwarmDocument::from_yaml_str(&doc(&agent, "solo"))
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownHookEvent { .. }));
    }

    #[test]
    fn test_mcp_empty_tools_rejected() {
        let dir = TempDir::new().unwrap();
        let agent = format!(
            "    solo:\n      description: d\n      model: m\n      directory: {}\n      mcp_servers:\n        - name: m\n          type: stdio\n          command: mcp-server\n          tools: []\n",
            dir.path().display()
        );
        let err = SwarmDocument::from_yaml_str(&doc(&agent, "solo"))
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMcpServer { .. }));
    }

    #[test]
    fn test_write_tool_gets_default_permissions() {
        let dir = TempDir::new().unwrap();
        let agent = format!(
            "    solo:\n      description: d\n      model: m\n      directory: {}\n      tools: [Read, Write]\n",
            dir.path().display()
        );
        let spec = SwarmDocument::from_yaml_str(&doc(&agent, "solo"))
            .unwrap()
            .validate()
            .unwrap();

        let write = spec.agents[0]
            .tools
            .iter()
            .find(|t| t.name == "Write")
            .unwrap();
        assert_eq!(
            write.permissions.as_ref().unwrap().allowed_paths,
            vec!["**/*"]
        );
    }

    #[test]
    fn test_agent_name_with_at_rejected() {
        let dir = TempDir::new().unwrap();
        let agent = format!(
            "    \"bad@name\":\n      description: d\n      model: m\n      directory: {}\n",
            dir.path().display()
        );
        let err = SwarmDocument::from_yaml_str(&doc(&agent, "bad@name"))
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAgent { .. }));
    }

    #[test]
    fn test_http_transport_maps_to_streamable() {
        let dir = TempDir::new().unwrap();
        let agent = format!(
            "    solo:\n      description: d\n      model: m\n      directory: {}\n      mcp_servers:\n        - name: remote\n          type: http\n          url: https://example.com/mcp\n          timeout: 30\n",
            dir.path().display()
        );
        let spec = SwarmDocument::from_yaml_str(&doc(&agent, "solo"))
            .unwrap()
            .validate()
            .unwrap();

        let server = &spec.agents[0].mcp_servers[0];
        assert!(matches!(server.transport, McpTransport::Streamable { .. }));
        assert_eq!(server.timeout, Duration::from_secs(30));
    }
}
