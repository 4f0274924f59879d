//! Wires MCP servers into an agent's tool registry.

use std::sync::Arc;

use apiary_events::{LogEntry, LogStream};
use apiary_tools::{ToolRegistry, ToolSource};
use serde_json::Value;
use tracing::info;

use crate::error::{McpError, McpResult};
use crate::pool::McpClientPool;
use crate::service::McpConnector;
use crate::spec::McpServerSpec;
use crate::stub::{McpTool, McpToolStub};

/// Registers MCP tools for an agent.
///
/// Discovery mode connects and calls `tools/list`; optimized mode registers
/// stubs without any initial RPC. Either way the live service is tracked in
/// the [`McpClientPool`] for cleanup.
pub struct McpConfigurator {
    connector: Arc<dyn McpConnector>,
    pool: Arc<McpClientPool>,
}

impl McpConfigurator {
    /// Create a configurator.
    #[must_use]
    pub fn new(connector: Arc<dyn McpConnector>, pool: Arc<McpClientPool>) -> Self {
        Self { connector, pool }
    }

    /// Configure every server spec for `agent`, registering tools into
    /// `registry`.
    ///
    /// # Errors
    ///
    /// Returns the first [`McpError`] encountered; initialization errors are
    /// configuration errors from the swarm's point of view.
    pub async fn configure(
        &self,
        agent: &str,
        specs: &[McpServerSpec],
        registry: &ToolRegistry,
        stream: &LogStream,
    ) -> McpResult<()> {
        for spec in specs {
            spec.validate()?;
            self.configure_server(agent, spec, registry, stream).await?;
        }
        Ok(())
    }

    async fn configure_server(
        &self,
        agent: &str,
        spec: &McpServerSpec,
        registry: &ToolRegistry,
        stream: &LogStream,
    ) -> McpResult<()> {
        stream.emit(
            LogEntry::new("mcp_server_init_start")
                .with_agent(agent)
                .with_field("server", spec.name.clone()),
        );

        let service = self.connector.connect(spec).await?;
        self.pool.register(agent, Arc::clone(&service));

        let (mode, tool_names) = if let Some(declared) = &spec.tools {
            // Optimized mode: no tools/list RPC; stubs fetch schemas lazily.
            for tool in declared {
                registry
                    .register(
                        Arc::new(McpToolStub::new(
                            spec.name.clone(),
                            tool.clone(),
                            Arc::clone(&service),
                        )),
                        ToolSource::Mcp,
                        server_metadata(&spec.name),
                    )
                    .map_err(|e| McpError::InvalidSpec {
                        server: spec.name.clone(),
                        reason: e.to_string(),
                    })?;
            }
            ("optimized", declared.clone())
        } else {
            let discovered = service.list_tools().await?;
            let mut names = Vec::with_capacity(discovered.len());
            for info in discovered {
                names.push(info.name.clone());
                registry
                    .register(
                        Arc::new(McpTool::new(spec.name.clone(), info, Arc::clone(&service))),
                        ToolSource::Mcp,
                        server_metadata(&spec.name),
                    )
                    .map_err(|e| McpError::InvalidSpec {
                        server: spec.name.clone(),
                        reason: e.to_string(),
                    })?;
            }
            ("discovery", names)
        };

        info!(
            agent = %agent,
            server = %spec.name,
            mode = mode,
            tools = tool_names.len(),
            "MCP server configured"
        );

        stream.emit(
            LogEntry::new("mcp_server_init_complete")
                .with_agent(agent)
                .with_field("server", spec.name.clone())
                .with_field("mode", mode)
                .with_field(
                    "tools",
                    Value::Array(tool_names.into_iter().map(Value::String).collect()),
                ),
        );

        Ok(())
    }
}

fn server_metadata(server: &str) -> serde_json::Map<String, Value> {
    let mut metadata = serde_json::Map::new();
    metadata.insert("server_name".to_string(), Value::String(server.to_string()));
    metadata
}
