//! MCP-backed tools: discovered tools and lazy-schema stubs.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use apiary_tools::{Tool, ToolError, ToolInvocation, ToolResult};

use crate::service::{McpService, McpToolInfo};

/// A tool discovered via `tools/list`.
pub struct McpTool {
    server: String,
    info: McpToolInfo,
    service: Arc<dyn McpService>,
}

impl McpTool {
    /// Wrap a discovered tool.
    #[must_use]
    pub fn new(server: impl Into<String>, info: McpToolInfo, service: Arc<dyn McpService>) -> Self {
        Self {
            server: server.into(),
            info,
            service,
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> String {
        self.info.name.clone()
    }

    fn description(&self) -> String {
        self.info
            .description
            .clone()
            .unwrap_or_else(|| format!("Tool {} on MCP server {}", self.info.name, self.server))
    }

    fn input_schema(&self) -> Value {
        self.info.input_schema.clone()
    }

    async fn call(&self, args: Value, _invocation: &ToolInvocation) -> ToolResult {
        self.service
            .call_tool(&self.info.name, args)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}

/// A stub registered in optimized mode.
///
/// No RPC happens at registration. The input schema is fetched once, on the
/// first invocation; a server that does not actually expose the tool fails at
/// that point with an error naming it.
pub struct McpToolStub {
    server: String,
    tool_name: String,
    service: Arc<dyn McpService>,
    schema: OnceCell<Value>,
}

impl McpToolStub {
    /// Create a stub for a declared tool.
    #[must_use]
    pub fn new(
        server: impl Into<String>,
        tool_name: impl Into<String>,
        service: Arc<dyn McpService>,
    ) -> Self {
        Self {
            server: server.into(),
            tool_name: tool_name.into(),
            service,
            schema: OnceCell::new(),
        }
    }

    async fn ensure_schema(&self) -> Result<&Value, ToolError> {
        self.schema
            .get_or_try_init(|| async {
                debug!(server = %self.server, tool = %self.tool_name, "Fetching stub schema");
                self.service
                    .tool_schema(&self.tool_name)
                    .await
                    .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
            })
            .await
    }
}

#[async_trait]
impl Tool for McpToolStub {
    fn name(&self) -> String {
        self.tool_name.clone()
    }

    fn description(&self) -> String {
        format!("Tool {} on MCP server {}", self.tool_name, self.server)
    }

    fn input_schema(&self) -> Value {
        // Schema may not have been fetched yet; advertise a permissive object
        // until the first invocation fills the cache.
        self.schema
            .get()
            .cloned()
            .unwrap_or_else(|| serde_json::json!({"type": "object"}))
    }

    async fn call(&self, args: Value, _invocation: &ToolInvocation) -> ToolResult {
        self.ensure_schema().await?;
        self.service
            .call_tool(&self.tool_name, args)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}
