//! In-memory MCP service and connector for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{McpError, McpResult};
use crate::service::{McpConnector, McpService, McpToolInfo};
use crate::spec::McpServerSpec;

struct StaticTool {
    schema: Value,
    result: String,
}

/// A fake MCP server with a fixed tool table.
///
/// Counts `tools/list` calls, schema fetches, and tool calls so tests can
/// assert which RPCs the engine actually issued.
pub struct StaticMcpService {
    name: String,
    tools: Mutex<HashMap<String, StaticTool>>,
    list_calls: AtomicUsize,
    schema_fetches: AtomicUsize,
    tool_calls: AtomicUsize,
    shut_down: AtomicBool,
}

impl StaticMcpService {
    /// Create a fake server with no tools.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: Mutex::new(HashMap::new()),
            list_calls: AtomicUsize::new(0),
            schema_fetches: AtomicUsize::new(0),
            tool_calls: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Add a tool with a fixed result.
    #[must_use]
    pub fn with_tool(
        self,
        tool: impl Into<String>,
        schema: Value,
        result: impl Into<String>,
    ) -> Self {
        self.tools
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(
                tool.into(),
                StaticTool {
                    schema,
                    result: result.into(),
                },
            );
        self
    }

    /// How many times `tools/list` ran.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// How many times a schema was fetched.
    #[must_use]
    pub fn schema_fetches(&self) -> usize {
        self.schema_fetches.load(Ordering::SeqCst)
    }

    /// How many tool calls ran.
    #[must_use]
    pub fn tool_calls(&self) -> usize {
        self.tool_calls.load(Ordering::SeqCst)
    }

    /// Whether `shutdown` was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl McpService for StaticMcpService {
    async fn list_tools(&self) -> McpResult<Vec<McpToolInfo>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let tools = self
            .tools
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut infos: Vec<McpToolInfo> = tools
            .iter()
            .map(|(name, tool)| McpToolInfo {
                name: name.clone(),
                description: Some(format!("{name} (fake)")),
                input_schema: tool.schema.clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn tool_schema(&self, name: &str) -> McpResult<Value> {
        self.schema_fetches.fetch_add(1, Ordering::SeqCst);
        self.tools
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .map(|t| t.schema.clone())
            .ok_or_else(|| McpError::ToolNotFound {
                server: self.name.clone(),
                tool: name.to_string(),
            })
    }

    async fn call_tool(&self, name: &str, _args: Value) -> McpResult<String> {
        self.tool_calls.fetch_add(1, Ordering::SeqCst);
        self.tools
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .map(|t| t.result.clone())
            .ok_or_else(|| McpError::CallFailed {
                server: self.name.clone(),
                tool: name.to_string(),
                reason: "tool not found".to_string(),
            })
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

/// Connector that hands out pre-built services by server name.
#[derive(Default)]
pub struct StaticMcpConnector {
    services: Mutex<HashMap<String, Arc<StaticMcpService>>>,
}

impl StaticMcpConnector {
    /// Create an empty connector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service for a server name.
    #[must_use]
    pub fn with_service(self, name: impl Into<String>, service: Arc<StaticMcpService>) -> Self {
        self.services
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(name.into(), service);
        self
    }
}

#[async_trait]
impl McpConnector for StaticMcpConnector {
    async fn connect(&self, spec: &McpServerSpec) -> McpResult<Arc<dyn McpService>> {
        self.services
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&spec.name)
            .map(|s| Arc::clone(s) as Arc<dyn McpService>)
            .ok_or_else(|| McpError::Connect {
                server: spec.name.clone(),
                reason: "no such fake server".to_string(),
            })
    }
}
