//! The MCP client boundary.
//!
//! Apiary never speaks the MCP wire protocol itself. The embedding
//! application supplies an [`McpConnector`] (typically a thin adapter over an
//! MCP SDK) and the engine drives it through the [`McpService`] interface.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::McpResult;
use crate::spec::McpServerSpec;

/// A tool advertised by an MCP server.
#[derive(Debug, Clone)]
pub struct McpToolInfo {
    /// Tool name.
    pub name: String,
    /// Description, if the server provided one.
    pub description: Option<String>,
    /// Input JSON schema.
    pub input_schema: Value,
}

/// A live connection to one MCP server.
#[async_trait]
pub trait McpService: Send + Sync {
    /// List the tools the server exposes (`tools/list`).
    ///
    /// # Errors
    ///
    /// Returns [`McpError::ListTools`](crate::McpError::ListTools) when the
    /// RPC fails.
    async fn list_tools(&self) -> McpResult<Vec<McpToolInfo>>;

    /// Fetch the input schema for one tool.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::ToolNotFound`](crate::McpError::ToolNotFound) when
    /// the server does not expose the tool.
    async fn tool_schema(&self, name: &str) -> McpResult<Value>;

    /// Call a tool (`tools/call`).
    ///
    /// # Errors
    ///
    /// Returns [`McpError::CallFailed`](crate::McpError::CallFailed) when the
    /// call fails.
    async fn call_tool(&self, name: &str, args: Value) -> McpResult<String>;

    /// Terminate the connection. Idempotent.
    async fn shutdown(&self);
}

/// Turns a server spec into a live service.
#[async_trait]
pub trait McpConnector: Send + Sync {
    /// Establish a connection for the spec.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Connect`](crate::McpError::Connect) when the
    /// server cannot be reached or started.
    async fn connect(&self, spec: &McpServerSpec) -> McpResult<Arc<dyn McpService>>;
}
