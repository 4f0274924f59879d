//! MCP errors.

use thiserror::Error;

/// Errors from MCP configuration and calls.
#[derive(Debug, Error)]
pub enum McpError {
    /// A server spec failed validation.
    #[error("invalid MCP server spec {server:?}: {reason}")]
    InvalidSpec {
        /// The server name.
        server: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Connecting to a server failed.
    #[error("failed to connect MCP server {server:?}: {reason}")]
    Connect {
        /// The server name.
        server: String,
        /// The underlying failure.
        reason: String,
    },

    /// `tools/list` failed.
    #[error("tools/list failed on MCP server {server:?}: {reason}")]
    ListTools {
        /// The server name.
        server: String,
        /// The underlying failure.
        reason: String,
    },

    /// The server does not expose the requested tool.
    #[error("MCP server {server:?} does not expose tool {tool:?}")]
    ToolNotFound {
        /// The server name.
        server: String,
        /// The missing tool.
        tool: String,
    },

    /// A tool call failed.
    #[error("MCP tool {tool:?} on {server:?} failed: {reason}")]
    CallFailed {
        /// The server name.
        server: String,
        /// The tool name.
        tool: String,
        /// The underlying failure.
        reason: String,
    },
}

/// Result type for MCP operations.
pub type McpResult<T> = Result<T, McpError>;
