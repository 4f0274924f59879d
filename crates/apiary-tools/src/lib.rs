#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Tool registry and built-in tools for the Apiary swarm engine.
//!
//! Tools are invoked with a parsed JSON argument map and return a string (or
//! a [`ToolError`] that is surfaced to the LLM as an error result). File- and
//! command-touching tools consult a [`PermissionEnvelope`] before acting and
//! fail with an error naming the violated rule.

mod bash;
mod edit;
mod invocation;
mod permissions;
mod read;
mod registry;
mod todo;
mod write;

pub use bash::{BashTool, DEFAULT_BASH_TIMEOUT, MAX_BASH_TIMEOUT};
pub use edit::EditTool;
pub use invocation::{ReadTracker, TodoItem, TodoStatus, TodoStore, ToolInvocation};
pub use permissions::PermissionEnvelope;
pub use read::ReadTool;
pub use registry::{ToolRegistration, ToolRegistry, ToolSource};
pub use todo::TodoWriteTool;
pub use write::WriteTool;

use async_trait::async_trait;
use serde_json::Value;

/// Tool execution errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Arguments failed validation.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A permission rule rejected the call.
    #[error("permission denied: {rule}")]
    PermissionDenied {
        /// The rule that was violated.
        rule: String,
    },

    /// The tool ran past its time limit.
    #[error("timed out after {limit_ms}ms")]
    Timeout {
        /// The limit in milliseconds.
        limit_ms: u64,
    },

    /// The tool ran but failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Registry-level failure (duplicate name, immutable removal).
    #[error("{0}")]
    Registry(String),
}

/// Result type for tool execution.
pub type ToolResult = Result<String, ToolError>;

/// An invokable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, unique within a registry.
    fn name(&self) -> String;

    /// Description shown to the LLM.
    fn description(&self) -> String;

    /// JSON schema for the input arguments.
    fn input_schema(&self) -> Value;

    /// Execute with parsed arguments.
    async fn call(&self, args: Value, invocation: &ToolInvocation) -> ToolResult;
}
