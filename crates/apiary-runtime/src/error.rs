//! Runtime errors.

use thiserror::Error;

/// Errors raised by the swarm runtime.
///
/// Configuration errors bubble out of `execute`; LLM and state errors are
/// captured into the execution result; tool failures never reach this type
/// (they are surfaced to the LLM as error tool results).
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Invalid configuration (unknown lead, invalid delegate, bad document).
    #[error(transparent)]
    Configuration(#[from] apiary_config::ConfigError),

    /// An agent failed to initialize.
    #[error("agent {agent:?} failed to initialize: {reason}")]
    AgentInitialization {
        /// The agent name.
        agent: String,
        /// The underlying failure.
        reason: String,
    },

    /// A delegation chain revisited an in-progress agent.
    #[error("circular delegation detected: {path}")]
    CircularDelegation {
        /// The cycle, e.g. `a→b→a`.
        path: String,
    },

    /// The LLM provider failed.
    #[error(transparent)]
    Llm(#[from] apiary_llm::LlmError),

    /// MCP initialization failed (configuration-class).
    #[error(transparent)]
    Mcp(#[from] apiary_mcp::McpError),

    /// Tool registry wiring failed during initialization.
    #[error("tool registry error: {0}")]
    ToolRegistry(String),

    /// Snapshot version or type mismatch on restore.
    #[error("state error: {message}")]
    State {
        /// What was wrong.
        message: String,
    },

    /// The execution was cancelled from outside.
    #[error("execution cancelled")]
    Cancelled,

    /// The swarm has no lead configured.
    #[error("no lead agent configured")]
    NoLead,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
