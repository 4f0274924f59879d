//! Configuration errors.

use thiserror::Error;

/// Errors raised while loading or validating a swarm document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document could not be parsed.
    #[error("failed to parse swarm document: {0}")]
    Parse(String),

    /// The document declares an unsupported version.
    #[error("unsupported document version {found}; expected {expected}")]
    UnsupportedVersion {
        /// The version found.
        found: u32,
        /// The version this build supports.
        expected: u32,
    },

    /// An environment variable referenced by `${VAR}` is unset.
    #[error("environment variable {var} is not set (at {path})")]
    MissingEnvVar {
        /// The variable name.
        var: String,
        /// Document path of the offending value.
        path: String,
    },

    /// The lead agent is missing or unknown.
    #[error("lead agent {name:?} is not defined")]
    UnknownLead {
        /// The configured lead name.
        name: String,
    },

    /// An agent failed validation.
    #[error("agent {agent:?}: {reason}")]
    InvalidAgent {
        /// The agent name.
        agent: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A delegation edge points at an unknown target.
    #[error("agent {agent:?} delegates to unknown target {target:?}")]
    UnknownDelegate {
        /// The delegating agent.
        agent: String,
        /// The missing target.
        target: String,
    },

    /// A hook entry names an unknown event.
    #[error("agent {agent:?} declares a hook for unknown event {event:?}")]
    UnknownHookEvent {
        /// The agent name.
        agent: String,
        /// The unrecognized event name.
        event: String,
    },

    /// An MCP server entry is invalid.
    #[error("agent {agent:?}, MCP server {server:?}: {reason}")]
    InvalidMcpServer {
        /// The agent name.
        agent: String,
        /// The server name.
        server: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
