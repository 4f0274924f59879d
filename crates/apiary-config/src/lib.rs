#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Declarative swarm configuration for the Apiary engine.
//!
//! A YAML document (version 2) describes the swarm: its agents, their tools
//! with optional per-tool permissions, delegation edges, MCP servers, and
//! shell hooks. Loading runs three passes: environment interpolation over the
//! raw tree (skipping `mcp_servers[*].env`), typed deserialization, and
//! validation that normalizes every polymorphic form into plain records.

mod definition;
mod document;
mod error;
mod interpolate;
mod validate;

pub use definition::{
    AgentDefinition, DelegateSpec, DisableDefaultTools, HookSpec, ToolPermissions, ToolSpec,
    DEFAULT_CONTEXT_WARNING_THRESHOLDS, DEFAULT_TODOWRITE_REMINDER_INTERVAL,
};
pub use document::{
    AgentSection, DelegateEntry, HookEntry, McpServerEntry, SwarmDocument, ToolEntry,
    SUPPORTED_VERSION,
};
pub use error::{ConfigError, ConfigResult};
pub use interpolate::interpolate_env;
pub use validate::SwarmSpec;
