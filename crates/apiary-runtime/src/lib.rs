#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The Apiary swarm runtime: swarm assembly, the per-agent execution loop,
//! the delegation graph, and the execution lifecycle.
//!
//! A [`Swarm`] is built from agent definitions (programmatically or via
//! `apiary-config`), wired by the six-pass initializer, and driven through
//! [`Swarm::execute`]. Agents delegate to each other through generated tools,
//! with shared or isolated (lazily created) target instances and cycle-safe
//! call stacks. Every component reports through the `apiary-events` bus, and
//! cleanup runs in every exit path.

mod chat;
mod compactor;
mod context;
mod delegation;
mod env;
mod error;
mod executor;
mod initializer;
mod plugin;
mod scratchpad;
mod snapshot;
mod swarm;

pub use chat::{AgentChat, AskOutcome, ChatUsage};
pub use compactor::ContextCompactor;
pub use context::AgentContext;
pub use delegation::{delegation_tool_name, DelegateTool, DelegationBinding, LazyDelegateChat};
pub use env::{ExecutionEnv, DEFAULT_GLOBAL_CONCURRENCY};
pub use error::{RuntimeError, RuntimeResult};
pub use plugin::{Plugin, PluginRegistry, PluginStorages};
pub use scratchpad::ScratchpadStore;
pub use snapshot::{AgentSnapshot, SnapshotMetadata, SwarmSnapshot, SNAPSHOT_VERSION};
pub use swarm::{native_hook, ExecutionHandle, ExecutionResult, Swarm, SwarmBuilder};

// The definition types live in `apiary-config`; re-exported so embedding
// applications can build swarms from one crate.
pub use apiary_config::{
    AgentDefinition, DelegateSpec, DisableDefaultTools, HookSpec, ToolPermissions, ToolSpec,
};
