#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Shared identifiers and the execution context for the Apiary swarm engine.
//!
//! `apiary-core` sits at the bottom of the crate graph so that the event bus,
//! hook system, and runtime can all reference the same identifier types
//! without circular dependencies.

mod context;
mod error;
mod id;

pub use context::ExecutionContext;
pub use error::{CoreError, CoreResult};
pub use id::{validate_agent_name, ExecutionId, SwarmId};
