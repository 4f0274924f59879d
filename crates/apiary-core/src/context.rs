//! Execution context threaded through the engine.
//!
//! The engine never relies on task-local or global mutable state for
//! identifying the current execution. Instead an [`ExecutionContext`] value is
//! created at the start of every `execute` call and passed (by clone) into
//! every component that emits events or spawns work. Nested swarm executions
//! derive a child context; when the nested call returns, the parent simply
//! keeps using its own value, which gives the save/restore discipline for
//! free.

use serde::{Deserialize, Serialize};

use crate::id::{ExecutionId, SwarmId};

/// Identifies one in-flight `execute` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// The execution this context belongs to.
    pub execution_id: ExecutionId,
    /// The swarm being executed.
    pub swarm_id: SwarmId,
    /// The parent swarm, when this execution was started by a delegation
    /// from another swarm.
    pub parent_swarm_id: Option<SwarmId>,
}

impl ExecutionContext {
    /// Create the root context for a top-level execution.
    #[must_use]
    pub fn root(swarm_id: SwarmId) -> Self {
        let execution_id = ExecutionId::generate(&swarm_id);
        Self {
            execution_id,
            swarm_id,
            parent_swarm_id: None,
        }
    }

    /// Create a child context for a nested swarm execution.
    ///
    /// The child gets a fresh execution ID and records the parent's swarm ID.
    #[must_use]
    pub fn child(&self, child_swarm_id: SwarmId) -> Self {
        let execution_id = ExecutionId::generate(&child_swarm_id);
        Self {
            execution_id,
            swarm_id: child_swarm_id,
            parent_swarm_id: Some(self.swarm_id.clone()),
        }
    }
}
