//! Swarm and execution identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Unique identifier for a swarm instance.
///
/// Stable for the lifetime of the swarm; auto-generated unless the swarm was
/// built from a composable configuration that pins an explicit id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwarmId(String);

impl SwarmId {
    /// Generate a fresh random swarm ID (`swarm_<12 hex>`).
    #[must_use]
    pub fn generate() -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self(format!("swarm_{}", &uuid[..12]))
    }

    /// Wrap an explicit identifier (from a composable configuration).
    #[must_use]
    pub fn from_name(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SwarmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one `execute` call on a swarm.
///
/// Distinct across all `execute` calls, on the same or different swarms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
    /// Generate a fresh execution ID (`exec_<swarm_id>_<16 hex>`).
    #[must_use]
    pub fn generate(swarm_id: &SwarmId) -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self(format!("exec_{}_{}", swarm_id.as_str(), &uuid[..16]))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate an agent name.
///
/// Names are used as map keys and as the left half of `"<delegate>@<delegator>"`
/// delegation-instance keys, so they must be non-empty and must not contain `@`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidAgentName`] if the name is empty or contains `@`.
pub fn validate_agent_name(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::InvalidAgentName {
            name: name.to_string(),
            reason: "name must not be empty".to_string(),
        });
    }
    if name.contains('@') {
        return Err(CoreError::InvalidAgentName {
            name: name.to_string(),
            reason: "name must not contain '@'".to_string(),
        });
    }
    Ok(())
}
