//! Per-agent-instance tracking record.

use std::collections::BTreeSet;
use std::sync::Mutex;

use apiary_core::SwarmId;

/// Identifies one live agent instance to instrumentation and hooks.
#[derive(Debug)]
pub struct AgentContext {
    /// Agent definition name.
    pub name: String,
    /// `"<delegate>@<delegator>"` for isolated delegation instances.
    pub instance_key: Option<String>,
    /// The owning swarm.
    pub swarm_id: SwarmId,
    /// Parent swarm for nested executions.
    pub parent_swarm_id: Option<SwarmId>,
    /// Names of the delegation tools wired onto this instance.
    pub delegation_tools: Vec<String>,
    /// Whether this is a lazily created delegation instance.
    pub is_delegation_instance: bool,
    /// Context-usage thresholds (percent) already warned about.
    warning_thresholds_hit: Mutex<BTreeSet<u8>>,
}

impl AgentContext {
    /// Create a context for a primary agent.
    #[must_use]
    pub fn primary(name: impl Into<String>, swarm_id: SwarmId) -> Self {
        Self {
            name: name.into(),
            instance_key: None,
            swarm_id,
            parent_swarm_id: None,
            delegation_tools: Vec::new(),
            is_delegation_instance: false,
            warning_thresholds_hit: Mutex::new(BTreeSet::new()),
        }
    }

    /// Create a context for an isolated delegation instance.
    #[must_use]
    pub fn delegation_instance(
        name: impl Into<String>,
        delegator: &str,
        swarm_id: SwarmId,
    ) -> Self {
        let name = name.into();
        let key = format!("{name}@{delegator}");
        Self {
            name,
            instance_key: Some(key),
            swarm_id,
            parent_swarm_id: None,
            delegation_tools: Vec::new(),
            is_delegation_instance: true,
            warning_thresholds_hit: Mutex::new(BTreeSet::new()),
        }
    }

    /// Record the delegation tools wired onto this instance.
    #[must_use]
    pub fn with_delegation_tools(mut self, tools: Vec<String>) -> Self {
        self.delegation_tools = tools;
        self
    }

    /// The label used in events: the instance key for delegation instances,
    /// the plain name otherwise.
    #[must_use]
    pub fn label(&self) -> &str {
        self.instance_key.as_deref().unwrap_or(&self.name)
    }

    /// Mark a threshold as hit. Returns `true` the first time.
    pub fn mark_threshold(&self, threshold: u8) -> bool {
        self.warning_thresholds_hit
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(threshold)
    }

    /// Thresholds hit so far.
    #[must_use]
    pub fn thresholds_hit(&self) -> Vec<u8> {
        self.warning_thresholds_hit
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }
}
