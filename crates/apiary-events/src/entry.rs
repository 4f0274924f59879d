//! Log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event on the bus.
///
/// Entries carry a required `entry_type` plus the uniform identification
/// fields (`agent`, `swarm_id`, `parent_swarm_id`, `execution_id`) and any
/// number of event-specific fields. The timestamp is added at emit time when
/// missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Event type, e.g. `swarm_start`, `tool_call`, `pre_delegation`.
    #[serde(rename = "type")]
    pub entry_type: String,
    /// When the event was emitted.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// The agent the event concerns, if any.
    #[serde(default)]
    pub agent: Option<String>,
    /// Swarm the event belongs to. Filled in by the stream.
    #[serde(default)]
    pub swarm_id: Option<String>,
    /// Parent swarm, for nested executions.
    #[serde(default)]
    pub parent_swarm_id: Option<String>,
    /// Execution the event belongs to. Filled in by the stream.
    #[serde(default)]
    pub execution_id: Option<String>,
    /// Event-specific fields.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl LogEntry {
    /// Create a new entry of the given type.
    #[must_use]
    pub fn new(entry_type: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into(),
            timestamp: None,
            agent: None,
            swarm_id: None,
            parent_swarm_id: None,
            execution_id: None,
            fields: serde_json::Map::new(),
        }
    }

    /// Set the agent name.
    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Add an event-specific field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Look up a value by field name, covering both the uniform fields and
    /// the event-specific ones. Used by subscription filters.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "type" => Some(Value::String(self.entry_type.clone())),
            "agent" => self.agent.clone().map(Value::String),
            "swarm_id" => self.swarm_id.clone().map(Value::String),
            "parent_swarm_id" => self.parent_swarm_id.clone().map(Value::String),
            "execution_id" => self.execution_id.clone().map(Value::String),
            other => self.fields.get(other).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_field_lookup() {
        let entry = LogEntry::new("tool_call")
            .with_agent("backend")
            .with_field("tool", "Bash");

        assert_eq!(entry.entry_type, "tool_call");
        assert_eq!(entry.field("type"), Some(Value::String("tool_call".into())));
        assert_eq!(entry.field("agent"), Some(Value::String("backend".into())));
        assert_eq!(entry.field("tool"), Some(Value::String("Bash".into())));
        assert_eq!(entry.field("missing"), None);
    }

    #[test]
    fn test_serialize_flattens_fields() {
        let entry = LogEntry::new("swarm_start").with_field("prompt", "hello");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "swarm_start");
        assert_eq!(json["prompt"], "hello");
    }
}
