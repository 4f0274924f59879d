//! Context passed to hooks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::HookEvent;

/// The tool call a `pre_tool_use`/`post_tool_use` hook is guarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallInfo {
    /// Tool call id from the assistant message.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Parsed arguments.
    pub arguments: Value,
}

/// Context provided to hooks during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookContext {
    /// The event that triggered the hook.
    pub event: HookEvent,
    /// The agent the event concerns.
    pub agent_name: String,
    /// The swarm the agent belongs to.
    pub swarm_id: String,
    /// The user prompt, for `user_prompt` and `swarm_stop`.
    #[serde(default)]
    pub prompt: Option<String>,
    /// The tool call, for `*_tool_use` events.
    #[serde(default)]
    pub tool_call: Option<ToolCallInfo>,
    /// The tool result, for `post_tool_use`.
    #[serde(default)]
    pub tool_result: Option<Value>,
    /// Event-specific metadata.
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl HookContext {
    /// Create a context for an event on an agent.
    #[must_use]
    pub fn new(event: HookEvent, agent_name: impl Into<String>, swarm_id: impl Into<String>) -> Self {
        Self {
            event,
            agent_name: agent_name.into(),
            swarm_id: swarm_id.into(),
            prompt: None,
            tool_call: None,
            tool_result: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Attach the prompt under consideration.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Attach the guarded tool call.
    #[must_use]
    pub fn with_tool_call(mut self, call: ToolCallInfo) -> Self {
        self.tool_call = Some(call);
        self
    }

    /// Attach the tool result.
    #[must_use]
    pub fn with_tool_result(mut self, result: Value) -> Self {
        self.tool_result = Some(result);
        self
    }

    /// Attach a metadata field.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The tool name, when a tool call is attached.
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        self.tool_call.as_ref().map(|c| c.name.as_str())
    }

    /// JSON projection delivered to shell hooks on stdin.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builders() {
        let ctx = HookContext::new(HookEvent::PreToolUse, "backend", "swarm_1")
            .with_tool_call(ToolCallInfo {
                id: "call_1".into(),
                name: "Bash".into(),
                arguments: serde_json::json!({"command": "ls"}),
            })
            .with_metadata("attempt", 1);

        assert_eq!(ctx.tool_name(), Some("Bash"));
        assert_eq!(ctx.metadata["attempt"], 1);
    }

    #[test]
    fn test_json_projection_includes_event() {
        let ctx = HookContext::new(HookEvent::UserPrompt, "backend", "swarm_1")
            .with_prompt("build it");
        let json = ctx.to_json();
        assert_eq!(json["event"], "user_prompt");
        assert_eq!(json["prompt"], "build it");
    }
}
