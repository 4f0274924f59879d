//! Hook event types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Events that can trigger hooks.
///
/// This is a closed enumeration; configuration files naming an unknown event
/// are rejected at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    /// A swarm execution is starting.
    SwarmStart,
    /// A swarm execution has completed one pass of the lead agent.
    SwarmStop,
    /// An agent is about to receive its first user message.
    FirstMessage,
    /// A user prompt is about to be sent to an agent.
    UserPrompt,
    /// An agent finished one completion-loop iteration.
    AgentStep,
    /// An agent's `ask` has completed.
    AgentStop,
    /// Before a tool call is executed.
    PreToolUse,
    /// After a tool call completes.
    PostToolUse,
    /// Before a delegation to another agent.
    PreDelegation,
    /// After a delegation returns.
    PostDelegation,
    /// Context usage crossed a warning threshold.
    ContextWarning,
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SwarmStart => write!(f, "swarm_start"),
            Self::SwarmStop => write!(f, "swarm_stop"),
            Self::FirstMessage => write!(f, "first_message"),
            Self::UserPrompt => write!(f, "user_prompt"),
            Self::AgentStep => write!(f, "agent_step"),
            Self::AgentStop => write!(f, "agent_stop"),
            Self::PreToolUse => write!(f, "pre_tool_use"),
            Self::PostToolUse => write!(f, "post_tool_use"),
            Self::PreDelegation => write!(f, "pre_delegation"),
            Self::PostDelegation => write!(f, "post_delegation"),
            Self::ContextWarning => write!(f, "context_warning"),
        }
    }
}

impl FromStr for HookEvent {
    type Err = UnknownHookEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "swarm_start" => Ok(Self::SwarmStart),
            "swarm_stop" => Ok(Self::SwarmStop),
            "first_message" => Ok(Self::FirstMessage),
            "user_prompt" => Ok(Self::UserPrompt),
            "agent_step" => Ok(Self::AgentStep),
            "agent_stop" => Ok(Self::AgentStop),
            "pre_tool_use" => Ok(Self::PreToolUse),
            "post_tool_use" => Ok(Self::PostToolUse),
            "pre_delegation" => Ok(Self::PreDelegation),
            "post_delegation" => Ok(Self::PostDelegation),
            "context_warning" => Ok(Self::ContextWarning),
            other => Err(UnknownHookEvent {
                name: other.to_string(),
            }),
        }
    }
}

/// Error returned when parsing an unrecognized event name.
#[derive(Debug, thiserror::Error)]
#[error("unknown hook event: {name}")]
pub struct UnknownHookEvent {
    /// The unrecognized name.
    pub name: String,
}

impl HookEvent {
    /// Whether this event carries a tool call (so matchers apply).
    #[must_use]
    pub fn is_tool_event(self) -> bool {
        matches!(self, Self::PreToolUse | Self::PostToolUse)
    }
}
