//! Hook outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a hook invocation.
///
/// The first non-[`Continue`](HookOutcome::Continue) outcome in a chain is the
/// chain's result. `Reprompt` is only honored at `swarm_stop`; the finish
/// variants short-circuit the current agent or the whole swarm.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "value")]
pub enum HookOutcome {
    /// Proceed unchanged.
    #[default]
    Continue,
    /// Replace the guarded value (prompt, tool arguments, or tool result).
    Replace(Value),
    /// Stop the guarded operation and surface the message in its place.
    Halt(String),
    /// Ask the executor to run another iteration with a new prompt.
    Reprompt(String),
    /// Finish the current agent's `ask` with the given message.
    FinishAgent(String),
    /// Finish the whole swarm execution with the given message.
    FinishSwarm(String),
}

impl HookOutcome {
    /// Replace with a string value.
    #[must_use]
    pub fn replace_text(text: impl Into<String>) -> Self {
        Self::Replace(Value::String(text.into()))
    }

    /// Whether this outcome lets the chain continue.
    #[must_use]
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }

    /// Whether this outcome terminates the agent or the swarm.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FinishAgent(_) | Self::FinishSwarm(_))
    }

    /// The replacement value, if this is a `Replace`.
    #[must_use]
    pub fn replacement(&self) -> Option<&Value> {
        match self {
            Self::Replace(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_continue() {
        assert!(HookOutcome::default().is_continue());
    }

    #[test]
    fn test_terminal_variants() {
        assert!(HookOutcome::FinishAgent("done".into()).is_terminal());
        assert!(HookOutcome::FinishSwarm("done".into()).is_terminal());
        assert!(!HookOutcome::Halt("no".into()).is_terminal());
    }

    #[test]
    fn test_serde_tagging() {
        let outcome = HookOutcome::Halt("denied".into());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["action"], "halt");
        assert_eq!(json["value"], "denied");

        let parsed: HookOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, outcome);
    }

    #[test]
    fn test_replacement_accessor() {
        let outcome = HookOutcome::replace_text("new prompt");
        assert_eq!(
            outcome.replacement().and_then(Value::as_str),
            Some("new prompt")
        );
        assert_eq!(HookOutcome::Continue.replacement(), None);
    }
}
