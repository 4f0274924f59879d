//! Hook registry: swarm-wide defaults plus agent-scoped callbacks.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::context::HookContext;
use crate::definition::{HookDefinition, HookSource};
use crate::event::HookEvent;

/// Holds default (swarm-wide) and agent-scoped hooks.
///
/// Lookup for an event at an agent returns defaults before agent hooks; each
/// scope is ordered by descending priority, with ties broken by registration
/// order.
#[derive(Debug, Default)]
pub struct HookRegistry {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    defaults: Vec<HookDefinition>,
    by_agent: HashMap<String, Vec<HookDefinition>>,
}

impl HookRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a swarm-wide default hook.
    pub fn add_default(&self, mut hook: HookDefinition) {
        hook.source = HookSource::Default;
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.defaults.push(hook);
    }

    /// Register an agent-scoped hook.
    pub fn add_agent_hook(&self, agent: impl Into<String>, mut hook: HookDefinition) {
        hook.source = HookSource::Agent;
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.by_agent.entry(agent.into()).or_default().push(hook);
    }

    /// The hooks applicable to `context`, in execution order.
    #[must_use]
    pub fn callbacks_for(&self, agent: &str, context: &HookContext) -> Vec<HookDefinition> {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut chain = ordered_matches(&inner.defaults, context);
        if let Some(agent_hooks) = inner.by_agent.get(agent) {
            chain.extend(ordered_matches(agent_hooks, context));
        }
        chain
    }

    /// Whether any hook is registered for the event (cheap pre-check).
    #[must_use]
    pub fn has_hooks_for(&self, agent: &str, event: HookEvent) -> bool {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.defaults.iter().any(|h| h.event == event)
            || inner
                .by_agent
                .get(agent)
                .is_some_and(|hooks| hooks.iter().any(|h| h.event == event))
    }
}

/// Filter to applicable hooks and sort priority-descending (stable sort keeps
/// registration order on ties).
fn ordered_matches(hooks: &[HookDefinition], context: &HookContext) -> Vec<HookDefinition> {
    let mut matched: Vec<HookDefinition> = hooks
        .iter()
        .filter(|h| h.applies_to(context))
        .cloned()
        .collect();
    matched.sort_by_key(|h| std::cmp::Reverse(h.priority));
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::HookOutcome;
    use std::sync::Arc;

    fn native(event: HookEvent, priority: i32) -> HookDefinition {
        HookDefinition::native(
            event,
            Arc::new(|_: &HookContext| HookOutcome::Continue),
        )
        .with_priority(priority)
    }

    #[test]
    fn test_defaults_run_before_agent_hooks() {
        let registry = HookRegistry::new();
        registry.add_agent_hook("backend", native(HookEvent::UserPrompt, 100));
        registry.add_default(native(HookEvent::UserPrompt, 0));

        let ctx = HookContext::new(HookEvent::UserPrompt, "backend", "s");
        let chain = registry.callbacks_for("backend", &ctx);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].source, HookSource::Default);
        assert_eq!(chain[1].source, HookSource::Agent);
    }

    #[test]
    fn test_priority_descending_with_stable_ties() {
        let registry = HookRegistry::new();
        registry.add_agent_hook("a", native(HookEvent::AgentStep, 1).with_matcher("first"));
        registry.add_agent_hook("a", native(HookEvent::AgentStep, 5));
        registry.add_agent_hook("a", native(HookEvent::AgentStep, 1).with_matcher("second"));

        let ctx = HookContext::new(HookEvent::AgentStep, "a", "s");
        let chain = registry.callbacks_for("a", &ctx);
        assert_eq!(chain[0].priority, 5);
        // Ties keep registration order: matcher "first" before "second".
        assert!(matches!(
            chain[1].matcher,
            Some(crate::definition::HookMatcher::Exact(ref m)) if m == "first"
        ));
    }

    #[test]
    fn test_agent_isolation() {
        let registry = HookRegistry::new();
        registry.add_agent_hook("a", native(HookEvent::UserPrompt, 0));

        let ctx = HookContext::new(HookEvent::UserPrompt, "b", "s");
        assert!(registry.callbacks_for("b", &ctx).is_empty());
        assert!(registry.has_hooks_for("a", HookEvent::UserPrompt));
        assert!(!registry.has_hooks_for("b", HookEvent::UserPrompt));
    }

    #[test]
    fn test_tool_matcher_filters_chain() {
        let registry = HookRegistry::new();
        registry.add_agent_hook(
            "a",
            HookDefinition::shell(HookEvent::PreToolUse, "true").with_matcher("Bash"),
        );

        let bash = HookContext::new(HookEvent::PreToolUse, "a", "s").with_tool_call(
            crate::context::ToolCallInfo {
                id: "1".into(),
                name: "Bash".into(),
                arguments: serde_json::json!({}),
            },
        );
        let write = HookContext::new(HookEvent::PreToolUse, "a", "s").with_tool_call(
            crate::context::ToolCallInfo {
                id: "2".into(),
                name: "Write".into(),
                arguments: serde_json::json!({}),
            },
        );

        assert_eq!(registry.callbacks_for("a", &bash).len(), 1);
        assert!(registry.callbacks_for("a", &write).is_empty());
    }
}
