//! Hook definitions: native callables and shell commands.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::context::HookContext;
use crate::event::HookEvent;
use crate::outcome::HookOutcome;
use crate::shell::DEFAULT_SHELL_HOOK_TIMEOUT;

/// A native hook callable.
#[async_trait]
pub trait NativeHook: Send + Sync {
    /// Run the hook against the context.
    async fn run(&self, context: &HookContext) -> HookOutcome;
}

/// Blanket adapter so plain closures can be registered as hooks.
#[async_trait]
impl<F> NativeHook for F
where
    F: Fn(&HookContext) -> HookOutcome + Send + Sync,
{
    async fn run(&self, context: &HookContext) -> HookOutcome {
        self(context)
    }
}

/// Handler implementation for a hook.
#[derive(Clone)]
pub enum HookHandler {
    /// In-process callable.
    Native(Arc<dyn NativeHook>),
    /// Shell command run through the [`ShellExecutor`](crate::ShellExecutor)
    /// collaborator with the context JSON on stdin.
    Shell {
        /// The command line (run through `sh -c`).
        command: String,
        /// Kill the command after this long.
        timeout: Duration,
    },
}

impl std::fmt::Debug for HookHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native(_) => f.write_str("Native(..)"),
            Self::Shell { command, timeout } => f
                .debug_struct("Shell")
                .field("command", command)
                .field("timeout", timeout)
                .finish(),
        }
    }
}

/// Scope a hook was registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookSource {
    /// Swarm-wide default; runs before agent hooks for the same event.
    Default,
    /// Registered for one agent.
    Agent,
}

/// Matcher restricting `*_tool_use` hooks by tool name.
#[derive(Debug, Clone)]
pub enum HookMatcher {
    /// Exact tool-name match.
    Exact(String),
    /// Regex over the tool name.
    Pattern(Regex),
}

impl HookMatcher {
    /// Parse a matcher string: treated as a regex when it compiles and
    /// contains regex metacharacters, exact otherwise.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let has_meta = raw.chars().any(|c| "^$.*+?()[]{}|\\".contains(c));
        if has_meta {
            if let Ok(re) = Regex::new(raw) {
                return Self::Pattern(re);
            }
        }
        Self::Exact(raw.to_string())
    }

    /// Whether the matcher accepts a tool name.
    #[must_use]
    pub fn matches(&self, tool_name: &str) -> bool {
        match self {
            Self::Exact(name) => name == tool_name,
            Self::Pattern(re) => re.is_match(tool_name),
        }
    }
}

/// A registered hook.
#[derive(Debug, Clone)]
pub struct HookDefinition {
    /// Event that triggers this hook.
    pub event: HookEvent,
    /// Optional tool-name matcher (only consulted for tool events).
    pub matcher: Option<HookMatcher>,
    /// Higher priority runs earlier within the hook's scope.
    pub priority: i32,
    /// Scope: swarm-wide default or agent-scoped.
    pub source: HookSource,
    /// The handler.
    pub handler: HookHandler,
}

impl HookDefinition {
    /// Create a native hook with default priority 0.
    #[must_use]
    pub fn native(event: HookEvent, hook: Arc<dyn NativeHook>) -> Self {
        Self {
            event,
            matcher: None,
            priority: 0,
            source: HookSource::Agent,
            handler: HookHandler::Native(hook),
        }
    }

    /// Create a shell hook with the default 60s timeout.
    #[must_use]
    pub fn shell(event: HookEvent, command: impl Into<String>) -> Self {
        Self {
            event,
            matcher: None,
            priority: 0,
            source: HookSource::Agent,
            handler: HookHandler::Shell {
                command: command.into(),
                timeout: DEFAULT_SHELL_HOOK_TIMEOUT,
            },
        }
    }

    /// Restrict by tool name.
    #[must_use]
    pub fn with_matcher(mut self, raw: &str) -> Self {
        self.matcher = Some(HookMatcher::parse(raw));
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Mark as a swarm-wide default hook.
    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.source = HookSource::Default;
        self
    }

    /// Set the shell timeout. No effect on native handlers.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let HookHandler::Shell { timeout: t, .. } = &mut self.handler {
            *t = timeout;
        }
        self
    }

    /// Whether this hook applies to the given context.
    #[must_use]
    pub fn applies_to(&self, context: &HookContext) -> bool {
        if self.event != context.event {
            return false;
        }
        if !self.event.is_tool_event() {
            return true;
        }
        match (&self.matcher, context.tool_name()) {
            (None, _) => true,
            (Some(matcher), Some(tool)) => matcher.matches(tool),
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matcher_exact_vs_regex() {
        let exact = HookMatcher::parse("Bash");
        assert!(exact.matches("Bash"));
        assert!(!exact.matches("BashX"));

        let pattern = HookMatcher::parse("^Work.*");
        assert!(pattern.matches("WorkWithBackend"));
        assert!(!pattern.matches("Bash"));
    }

    #[test]
    fn test_applies_to_respects_matcher_on_tool_events() {
        let hook = HookDefinition::shell(HookEvent::PreToolUse, "true").with_matcher("Bash");

        let bash_ctx = HookContext::new(HookEvent::PreToolUse, "a", "s").with_tool_call(
            crate::context::ToolCallInfo {
                id: "1".into(),
                name: "Bash".into(),
                arguments: serde_json::json!({}),
            },
        );
        let write_ctx = HookContext::new(HookEvent::PreToolUse, "a", "s").with_tool_call(
            crate::context::ToolCallInfo {
                id: "2".into(),
                name: "Write".into(),
                arguments: serde_json::json!({}),
            },
        );

        assert!(hook.applies_to(&bash_ctx));
        assert!(!hook.applies_to(&write_ctx));
    }

    #[test]
    fn test_matcher_ignored_for_non_tool_events() {
        let hook = HookDefinition::shell(HookEvent::UserPrompt, "true").with_matcher("Bash");
        let ctx = HookContext::new(HookEvent::UserPrompt, "a", "s");
        assert!(hook.applies_to(&ctx));
    }

    #[tokio::test]
    async fn test_closure_as_native_hook() {
        let hook: Arc<dyn NativeHook> =
            Arc::new(|_ctx: &HookContext| HookOutcome::Halt("no".into()));
        let ctx = HookContext::new(HookEvent::PreToolUse, "a", "s");
        assert_eq!(hook.run(&ctx).await, HookOutcome::Halt("no".into()));
    }
}
