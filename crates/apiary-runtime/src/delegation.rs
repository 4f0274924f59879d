//! Cross-agent delegation.
//!
//! A delegation edge becomes a tool on the delegator (`WorkWith<Name>` unless
//! renamed). The chat loop dispatches those tools through a
//! [`DelegationBinding`] rather than the registry, so the `pre_tool_use`/
//! `post_tool_use` pair never fires for them; delegation has its own
//! `pre_delegation`/`post_delegation` events. Isolated targets are created
//! lazily, once, per `"<delegate>@<delegator>"` pair.

use std::sync::{Arc, Weak};
use std::time::Instant;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use apiary_events::LogEntry;
use apiary_hooks::{HookContext, HookEvent, HookExecutor};
use apiary_tools::{Tool, ToolError, ToolInvocation, ToolResult};

use crate::chat::{AgentChat, AskOutcome};
use crate::env::ExecutionEnv;
use crate::error::{RuntimeError, RuntimeResult};
use crate::swarm::SwarmCore;

/// Derive the automatic delegation tool name: `WorkWith<PascalCase>`.
#[must_use]
pub fn delegation_tool_name(delegate: &str) -> String {
    let pascal: String = delegate
        .split(|c: char| c == '-' || c == '_' || c == ' ')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect();
    format!("WorkWith{pascal}")
}

/// The registry-visible face of a delegation edge: carries the schema and
/// description the LLM sees. Invocation is intercepted by the chat loop.
pub struct DelegateTool {
    tool_name: String,
    delegate: String,
    delegate_description: String,
}

impl DelegateTool {
    /// Create the tool face for an edge.
    #[must_use]
    pub fn new(
        tool_name: impl Into<String>,
        delegate: impl Into<String>,
        delegate_description: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            delegate: delegate.into(),
            delegate_description: delegate_description.into(),
        }
    }
}

#[async_trait]
impl Tool for DelegateTool {
    fn name(&self) -> String {
        self.tool_name.clone()
    }

    fn description(&self) -> String {
        format!(
            "Delegate a task to the {} agent. {}",
            self.delegate, self.delegate_description
        )
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_description": {
                    "type": "string",
                    "description": "The task for the delegate, with everything it needs to know"
                },
                "context_hints": {
                    "type": "string",
                    "description": "Optional background that helps the delegate"
                }
            },
            "required": ["task_description"]
        })
    }

    async fn call(&self, _args: Value, _invocation: &ToolInvocation) -> ToolResult {
        // The chat loop routes delegation tools through their binding before
        // consulting the registry; reaching this body is a wiring bug.
        Err(ToolError::ExecutionFailed(format!(
            "delegation tool {:?} must be dispatched by the agent loop",
            self.tool_name
        )))
    }
}

/// Where a delegation edge points.
pub(crate) enum DelegationTarget {
    /// The delegate's primary chat (shared across delegators).
    SharedAgent(String),
    /// A lazily created isolated instance for this delegator.
    Lazy(Arc<LazyDelegateChat>),
    /// A registered external swarm.
    ExternalSwarm(String),
}

/// Result of invoking a delegation tool.
pub(crate) struct DelegationOutcome {
    pub content: String,
    pub finish_swarm: Option<String>,
    pub fatal: Option<RuntimeError>,
}

impl DelegationOutcome {
    fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_swarm: None,
            fatal: None,
        }
    }

    fn fatal(error: RuntimeError) -> Self {
        Self {
            content: String::new(),
            finish_swarm: None,
            fatal: Some(error),
        }
    }
}

/// One wired delegation edge on a delegator's chat.
pub struct DelegationBinding {
    /// Delegating agent.
    pub from: String,
    /// Delegate (agent or external swarm) name.
    pub to: String,
    /// The tool name the LLM calls.
    pub tool_name: String,
    /// Keep the delegate's conversation across calls.
    pub preserve_context: bool,
    pub(crate) target: DelegationTarget,
    pub(crate) core: Weak<SwarmCore>,
}

impl DelegationBinding {
    pub(crate) async fn invoke(
        &self,
        args: &Value,
        env: &ExecutionEnv,
        hooks: &HookExecutor,
    ) -> DelegationOutcome {
        let Some(task) = args.get("task_description").and_then(Value::as_str) else {
            return DelegationOutcome::text("delegation error: task_description is required");
        };
        let prompt = match args.get("context_hints").and_then(Value::as_str) {
            Some(hints) if !hints.trim().is_empty() => {
                format!("{task}\n\nContext:\n{hints}")
            }
            _ => task.to_string(),
        };

        let swarm_id = env.stream.context().swarm_id.to_string();
        env.stream.emit(
            LogEntry::new("pre_delegation")
                .with_agent(self.from.clone())
                .with_field("from", self.from.clone())
                .with_field("to", self.to.clone())
                .with_field("prompt", prompt.clone())
                .with_field("preserve_context", self.preserve_context),
        );
        let pre_ctx = HookContext::new(HookEvent::PreDelegation, self.from.clone(), swarm_id.clone())
            .with_prompt(prompt.clone())
            .with_metadata("to", self.to.clone());
        hooks.execute_safe(&self.from, &pre_ctx, &env.stream).await;

        // Cycle guard: refuse before issuing any LLM call.
        if let Err(error) = env.push_delegation(&self.to).await {
            warn!(from = %self.from, to = %self.to, "Circular delegation blocked");
            env.stream.emit(
                LogEntry::new("delegation_error")
                    .with_agent(self.from.clone())
                    .with_field("from", self.from.clone())
                    .with_field("to", self.to.clone())
                    .with_field("error", error.to_string()),
            );
            return DelegationOutcome::text(format!("delegation error: {error}"));
        }

        let started = Instant::now();
        let outcome = self.run_target(&prompt, env).await;
        env.pop_delegation(&self.to).await;

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        env.stream.emit(
            LogEntry::new("post_delegation")
                .with_agent(self.from.clone())
                .with_field("from", self.from.clone())
                .with_field("to", self.to.clone())
                .with_field("duration_ms", duration_ms)
                .with_field("error", outcome.fatal.is_some()),
        );
        let post_ctx =
            HookContext::new(HookEvent::PostDelegation, self.from.clone(), swarm_id.clone())
            .with_metadata("to", self.to.clone())
            .with_metadata("duration_ms", duration_ms);
        hooks.execute_safe(&self.from, &post_ctx, &env.stream).await;

        outcome
    }

    async fn run_target(&self, prompt: &str, env: &ExecutionEnv) -> DelegationOutcome {
        let Some(core) = self.core.upgrade() else {
            return DelegationOutcome::text("delegation error: swarm is shutting down");
        };

        match &self.target {
            DelegationTarget::SharedAgent(name) => {
                let chat = core.agents.read().await.get(name).cloned();
                match chat {
                    Some(chat) => self.ask_chat(&chat, prompt, env).await,
                    None => DelegationOutcome::text(format!(
                        "delegation error: agent {name:?} is not initialized"
                    )),
                }
            }
            DelegationTarget::Lazy(lazy) => match lazy.get_or_init(env).await {
                Ok(chat) => self.ask_chat(&chat, prompt, env).await,
                Err(error) => {
                    env.stream.emit(
                        LogEntry::new("delegation_error")
                            .with_agent(self.from.clone())
                            .with_field("from", self.from.clone())
                            .with_field("to", self.to.clone())
                            .with_field("error", error.to_string()),
                    );
                    DelegationOutcome::text(format!("delegation error: {error}"))
                }
            },
            DelegationTarget::ExternalSwarm(name) => {
                let swarm = core.external_swarm(name);
                match swarm {
                    Some(swarm) => {
                        let fut: BoxFuture<'_, crate::swarm::ExecutionResult> =
                            Box::pin(swarm.execute_nested(prompt, env.stream.context()));
                        let result = fut.await;
                        match (result.content, result.error) {
                            (Some(content), None) => DelegationOutcome::text(content),
                            (_, Some(error)) => {
                                DelegationOutcome::text(format!("delegation error: {error}"))
                            }
                            (None, None) => DelegationOutcome::text(String::new()),
                        }
                    }
                    None => DelegationOutcome::text(format!(
                        "delegation error: swarm {name:?} is not registered"
                    )),
                }
            }
        }
    }

    async fn ask_chat(
        &self,
        chat: &Arc<AgentChat>,
        prompt: &str,
        env: &ExecutionEnv,
    ) -> DelegationOutcome {
        if !self.preserve_context {
            chat.reset_to_baseline().await;
        }

        debug!(from = %self.from, to = %self.to, "Entering delegate chat");
        let fut: BoxFuture<'_, RuntimeResult<AskOutcome>> = Box::pin(chat.ask(prompt, env));
        match fut.await {
            Ok(AskOutcome::Completed(content)) => DelegationOutcome::text(content),
            Ok(AskOutcome::FinishSwarm(message)) => DelegationOutcome {
                content: message.clone(),
                finish_swarm: Some(message),
                fatal: None,
            },
            Err(error @ (RuntimeError::Llm(_) | RuntimeError::Cancelled)) => {
                DelegationOutcome::fatal(error)
            }
            Err(error) => DelegationOutcome::text(format!("delegation error: {error}")),
        }
    }
}

/// A lazily created isolated delegate chat, keyed `"<delegate>@<delegator>"`.
///
/// First use performs chat creation, context setup, hook and tool wiring, and
/// nested delegation wiring exactly once; concurrent first calls serialize on
/// the cell. Later calls reuse the inner chat, so the instance keeps its own
/// history across multiple calls from the same delegator.
pub struct LazyDelegateChat {
    delegate: String,
    delegator: String,
    core: Weak<SwarmCore>,
    cell: OnceCell<Arc<AgentChat>>,
}

impl LazyDelegateChat {
    pub(crate) fn new(
        delegate: impl Into<String>,
        delegator: impl Into<String>,
        core: Weak<SwarmCore>,
    ) -> Self {
        Self {
            delegate: delegate.into(),
            delegator: delegator.into(),
            core,
            cell: OnceCell::new(),
        }
    }

    /// The `"<delegate>@<delegator>"` key.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}@{}", self.delegate, self.delegator)
    }

    /// Whether the inner chat has been created.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// The inner chat, if already created.
    #[must_use]
    pub fn chat(&self) -> Option<Arc<AgentChat>> {
        self.cell.get().cloned()
    }

    /// Get the inner chat, creating it on first use.
    ///
    /// # Errors
    ///
    /// Propagates initialization failures; the cell stays empty so a later
    /// call can retry.
    pub(crate) async fn get_or_init(&self, env: &ExecutionEnv) -> RuntimeResult<Arc<AgentChat>> {
        self.cell
            .get_or_try_init(|| async {
                let core = self
                    .core
                    .upgrade()
                    .ok_or_else(|| RuntimeError::AgentInitialization {
                        agent: self.delegate.clone(),
                        reason: "swarm is shutting down".to_string(),
                    })?;
                debug!(key = %self.key(), "Initializing delegation instance");
                core.create_instance_chat(&self.delegate, &self.delegator, env)
                    .await
            })
            .await
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delegation_tool_name_casing() {
        assert_eq!(delegation_tool_name("backend"), "WorkWithBackend");
        assert_eq!(delegation_tool_name("data-writer"), "WorkWithDataWriter");
        assert_eq!(delegation_tool_name("doc_team"), "WorkWithDocTeam");
    }

    #[test]
    fn test_delegate_tool_schema_requires_task() {
        let tool = DelegateTool::new("WorkWithBackend", "backend", "Builds APIs");
        let schema = tool.input_schema();
        assert_eq!(schema["required"][0], "task_description");
        assert!(tool.description().contains("backend"));
        assert!(tool.description().contains("Builds APIs"));
    }

    #[tokio::test]
    async fn test_delegate_tool_direct_call_is_wiring_error() {
        let tool = DelegateTool::new("WorkWithBackend", "backend", "d");
        let inv = ToolInvocation::new("/tmp");
        assert!(tool.call(serde_json::json!({}), &inv).await.is_err());
    }
}
