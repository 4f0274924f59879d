//! Per-agent conversation state machine.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, Weak};

use apiary_config::{AgentDefinition, ToolPermissions, ToolSpec};
use apiary_events::LogEntry;
use apiary_hooks::{HookContext, HookEvent, HookExecutor, HookOutcome, ToolCallInfo};
use apiary_llm::{
    ChatProvider, ChatRequest, Message, MessageRole, ModelRegistry, TokenUsage, ToolCall,
    ToolDefinition, DEFAULT_CONTEXT_WINDOW,
};
use apiary_tools::{
    BashTool, EditTool, PermissionEnvelope, ReadTool, TodoWriteTool, Tool, ToolError,
    ToolInvocation, ToolRegistry, ToolSource, WriteTool,
};
use futures::future::BoxFuture;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::context::AgentContext;
use crate::delegation::DelegationBinding;
use crate::env::ExecutionEnv;
use crate::error::{RuntimeError, RuntimeResult};
use crate::swarm::SwarmCore;

/// Result of one `ask` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskOutcome {
    /// The agent produced a final answer.
    Completed(String),
    /// A hook requested the whole swarm finish with this message.
    FinishSwarm(String),
}

impl AskOutcome {
    /// The message either way.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Completed(s) | Self::FinishSwarm(s) => s,
        }
    }
}

/// Token accounting snapshot for one chat.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatUsage {
    /// Input tokens of the most recent assistant message.
    pub input_tokens: u64,
    /// Output tokens accumulated across the conversation.
    pub output_tokens: u64,
    /// Cached tokens of the most recent assistant message.
    pub cached_tokens: u64,
    /// Cache-creation tokens accumulated across the conversation.
    pub cache_creation_tokens: u64,
    /// Estimated cost in USD (zero when pricing is unknown).
    pub cost: f64,
}

impl ChatUsage {
    /// Input minus cached tokens.
    #[must_use]
    pub fn effective_input_tokens(&self) -> u64 {
        self.input_tokens.saturating_sub(self.cached_tokens)
    }

    /// Input plus output tokens.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

pub(crate) struct ChatState {
    pub messages: Vec<Message>,
    pub last_todowrite_index: Option<usize>,
    pub cumulative_output_tokens: u64,
    pub cumulative_cache_creation_tokens: u64,
    pub last_usage: TokenUsage,
    pub total_cost: f64,
}

enum Terminator {
    FinishAgent(String),
    FinishSwarm(String),
}

struct ToolDispatch {
    call_id: String,
    content: String,
    terminator: Option<Terminator>,
    fatal: Option<RuntimeError>,
}

/// A live conversation for one agent instance.
///
/// The message history and accounting sit behind a single async lock that is
/// held for the whole of `ask` — including the LLM call and the subsequent
/// tool expansion — so a shared delegate driven by two delegators is strictly
/// serialized.
pub struct AgentChat {
    pub(crate) definition: Arc<AgentDefinition>,
    provider: Arc<dyn ChatProvider>,
    models: Arc<dyn ModelRegistry>,
    pub(crate) registry: Arc<ToolRegistry>,
    invocation: ToolInvocation,
    hooks: HookExecutor,
    pub(crate) agent_context: OnceLock<Arc<AgentContext>>,
    pub(crate) delegations: RwLock<HashMap<String, Arc<DelegationBinding>>>,
    active_tools: RwLock<Vec<ToolDefinition>>,
    state: Mutex<ChatState>,
    pub(crate) core: Weak<SwarmCore>,
}

impl std::fmt::Debug for AgentChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentChat")
            .field("agent", &self.definition.name)
            .finish_non_exhaustive()
    }
}

impl AgentChat {
    /// Construct a chat for a definition: system prompt, built-in tools per
    /// the tool list, permission envelopes resolved against the directory.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::AgentInitialization`] when a tool spec is
    /// unknown or its permission globs fail to compile.
    pub(crate) fn new(
        definition: Arc<AgentDefinition>,
        provider: Arc<dyn ChatProvider>,
        models: Arc<dyn ModelRegistry>,
        hooks: HookExecutor,
        core: Weak<SwarmCore>,
    ) -> RuntimeResult<Self> {
        let registry = Arc::new(ToolRegistry::new());
        let invocation = ToolInvocation::new(&definition.directory);

        register_builtin_tools(&definition, &registry)?;

        let mut messages = Vec::new();
        let prompt = system_prompt_for(&definition);
        if !prompt.is_empty() {
            messages.push(Message::system(prompt));
        }

        Ok(Self {
            definition,
            provider,
            models,
            registry,
            invocation,
            hooks,
            agent_context: OnceLock::new(),
            delegations: RwLock::new(HashMap::new()),
            active_tools: RwLock::new(Vec::new()),
            state: Mutex::new(ChatState {
                messages,
                last_todowrite_index: None,
                cumulative_output_tokens: 0,
                cumulative_cache_creation_tokens: 0,
                last_usage: TokenUsage::default(),
                total_cost: 0.0,
            }),
            core,
        })
    }

    /// The agent definition.
    #[must_use]
    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    /// The label used in events: the instance key for delegation instances.
    #[must_use]
    pub fn label(&self) -> String {
        self.agent_context
            .get()
            .map_or_else(|| self.definition.name.clone(), |c| c.label().to_string())
    }

    /// Attach the agent context (initializer pass 3 / lazy init).
    pub(crate) fn attach_context(&self, context: Arc<AgentContext>) {
        let _ = self.agent_context.set(context);
    }

    /// Record a delegation binding (initializer pass 2 / nested wiring).
    pub(crate) fn add_delegation(&self, binding: Arc<DelegationBinding>) {
        self.delegations
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(binding.tool_name.clone(), binding);
    }

    /// Copy the registry into the LLM-facing tool list (initializer pass 6).
    /// Late-registered tools become visible at the next activation.
    pub(crate) fn activate_tools(&self) {
        let definitions = self.registry.definitions();
        *self
            .active_tools
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = definitions;
    }

    /// The context-window limit: explicit override, then model registry, then
    /// a conservative default.
    #[must_use]
    pub fn context_limit(&self) -> u64 {
        self.definition.context_window.unwrap_or_else(|| {
            self.models
                .find(&self.definition.model)
                .map_or(DEFAULT_CONTEXT_WINDOW, |info| info.context_window)
        })
    }

    /// Token accounting snapshot.
    pub async fn usage(&self) -> ChatUsage {
        let state = self.state.lock().await;
        ChatUsage {
            input_tokens: state.last_usage.input_tokens,
            output_tokens: state.cumulative_output_tokens,
            cached_tokens: state.last_usage.cached_tokens,
            cache_creation_tokens: state.cumulative_cache_creation_tokens,
            cost: state.total_cost,
        }
    }

    /// A copy of the message history (reminders are never in it).
    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.messages.clone()
    }

    /// Number of user turns in the history.
    pub async fn user_turn_count(&self) -> usize {
        self.state
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .count()
    }

    /// Clear the conversation back to its system-prompt baseline.
    pub async fn reset_to_baseline(&self) {
        let mut state = self.state.lock().await;
        state
            .messages
            .retain(|m| m.role == MessageRole::System);
        state.last_todowrite_index = None;
    }

    /// Run one turn of the conversation.
    ///
    /// # Errors
    ///
    /// Returns LLM failures, cancellation, and fatal delegation errors.
    /// Tool failures are not errors; they are surfaced to the LLM as error
    /// tool results.
    // Returned as an explicitly boxed future (rather than `async fn`) so the
    // opaque return type doesn't recurse through the delegation call graph,
    // which can call back into this method via tool dispatch.
    #[allow(clippy::too_many_lines)]
    pub fn ask<'a>(&'a self, prompt: &'a str, env: &'a ExecutionEnv) -> BoxFuture<'a, RuntimeResult<AskOutcome>> {
        Box::pin(self.ask_inner(prompt, env))
    }

    async fn ask_inner(&self, prompt: &str, env: &ExecutionEnv) -> RuntimeResult<AskOutcome> {
        let mut state = self.state.lock().await;
        let label = self.label();

        let is_first = !state
            .messages
            .iter()
            .any(|m| m.role == MessageRole::User);

        if is_first {
            env.stream
                .emit(LogEntry::new("first_message").with_agent(label.clone()));
            let ctx = self.hook_context(HookEvent::FirstMessage, env).with_prompt(prompt);
            self.hooks
                .execute_safe(&self.definition.name, &ctx, &env.stream)
                .await;
        }

        // user_prompt hooks may halt, replace, or finish.
        let mut prompt = prompt.to_string();
        {
            let ctx = self
                .hook_context(HookEvent::UserPrompt, env)
                .with_prompt(prompt.clone());
            match self
                .hooks
                .execute_safe(&self.definition.name, &ctx, &env.stream)
                .await
            {
                HookOutcome::Halt(message) => {
                    env.stream.emit(
                        LogEntry::new("agent_stop")
                            .with_agent(label.clone())
                            .with_field("halted", true)
                            .with_field("reason", message.clone()),
                    );
                    self.fire_agent_stop_hooks(env).await;
                    return Ok(AskOutcome::Completed(message));
                }
                HookOutcome::Replace(value) => {
                    let injected = value_to_text(&value);
                    prompt = format!("{prompt}\n\n<hook-context>{injected}</hook-context>");
                }
                HookOutcome::FinishAgent(message) => {
                    self.emit_agent_stop(env, &label).await;
                    return Ok(AskOutcome::Completed(message));
                }
                HookOutcome::FinishSwarm(message) => {
                    self.emit_agent_stop(env, &label).await;
                    return Ok(AskOutcome::FinishSwarm(message));
                }
                HookOutcome::Continue | HookOutcome::Reprompt(_) => {}
            }
        }

        // Ephemeral reminders for this turn; embedded into the request only,
        // never stored in history.
        let mut reminders = self.collect_reminders(&state, is_first, &prompt).await;
        state.messages.push(Message::user(prompt.clone()));

        let outcome = loop {
            if env.is_cancelled() {
                return Err(RuntimeError::Cancelled);
            }

            let request = self.build_request(&state, &reminders);
            reminders.clear();

            env.stream.emit(
                LogEntry::new("llm_api_request")
                    .with_agent(label.clone())
                    .with_field("model", self.definition.model.clone())
                    .with_field("message_count", request.messages.len()),
            );

            let response = self.call_provider(&request, env).await?;
            let usage = response.usage;
            let cost = self
                .models
                .find(&self.definition.model)
                .map_or(0.0, |info| info.cost(usage.input_tokens, usage.output_tokens));

            state.cumulative_output_tokens = state
                .cumulative_output_tokens
                .saturating_add(usage.output_tokens);
            state.cumulative_cache_creation_tokens = state
                .cumulative_cache_creation_tokens
                .saturating_add(usage.cache_creation_tokens);
            state.last_usage = usage;
            state.total_cost += cost;

            env.stream.emit(
                LogEntry::new("llm_api_response")
                    .with_agent(label.clone())
                    .with_field("model", self.definition.model.clone())
                    .with_field("input_tokens", usage.input_tokens)
                    .with_field("output_tokens", usage.output_tokens)
                    .with_field("cost", cost),
            );

            let assistant = response
                .message
                .with_model(self.definition.model.clone())
                .with_usage(usage);
            let tool_calls = assistant.tool_calls.clone();
            let content = assistant.content.clone();
            state.messages.push(assistant);

            env.stream
                .emit(LogEntry::new("agent_step").with_agent(label.clone()));
            let step_ctx = self.hook_context(HookEvent::AgentStep, env);
            match self
                .hooks
                .execute_safe(&self.definition.name, &step_ctx, &env.stream)
                .await
            {
                HookOutcome::FinishAgent(message) => break AskOutcome::Completed(message),
                HookOutcome::FinishSwarm(message) => break AskOutcome::FinishSwarm(message),
                _ => {}
            }

            if tool_calls.is_empty() {
                break AskOutcome::Completed(content);
            }

            // Dispatch with bounded parallelism; `buffered` preserves request
            // order regardless of completion order.
            let concurrency = self.definition.max_concurrent_tools.max(1);
            let mut dispatch_futs: Vec<BoxFuture<'_, ToolDispatch>> =
                Vec::with_capacity(tool_calls.len());
            for call in &tool_calls {
                dispatch_futs.push(self.dispatch(call, env));
            }
            let dispatches: Vec<ToolDispatch> = futures::stream::iter(dispatch_futs)
                .buffered(concurrency)
                .collect()
                .await;

            let used_todowrite = tool_calls.iter().any(|c| c.name == "TodoWrite");
            let mut terminator = None;
            let mut fatal = None;
            for dispatch in dispatches {
                state
                    .messages
                    .push(Message::tool_result(dispatch.call_id, dispatch.content));
                if terminator.is_none() {
                    terminator = dispatch.terminator;
                }
                if fatal.is_none() {
                    fatal = dispatch.fatal;
                }
            }
            if used_todowrite {
                state.last_todowrite_index = Some(state.messages.len());
            }
            if let Some(error) = fatal {
                return Err(error);
            }
            match terminator {
                Some(Terminator::FinishAgent(message)) => break AskOutcome::Completed(message),
                Some(Terminator::FinishSwarm(message)) => break AskOutcome::FinishSwarm(message),
                None => {}
            }
        };

        self.check_context_thresholds(&state, env, &label).await;
        self.emit_agent_stop(env, &label).await;
        Ok(outcome)
    }

    async fn emit_agent_stop(&self, env: &ExecutionEnv, label: &str) {
        env.stream
            .emit(LogEntry::new("agent_stop").with_agent(label.to_string()));
        self.fire_agent_stop_hooks(env).await;
    }

    async fn fire_agent_stop_hooks(&self, env: &ExecutionEnv) {
        let ctx = self.hook_context(HookEvent::AgentStop, env);
        self.hooks
            .execute_safe(&self.definition.name, &ctx, &env.stream)
            .await;
    }

    async fn call_provider(
        &self,
        request: &ChatRequest,
        env: &ExecutionEnv,
    ) -> RuntimeResult<apiary_llm::ChatResponse> {
        // Bounds concurrent LLM calls across the whole swarm.
        let permit = env
            .llm_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RuntimeError::Cancelled)?;

        let call = self.provider.chat(request);
        let result = if let Some(limit) = self.definition.timeout {
            tokio::select! {
                () = env.cancel.cancelled() => Err(RuntimeError::Cancelled),
                outcome = tokio::time::timeout(limit, call) => match outcome {
                    Ok(inner) => inner.map_err(RuntimeError::from),
                    Err(_) => Err(RuntimeError::Llm(apiary_llm::LlmError::Timeout { limit })),
                },
            }
        } else {
            tokio::select! {
                () = env.cancel.cancelled() => Err(RuntimeError::Cancelled),
                inner = call => inner.map_err(RuntimeError::from),
            }
        };
        drop(permit);
        result
    }

    fn build_request(&self, state: &ChatState, reminders: &[String]) -> ChatRequest {
        let mut messages = state.messages.clone();
        if !reminders.is_empty() {
            if let Some(last_user) = messages
                .iter_mut()
                .rev()
                .find(|m| m.role == MessageRole::User)
            {
                for reminder in reminders {
                    last_user.content.push_str("\n\n<system-reminder>\n");
                    last_user.content.push_str(reminder);
                    last_user.content.push_str("\n</system-reminder>");
                }
            }
        }

        let tools = self
            .active_tools
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        let mut request = ChatRequest::new(self.definition.model.clone(), messages)
            .with_tools(tools)
            .with_params(self.definition.parameters.clone())
            .with_headers(self.definition.headers.clone());
        if let Some(timeout) = self.definition.timeout {
            request = request.with_timeout(timeout);
        }
        request
    }

    async fn collect_reminders(
        &self,
        state: &ChatState,
        is_first: bool,
        prompt: &str,
    ) -> Vec<String> {
        let mut reminders = Vec::new();
        let has_todowrite = self.registry.get("TodoWrite").is_some();

        if is_first {
            let names = self.registry.names();
            if !names.is_empty() {
                reminders.push(format!(
                    "You have access to the following tools: {}.",
                    names.join(", ")
                ));
            }
            if has_todowrite {
                reminders.push(
                    "Your todo list is empty. For multi-step work, record a plan with \
                     TodoWrite and keep it current as you progress."
                        .to_string(),
                );
            }
        } else if has_todowrite {
            let interval = self.definition.todowrite_reminder_interval.max(1);
            let index_now = state.messages.len();
            let stale = match state.last_todowrite_index {
                None => index_now >= interval,
                Some(last) => index_now.saturating_sub(last) >= interval,
            };
            if stale {
                reminders.push(
                    "The todo list has not been updated recently. If the plan changed, \
                     update it with TodoWrite."
                        .to_string(),
                );
            }
        }

        if let Some(core) = self.core.upgrade() {
            reminders.extend(
                core.plugins
                    .reminders_for(&self.definition.name, prompt)
                    .await,
            );
        }

        reminders
    }

    // Returned as an explicitly boxed future (rather than `async fn`) so the
    // opaque return type doesn't recurse through the delegation call graph,
    // which can call back into `ask`/`dispatch` via delegation bindings.
    fn dispatch<'s, 'c>(
        &'s self,
        call: &'c ToolCall,
        env: &'s ExecutionEnv,
    ) -> BoxFuture<'c, ToolDispatch>
    where
        's: 'c,
    {
        Box::pin(self.dispatch_inner(call, env))
    }

    async fn dispatch_inner(&self, call: &ToolCall, env: &ExecutionEnv) -> ToolDispatch {
        let binding = self
            .delegations
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&call.name)
            .cloned();

        // Delegation tools bypass the tool-use hook pair; they have their own
        // pre_delegation/post_delegation events.
        if let Some(binding) = binding {
            let outcome = binding.invoke(&call.arguments, env, &self.hooks).await;
            return ToolDispatch {
                call_id: call.id.clone(),
                content: outcome.content,
                terminator: outcome
                    .finish_swarm
                    .map(Terminator::FinishSwarm),
                fatal: outcome.fatal,
            };
        }

        let label = self.label();
        let info = ToolCallInfo {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        };

        let pre_ctx = self
            .hook_context(HookEvent::PreToolUse, env)
            .with_tool_call(info.clone());
        let pre = self
            .hooks
            .execute_safe(&self.definition.name, &pre_ctx, &env.stream)
            .await;

        let (mut content, invoked) = match pre {
            HookOutcome::Replace(value) => (value_to_text(&value), false),
            HookOutcome::Halt(message) => (message, false),
            HookOutcome::FinishAgent(message) => {
                return ToolDispatch {
                    call_id: call.id.clone(),
                    content: message.clone(),
                    terminator: Some(Terminator::FinishAgent(message)),
                    fatal: None,
                }
            }
            HookOutcome::FinishSwarm(message) => {
                return ToolDispatch {
                    call_id: call.id.clone(),
                    content: message.clone(),
                    terminator: Some(Terminator::FinishSwarm(message)),
                    fatal: None,
                }
            }
            HookOutcome::Continue | HookOutcome::Reprompt(_) => {
                (self.invoke_tool(call, env, &label).await, true)
            }
        };
        debug!(agent = %label, tool = %call.name, invoked, "Tool dispatch complete");

        let post_ctx = self
            .hook_context(HookEvent::PostToolUse, env)
            .with_tool_call(info)
            .with_tool_result(Value::String(content.clone()));
        match self
            .hooks
            .execute_safe(&self.definition.name, &post_ctx, &env.stream)
            .await
        {
            HookOutcome::Replace(value) => content = value_to_text(&value),
            HookOutcome::Halt(message) => content = message,
            HookOutcome::FinishAgent(message) => {
                return ToolDispatch {
                    call_id: call.id.clone(),
                    content,
                    terminator: Some(Terminator::FinishAgent(message)),
                    fatal: None,
                }
            }
            HookOutcome::FinishSwarm(message) => {
                return ToolDispatch {
                    call_id: call.id.clone(),
                    content,
                    terminator: Some(Terminator::FinishSwarm(message)),
                    fatal: None,
                }
            }
            HookOutcome::Continue | HookOutcome::Reprompt(_) => {}
        }

        ToolDispatch {
            call_id: call.id.clone(),
            content,
            terminator: None,
            fatal: None,
        }
    }

    async fn invoke_tool(&self, call: &ToolCall, env: &ExecutionEnv, label: &str) -> String {
        env.stream.emit(
            LogEntry::new("tool_call")
                .with_agent(label.to_string())
                .with_field("tool", call.name.clone())
                .with_field("tool_call_id", call.id.clone()),
        );

        let result = match self.registry.get(&call.name) {
            Some(tool) => tool.call(call.arguments.clone(), &self.invocation).await,
            None => Err(ToolError::ExecutionFailed(format!(
                "unknown tool {:?}",
                call.name
            ))),
        };

        let (content, is_error) = match result {
            Ok(content) => (content, false),
            Err(ToolError::PermissionDenied { rule }) => {
                env.stream.emit(
                    LogEntry::new("permission_denied")
                        .with_agent(label.to_string())
                        .with_field("tool", call.name.clone())
                        .with_field("rule", rule.clone()),
                );
                (format!("permission denied: {rule}"), true)
            }
            Err(error) => {
                warn!(agent = %label, tool = %call.name, error = %error, "Tool failed");
                (format!("tool error: {error}"), true)
            }
        };

        env.stream.emit(
            LogEntry::new("tool_result")
                .with_agent(label.to_string())
                .with_field("tool", call.name.clone())
                .with_field("tool_call_id", call.id.clone())
                .with_field("is_error", is_error),
        );

        content
    }

    async fn check_context_thresholds(&self, state: &ChatState, env: &ExecutionEnv, label: &str) {
        let Some(context) = self.agent_context.get() else {
            return;
        };
        let limit = self.context_limit();
        if limit == 0 {
            return;
        }
        #[allow(clippy::cast_precision_loss)]
        let pct = (state.last_usage.input_tokens as f64 / limit as f64) * 100.0;

        for &threshold in &self.definition.context_warning_thresholds {
            if pct >= f64::from(threshold) && context.mark_threshold(threshold) {
                env.stream.emit(
                    LogEntry::new("context_limit_warning")
                        .with_agent(label.to_string())
                        .with_field("threshold", threshold)
                        .with_field("usage_pct", pct.round() as u64)
                        .with_field("context_limit", limit),
                );
                let ctx = self
                    .hook_context(HookEvent::ContextWarning, env)
                    .with_metadata("threshold", threshold);
                self.hooks
                    .execute_safe(&self.definition.name, &ctx, &env.stream)
                    .await;
            }
        }
    }

    fn hook_context(&self, event: HookEvent, env: &ExecutionEnv) -> HookContext {
        HookContext::new(
            event,
            self.label(),
            env.stream.context().swarm_id.to_string(),
        )
    }

    /// Compact the conversation in place, preserving the system message and
    /// the last complete tool-call/tool-result pair.
    ///
    /// # Errors
    ///
    /// Propagates provider failures from the summarization call.
    pub async fn compact_context(&self) -> RuntimeResult<bool> {
        let compactor = crate::compactor::ContextCompactor::default();
        let mut state = self.state.lock().await;
        let compacted = compactor
            .compact(&state.messages, self.provider.as_ref(), &self.definition.model)
            .await?;
        match compacted {
            Some(messages) => {
                state.messages = messages;
                state.last_todowrite_index = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) async fn export_state(&self) -> crate::snapshot::AgentSnapshot {
        let state = self.state.lock().await;
        crate::snapshot::AgentSnapshot {
            conversation: state.messages.clone(),
            system_prompt: state
                .messages
                .first()
                .filter(|m| m.role == MessageRole::System)
                .map(|m| m.content.clone()),
            last_todowrite_index: state.last_todowrite_index,
            cumulative_output_tokens: state.cumulative_output_tokens,
            cumulative_cache_creation_tokens: state.cumulative_cache_creation_tokens,
            last_usage: state.last_usage,
            total_cost: state.total_cost,
            read_tracking: self.invocation.reads.export(),
        }
    }

    pub(crate) async fn import_state(&self, snapshot: &crate::snapshot::AgentSnapshot) {
        let mut state = self.state.lock().await;
        state.messages = snapshot.conversation.clone();
        state.last_todowrite_index = snapshot.last_todowrite_index;
        state.cumulative_output_tokens = snapshot.cumulative_output_tokens;
        state.cumulative_cache_creation_tokens = snapshot.cumulative_cache_creation_tokens;
        state.last_usage = snapshot.last_usage;
        state.total_cost = snapshot.total_cost;
        self.invocation.reads.import(snapshot.read_tracking.clone());
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn system_prompt_for(definition: &AgentDefinition) -> String {
    if let Some(prompt) = &definition.system_prompt {
        return prompt.clone();
    }
    let base = if definition.coding_agent {
        "You are a coding agent. Work inside your directory, prefer small verifiable \
         changes, and run the tools available to you rather than guessing."
    } else {
        "You are an agent collaborating inside a swarm. Use your tools to complete \
         the task you are given and reply with a clear, final answer."
    };
    format!(
        "{base}\n\nYou are {name}: {description}\nWorking directory: {dir}",
        name = definition.name,
        description = definition.description,
        dir = definition.directory.display()
    )
}

fn register_builtin_tools(
    definition: &AgentDefinition,
    registry: &ToolRegistry,
) -> RuntimeResult<()> {
    let default_specs = || {
        ["Read", "Write", "Edit", "Bash", "TodoWrite"]
            .into_iter()
            .map(ToolSpec::named)
            .collect::<Vec<_>>()
    };
    // `disable_default_tools` filters the implicit default set; an explicit
    // tool list is taken as written.
    let specs = if definition.tools.is_empty() {
        let mut defaults = default_specs();
        defaults.retain(|spec| !definition.disable_default_tools.disables(&spec.name));
        defaults
    } else {
        definition.tools.clone()
    };

    for mut spec in specs {
        if spec.is_write_class() && spec.permissions.is_none() {
            spec.permissions = Some(ToolPermissions {
                allowed_paths: vec!["**/*".to_string()],
                ..Default::default()
            });
        }
        let envelope = envelope_for(definition, spec.permissions.as_ref())?;
        let tool: Arc<dyn Tool> = match spec.name.as_str() {
            "Read" => Arc::new(ReadTool::new(envelope)),
            "Write" => Arc::new(WriteTool::new(envelope)),
            "Edit" | "MultiEdit" => Arc::new(EditTool::new(envelope)),
            "Bash" => Arc::new(BashTool::new(envelope)),
            "TodoWrite" => Arc::new(TodoWriteTool),
            other => {
                return Err(RuntimeError::AgentInitialization {
                    agent: definition.name.clone(),
                    reason: format!("unknown tool {other:?}"),
                })
            }
        };
        registry
            .register(tool, ToolSource::Builtin, serde_json::Map::new())
            .map_err(|e| RuntimeError::AgentInitialization {
                agent: definition.name.clone(),
                reason: e.to_string(),
            })?;
    }
    Ok(())
}

fn envelope_for(
    definition: &AgentDefinition,
    permissions: Option<&ToolPermissions>,
) -> RuntimeResult<PermissionEnvelope> {
    match permissions {
        None => Ok(PermissionEnvelope::allow_all(&definition.directory)),
        Some(p) => PermissionEnvelope::new(
            &definition.directory,
            &p.allowed_paths,
            &p.deny_paths,
            &p.allowed_commands,
        )
        .map_err(|e| RuntimeError::AgentInitialization {
            agent: definition.name.clone(),
            reason: e.to_string(),
        }),
    }
}
