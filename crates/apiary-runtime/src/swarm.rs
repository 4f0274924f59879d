//! The swarm: top-level handle over agents, hooks, and shared infrastructure.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock as StdRwLock, Weak};
use std::time::Duration;

use apiary_config::{AgentDefinition, SwarmSpec};
use apiary_core::{validate_agent_name, ExecutionContext, SwarmId};
use apiary_events::{LogCollector, LogEntry, LogStream};
use apiary_hooks::{
    HookDefinition, HookEvent, HookExecutor, HookOutcome, HookRegistry, NativeHook, ShellExecutor,
    TokioShellExecutor,
};
use apiary_llm::{ChatProvider, ModelRegistry, StaticModelRegistry};
use apiary_mcp::{McpClientPool, McpConfigurator, McpConnector};
use tokio::sync::{Mutex, OnceCell, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::chat::AgentChat;
use crate::context::AgentContext;
use crate::delegation::{
    delegation_tool_name, DelegateTool, DelegationBinding, DelegationTarget, LazyDelegateChat,
};
use crate::env::{ExecutionEnv, DEFAULT_GLOBAL_CONCURRENCY};
use crate::error::{RuntimeError, RuntimeResult};
use crate::executor;
use crate::plugin::{Plugin, PluginRegistry, PluginStorages};
use crate::scratchpad::ScratchpadStore;

/// Result of one `execute` call.
#[derive(Debug)]
pub struct ExecutionResult {
    /// The lead agent's final answer (or a finish-swarm message).
    pub content: Option<String>,
    /// The agent that produced the final content.
    pub agent: Option<String>,
    /// Every event emitted during this execution, in order.
    pub logs: Vec<LogEntry>,
    /// Wall-clock duration.
    pub duration: Duration,
    /// Runtime failure, when the execution did not complete normally.
    pub error: Option<RuntimeError>,
    /// Total estimated cost across all LLM calls (USD).
    pub total_cost: f64,
    /// Total tokens (input + output) across all LLM calls.
    pub total_tokens: u64,
    /// Agents that emitted events, in order of first appearance.
    pub agents_involved: Vec<String>,
}

impl ExecutionResult {
    /// Whether the execution completed with content and no error.
    #[must_use]
    pub fn success(&self) -> bool {
        self.error.is_none() && self.content.is_some()
    }
}

/// Handle for a detached (`wait: false`) execution.
pub struct ExecutionHandle {
    pub(crate) cancel: CancellationToken,
    pub(crate) join: tokio::task::JoinHandle<RuntimeResult<ExecutionResult>>,
}

impl ExecutionHandle {
    /// Request cancellation: aborts in-flight LLM and tool work at the next
    /// suspension point; `swarm_stop` and cleanup still run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the execution to finish.
    ///
    /// # Errors
    ///
    /// Returns configuration errors from the execution, or a
    /// [`RuntimeError::State`] if the task panicked.
    pub async fn wait(self) -> RuntimeResult<ExecutionResult> {
        self.join.await.map_err(|e| RuntimeError::State {
            message: format!("execution task failed: {e}"),
        })?
    }
}

/// Shared state behind a [`Swarm`]: definitions, live agents, registries, and
/// the infrastructure every component borrows.
pub(crate) struct SwarmCore {
    pub(crate) name: String,
    pub(crate) swarm_id: SwarmId,
    pub(crate) lead: String,
    pub(crate) definitions: BTreeMap<String, Arc<AgentDefinition>>,
    pub(crate) provider: Arc<dyn ChatProvider>,
    pub(crate) models: Arc<dyn ModelRegistry>,
    pub(crate) shell: Arc<dyn ShellExecutor>,
    pub(crate) hook_registry: Arc<HookRegistry>,
    pub(crate) plugins: PluginRegistry,
    pub(crate) plugin_storages: PluginStorages,
    pub(crate) scratchpad: Arc<ScratchpadStore>,
    pub(crate) mcp_connector: Option<Arc<dyn McpConnector>>,
    pub(crate) mcp_pool: Arc<McpClientPool>,
    pub(crate) collector: Arc<LogCollector>,
    pub(crate) llm_permits: usize,
    pub(crate) swarm_registry: StdRwLock<HashMap<String, Arc<Swarm>>>,
    pub(crate) agents: RwLock<HashMap<String, Arc<AgentChat>>>,
    pub(crate) delegation_instances: RwLock<HashMap<String, Arc<LazyDelegateChat>>>,
    pub(crate) initialized: OnceCell<()>,
    pub(crate) self_weak: Weak<SwarmCore>,
}

impl SwarmCore {
    pub(crate) fn hook_executor(&self) -> HookExecutor {
        HookExecutor::new(Arc::clone(&self.hook_registry), Arc::clone(&self.shell))
    }

    pub(crate) fn external_swarm(&self, name: &str) -> Option<Arc<Swarm>> {
        self.swarm_registry
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Construct a bare chat for a definition (no wiring).
    pub(crate) fn build_chat(&self, definition: &Arc<AgentDefinition>) -> RuntimeResult<AgentChat> {
        AgentChat::new(
            Arc::clone(definition),
            Arc::clone(&self.provider),
            Arc::clone(&self.models),
            self.hook_executor(),
            self.self_weak.clone(),
        )
    }

    /// Wire the delegation edges of `definition` onto `chat`.
    ///
    /// Returns the wired tool names, in edge order.
    pub(crate) async fn wire_delegations(
        &self,
        chat: &AgentChat,
        definition: &AgentDefinition,
        delegator_label: &str,
    ) -> RuntimeResult<Vec<String>> {
        let mut tool_names = Vec::with_capacity(definition.delegates_to.len());

        for edge in &definition.delegates_to {
            let tool_name = edge
                .tool_name
                .clone()
                .unwrap_or_else(|| delegation_tool_name(&edge.agent));

            let (target, description) = if let Some(target_def) = self.definitions.get(&edge.agent)
            {
                if target_def.shared_across_delegations {
                    (
                        DelegationTarget::SharedAgent(edge.agent.clone()),
                        target_def.description.clone(),
                    )
                } else {
                    let lazy = Arc::new(LazyDelegateChat::new(
                        edge.agent.clone(),
                        delegator_label,
                        self.self_weak.clone(),
                    ));
                    self.delegation_instances
                        .write()
                        .await
                        .insert(lazy.key(), Arc::clone(&lazy));
                    (DelegationTarget::Lazy(lazy), target_def.description.clone())
                }
            } else if self.external_swarm(&edge.agent).is_some() {
                (
                    DelegationTarget::ExternalSwarm(edge.agent.clone()),
                    format!("The {} swarm.", edge.agent),
                )
            } else {
                return Err(RuntimeError::Configuration(
                    apiary_config::ConfigError::UnknownDelegate {
                        agent: delegator_label.to_string(),
                        target: edge.agent.clone(),
                    },
                ));
            };

            let mut metadata = serde_json::Map::new();
            metadata.insert(
                "delegate".to_string(),
                serde_json::Value::String(edge.agent.clone()),
            );
            chat.registry
                .register(
                    Arc::new(DelegateTool::new(
                        tool_name.clone(),
                        edge.agent.clone(),
                        description,
                    )),
                    apiary_tools::ToolSource::Delegation,
                    metadata,
                )
                .map_err(|e| RuntimeError::ToolRegistry(e.to_string()))?;

            chat.add_delegation(Arc::new(DelegationBinding {
                from: delegator_label.to_string(),
                to: edge.agent.clone(),
                tool_name: tool_name.clone(),
                preserve_context: edge.preserve_context,
                target,
                core: self.self_weak.clone(),
            }));
            tool_names.push(tool_name);
        }

        Ok(tool_names)
    }

    /// Create, wire, and activate an isolated delegation instance.
    pub(crate) async fn create_instance_chat(
        &self,
        delegate: &str,
        delegator_label: &str,
        env: &ExecutionEnv,
    ) -> RuntimeResult<Arc<AgentChat>> {
        let definition = self
            .definitions
            .get(delegate)
            .cloned()
            .ok_or_else(|| RuntimeError::AgentInitialization {
                agent: delegate.to_string(),
                reason: "no definition for delegate".to_string(),
            })?;

        let chat = Arc::new(self.build_chat(&definition)?);
        let context =
            AgentContext::delegation_instance(delegate, delegator_label, self.swarm_id.clone());
        let label = context.label().to_string();

        for plugin in self.plugins.all() {
            if let Some(storage) =
                plugin.create_storage(&label, definition.plugin_configs.get(plugin.name()))
            {
                self.plugin_storages.insert(plugin.name(), &label, storage);
            }
            plugin.on_agent_initialized(delegate, &chat.registry).await?;
        }

        if let Some(connector) = &self.mcp_connector {
            if !definition.mcp_servers.is_empty() {
                let configurator =
                    McpConfigurator::new(Arc::clone(connector), Arc::clone(&self.mcp_pool));
                configurator
                    .configure(&label, &definition.mcp_servers, &chat.registry, &env.stream)
                    .await?;
            }
        }

        let tools = self.wire_delegations(&chat, &definition, &label).await?;
        chat.attach_context(Arc::new(context.with_delegation_tools(tools)));
        chat.activate_tools();

        Ok(chat)
    }

    /// Shut down MCP clients. Always runs, in every exit path.
    pub(crate) async fn cleanup(&self) {
        self.mcp_pool.shutdown_all().await;
    }
}

impl std::fmt::Debug for SwarmCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwarmCore")
            .field("name", &self.name)
            .field("swarm_id", &self.swarm_id)
            .field("lead", &self.lead)
            .field("agents", &self.definitions.len())
            .finish_non_exhaustive()
    }
}

/// A configured collection of agents, executed as a unit.
#[derive(Debug)]
pub struct Swarm {
    pub(crate) core: Arc<SwarmCore>,
    execution_lock: Mutex<()>,
}

impl Swarm {
    /// Start building a swarm.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SwarmBuilder {
        SwarmBuilder::new(name)
    }

    /// The swarm's stable id.
    #[must_use]
    pub fn swarm_id(&self) -> &SwarmId {
        &self.core.swarm_id
    }

    /// The swarm name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// The event collector; subscribe here for live events.
    #[must_use]
    pub fn collector(&self) -> &Arc<LogCollector> {
        &self.core.collector
    }

    /// The scratchpad shared by this swarm's agents.
    #[must_use]
    pub fn scratchpad(&self) -> &Arc<ScratchpadStore> {
        &self.core.scratchpad
    }

    /// Register a swarm-wide default hook from a native callable.
    pub fn add_default_callback(
        &self,
        event: HookEvent,
        matcher: Option<&str>,
        priority: i32,
        hook: Arc<dyn NativeHook>,
    ) {
        let mut definition = HookDefinition::native(event, hook).with_priority(priority);
        if let Some(matcher) = matcher {
            definition = definition.with_matcher(matcher);
        }
        self.core.hook_registry.add_default(definition);
    }

    /// The primary chat for an agent, if instantiated.
    pub async fn agent_chat(&self, name: &str) -> Option<Arc<AgentChat>> {
        self.core.agents.read().await.get(name).cloned()
    }

    /// The isolated delegation instance for `"<delegate>@<delegator>"`, if
    /// wired.
    pub async fn delegation_instance(&self, key: &str) -> Option<Arc<LazyDelegateChat>> {
        self.core.delegation_instances.read().await.get(key).cloned()
    }

    /// Run one execution and wait for it.
    ///
    /// Reentrant only after the previous call resolves; configuration is
    /// snapshotted at entry, so mutating shared config mid-execution is
    /// unsupported.
    ///
    /// # Errors
    ///
    /// Configuration errors (unknown lead, invalid delegate, MCP init
    /// failures) are returned as `Err`. Runtime failures are captured inside
    /// the returned [`ExecutionResult`].
    pub async fn execute(&self, prompt: &str) -> RuntimeResult<ExecutionResult> {
        let _guard = self.execution_lock.lock().await;
        let ctx = ExecutionContext::root(self.core.swarm_id.clone());
        self.execute_with_context(prompt, ctx, CancellationToken::new())
            .await
    }

    /// Run one execution as a nested swarm (delegation from another swarm).
    ///
    /// Returned as an explicitly boxed future (rather than `async fn`) so
    /// the opaque return type doesn't recurse through the delegation call
    /// graph, which can call back into this method for external-swarm
    /// delegation.
    pub(crate) fn execute_nested<'a>(
        &'a self,
        prompt: &'a str,
        parent: &'a ExecutionContext,
    ) -> futures::future::BoxFuture<'a, ExecutionResult> {
        Box::pin(async move {
            let guard = self.execution_lock.lock().await;
            let ctx = parent.child(self.core.swarm_id.clone());
            let result = self
                .execute_with_context(prompt, ctx, CancellationToken::new())
                .await;
            drop(guard);
            match result {
                Ok(result) => result,
                Err(error) => ExecutionResult {
                    content: None,
                    agent: None,
                    logs: Vec::new(),
                    duration: Duration::ZERO,
                    error: Some(error),
                    total_cost: 0.0,
                    total_tokens: 0,
                    agents_involved: Vec::new(),
                },
            }
        })
    }

    /// Start an execution without waiting; returns a cancellable handle.
    #[must_use]
    pub fn execute_detached(self: &Arc<Self>, prompt: &str) -> ExecutionHandle {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let swarm = Arc::clone(self);
        let prompt = prompt.to_string();

        let join = tokio::spawn(async move {
            let _guard = swarm.execution_lock.lock().await;
            let ctx = ExecutionContext::root(swarm.core.swarm_id.clone());
            swarm.execute_with_context(&prompt, ctx, task_cancel).await
        });

        ExecutionHandle { cancel, join }
    }

    async fn execute_with_context(
        &self,
        prompt: &str,
        ctx: ExecutionContext,
        cancel: CancellationToken,
    ) -> RuntimeResult<ExecutionResult> {
        let stream = LogStream::new(ctx, Arc::clone(&self.core.collector));
        let mut env = ExecutionEnv::new(stream, self.core.llm_permits);
        env.cancel = cancel;
        executor::run(&self.core, prompt, &env).await
    }

    /// Ensure the agent graph is wired, using a bootstrap execution context.
    /// Used by restore-before-execute flows.
    ///
    /// # Errors
    ///
    /// Returns configuration errors from initialization.
    pub async fn ensure_initialized(&self) -> RuntimeResult<()> {
        let ctx = ExecutionContext::root(self.core.swarm_id.clone());
        let stream = LogStream::new(ctx, Arc::clone(&self.core.collector));
        let env = ExecutionEnv::new(stream, self.core.llm_permits);
        crate::initializer::ensure_initialized(&self.core, &env).await
    }

    /// Shut down MCP clients and release per-execution state.
    pub async fn cleanup(&self) {
        self.core.cleanup().await;
    }
}

/// Builds a [`Swarm`].
pub struct SwarmBuilder {
    name: String,
    swarm_id: Option<String>,
    lead: Option<String>,
    definitions: Vec<AgentDefinition>,
    provider: Option<Arc<dyn ChatProvider>>,
    models: Option<Arc<dyn ModelRegistry>>,
    shell: Option<Arc<dyn ShellExecutor>>,
    mcp_connector: Option<Arc<dyn McpConnector>>,
    plugins: PluginRegistry,
    llm_permits: usize,
    external_swarms: HashMap<String, Arc<Swarm>>,
}

impl SwarmBuilder {
    /// Create a builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            swarm_id: None,
            lead: None,
            definitions: Vec::new(),
            provider: None,
            models: None,
            shell: None,
            mcp_connector: None,
            plugins: PluginRegistry::new(),
            llm_permits: DEFAULT_GLOBAL_CONCURRENCY,
            external_swarms: HashMap::new(),
        }
    }

    /// Build from a validated declarative spec.
    #[must_use]
    pub fn from_spec(spec: SwarmSpec) -> Self {
        let mut builder = Self::new(spec.name);
        builder.swarm_id = spec.id;
        builder.lead = Some(spec.lead);
        builder.definitions = spec.agents;
        builder
    }

    /// Pin the swarm id (composable swarms).
    #[must_use]
    pub fn swarm_id(mut self, id: impl Into<String>) -> Self {
        self.swarm_id = Some(id.into());
        self
    }

    /// Add an agent definition.
    ///
    /// # Errors
    ///
    /// Returns a configuration error on a name collision.
    pub fn add_agent(mut self, definition: AgentDefinition) -> RuntimeResult<Self> {
        if self.definitions.iter().any(|d| d.name == definition.name) {
            return Err(RuntimeError::Configuration(
                apiary_config::ConfigError::InvalidAgent {
                    agent: definition.name,
                    reason: "an agent with this name is already defined".to_string(),
                },
            ));
        }
        self.definitions.push(definition);
        Ok(self)
    }

    /// Set the lead agent.
    #[must_use]
    pub fn lead(mut self, name: impl Into<String>) -> Self {
        self.lead = Some(name.into());
        self
    }

    /// Set the LLM provider (required).
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the model metadata registry (defaults to the bundled table).
    #[must_use]
    pub fn model_registry(mut self, models: Arc<dyn ModelRegistry>) -> Self {
        self.models = Some(models);
        self
    }

    /// Set the shell executor used by declarative hooks.
    #[must_use]
    pub fn shell_executor(mut self, shell: Arc<dyn ShellExecutor>) -> Self {
        self.shell = Some(shell);
        self
    }

    /// Set the MCP connector. Without one, agents with MCP servers fail at
    /// initialization.
    #[must_use]
    pub fn mcp_connector(mut self, connector: Arc<dyn McpConnector>) -> Self {
        self.mcp_connector = Some(connector);
        self
    }

    /// Attach a plugin.
    #[must_use]
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.add(plugin);
        self
    }

    /// Cap concurrent LLM calls across all agents.
    #[must_use]
    pub fn llm_concurrency(mut self, permits: usize) -> Self {
        self.llm_permits = permits.max(1);
        self
    }

    /// Register an external swarm as a delegation target.
    #[must_use]
    pub fn register_swarm(mut self, name: impl Into<String>, swarm: Arc<Swarm>) -> Self {
        self.external_swarms.insert(name.into(), swarm);
        self
    }

    /// Build the swarm.
    ///
    /// # Errors
    ///
    /// Returns configuration errors for invalid agent definitions or a
    /// missing provider.
    pub fn build(self) -> RuntimeResult<Swarm> {
        let provider = self.provider.ok_or_else(|| RuntimeError::State {
            message: "a ChatProvider is required to build a swarm".to_string(),
        })?;

        let mut definitions = BTreeMap::new();
        for mut definition in self.definitions {
            validate_agent_name(&definition.name).map_err(|e| {
                RuntimeError::Configuration(apiary_config::ConfigError::InvalidAgent {
                    agent: definition.name.clone(),
                    reason: e.to_string(),
                })
            })?;
            if definition.description.trim().is_empty() {
                return Err(RuntimeError::Configuration(
                    apiary_config::ConfigError::InvalidAgent {
                        agent: definition.name,
                        reason: "description is required".to_string(),
                    },
                ));
            }
            if !definition.directory.is_dir() {
                return Err(RuntimeError::Configuration(
                    apiary_config::ConfigError::InvalidAgent {
                        agent: definition.name.clone(),
                        reason: format!(
                            "directory {} does not exist",
                            definition.directory.display()
                        ),
                    },
                ));
            }
            definition.apply_default_write_permissions();
            definitions.insert(definition.name.clone(), Arc::new(definition));
        }

        let lead = self.lead.unwrap_or_default();
        let swarm_id = self
            .swarm_id
            .map_or_else(SwarmId::generate, SwarmId::from_name);

        if !lead.is_empty() && !definitions.contains_key(&lead) {
            warn!(lead = %lead, "Lead agent is not defined; execute will fail");
        }

        let core = Arc::new_cyclic(|weak| SwarmCore {
            name: self.name,
            swarm_id,
            lead,
            definitions,
            provider,
            models: self
                .models
                .unwrap_or_else(|| Arc::new(StaticModelRegistry::bundled())),
            shell: self
                .shell
                .unwrap_or_else(|| Arc::new(TokioShellExecutor::new())),
            hook_registry: Arc::new(HookRegistry::new()),
            plugins: self.plugins,
            plugin_storages: PluginStorages::new(),
            scratchpad: Arc::new(ScratchpadStore::new()),
            mcp_connector: self.mcp_connector,
            mcp_pool: Arc::new(McpClientPool::new()),
            collector: Arc::new(LogCollector::new()),
            llm_permits: self.llm_permits,
            swarm_registry: StdRwLock::new(self.external_swarms),
            agents: RwLock::new(HashMap::new()),
            delegation_instances: RwLock::new(HashMap::new()),
            initialized: OnceCell::new(),
            self_weak: weak.clone(),
        });

        Ok(Swarm {
            core,
            execution_lock: Mutex::new(()),
        })
    }
}

/// Helper so hook callbacks can be registered from plain closures.
pub fn native_hook<F>(f: F) -> Arc<dyn NativeHook>
where
    F: Fn(&apiary_hooks::HookContext) -> HookOutcome + Send + Sync + 'static,
{
    Arc::new(f)
}
