//! Six-pass agent graph wiring.
//!
//! The passes are strictly ordered; each depends on the previous:
//! 1. create primary chats (parallel, one task per agent),
//! 2. wire delegation tools,
//! 3. attach agent contexts (and model-lookup warnings),
//! 4. wire hook executors to the shared registry,
//! 5. translate declarative (shell) hooks,
//! 6. activate tools — last, because plugins and MCP may have registered
//!    tools during pass 1.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use apiary_events::LogEntry;
use apiary_hooks::HookDefinition;
use apiary_mcp::McpConfigurator;
use apiary_tools::ToolSource;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::chat::AgentChat;
use crate::context::AgentContext;
use crate::env::ExecutionEnv;
use crate::error::{RuntimeError, RuntimeResult};
use crate::swarm::SwarmCore;

/// Initialize the agent graph once; later calls are no-ops (except MCP
/// re-wiring after a cleanup shut the clients down).
pub(crate) async fn ensure_initialized(
    core: &Arc<SwarmCore>,
    env: &ExecutionEnv,
) -> RuntimeResult<()> {
    core.initialized
        .get_or_try_init(|| initialize(core, env))
        .await?;
    reconnect_mcp_if_needed(core, env).await?;
    Ok(())
}

async fn initialize(core: &Arc<SwarmCore>, env: &ExecutionEnv) -> RuntimeResult<()> {
    // Agents that appear only as isolated delegation targets get no primary;
    // their instances are created lazily on first use.
    let referenced_as_delegate: HashSet<String> = core
        .definitions
        .values()
        .flat_map(|def| def.delegates_to.iter().map(|d| d.agent.clone()))
        .collect();

    let needs_primary: Vec<String> = core
        .definitions
        .values()
        .filter(|def| {
            def.name == core.lead
                || def.shared_across_delegations
                || !referenced_as_delegate.contains(&def.name)
        })
        .map(|def| def.name.clone())
        .collect();

    // Pass 1 — create primaries, in parallel.
    let mut tasks: JoinSet<(String, RuntimeResult<Arc<AgentChat>>)> = JoinSet::new();
    for name in &needs_primary {
        let core = Arc::clone(core);
        let env = env.clone();
        let name = name.clone();
        tasks.spawn(async move {
            let result = create_primary(&core, &name, &env).await;
            (name, result)
        });
    }

    let mut chats: HashMap<String, Arc<AgentChat>> = HashMap::new();
    let mut first_error: Option<(String, RuntimeError)> = None;
    while let Some(joined) = tasks.join_next().await {
        let (name, result) = joined.map_err(|e| RuntimeError::AgentInitialization {
            agent: "unknown".to_string(),
            reason: format!("initialization task failed: {e}"),
        })?;
        match result {
            Ok(chat) => {
                chats.insert(name, chat);
            }
            Err(error) => {
                env.stream.emit(
                    LogEntry::new("agent_initialization_error")
                        .with_agent(name.clone())
                        .with_field("error", error.to_string()),
                );
                if first_error.is_none() {
                    first_error = Some((name, error));
                }
            }
        }
    }
    if let Some((agent, error)) = first_error {
        return Err(RuntimeError::AgentInitialization {
            agent,
            reason: error.to_string(),
        });
    }

    // Pass 2 — wire delegation tools onto each primary.
    for (name, chat) in &chats {
        let definition = &chat.definition;
        let tools = core.wire_delegations(chat, definition, name).await?;
        debug!(agent = %name, delegation_tools = tools.len(), "Delegations wired");
    }

    // Pass 3 — attach contexts; non-fatal validation warnings.
    for (name, chat) in &chats {
        let delegation_tools: Vec<String> = chat
            .delegations
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        let context = AgentContext::primary(name.clone(), core.swarm_id.clone())
            .with_delegation_tools(delegation_tools);
        chat.attach_context(Arc::new(context));

        if core.models.find(&chat.definition.model).is_none() {
            env.stream.emit(
                LogEntry::new("model_lookup_warning")
                    .with_agent(name.clone())
                    .with_field("model", chat.definition.model.clone()),
            );
        }
    }

    // Pass 4 — hook executors already point at the shared registry (wired at
    // chat construction); nothing to re-bind per agent.

    // Pass 5 — declarative hooks from the definitions.
    for chat in chats.values() {
        for spec in &chat.definition.hooks {
            let mut hook = HookDefinition::shell(spec.event, spec.command.clone());
            if let Some(matcher) = &spec.matcher {
                hook = hook.with_matcher(matcher);
            }
            if let Some(timeout) = spec.timeout {
                hook = hook.with_timeout(std::time::Duration::from_secs(timeout));
            }
            core.hook_registry
                .add_agent_hook(chat.definition.name.clone(), hook);
        }
    }

    // Pass 6 — activate tools. Last: plugins and MCP registered tools in
    // pass 1, delegation tools in pass 2.
    for chat in chats.values() {
        chat.activate_tools();
    }

    let count = chats.len();
    *core.agents.write().await = chats;
    info!(swarm = %core.name, primaries = count, "Swarm initialized");
    Ok(())
}

async fn create_primary(
    core: &Arc<SwarmCore>,
    name: &str,
    env: &ExecutionEnv,
) -> RuntimeResult<Arc<AgentChat>> {
    let definition = core
        .definitions
        .get(name)
        .cloned()
        .ok_or_else(|| RuntimeError::AgentInitialization {
            agent: name.to_string(),
            reason: "definition disappeared during initialization".to_string(),
        })?;

    let chat = Arc::new(core.build_chat(&definition)?);

    for plugin in core.plugins.all() {
        if let Some(storage) =
            plugin.create_storage(name, definition.plugin_configs.get(plugin.name()))
        {
            core.plugin_storages.insert(plugin.name(), name, storage);
        }
        plugin.on_agent_initialized(name, &chat.registry).await?;
    }

    if !definition.mcp_servers.is_empty() {
        let connector =
            core.mcp_connector
                .as_ref()
                .ok_or_else(|| RuntimeError::AgentInitialization {
                    agent: name.to_string(),
                    reason: "agent declares MCP servers but no connector is configured".to_string(),
                })?;
        let configurator = McpConfigurator::new(Arc::clone(connector), Arc::clone(&core.mcp_pool));
        configurator
            .configure(name, &definition.mcp_servers, &chat.registry, &env.stream)
            .await?;
    }

    Ok(chat)
}

/// After `cleanup` has shut the MCP clients down, a later execute re-wires
/// MCP tools from fresh connections.
async fn reconnect_mcp_if_needed(core: &Arc<SwarmCore>, env: &ExecutionEnv) -> RuntimeResult<()> {
    let Some(connector) = core.mcp_connector.as_ref() else {
        return Ok(());
    };

    let agents = core.agents.read().await.clone();
    for (name, chat) in agents {
        if chat.definition.mcp_servers.is_empty() || core.mcp_pool.count_for(&name) > 0 {
            continue;
        }
        debug!(agent = %name, "Re-wiring MCP tools after cleanup");
        chat.registry.remove_where_source(ToolSource::Mcp);
        let configurator = McpConfigurator::new(Arc::clone(connector), Arc::clone(&core.mcp_pool));
        configurator
            .configure(&name, &chat.definition.mcp_servers, &chat.registry, &env.stream)
            .await?;
        chat.activate_tools();
    }
    Ok(())
}
