//! The swarm run loop.

use std::sync::Arc;
use std::time::Instant;

use apiary_events::LogEntry;
use apiary_hooks::{HookContext, HookEvent, HookOutcome};
use tracing::{debug, info};

use crate::chat::AskOutcome;
use crate::env::ExecutionEnv;
use crate::error::{RuntimeError, RuntimeResult};
use crate::swarm::{ExecutionResult, SwarmCore};

/// Run one execution to completion.
///
/// Configuration errors bubble as `Err`; runtime failures are captured into
/// the result. Exactly one `swarm_start` and one `swarm_stop` event bracket
/// every other event of the execution, and MCP cleanup runs in every exit
/// path.
pub(crate) async fn run(
    core: &Arc<SwarmCore>,
    prompt: &str,
    env: &ExecutionEnv,
) -> RuntimeResult<ExecutionResult> {
    let started = Instant::now();

    crate::initializer::ensure_initialized(core, env).await?;

    if core.lead.is_empty() {
        return Err(RuntimeError::NoLead);
    }
    let lead_chat = core.agents.read().await.get(&core.lead).cloned().ok_or_else(|| {
        RuntimeError::Configuration(apiary_config::ConfigError::UnknownLead {
            name: core.lead.clone(),
        })
    })?;

    let execution_id = env.stream.context().execution_id.to_string();
    let swarm_id = env.stream.context().swarm_id.to_string();

    env.stream.emit(
        LogEntry::new("swarm_start")
            .with_field("swarm", core.name.clone())
            .with_field("lead", core.lead.clone())
            .with_field("prompt", prompt),
    );
    let hooks = core.hook_executor();
    let start_ctx = HookContext::new(HookEvent::SwarmStart, core.lead.clone(), swarm_id.clone())
        .with_prompt(prompt);
    hooks.execute_safe(&core.lead, &start_ctx, &env.stream).await;

    // The lead sits at the bottom of the delegation stack so a chain that
    // loops back to it is caught as a cycle.
    let seeded = env.push_delegation(&core.lead).await.is_ok();

    let mut current_prompt = prompt.to_string();
    let (content, error) = loop {
        match lead_chat.ask(&current_prompt, env).await {
            Ok(AskOutcome::FinishSwarm(message)) => {
                info!(swarm = %core.name, "Swarm finished early by hook");
                break (Some(message), None);
            }
            Ok(AskOutcome::Completed(message)) => {
                let stop_ctx =
                    HookContext::new(HookEvent::SwarmStop, core.lead.clone(), swarm_id.clone())
                        .with_metadata("result", message.clone());
                match hooks.execute_safe(&core.lead, &stop_ctx, &env.stream).await {
                    HookOutcome::Reprompt(new_prompt) => {
                        debug!(swarm = %core.name, "swarm_stop hook requested a reprompt");
                        current_prompt = new_prompt;
                    }
                    _ => break (Some(message), None),
                }
            }
            Err(error) => break (None, Some(error)),
        }
    };

    if seeded {
        env.pop_delegation(&core.lead).await;
    }

    // Exactly one swarm_stop event per execution, even on error.
    let mut stop = LogEntry::new("swarm_stop").with_field("swarm", core.name.clone());
    if let Some(content) = &content {
        stop = stop.with_field("result", content.clone());
    }
    if let Some(error) = &error {
        stop = stop.with_field("error", error.to_string());
    }
    env.stream.emit(stop);

    core.cleanup().await;

    // Drain (not just read) this execution's entries so the shared collector
    // buffer stays bounded across repeated executes on a long-lived swarm.
    let logs = core.collector.drain_for(&execution_id);
    let mut total_tokens: u64 = 0;
    let mut total_cost: f64 = 0.0;
    let mut agents_involved: Vec<String> = Vec::new();
    for entry in &logs {
        if entry.entry_type == "llm_api_response" {
            let input = entry.field("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
            let output = entry.field("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
            total_tokens = total_tokens.saturating_add(input).saturating_add(output);
            total_cost += entry.field("cost").and_then(|v| v.as_f64()).unwrap_or(0.0);
        }
        if let Some(agent) = &entry.agent {
            if !agents_involved.contains(agent) {
                agents_involved.push(agent.clone());
            }
        }
    }

    let agent = if error.is_some() {
        agents_involved.last().cloned()
    } else {
        Some(core.lead.clone())
    };

    Ok(ExecutionResult {
        content,
        agent,
        logs,
        duration: started.elapsed(),
        error,
        total_cost,
        total_tokens,
        agents_involved,
    })
}
