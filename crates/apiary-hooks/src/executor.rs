//! Hook chain execution.

use std::sync::Arc;

use apiary_events::{LogEntry, LogStream};
use tracing::{debug, warn};

use crate::context::HookContext;
use crate::definition::{HookDefinition, HookHandler};
use crate::outcome::HookOutcome;
use crate::registry::HookRegistry;
use crate::shell::{outcome_from_shell, ShellExecutor};

/// Runs hook chains with error isolation.
///
/// The first non-`Continue` outcome short-circuits the chain and is returned.
/// A failing hook (shell spawn error, timeout) is logged as a `hook_error`
/// event and treated as `Continue` so one bad hook cannot break the chain.
#[derive(Clone)]
pub struct HookExecutor {
    registry: Arc<HookRegistry>,
    shell: Arc<dyn ShellExecutor>,
}

impl std::fmt::Debug for HookExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookExecutor").finish_non_exhaustive()
    }
}

impl HookExecutor {
    /// Create an executor over a registry and a shell collaborator.
    #[must_use]
    pub fn new(registry: Arc<HookRegistry>, shell: Arc<dyn ShellExecutor>) -> Self {
        Self { registry, shell }
    }

    /// The registry this executor consults.
    #[must_use]
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// Run all hooks applicable to `context` for `agent`.
    ///
    /// Returns the first non-`Continue` outcome, or `Continue` when the whole
    /// chain passed.
    pub async fn execute_safe(
        &self,
        agent: &str,
        context: &HookContext,
        stream: &LogStream,
    ) -> HookOutcome {
        let chain = self.registry.callbacks_for(agent, context);
        if chain.is_empty() {
            return HookOutcome::Continue;
        }

        debug!(
            event = %context.event,
            agent = %agent,
            hooks = chain.len(),
            "Running hook chain"
        );

        for hook in &chain {
            let outcome = self.run_one(hook, context, stream).await;
            if !outcome.is_continue() {
                debug!(
                    event = %context.event,
                    agent = %agent,
                    outcome = ?outcome,
                    "Hook chain short-circuited"
                );
                return outcome;
            }
        }

        HookOutcome::Continue
    }

    async fn run_one(
        &self,
        hook: &HookDefinition,
        context: &HookContext,
        stream: &LogStream,
    ) -> HookOutcome {
        match &hook.handler {
            HookHandler::Native(callable) => callable.run(context).await,
            HookHandler::Shell { command, timeout } => {
                let stdin = context.to_json().to_string();
                match self.shell.run(command, &stdin, *timeout).await {
                    Ok(output) => {
                        if output.exit_code != 0 && output.exit_code != 2 {
                            warn!(
                                command = %command,
                                exit_code = output.exit_code,
                                stderr = %output.stderr,
                                "Shell hook exited non-zero; continuing"
                            );
                        }
                        outcome_from_shell(&output)
                    }
                    Err(e) => {
                        warn!(command = %command, error = %e, "Shell hook failed; continuing");
                        stream.emit(
                            LogEntry::new("hook_error")
                                .with_agent(context.agent_name.clone())
                                .with_field("event", context.event.to_string())
                                .with_field("command", command.clone())
                                .with_field("error", e.to_string()),
                        );
                        HookOutcome::Continue
                    }
                }
            }
        }
    }
}
