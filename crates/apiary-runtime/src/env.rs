//! Per-execution environment threaded through the engine.

use std::sync::Arc;

use apiary_events::LogStream;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeError, RuntimeResult};

/// Default cap on concurrent LLM calls across the swarm.
pub const DEFAULT_GLOBAL_CONCURRENCY: usize = 4;

/// Everything one `execute` call carries through the agent graph.
///
/// Cloned freely; all fields are shared handles. Replaces the source design's
/// fiber-local storage: a nested swarm execution builds its own `ExecutionEnv`
/// and the parent's value is untouched when the nested call returns.
#[derive(Clone)]
pub struct ExecutionEnv {
    /// Event stream stamped with this execution's context.
    pub stream: LogStream,
    /// Caps concurrent LLM calls across all agents. Acquired around each LLM
    /// call rather than a whole `ask` so nested delegation cannot deadlock
    /// the pool.
    pub llm_semaphore: Arc<Semaphore>,
    /// Agents currently being delegated to, for cycle detection.
    pub delegation_stack: Arc<Mutex<Vec<String>>>,
    /// Cooperative cancellation for the whole execution.
    pub cancel: CancellationToken,
}

impl std::fmt::Debug for ExecutionEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEnv")
            .field("context", self.stream.context())
            .finish_non_exhaustive()
    }
}

impl ExecutionEnv {
    /// Create an environment for an execution.
    #[must_use]
    pub fn new(stream: LogStream, llm_permits: usize) -> Self {
        Self {
            stream,
            llm_semaphore: Arc::new(Semaphore::new(llm_permits.max(1))),
            delegation_stack: Arc::new(Mutex::new(Vec::new())),
            cancel: CancellationToken::new(),
        }
    }

    /// Push a delegation target onto the cycle-detection stack.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::CircularDelegation`] naming the cycle when the
    /// target is already in progress. The target is NOT pushed in that case.
    pub async fn push_delegation(&self, target: &str) -> RuntimeResult<()> {
        let mut stack = self.delegation_stack.lock().await;
        if stack.iter().any(|name| name == target) {
            let mut path: Vec<&str> = stack.iter().map(String::as_str).collect();
            path.push(target);
            return Err(RuntimeError::CircularDelegation {
                path: path.join("\u{2192}"),
            });
        }
        stack.push(target.to_string());
        Ok(())
    }

    /// Pop the most recent delegation target.
    pub async fn pop_delegation(&self, target: &str) {
        let mut stack = self.delegation_stack.lock().await;
        if stack.last().map(String::as_str) == Some(target) {
            stack.pop();
        } else {
            // Unbalanced pops only happen on logic errors; drop the entry
            // wherever it is rather than corrupting the stack.
            stack.retain(|name| name != target);
        }
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_core::{ExecutionContext, SwarmId};
    use apiary_events::LogCollector;

    fn env() -> ExecutionEnv {
        let collector = Arc::new(LogCollector::new());
        let ctx = ExecutionContext::root(SwarmId::from_name("test"));
        ExecutionEnv::new(LogStream::new(ctx, collector), 4)
    }

    #[tokio::test]
    async fn test_cycle_detection_names_path() {
        let env = env();
        env.push_delegation("a").await.unwrap();
        env.push_delegation("b").await.unwrap();

        let err = env.push_delegation("a").await.unwrap_err();
        match err {
            RuntimeError::CircularDelegation { path } => {
                assert_eq!(path, "a\u{2192}b\u{2192}a");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[tokio::test]
    async fn test_pop_restores_capacity() {
        let env = env();
        env.push_delegation("a").await.unwrap();
        env.pop_delegation("a").await;
        env.push_delegation("a").await.unwrap();
    }
}
