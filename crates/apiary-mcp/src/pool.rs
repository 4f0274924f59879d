//! Per-agent MCP client lifecycle.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::service::McpService;

/// Tracks live MCP services per agent so cleanup can terminate them all, in
/// every exit path (normal, errored, cancelled).
#[derive(Default)]
pub struct McpClientPool {
    clients: DashMap<String, Vec<Arc<dyn McpService>>>,
}

impl std::fmt::Debug for McpClientPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClientPool")
            .field("agents", &self.clients.len())
            .finish_non_exhaustive()
    }
}

impl McpClientPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a service under an agent.
    pub fn register(&self, agent: impl Into<String>, service: Arc<dyn McpService>) {
        self.clients.entry(agent.into()).or_default().push(service);
    }

    /// Number of services tracked for an agent.
    #[must_use]
    pub fn count_for(&self, agent: &str) -> usize {
        self.clients.get(agent).map_or(0, |v| v.len())
    }

    /// Shut down and drop every service registered under an agent.
    pub async fn shutdown_agent(&self, agent: &str) {
        if let Some((_, services)) = self.clients.remove(agent) {
            debug!(agent = %agent, count = services.len(), "Shutting down MCP clients");
            for service in services {
                service.shutdown().await;
            }
        }
    }

    /// Shut down every tracked service.
    pub async fn shutdown_all(&self) {
        let agents: Vec<String> = self.clients.iter().map(|e| e.key().clone()).collect();
        for agent in agents {
            self.shutdown_agent(&agent).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticMcpService;

    #[tokio::test]
    async fn test_shutdown_agent_terminates_services() {
        let pool = McpClientPool::new();
        let service = Arc::new(StaticMcpService::new("m"));
        pool.register("backend", Arc::clone(&service) as Arc<dyn McpService>);

        assert_eq!(pool.count_for("backend"), 1);
        pool.shutdown_agent("backend").await;

        assert_eq!(pool.count_for("backend"), 0);
        assert!(service.is_shut_down());
    }

    #[tokio::test]
    async fn test_shutdown_all() {
        let pool = McpClientPool::new();
        let a = Arc::new(StaticMcpService::new("a"));
        let b = Arc::new(StaticMcpService::new("b"));
        pool.register("agent1", Arc::clone(&a) as Arc<dyn McpService>);
        pool.register("agent2", Arc::clone(&b) as Arc<dyn McpService>);

        pool.shutdown_all().await;
        assert!(a.is_shut_down());
        assert!(b.is_shut_down());
    }
}
