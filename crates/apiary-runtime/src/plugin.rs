//! Plugin extension points.
//!
//! Plugins hook into agent initialization (to register tools), user messages
//! (to inject ephemeral reminders), and snapshots (to persist their own
//! state). Their storage is opaque to the engine.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use apiary_tools::ToolRegistry;

use crate::error::RuntimeResult;

/// A plugin attached to a swarm.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name; also the key for per-agent `plugin_configs`.
    fn name(&self) -> &str;

    /// Create per-agent storage. The engine keeps the handle but never looks
    /// inside it.
    fn create_storage(
        &self,
        _agent: &str,
        _config: Option<&Value>,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }

    /// Called after an agent's chat is constructed. May register tools.
    ///
    /// # Errors
    ///
    /// Errors abort that agent's initialization.
    async fn on_agent_initialized(
        &self,
        _agent: &str,
        _registry: &ToolRegistry,
    ) -> RuntimeResult<()> {
        Ok(())
    }

    /// Called before each user message; returned strings are injected as
    /// ephemeral system reminders for that turn.
    async fn on_user_message(&self, _agent: &str, _prompt: &str) -> Vec<String> {
        Vec::new()
    }

    /// State to include in swarm snapshots, keyed by plugin name.
    fn snapshot_state(&self) -> Option<Value> {
        None
    }

    /// Restore state from a snapshot.
    fn restore_state(&self, _state: &Value) {}
}

/// The plugins attached to a swarm, keyed by name.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("count", &self.plugins.len())
            .finish_non_exhaustive()
    }
}

impl PluginRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin.
    pub fn add(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// All plugins, in registration order.
    #[must_use]
    pub fn all(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Look up a plugin by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.iter().find(|p| p.name() == name)
    }

    /// Collect reminders from every plugin for a user message.
    pub async fn reminders_for(&self, agent: &str, prompt: &str) -> Vec<String> {
        let mut reminders = Vec::new();
        for plugin in &self.plugins {
            reminders.extend(plugin.on_user_message(agent, prompt).await);
        }
        reminders
    }
}

/// Opaque per-plugin, per-agent storages owned by the swarm.
#[derive(Default)]
pub struct PluginStorages {
    // plugin name -> agent name -> handle
    storages: RwLock<HashMap<String, HashMap<String, Arc<dyn Any + Send + Sync>>>>,
}

impl std::fmt::Debug for PluginStorages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginStorages").finish_non_exhaustive()
    }
}

impl PluginStorages {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a storage handle.
    pub fn insert(&self, plugin: &str, agent: &str, handle: Arc<dyn Any + Send + Sync>) {
        self.storages
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(plugin.to_string())
            .or_default()
            .insert(agent.to_string(), handle);
    }

    /// Fetch a storage handle.
    #[must_use]
    pub fn get(&self, plugin: &str, agent: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.storages
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(plugin)
            .and_then(|agents| agents.get(agent))
            .map(Arc::clone)
    }
}
