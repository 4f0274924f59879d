//! Tool registry.

use std::sync::{Arc, RwLock};

use apiary_llm::ToolDefinition;
use serde_json::Value;

use crate::{Tool, ToolError};

/// Where a registration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSource {
    /// Built-in tool.
    Builtin,
    /// MCP server tool (metadata carries the server name).
    Mcp,
    /// Delegation tool (metadata carries the delegate name).
    Delegation,
    /// Registered by a plugin.
    Plugin,
}

/// One record in the registry.
#[derive(Clone)]
pub struct ToolRegistration {
    /// The tool.
    pub tool: Arc<dyn Tool>,
    /// Registration source.
    pub source: ToolSource,
    /// Source-specific metadata (server name, delegate name, plugin name).
    pub metadata: serde_json::Map<String, Value>,
    /// Immutable registrations cannot be removed.
    pub immutable: bool,
}

impl std::fmt::Debug for ToolRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistration")
            .field("name", &self.tool.name())
            .field("source", &self.source)
            .field("immutable", &self.immutable)
            .finish_non_exhaustive()
    }
}

/// Registry of an agent's tools.
///
/// Registration order is preserved; it drives both the LLM definition list
/// and the toolset reminder. Late registrations (plugins, lazy delegation
/// wiring) become visible to the LLM at the next activation.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    entries: RwLock<Vec<ToolRegistration>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Registry`] when the name is already taken.
    pub fn register(
        &self,
        tool: Arc<dyn Tool>,
        source: ToolSource,
        metadata: serde_json::Map<String, Value>,
    ) -> Result<(), ToolError> {
        let name = tool.name();
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if entries.iter().any(|e| e.tool.name() == name) {
            return Err(ToolError::Registry(format!(
                "tool {name:?} is already registered"
            )));
        }
        entries.push(ToolRegistration {
            tool,
            source,
            metadata,
            immutable: false,
        });
        Ok(())
    }

    /// Remove a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Registry`] when the tool is missing or marked
    /// immutable.
    pub fn remove(&self, name: &str) -> Result<(), ToolError> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(idx) = entries.iter().position(|e| e.tool.name() == name) else {
            return Err(ToolError::Registry(format!("tool {name:?} is not registered")));
        };
        if entries[idx].immutable {
            return Err(ToolError::Registry(format!(
                "tool {name:?} is immutable and cannot be removed"
            )));
        }
        entries.remove(idx);
        Ok(())
    }

    /// Mark tools as immutable.
    pub fn mark_immutable(&self, names: &[&str]) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for entry in entries.iter_mut() {
            if names.contains(&entry.tool.name().as_str()) {
                entry.immutable = true;
            }
        }
    }

    /// Remove every registration from a source (ignores immutability; used
    /// when re-wiring MCP tools after their clients were shut down).
    pub fn remove_where_source(&self, source: ToolSource) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.retain(|e| e.source != source);
    }

    /// Look up a tool.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .find(|e| e.tool.name() == name)
            .map(|e| Arc::clone(&e.tool))
    }

    /// The source of a registration.
    #[must_use]
    pub fn source_of(&self, name: &str) -> Option<ToolSource> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .find(|e| e.tool.name() == name)
            .map(|e| e.source)
    }

    /// Registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|e| e.tool.name())
            .collect()
    }

    /// Export definitions for the LLM, in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|e| {
                ToolDefinition::new(e.tool.name(), e.tool.description(), e.tool.input_schema())
            })
            .collect()
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolInvocation;
    use async_trait::async_trait;

    struct FakeTool(&'static str);

    #[async_trait]
    impl Tool for FakeTool {
        fn name(&self) -> String {
            self.0.to_string()
        }
        fn description(&self) -> String {
            "fake".to_string()
        }
        fn input_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn call(&self, _args: Value, _inv: &ToolInvocation) -> crate::ToolResult {
            Ok("ok".to_string())
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(FakeTool("Read")), ToolSource::Builtin, Default::default())
            .unwrap();

        assert!(registry.get("Read").is_some());
        assert_eq!(registry.source_of("Read"), Some(ToolSource::Builtin));
        assert!(registry.get("Write").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(FakeTool("Read")), ToolSource::Builtin, Default::default())
            .unwrap();
        let err = registry
            .register(Arc::new(FakeTool("Read")), ToolSource::Plugin, Default::default())
            .unwrap_err();
        assert!(matches!(err, ToolError::Registry(_)));
    }

    #[test]
    fn test_immutable_cannot_be_removed() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(FakeTool("LoadSkill")), ToolSource::Plugin, Default::default())
            .unwrap();
        registry.mark_immutable(&["LoadSkill"]);

        assert!(registry.remove("LoadSkill").is_err());
        assert!(registry.get("LoadSkill").is_some());
    }

    #[test]
    fn test_remove() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(FakeTool("Read")), ToolSource::Builtin, Default::default())
            .unwrap();
        registry.remove("Read").unwrap();
        assert!(registry.is_empty());
        assert!(registry.remove("Read").is_err());
    }

    #[test]
    fn test_definitions_preserve_registration_order() {
        let registry = ToolRegistry::new();
        for name in ["Read", "Write", "Bash"] {
            registry
                .register(Arc::new(FakeTool(name)), ToolSource::Builtin, Default::default())
                .unwrap();
        }
        let names: Vec<String> = registry.definitions().iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["Read", "Write", "Bash"]);
    }
}
