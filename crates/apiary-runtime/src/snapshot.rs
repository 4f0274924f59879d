//! Swarm snapshots: persist and restore conversations.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use apiary_llm::{Message, TokenUsage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RuntimeError, RuntimeResult};
use crate::swarm::Swarm;

/// The snapshot schema version this build reads and writes.
pub const SNAPSHOT_VERSION: u32 = 2;

/// Serialized state of one agent instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Full message history (system prompt first when present; reminders are
    /// never part of history, so none appear here).
    pub conversation: Vec<Message>,
    /// The system prompt, duplicated for convenient inspection.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// TodoWrite recency marker.
    #[serde(default)]
    pub last_todowrite_index: Option<usize>,
    /// Accumulated output tokens.
    #[serde(default)]
    pub cumulative_output_tokens: u64,
    /// Accumulated cache-creation tokens.
    #[serde(default)]
    pub cumulative_cache_creation_tokens: u64,
    /// Usage of the most recent assistant message.
    #[serde(default)]
    pub last_usage: TokenUsage,
    /// Accumulated cost.
    #[serde(default)]
    pub total_cost: f64,
    /// Read-tracking digests (path, sha256).
    #[serde(default)]
    pub read_tracking: Vec<(String, String)>,
}

/// Snapshot metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
    /// The swarm id at snapshot time.
    pub swarm_id: String,
}

/// A complete swarm snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmSnapshot {
    /// Schema version; restore rejects anything but [`SNAPSHOT_VERSION`].
    pub version: u32,
    /// Snapshot kind (`swarm`); compared case-insensitively on restore.
    #[serde(rename = "type")]
    pub kind: String,
    /// The swarm name.
    pub swarm_name: String,
    /// Primary agents by name.
    pub agents: BTreeMap<String, AgentSnapshot>,
    /// Isolated delegation instances by `"<delegate>@<delegator>"` key.
    #[serde(default)]
    pub delegations: BTreeMap<String, AgentSnapshot>,
    /// Scratchpad contents.
    #[serde(default)]
    pub scratchpad: BTreeMap<String, String>,
    /// Opaque plugin state by plugin name.
    #[serde(default)]
    pub plugin_states: BTreeMap<String, serde_json::Value>,
    /// Metadata.
    pub metadata: SnapshotMetadata,
}

impl Swarm {
    /// Take a snapshot of every live conversation.
    ///
    /// Uninitialized lazy delegation instances are skipped (they have no
    /// history yet).
    pub async fn snapshot(&self) -> SwarmSnapshot {
        let mut agents = BTreeMap::new();
        for (name, chat) in self.core.agents.read().await.iter() {
            agents.insert(name.clone(), chat.export_state().await);
        }

        let mut delegations = BTreeMap::new();
        for (key, lazy) in self.core.delegation_instances.read().await.iter() {
            if let Some(chat) = lazy.chat() {
                delegations.insert(key.clone(), chat.export_state().await);
            }
        }

        let mut plugin_states = BTreeMap::new();
        for plugin in self.core.plugins.all() {
            if let Some(state) = plugin.snapshot_state() {
                plugin_states.insert(plugin.name().to_string(), state);
            }
        }

        SwarmSnapshot {
            version: SNAPSHOT_VERSION,
            kind: "swarm".to_string(),
            swarm_name: self.core.name.clone(),
            agents,
            delegations,
            scratchpad: self.core.scratchpad.export(),
            plugin_states,
            metadata: SnapshotMetadata {
                created_at: Utc::now(),
                swarm_id: self.core.swarm_id.to_string(),
            },
        }
    }

    /// Restore conversations from a snapshot.
    ///
    /// Unknown agents and delegation keys are skipped with a warning; the
    /// rest is restored. The agent graph is initialized first when needed.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::State`] on a version or kind mismatch, and
    /// initialization errors when the graph cannot be wired.
    pub async fn restore(&self, snapshot: &SwarmSnapshot) -> RuntimeResult<()> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RuntimeError::State {
                message: format!(
                    "unsupported snapshot version {}; this build supports version {SNAPSHOT_VERSION}",
                    snapshot.version
                ),
            });
        }
        // The source serialized this field sometimes as a symbol and
        // sometimes as a string; both forms compare equal here.
        if !snapshot.kind.eq_ignore_ascii_case("swarm") {
            return Err(RuntimeError::State {
                message: format!("snapshot kind {:?} is not a swarm snapshot", snapshot.kind),
            });
        }

        self.ensure_initialized().await?;

        let agents = self.core.agents.read().await.clone();
        for (name, agent_snapshot) in &snapshot.agents {
            match agents.get(name) {
                Some(chat) => chat.import_state(agent_snapshot).await,
                None => {
                    warn!(agent = %name, "Snapshot names an unknown agent; skipping");
                }
            }
        }

        let instances = self.core.delegation_instances.read().await.clone();
        for (key, instance_snapshot) in &snapshot.delegations {
            match instances.get(key) {
                Some(lazy) => {
                    let ctx = apiary_core::ExecutionContext::root(self.core.swarm_id.clone());
                    let stream =
                        apiary_events::LogStream::new(ctx, std::sync::Arc::clone(&self.core.collector));
                    let env = crate::env::ExecutionEnv::new(stream, self.core.llm_permits);
                    match lazy.get_or_init(&env).await {
                        Ok(chat) => chat.import_state(instance_snapshot).await,
                        Err(error) => {
                            warn!(key = %key, error = %error, "Could not initialize delegation instance for restore");
                        }
                    }
                }
                None => {
                    warn!(key = %key, "Snapshot names an unknown delegation instance; skipping");
                }
            }
        }

        self.core.scratchpad.import(snapshot.scratchpad.clone());

        for (name, state) in &snapshot.plugin_states {
            if let Some(plugin) = self.core.plugins.get(name) {
                plugin.restore_state(state);
            } else {
                warn!(plugin = %name, "Snapshot carries state for an unknown plugin; skipping");
            }
        }

        Ok(())
    }

    /// Write a snapshot to disk atomically (temp file + rename).
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::State`] on serialization or I/O failure.
    pub async fn persist_snapshot(&self, path: impl AsRef<Path>) -> RuntimeResult<()> {
        let snapshot = self.snapshot().await;
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(&snapshot).map_err(|e| RuntimeError::State {
            message: format!("failed to serialize snapshot: {e}"),
        })?;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| RuntimeError::State {
            message: format!("failed to create temp snapshot file: {e}"),
        })?;
        temp.write_all(&json).map_err(|e| RuntimeError::State {
            message: format!("failed to write snapshot: {e}"),
        })?;
        temp.persist(path).map_err(|e| RuntimeError::State {
            message: format!("failed to persist snapshot to {}: {e}", path.display()),
        })?;
        Ok(())
    }

    /// Load a snapshot from disk.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::State`] on I/O or parse failure.
    pub fn load_snapshot(path: impl AsRef<Path>) -> RuntimeResult<SwarmSnapshot> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| RuntimeError::State {
            message: format!("failed to read snapshot {}: {e}", path.as_ref().display()),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| RuntimeError::State {
            message: format!("failed to parse snapshot: {e}"),
        })
    }
}
