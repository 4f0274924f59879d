//! Shared per-agent state handed to tools at invocation time.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Mutex;

use crate::bash::DEFAULT_BASH_TIMEOUT;

/// Tracks content digests of files an agent has read.
///
/// Post-tool hooks and snapshots use this to know what the agent has seen.
#[derive(Debug, Default)]
pub struct ReadTracker {
    digests: DashMap<PathBuf, String>,
}

impl ReadTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the digest of `content` for `path`.
    pub fn record(&self, path: impl Into<PathBuf>, content: &str) {
        let digest = hex::encode(Sha256::digest(content.as_bytes()));
        self.digests.insert(path.into(), digest);
    }

    /// The recorded digest for a path.
    #[must_use]
    pub fn digest(&self, path: &Path) -> Option<String> {
        self.digests.get(path).map(|d| d.clone())
    }

    /// Export all digests (for snapshots).
    #[must_use]
    pub fn export(&self) -> Vec<(String, String)> {
        self.digests
            .iter()
            .map(|e| (e.key().display().to_string(), e.value().clone()))
            .collect()
    }

    /// Import digests (from a snapshot).
    pub fn import(&self, entries: Vec<(String, String)>) {
        for (path, digest) in entries {
            self.digests.insert(PathBuf::from(path), digest);
        }
    }

    /// Number of tracked paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// Whether nothing has been read yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

/// Status of a todo item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    /// Not started yet.
    Pending,
    /// Being worked on.
    InProgress,
    /// Done.
    Completed,
}

/// One entry in an agent's todo list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    /// What needs to be done.
    pub content: String,
    /// Current status.
    pub status: TodoStatus,
    /// Present-continuous form shown while in progress.
    #[serde(default)]
    pub active_form: Option<String>,
}

/// The structured todo list recorded by the `TodoWrite` tool.
#[derive(Debug, Default)]
pub struct TodoStore {
    items: Mutex<Vec<TodoItem>>,
}

impl TodoStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list.
    pub fn set_items(&self, items: Vec<TodoItem>) {
        *self
            .items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = items;
    }

    /// Current items.
    #[must_use]
    pub fn items(&self) -> Vec<TodoItem> {
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_empty()
    }
}

/// Per-agent state available to every tool call.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// The agent's working directory.
    pub directory: PathBuf,
    /// Read digests shared across the agent's tools.
    pub reads: Arc<ReadTracker>,
    /// The agent's todo list.
    pub todos: Arc<TodoStore>,
    /// Default timeout for shell commands.
    pub bash_timeout: Duration,
    /// Upper bound a caller-supplied timeout is clamped to.
    pub bash_timeout_ceiling: Duration,
}

impl ToolInvocation {
    /// Create an invocation context rooted at `directory`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            reads: Arc::new(ReadTracker::new()),
            todos: Arc::new(TodoStore::new()),
            bash_timeout: DEFAULT_BASH_TIMEOUT,
            bash_timeout_ceiling: crate::bash::MAX_BASH_TIMEOUT,
        }
    }

    /// Override the default shell timeout.
    #[must_use]
    pub fn with_bash_timeout(mut self, timeout: Duration) -> Self {
        self.bash_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_tracker_digests() {
        let tracker = ReadTracker::new();
        tracker.record("/tmp/a.txt", "hello");
        tracker.record("/tmp/a.txt", "world");

        let digest = tracker.digest(Path::new("/tmp/a.txt")).unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_read_tracker_export_import() {
        let tracker = ReadTracker::new();
        tracker.record("/tmp/a.txt", "hello");

        let exported = tracker.export();
        let restored = ReadTracker::new();
        restored.import(exported);

        assert_eq!(
            restored.digest(Path::new("/tmp/a.txt")),
            tracker.digest(Path::new("/tmp/a.txt"))
        );
    }

    #[test]
    fn test_todo_store_replace() {
        let store = TodoStore::new();
        assert!(store.is_empty());

        store.set_items(vec![TodoItem {
            content: "write tests".into(),
            status: TodoStatus::Pending,
            active_form: None,
        }]);
        assert_eq!(store.items().len(), 1);
    }
}
