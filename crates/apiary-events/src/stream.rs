//! The one-line emitter handed to every component.

use std::sync::Arc;

use apiary_core::ExecutionContext;
use chrono::Utc;

use crate::collector::LogCollector;
use crate::entry::LogEntry;

/// Cheap-clone emitter bound to an execution context.
///
/// `emit` normalizes the entry (timestamp, `swarm_id`, `parent_swarm_id`,
/// `execution_id`) before forwarding to the shared [`LogCollector`]. Nested
/// executions call [`LogStream::child`] to derive a stream for the child
/// context; the parent's stream is untouched, so no restore step is needed.
#[derive(Debug, Clone)]
pub struct LogStream {
    context: ExecutionContext,
    collector: Arc<LogCollector>,
}

impl LogStream {
    /// Bind a context to a collector.
    #[must_use]
    pub fn new(context: ExecutionContext, collector: Arc<LogCollector>) -> Self {
        Self { context, collector }
    }

    /// The execution context this stream stamps onto entries.
    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// The underlying collector.
    #[must_use]
    pub fn collector(&self) -> &Arc<LogCollector> {
        &self.collector
    }

    /// Derive a stream for a nested execution context, sharing the collector.
    #[must_use]
    pub fn child(&self, context: ExecutionContext) -> Self {
        Self {
            context,
            collector: Arc::clone(&self.collector),
        }
    }

    /// Normalize and emit an entry.
    pub fn emit(&self, mut entry: LogEntry) {
        if entry.timestamp.is_none() {
            entry.timestamp = Some(Utc::now());
        }
        if entry.swarm_id.is_none() {
            entry.swarm_id = Some(self.context.swarm_id.to_string());
        }
        if entry.parent_swarm_id.is_none() {
            entry.parent_swarm_id = self
                .context
                .parent_swarm_id
                .as_ref()
                .map(ToString::to_string);
        }
        if entry.execution_id.is_none() {
            entry.execution_id = Some(self.context.execution_id.to_string());
        }
        self.collector.emit(entry);
    }

    /// Emit an error-shaped entry.
    pub fn emit_error(&self, entry_type: impl Into<String>, message: impl Into<String>) {
        self.emit(LogEntry::new(entry_type).with_field("error", message.into()));
    }
}
