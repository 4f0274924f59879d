//! The default emitter: filtered subscriptions plus a capture buffer.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::Mutex;

use dashmap::DashMap;
use tracing::warn;
use uuid::Uuid;

use crate::entry::LogEntry;
use crate::filter::LogFilter;

/// Identifier returned by [`LogCollector::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Callback = Arc<dyn Fn(&LogEntry) + Send + Sync>;

/// A registered subscription: a filter plus a callback.
#[derive(Clone)]
pub struct Subscription {
    /// Subscription id.
    pub id: SubscriptionId,
    filter: LogFilter,
    callback: Callback,
    seq: u64,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// Collects entries and delivers them to subscribers.
///
/// Delivery is synchronous within the emitting task, in emit order. A
/// subscriber that panics is isolated (logged via `tracing`) and does not
/// break other subscribers. Every emitted entry is also appended to an
/// internal buffer so that an execution can collect its own log afterwards.
#[derive(Default)]
pub struct LogCollector {
    subscriptions: DashMap<SubscriptionId, Subscription>,
    entries: Mutex<Vec<LogEntry>>,
    next_seq: Mutex<u64>,
}

impl std::fmt::Debug for LogCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogCollector")
            .field("subscriptions", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}

impl LogCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription.
    pub fn subscribe(
        &self,
        filter: LogFilter,
        callback: impl Fn(&LogEntry) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId::new();
        let seq = {
            let mut next = self.next_seq.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let current = *next;
            *next = next.saturating_add(1);
            current
        };
        self.subscriptions.insert(
            id,
            Subscription {
                id,
                filter,
                callback: Arc::new(callback),
                seq,
            },
        );
        id
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Deliver an entry to all matching subscribers and record it.
    pub fn emit(&self, entry: LogEntry) {
        // Snapshot in registration order so delivery order is stable even
        // though DashMap iteration order is not.
        let mut subs: Vec<Subscription> = self
            .subscriptions
            .iter()
            .map(|r| r.value().clone())
            .collect();
        subs.sort_by_key(|s| s.seq);

        for sub in &subs {
            if !sub.filter.matches(&entry) {
                continue;
            }
            let callback = Arc::clone(&sub.callback);
            if catch_unwind(AssertUnwindSafe(|| callback(&entry))).is_err() {
                warn!(
                    subscription = %sub.id,
                    entry_type = %entry.entry_type,
                    "Log subscriber panicked; continuing with remaining subscribers"
                );
            }
        }

        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(entry);
    }

    /// All entries recorded so far.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Entries belonging to one execution, in emit order.
    #[must_use]
    pub fn entries_for(&self, execution_id: &str) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|e| e.execution_id.as_deref() == Some(execution_id))
            .cloned()
            .collect()
    }

    /// Atomically remove and return one execution's entries, in emit order.
    ///
    /// The executor drains a finished execution into its result, so the
    /// shared buffer stays bounded across repeated `execute` calls on a
    /// long-lived swarm.
    pub fn drain_for(&self, execution_id: &str) -> Vec<LogEntry> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut drained = Vec::new();
        let mut kept = Vec::with_capacity(entries.len());
        for entry in entries.drain(..) {
            if entry.execution_id.as_deref() == Some(execution_id) {
                drained.push(entry);
            } else {
                kept.push(entry);
            }
        }
        *entries = kept;
        drained
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscribe_and_emit() {
        let collector = LogCollector::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        collector.subscribe(LogFilter::all().entry_type("tool_call"), move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        collector.emit(LogEntry::new("tool_call"));
        collector.emit(LogEntry::new("tool_result"));
        collector.emit(LogEntry::new("tool_call"));

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(collector.entries().len(), 3);
    }

    #[test]
    fn test_unsubscribe() {
        let collector = LogCollector::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let id = collector.subscribe(LogFilter::all(), move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        collector.emit(LogEntry::new("a"));
        assert!(collector.unsubscribe(id));
        collector.emit(LogEntry::new("b"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!collector.unsubscribe(id));
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let collector = LogCollector::new();
        let count = Arc::new(AtomicUsize::new(0));

        collector.subscribe(LogFilter::all(), |_| {
            panic!("bad subscriber");
        });
        let count_clone = Arc::clone(&count);
        collector.subscribe(LogFilter::all(), move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        collector.emit(LogEntry::new("event"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let collector = LogCollector::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            collector.subscribe(LogFilter::all(), move |_| {
                order.lock().unwrap().push(tag);
            });
        }

        collector.emit(LogEntry::new("event"));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_entries_for_execution() {
        let collector = LogCollector::new();
        let mut a = LogEntry::new("x");
        a.execution_id = Some("exec_1".into());
        let mut b = LogEntry::new("y");
        b.execution_id = Some("exec_2".into());
        collector.emit(a);
        collector.emit(b);

        let entries = collector.entries_for("exec_1");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, "x");
    }

    #[test]
    fn test_drain_for_removes_only_that_execution() {
        let collector = LogCollector::new();
        for (ty, exec) in [("a1", "exec_1"), ("b1", "exec_2"), ("a2", "exec_1")] {
            let mut entry = LogEntry::new(ty);
            entry.execution_id = Some(exec.into());
            collector.emit(entry);
        }

        let drained = collector.drain_for("exec_1");
        let types: Vec<&str> = drained.iter().map(|e| e.entry_type.as_str()).collect();
        assert_eq!(types, vec!["a1", "a2"]);

        // Drained entries are gone; the other execution is untouched.
        assert!(collector.drain_for("exec_1").is_empty());
        assert_eq!(collector.entries().len(), 1);
        assert_eq!(collector.entries_for("exec_2").len(), 1);
    }
}
