//! Lifecycle event subscriptions.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::task::{Task, TaskState};
use crate::util::serde::TaskId;

/// Lifecycle events a caller can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Task dispatched to a worker.
    Started,
    /// Task finished successfully.
    Completed,
    /// Task finished with an execution error.
    Failed,
    /// Task cancelled by the caller.
    Cancelled,
}

impl EventKind {
    /// All event kinds.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Started, Self::Completed, Self::Failed, Self::Cancelled]
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Payload delivered to event handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Event kind.
    pub kind: EventKind,
    /// Affected task.
    pub task_id: TaskId,
    /// Task name.
    pub name: String,
    /// Task state when the event fired.
    pub state: TaskState,
    /// Error message, for `Failed`.
    pub error: Option<String>,
}

impl TaskEvent {
    /// Build an event from the current view of a task.
    #[must_use]
    pub fn from_task(kind: EventKind, task: &Task) -> Self {
        Self {
            kind,
            task_id: task.id(),
            name: task.name().to_string(),
            state: task.state(),
            error: task.error().map(ToString::to_string),
        }
    }
}

/// Event handler. Runs on whichever thread fires the event, outside every
/// scheduler lock.
pub type EventHandler = Arc<dyn Fn(&TaskEvent) + Send + Sync>;

/// Registry of handlers keyed by event kind.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<EventHandler>>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`.
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) {
        self.handlers.write().entry(kind).or_default().push(handler);
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to every handler of its kind. A panicking handler is
    /// logged and does not stop the others.
    pub fn emit(&self, event: &TaskEvent) {
        let handlers = self
            .handlers
            .read()
            .get(&event.kind)
            .cloned()
            .unwrap_or_default();
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!(kind = %event.kind, task_id = %event.task_id, "event handler panicked");
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<EventKind, usize> = self
            .handlers
            .read()
            .iter()
            .map(|(kind, handlers)| (*kind, handlers.len()))
            .collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_handlers_receive_matching_events_only() {
        let bus = EventBus::new();
        let completed = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&completed);
        bus.subscribe(
            EventKind::Completed,
            Arc::new(move |_event: &TaskEvent| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let task = Task::simulated("job");
        bus.emit(&TaskEvent::from_task(EventKind::Started, &task));
        bus.emit(&TaskEvent::from_task(EventKind::Completed, &task));
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_count(EventKind::Completed), 1);
        assert_eq!(bus.handler_count(EventKind::Failed), 0);
    }

    #[test]
    fn test_panicking_handler_does_not_block_others() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventKind::Failed, Arc::new(|_event: &TaskEvent| panic!("handler bug")));
        let counter = Arc::clone(&calls);
        bus.subscribe(
            EventKind::Failed,
            Arc::new(move |_event: &TaskEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.emit(&TaskEvent::from_task(EventKind::Failed, &Task::simulated("job")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
