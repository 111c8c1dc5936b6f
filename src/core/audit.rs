//! Audit trail of task lifecycle actions.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::clock::now_ms;
use crate::util::serde::TaskId;

/// Lifecycle action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Task accepted by `submit`.
    Submit,
    /// Task entered the ready set.
    Ready,
    /// Task is waiting on dependencies.
    Blocked,
    /// Task dispatched to a worker.
    Start,
    /// Task completed.
    Complete,
    /// Task failed.
    Fail,
    /// Failed task re-entered the ready set.
    Retry,
    /// Task cancelled.
    Cancel,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Submit => "submit",
            Self::Ready => "ready",
            Self::Blocked => "blocked",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::Retry => "retry",
            Self::Cancel => "cancel",
        })
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Record identifier.
    pub event_id: String,
    /// Task the action applies to.
    pub task_id: TaskId,
    /// Task name at the time of the action.
    pub task_name: String,
    /// Action taken.
    pub action: AuditAction,
    /// Timestamp (ms since epoch).
    pub created_at_ms: u128,
    /// Additional context, such as an error message.
    pub detail: Option<String>,
}

/// Destination for audit records.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// Bounded in-memory sink. Clones share the same buffer, so a caller can
/// keep one handle and give another to the scheduler.
#[derive(Debug, Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a sink keeping at most `max_events` records; the oldest are
    /// evicted first.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Snapshot of stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Actions recorded for one task, oldest first.
    #[must_use]
    pub fn actions_for(&self, task_id: TaskId) -> Vec<AuditAction> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.task_id == task_id)
            .map(|event| event.action)
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Build an audit event stamped with a fresh identifier and the current time.
pub fn build_audit_event(
    task_id: TaskId,
    task_name: impl Into<String>,
    action: AuditAction,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: Uuid::new_v4().to_string(),
        task_id,
        task_name: task_name.into(),
        action,
        created_at_ms: now_ms(),
        detail,
    }
}
