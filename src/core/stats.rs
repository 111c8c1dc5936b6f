//! Read-only reporting snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::ledger::LedgerStats;
use crate::core::policy::PolicyStats;
use crate::core::task::TaskSnapshot;
use crate::util::serde::TaskId;

/// Number of recently created tasks listed in a [`TaskSummary`].
pub const RECENT_TASKS: usize = 10;

/// Aggregate counters and component statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Tasks accepted by `submit`.
    pub total_submitted: u64,
    /// Attempts that completed.
    pub total_completed: u64,
    /// Attempts that failed.
    pub total_failed: u64,
    /// Tasks cancelled.
    pub total_cancelled: u64,
    /// Retries performed, manual or automatic.
    pub total_retried: u64,
    /// Mean wall time of completed attempts, in seconds.
    pub average_completion_time_secs: f64,
    /// Tasks waiting in the ready set.
    pub ready_tasks: usize,
    /// Tasks holding a worker slot.
    pub running_tasks: usize,
    /// Tasks waiting on dependencies.
    pub blocked_tasks: usize,
    /// Whether the control loop is running.
    pub is_running: bool,
    /// Worker slots.
    pub max_concurrent_tasks: usize,
    /// Active policy statistics.
    pub policy: PolicyStats,
    /// Ledger counters and per-resource utilization.
    pub resources: LedgerStats,
    /// First start of the control loop (ms since epoch).
    pub started_at_ms: Option<u128>,
    /// Seconds since the first start.
    pub uptime_secs: f64,
}

/// Tasks grouped for a quick overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// Total tasks known to the scheduler.
    pub total_tasks: usize,
    /// Count per state label.
    pub by_state: BTreeMap<String, usize>,
    /// Count per priority label.
    pub by_priority: BTreeMap<String, usize>,
    /// Tasks past their deadline that have not completed.
    pub overdue: Vec<TaskId>,
    /// Most recently created tasks, newest first.
    pub recent: Vec<TaskSnapshot>,
}
