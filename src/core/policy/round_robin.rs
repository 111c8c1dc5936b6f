use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use super::{DecisionCounter, PolicyStats, SchedulingPolicy};
use crate::core::task::Task;
use crate::util::serde::TaskId;

/// Default time slice between two selections of the same task.
pub const DEFAULT_TIME_SLICE: Duration = Duration::from_secs(10);

/// Rotates a cursor over the tasks whose time slice has elapsed.
///
/// A task is eligible if it was never selected or its last selection is at
/// least `time_slice` old. When nothing is eligible the slice history is
/// cleared and the whole ready set is used with the cursor back at zero.
#[derive(Debug, Clone)]
pub struct RoundRobinPolicy {
    time_slice_ms: u128,
    cursor: usize,
    last_selected: HashMap<TaskId, u128>,
    counter: DecisionCounter,
}

impl Default for RoundRobinPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_SLICE)
    }
}

impl RoundRobinPolicy {
    /// Create a policy with the given time slice.
    #[must_use]
    pub fn new(time_slice: Duration) -> Self {
        Self {
            time_slice_ms: time_slice.as_millis(),
            cursor: 0,
            last_selected: HashMap::new(),
            counter: DecisionCounter::default(),
        }
    }

    fn is_eligible(&self, id: TaskId, now_ms: u128) -> bool {
        self.last_selected
            .get(&id)
            .is_none_or(|last| now_ms.saturating_sub(*last) >= self.time_slice_ms)
    }
}

impl SchedulingPolicy for RoundRobinPolicy {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn select_next(&mut self, ready: &[&Task], now_ms: u128) -> Option<TaskId> {
        if ready.is_empty() {
            return None;
        }

        let mut eligible: Vec<TaskId> = ready
            .iter()
            .map(|task| task.id())
            .filter(|id| self.is_eligible(*id, now_ms))
            .collect();
        if eligible.is_empty() {
            self.last_selected.clear();
            self.cursor = 0;
            eligible = ready.iter().map(|task| task.id()).collect();
        }

        if self.cursor >= eligible.len() {
            self.cursor = 0;
        }
        let selected = eligible[self.cursor];
        self.cursor = (self.cursor + 1) % eligible.len();
        self.last_selected.insert(selected, now_ms);

        debug!(task_id = %selected, eligible = eligible.len(), "round-robin policy selected task");
        Some(selected)
    }

    fn record_decision(&mut self, latency: Duration) {
        self.counter.record(latency);
    }

    fn forget(&mut self, id: TaskId) {
        self.last_selected.remove(&id);
    }

    fn stats(&self) -> PolicyStats {
        self.counter.snapshot(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::task;
    use super::*;
    use crate::util::serde::Priority;

    #[test]
    fn test_cycles_in_submission_order() {
        let a = task("a", Priority::Normal, 0);
        let b = task("b", Priority::Normal, 1);
        let c = task("c", Priority::Normal, 2);
        let ready = [&a, &b, &c];
        let mut policy = RoundRobinPolicy::new(Duration::ZERO);

        let picks: Vec<TaskId> = (0..4)
            .filter_map(|i| policy.select_next(&ready, 1_000 + i))
            .collect();
        assert_eq!(picks, vec![a.id(), b.id(), c.id(), a.id()]);
    }

    #[test]
    fn test_skips_tasks_inside_their_slice() {
        let a = task("a", Priority::Normal, 0);
        let b = task("b", Priority::Normal, 1);
        let ready = [&a, &b];
        let mut policy = RoundRobinPolicy::new(Duration::from_secs(10));

        assert_eq!(policy.select_next(&ready, 0), Some(a.id()));
        // Only b is eligible; cursor 1 wraps to 0 over the one-element list.
        assert_eq!(policy.select_next(&ready, 1), Some(b.id()));
        // Nobody is eligible: history resets and the cursor restarts.
        assert_eq!(policy.select_next(&ready, 2), Some(a.id()));
        // b lost its history in the reset; a was picked 9.999s ago.
        assert_eq!(policy.select_next(&ready, 10_001), Some(b.id()));
        assert_eq!(policy.select_next(&ready, 10_002), Some(a.id()));
    }
}
