use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use super::{select_by_score, DecisionCounter, PolicyStats, SchedulingPolicy};
use crate::core::task::Task;
use crate::util::serde::TaskId;

/// Default aging increment per selection spent waiting.
pub const DEFAULT_AGING_FACTOR: f64 = 0.1;

/// Highest `priority + wait * aging_factor` first, oldest submission on ties.
///
/// A task's wait counter starts at zero the first time it is seen, grows by
/// one on every later `select_next` call that passes it over, and resets
/// when it is chosen. Aging is counted per selection, not per scheduler
/// tick, so a tick that dispatches several tasks ages the rest several
/// times.
#[derive(Debug, Clone)]
pub struct PriorityPolicy {
    aging_factor: f64,
    wait: HashMap<TaskId, f64>,
    counter: DecisionCounter,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_AGING_FACTOR)
    }
}

impl PriorityPolicy {
    /// Create a policy with the given aging factor. Zero disables aging.
    #[must_use]
    pub fn new(aging_factor: f64) -> Self {
        Self {
            aging_factor,
            wait: HashMap::new(),
            counter: DecisionCounter::default(),
        }
    }

    /// Current wait counter of a task.
    #[must_use]
    pub fn wait_time(&self, id: TaskId) -> f64 {
        self.wait.get(&id).copied().unwrap_or(0.0)
    }

    fn effective_priority(&self, task: &Task) -> f64 {
        f64::from(task.priority().ordinal()) + self.wait_time(task.id()) * self.aging_factor
    }
}

impl SchedulingPolicy for PriorityPolicy {
    fn name(&self) -> &'static str {
        "priority"
    }

    fn select_next(&mut self, ready: &[&Task], _now_ms: u128) -> Option<TaskId> {
        let selected = select_by_score(ready, |task| self.effective_priority(task), Task::seq)?;

        for task in ready {
            self.wait
                .entry(task.id())
                .and_modify(|wait| *wait += 1.0)
                .or_insert(0.0);
        }
        self.wait.insert(selected, 0.0);

        debug!(task_id = %selected, candidates = ready.len(), "priority policy selected task");
        Some(selected)
    }

    fn record_decision(&mut self, latency: Duration) {
        self.counter.record(latency);
    }

    fn forget(&mut self, id: TaskId) {
        self.wait.remove(&id);
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
    fn test_orders_by_priority_without_aging() {
        let low = task("low", Priority::Low, 0);
        let high = task("high", Priority::High, 1);
        let normal = task("normal", Priority::Normal, 2);
        let mut policy = PriorityPolicy::new(0.0);

        let mut ready = vec![&low, &high, &normal];
        let mut order = Vec::new();
        while let Some(id) = policy.select_next(&ready, 0) {
            order.push(id);
            ready.retain(|t| t.id() != id);
        }
        assert_eq!(order, vec![high.id(), normal.id(), low.id()]);
    }

    #[test]
    fn test_ties_go_to_earliest_submission() {
        let first = task("first", Priority::Normal, 3);
        let second = task("second", Priority::Normal, 7);
        let mut policy = PriorityPolicy::default();
        assert_eq!(policy.select_next(&[&second, &first], 0), Some(first.id()));
    }

    #[test]
    fn test_aging_lets_waiting_task_overtake() {
        let low = task("low", Priority::Low, 0);
        let mut policy = PriorityPolicy::new(0.5);

        // Fresh NORMAL tasks beat LOW until 1 + 0.5 * wait reaches 2; LOW
        // then wins the tie as the older submission.
        let mut picked_low_at = None;
        for round in 0..10u64 {
            let normal = task("normal", Priority::Normal, round + 1);
            let selected = policy.select_next(&[&low, &normal], 0);
            if selected == Some(low.id()) {
                picked_low_at = Some(round);
                break;
            }
        }
        assert_eq!(picked_low_at, Some(3));
        assert!(policy.wait_time(low.id()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_ready_set() {
        let mut policy = PriorityPolicy::default();
        assert_eq!(policy.select_next(&[], 0), None);
    }
}
