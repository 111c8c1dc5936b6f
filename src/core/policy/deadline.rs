use std::time::Duration;

use tracing::debug;

use super::{select_by_score, DecisionCounter, PolicyStats, SchedulingPolicy};
use crate::core::task::Task;
use crate::util::clock::seconds_between;
use crate::util::serde::TaskId;

/// Default weight of deadline proximity.
pub const DEFAULT_DEADLINE_WEIGHT: f64 = 1.0;
/// Default weight of the priority ordinal.
pub const DEFAULT_PRIORITY_WEIGHT: f64 = 0.3;
/// Added to the score of a task whose deadline has passed.
pub const OVERDUE_BONUS: f64 = 1000.0;
/// Deadline component of a task without a deadline.
pub const NO_DEADLINE_SCORE: f64 = 0.1;

/// Earliest-deadline-first with a priority component.
///
/// `score = deadline_weight / (remaining_secs + 1) + priority_weight * ordinal`,
/// where an overdue task gets [`OVERDUE_BONUS`] instead of the proximity term
/// and a task without a deadline gets [`NO_DEADLINE_SCORE`]. Ties go to the
/// earliest deadline, then the earliest submission.
#[derive(Debug, Clone)]
pub struct DeadlinePolicy {
    deadline_weight: f64,
    priority_weight: f64,
    counter: DecisionCounter,
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DEADLINE_WEIGHT, DEFAULT_PRIORITY_WEIGHT)
    }
}

impl DeadlinePolicy {
    /// Create a policy with explicit weights.
    #[must_use]
    pub fn new(deadline_weight: f64, priority_weight: f64) -> Self {
        Self {
            deadline_weight,
            priority_weight,
            counter: DecisionCounter::default(),
        }
    }

    /// Score of `task` at `now_ms`.
    #[must_use]
    pub fn score(&self, task: &Task, now_ms: u128) -> f64 {
        let urgency = task.deadline_ms().map_or(NO_DEADLINE_SCORE, |deadline| {
            let remaining = seconds_between(now_ms, deadline);
            if remaining <= 0.0 {
                OVERDUE_BONUS
            } else {
                self.deadline_weight / (remaining + 1.0)
            }
        });
        urgency + self.priority_weight * f64::from(task.priority().ordinal())
    }
}

impl SchedulingPolicy for DeadlinePolicy {
    fn name(&self) -> &'static str {
        "deadline"
    }

    fn select_next(&mut self, ready: &[&Task], now_ms: u128) -> Option<TaskId> {
        let selected = select_by_score(
            ready,
            |task| self.score(task, now_ms),
            |task| (task.deadline_ms().unwrap_or(u128::MAX), task.seq()),
        )?;
        debug!(task_id = %selected, candidates = ready.len(), "deadline policy selected task");
        Some(selected)
    }

    fn record_decision(&mut self, latency: Duration) {
        self.counter.record(latency);
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

    const NOW: u128 = 1_700_000_000_000;

    #[test]
    fn test_earlier_deadline_wins() {
        let late = task("late", Priority::Normal, 0).with_deadline_ms(NOW + 2 * 3_600_000);
        let early = task("early", Priority::Normal, 1).with_deadline_ms(NOW + 30_000);
        let mut policy = DeadlinePolicy::default();
        assert_eq!(policy.select_next(&[&late, &early], NOW), Some(early.id()));
    }

    #[test]
    fn test_overdue_outranks_everything() {
        let overdue = task("overdue", Priority::Low, 0).with_deadline_ms(NOW - 1);
        let urgent = task("urgent", Priority::Urgent, 1).with_deadline_ms(NOW + 1_000);
        let mut policy = DeadlinePolicy::default();
        assert_eq!(policy.select_next(&[&urgent, &overdue], NOW), Some(overdue.id()));
    }

    #[test]
    fn test_no_deadline_scores_constant() {
        let plain = task("plain", Priority::High, 0);
        let policy = DeadlinePolicy::default();
        let expected = NO_DEADLINE_SCORE + DEFAULT_PRIORITY_WEIGHT * 3.0;
        assert!((policy.score(&plain, NOW) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ties_prefer_earliest_deadline_then_submission() {
        // Both overdue with equal priority: identical scores.
        let older_deadline = task("a", Priority::Normal, 5).with_deadline_ms(NOW - 10_000);
        let newer_deadline = task("b", Priority::Normal, 1).with_deadline_ms(NOW - 5_000);
        let mut policy = DeadlinePolicy::default();
        assert_eq!(
            policy.select_next(&[&newer_deadline, &older_deadline], NOW),
            Some(older_deadline.id())
        );

        let first = task("first", Priority::Normal, 0);
        let second = task("second", Priority::Normal, 1);
        assert_eq!(policy.select_next(&[&second, &first], NOW), Some(first.id()));
    }
}
