//! Pluggable task-selection strategies.
//!
//! A policy sees the ready set in insertion order and returns the identifier
//! of the task to dispatch next. Policy state (aging counters, round-robin
//! cursor, hybrid phase) lives in the policy and changes only while
//! selecting. Decision statistics are advisory and never influence a choice.

mod deadline;
mod hybrid;
mod priority;
mod round_robin;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PolicyConfig;
use crate::core::task::Task;
use crate::util::serde::TaskId;

pub use deadline::DeadlinePolicy;
pub use hybrid::{HybridPhase, HybridPolicy};
pub use priority::PriorityPolicy;
pub use round_robin::RoundRobinPolicy;

/// Strategy that picks the next task from the ready set.
pub trait SchedulingPolicy: Send {
    /// Short policy name used in logs and stats.
    fn name(&self) -> &'static str;

    /// Choose a task from `ready`. Returns `None` only when `ready` is empty.
    fn select_next(&mut self, ready: &[&Task], now_ms: u128) -> Option<TaskId>;

    /// Record how long a decision that led to a dispatch took.
    fn record_decision(&mut self, latency: Duration);

    /// Drop any per-task bookkeeping for a task that left the ready set for
    /// good.
    fn forget(&mut self, _id: TaskId) {}

    /// Decision statistics.
    fn stats(&self) -> PolicyStats;
}

/// Decision statistics reported by a policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyStats {
    /// Policy name.
    pub name: String,
    /// Decisions recorded.
    pub decisions: u64,
    /// Sum of decision latencies in seconds.
    pub total_decision_secs: f64,
    /// Mean decision latency in seconds.
    pub average_decision_secs: f64,
    /// Active phase, for composite policies.
    pub phase: Option<String>,
    /// Statistics of delegated policies.
    pub children: Vec<PolicyStats>,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DecisionCounter {
    decisions: u64,
    total: Duration,
}

impl DecisionCounter {
    pub(crate) fn record(&mut self, latency: Duration) {
        self.decisions += 1;
        self.total += latency;
    }

    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn snapshot(&self, name: &str) -> PolicyStats {
        let total_decision_secs = self.total.as_secs_f64();
        let average_decision_secs = if self.decisions == 0 {
            0.0
        } else {
            total_decision_secs / self.decisions as f64
        };
        PolicyStats {
            name: name.to_string(),
            decisions: self.decisions,
            total_decision_secs,
            average_decision_secs,
            phase: None,
            children: Vec::new(),
        }
    }
}

/// Pick the task with the highest score. Equal scores go to the task with
/// the smallest `tie_key`.
pub(crate) fn select_by_score<S, K, T>(ready: &[&Task], mut score: S, tie_key: T) -> Option<TaskId>
where
    S: FnMut(&Task) -> f64,
    K: Ord,
    T: Fn(&Task) -> K,
{
    ready
        .iter()
        .map(|task| (score(task), tie_key(task), task.id()))
        .max_by(|(score_a, key_a, _), (score_b, key_b, _)| {
            score_a.total_cmp(score_b).then_with(|| key_b.cmp(key_a))
        })
        .map(|(_, _, id)| id)
}

/// Instantiate the policy described by `config`.
#[must_use]
pub fn build_policy(config: &PolicyConfig) -> Box<dyn SchedulingPolicy> {
    match *config {
        PolicyConfig::Priority { aging_factor } => Box::new(PriorityPolicy::new(aging_factor)),
        PolicyConfig::RoundRobin { time_slice_ms } => {
            Box::new(RoundRobinPolicy::new(Duration::from_millis(time_slice_ms)))
        }
        PolicyConfig::Deadline {
            deadline_weight,
            priority_weight,
        } => Box::new(DeadlinePolicy::new(deadline_weight, priority_weight)),
        PolicyConfig::Hybrid { phase_length } => Box::new(HybridPolicy::new(phase_length)),
    }
}
