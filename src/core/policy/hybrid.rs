use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    DeadlinePolicy, DecisionCounter, PolicyStats, PriorityPolicy, RoundRobinPolicy,
    SchedulingPolicy,
};
use crate::core::task::Task;
use crate::util::serde::TaskId;

/// Default number of selections per phase.
pub const DEFAULT_PHASE_LENGTH: u32 = 10;

/// Policy currently delegated to by [`HybridPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HybridPhase {
    /// Aged priority.
    Priority,
    /// Earliest deadline first.
    Deadline,
    /// Round robin.
    RoundRobin,
}

impl HybridPhase {
    /// Phase that follows `self`.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Priority => Self::Deadline,
            Self::Deadline => Self::RoundRobin,
            Self::RoundRobin => Self::Priority,
        }
    }

    /// Snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::Deadline => "deadline",
            Self::RoundRobin => "round_robin",
        }
    }
}

impl fmt::Display for HybridPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delegates to priority, deadline, then round-robin, switching after every
/// `phase_length` selections.
#[derive(Debug, Clone)]
pub struct HybridPolicy {
    priority: PriorityPolicy,
    deadline: DeadlinePolicy,
    round_robin: RoundRobinPolicy,
    phase: HybridPhase,
    phase_counter: u32,
    phase_length: u32,
    last_delegate: Option<HybridPhase>,
    counter: DecisionCounter,
}

impl Default for HybridPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PHASE_LENGTH)
    }
}

impl HybridPolicy {
    /// Hybrid over default-configured children. A zero phase length is
    /// treated as one.
    #[must_use]
    pub fn new(phase_length: u32) -> Self {
        Self::with_policies(
            phase_length,
            PriorityPolicy::default(),
            DeadlinePolicy::default(),
            RoundRobinPolicy::default(),
        )
    }

    /// Hybrid over explicitly configured children.
    #[must_use]
    pub fn with_policies(
        phase_length: u32,
        priority: PriorityPolicy,
        deadline: DeadlinePolicy,
        round_robin: RoundRobinPolicy,
    ) -> Self {
        Self {
            priority,
            deadline,
            round_robin,
            phase: HybridPhase::Priority,
            phase_counter: 0,
            phase_length: phase_length.max(1),
            last_delegate: None,
            counter: DecisionCounter::default(),
        }
    }

    /// Active phase.
    #[must_use]
    pub const fn phase(&self) -> HybridPhase {
        self.phase
    }

    fn delegate(&mut self, phase: HybridPhase) -> &mut dyn SchedulingPolicy {
        match phase {
            HybridPhase::Priority => &mut self.priority,
            HybridPhase::Deadline => &mut self.deadline,
            HybridPhase::RoundRobin => &mut self.round_robin,
        }
    }
}

impl SchedulingPolicy for HybridPolicy {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn select_next(&mut self, ready: &[&Task], now_ms: u128) -> Option<TaskId> {
        if ready.is_empty() {
            return None;
        }
        let phase = self.phase;
        let selected = self.delegate(phase).select_next(ready, now_ms)?;
        self.last_delegate = Some(phase);

        self.phase_counter += 1;
        if self.phase_counter >= self.phase_length {
            self.phase_counter = 0;
            self.phase = self.phase.next();
            debug!(phase = %self.phase, "hybrid policy switched phase");
        }
        Some(selected)
    }

    fn record_decision(&mut self, latency: Duration) {
        self.counter.record(latency);
        if let Some(phase) = self.last_delegate {
            self.delegate(phase).record_decision(latency);
        }
    }

    fn forget(&mut self, id: TaskId) {
        self.priority.forget(id);
        self.deadline.forget(id);
        self.round_robin.forget(id);
    }

    fn stats(&self) -> PolicyStats {
        let mut stats = self.counter.snapshot(self.name());
        stats.phase = Some(self.phase.to_string());
        stats.children = vec![
            self.priority.stats(),
            self.deadline.stats(),
            self.round_robin.stats(),
        ];
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::task;
    use super::*;
    use crate::util::serde::Priority;

    #[test]
    fn test_phases_rotate_after_phase_length() {
        let a = task("a", Priority::Low, 0);
        let b = task("b", Priority::High, 1);
        let ready = [&a, &b];
        let mut policy = HybridPolicy::new(2);

        let mut phases = Vec::new();
        for i in 0..7 {
            phases.push(policy.phase());
            policy.select_next(&ready, i).unwrap();
        }
        assert_eq!(
            phases,
            vec![
                HybridPhase::Priority,
                HybridPhase::Priority,
                HybridPhase::Deadline,
                HybridPhase::Deadline,
                HybridPhase::RoundRobin,
                HybridPhase::RoundRobin,
                HybridPhase::Priority,
            ]
        );
    }

    #[test]
    fn test_stats_include_children() {
        let a = task("a", Priority::Normal, 0);
        let mut policy = HybridPolicy::new(1);
        policy.select_next(&[&a], 0).unwrap();
        policy.record_decision(Duration::from_micros(5));

        let stats = policy.stats();
        assert_eq!(stats.decisions, 1);
        assert_eq!(stats.phase.as_deref(), Some("deadline"));
        assert_eq!(stats.children.len(), 3);
        assert_eq!(stats.children[0].name, "priority");
        assert_eq!(stats.children[0].decisions, 1);
        assert_eq!(stats.children[1].decisions, 0);
    }
}
