//! Blocked-task bookkeeping and promotion to ready.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::core::error::SchedulerError;
use crate::core::task::{Task, TaskState};
use crate::util::serde::TaskId;

/// Where a freshly submitted task starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Every dependency is completed.
    Ready,
    /// At least one dependency is not completed yet.
    Blocked,
}

/// Tracks `Blocked` tasks and the reverse dependency edges pointing at them.
///
/// Blocked tasks are kept in the order they were blocked, so promotion is
/// deterministic.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    blocked: Vec<TaskId>,
    dependents: HashMap<TaskId, HashSet<TaskId>>,
}

impl DependencyTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that every dependency of `task` is known.
    ///
    /// # Errors
    ///
    /// `Validation` naming the first unknown dependency.
    pub fn validate(task: &Task, table: &HashMap<TaskId, Task>) -> Result<(), SchedulerError> {
        let mut missing: Vec<&TaskId> = task
            .dependencies()
            .iter()
            .filter(|dep| !table.contains_key(dep))
            .collect();
        missing.sort();
        match missing.first() {
            Some(dep) => Err(SchedulerError::Validation(format!(
                "task `{}` depends on unknown task {dep}",
                task.name()
            ))),
            None => Ok(()),
        }
    }

    /// `Ready` iff every dependency is `Completed`.
    #[must_use]
    pub fn classify(task: &Task, table: &HashMap<TaskId, Task>) -> Readiness {
        if Self::dependencies_met(task, table) {
            Readiness::Ready
        } else {
            Readiness::Blocked
        }
    }

    fn dependencies_met(task: &Task, table: &HashMap<TaskId, Task>) -> bool {
        task.dependencies().iter().all(|dep| {
            table
                .get(dep)
                .is_some_and(|dep| dep.state() == TaskState::Completed)
        })
    }

    /// Start tracking a task that was just marked `Blocked`.
    pub fn track(&mut self, task: &Task) {
        if self.blocked.contains(&task.id()) {
            return;
        }
        self.blocked.push(task.id());
        for dep in task.dependencies() {
            self.dependents.entry(*dep).or_default().insert(task.id());
        }
    }

    /// Stop tracking a task (promoted or cancelled).
    pub fn forget(&mut self, id: TaskId) {
        self.blocked.retain(|blocked| *blocked != id);
        self.dependents.retain(|_, waiting| {
            waiting.remove(&id);
            !waiting.is_empty()
        });
    }

    /// Whether `id` is currently tracked as blocked.
    #[must_use]
    pub fn is_blocked(&self, id: TaskId) -> bool {
        self.blocked.contains(&id)
    }

    /// Blocked tasks in the order they were blocked.
    #[must_use]
    pub fn blocked(&self) -> &[TaskId] {
        &self.blocked
    }

    /// Blocked tasks waiting on `id`.
    #[must_use]
    pub fn dependents_of(&self, id: TaskId) -> Vec<TaskId> {
        self.blocked
            .iter()
            .copied()
            .filter(|blocked| self.dependents.get(&id).is_some_and(|set| set.contains(blocked)))
            .collect()
    }

    /// Re-evaluate every blocked task and move those whose dependencies are
    /// all completed to `Ready`. Returns the promoted tasks in order.
    pub fn promote(&mut self, table: &mut HashMap<TaskId, Task>) -> Vec<TaskId> {
        let candidates = self.blocked.clone();
        self.promote_candidates(candidates, table)
    }

    /// Re-evaluate only the tasks blocked on `completed`.
    pub fn on_completed(
        &mut self,
        completed: TaskId,
        table: &mut HashMap<TaskId, Task>,
    ) -> Vec<TaskId> {
        let candidates = self.dependents_of(completed);
        self.promote_candidates(candidates, table)
    }

    fn promote_candidates(
        &mut self,
        candidates: Vec<TaskId>,
        table: &mut HashMap<TaskId, Task>,
    ) -> Vec<TaskId> {
        let mut promoted = Vec::new();
        for id in candidates {
            let Some(task) = table.get(&id) else {
                self.forget(id);
                continue;
            };
            if !Self::dependencies_met(task, table) {
                continue;
            }
            let Some(task) = table.get_mut(&id) else {
                continue;
            };
            match task.mark_ready() {
                Ok(()) => {
                    debug!(task_id = %id, task = task.name(), "dependencies met, task ready");
                    promoted.push(id);
                }
                Err(e) => warn!(
                    task_id = %id,
                    error = %e,
                    "dropping blocked task that cannot become ready"
                ),
            }
            self.forget(id);
        }
        promoted
    }

    /// Blocked tasks with a dependency that can never complete: `Cancelled`,
    /// or `Failed` with no retries left.
    #[must_use]
    pub fn orphans(&self, table: &HashMap<TaskId, Task>) -> Vec<TaskId> {
        self.blocked
            .iter()
            .copied()
            .filter(|id| {
                table.get(id).is_some_and(|task| {
                    task.dependencies().iter().any(|dep| {
                        table.get(dep).is_some_and(|dep| {
                            dep.state() == TaskState::Cancelled
                                || (dep.state() == TaskState::Failed && !dep.can_retry())
                        })
                    })
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(tasks: Vec<Task>) -> HashMap<TaskId, Task> {
        tasks.into_iter().map(|t| (t.id(), t)).collect()
    }

    fn complete(task: &mut Task) {
        task.mark_ready().unwrap();
        task.mark_running().unwrap();
        task.mark_completed().unwrap();
    }

    #[test]
    fn test_validate_rejects_unknown_dependency() {
        let known = Task::simulated("known");
        let stranger = TaskId::new();
        let child = Task::simulated("child")
            .with_dependency(known.id())
            .with_dependency(stranger);
        let table = table(vec![known]);
        let err = DependencyTracker::validate(&child, &table).unwrap_err();
        assert!(err.to_string().contains(&stranger.to_string()));
    }

    #[test]
    fn test_promotes_only_after_all_dependencies_complete() {
        let a = Task::simulated("a");
        let b = Task::simulated("b");
        let (a_id, b_id) = (a.id(), b.id());
        let mut child = Task::simulated("child").with_dependencies([a_id, b_id]);
        let child_id = child.id();
        let mut table = table(vec![a, b]);

        assert_eq!(DependencyTracker::classify(&child, &table), Readiness::Blocked);
        child.mark_blocked().unwrap();
        let mut tracker = DependencyTracker::new();
        tracker.track(&child);
        table.insert(child_id, child);

        complete(table.get_mut(&a_id).unwrap());
        assert!(tracker.on_completed(a_id, &mut table).is_empty());
        assert!(tracker.promote(&mut table).is_empty());
        assert_eq!(table[&child_id].state(), TaskState::Blocked);

        complete(table.get_mut(&b_id).unwrap());
        assert_eq!(tracker.on_completed(b_id, &mut table), vec![child_id]);
        assert_eq!(table[&child_id].state(), TaskState::Ready);
        assert!(!tracker.is_blocked(child_id));
        assert!(tracker.dependents_of(b_id).is_empty());
    }

    #[test]
    fn test_orphans_detected_on_cancelled_dependency() {
        let mut parent = Task::simulated("parent");
        let parent_id = parent.id();
        let mut child = Task::simulated("child").with_dependency(parent_id);
        child.mark_blocked().unwrap();
        let child_id = child.id();

        let mut tracker = DependencyTracker::new();
        tracker.track(&child);
        parent.mark_cancelled().unwrap();
        let table = table(vec![parent, child]);

        assert_eq!(tracker.orphans(&table), vec![child_id]);
        tracker.forget(child_id);
        assert!(tracker.orphans(&table).is_empty());
    }
}
