//! Task model and its lifecycle state machine.
//!
//! A [`Task`] is created `Pending` by the caller and handed to the scheduler,
//! which owns every later state change. The transition methods here perform
//! no locking; callers serialize access.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::SchedulerError;
use crate::core::executor::{SimulatedWork, WorkUnit};
use crate::util::clock::{now_ms, seconds_between};
use crate::util::serde::{Priority, ResourceKind, TaskId};

/// Default retry limit for new tasks.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default estimated duration for new tasks, in seconds.
pub const DEFAULT_ESTIMATED_DURATION_SECS: f64 = 60.0;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Created, not yet classified by the scheduler.
    Pending,
    /// Dependencies satisfied, waiting for selection.
    Ready,
    /// Waiting on at least one dependency.
    Blocked,
    /// Dispatched to a worker.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an execution error.
    Failed,
    /// Cancelled by the caller.
    Cancelled,
}

impl TaskState {
    /// Whether `self -> to` is an edge of the lifecycle graph.
    ///
    /// `Failed -> Ready` is listed here; the retry budget is checked by
    /// [`Task::retry`].
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Ready | Self::Blocked | Self::Cancelled)
                | (Self::Blocked, Self::Ready | Self::Cancelled)
                | (Self::Ready, Self::Running | Self::Cancelled)
                | (Self::Running, Self::Completed | Self::Failed | Self::Cancelled)
                | (Self::Failed, Self::Ready)
        )
    }

    /// `Completed` and `Cancelled` never change again. `Failed` may still be
    /// retried and is reported separately by [`Task::is_terminal`].
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Snake-case label used in logs and summaries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Blocked => "blocked",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A schedulable unit of work.
#[derive(Clone)]
pub struct Task {
    id: TaskId,
    name: String,
    description: String,
    priority: Priority,
    deadline_ms: Option<u128>,
    estimated_duration_secs: f64,
    dependencies: HashSet<TaskId>,
    resources_required: BTreeSet<ResourceKind>,
    agent_id: Option<String>,
    state: TaskState,
    retry_count: u32,
    max_retries: u32,
    created_at_ms: u128,
    started_at_ms: Option<u128>,
    completed_at_ms: Option<u128>,
    error: Option<String>,
    seq: u64,
    work: Arc<dyn WorkUnit>,
}

impl Task {
    /// Create a `Pending` task that runs `work` when dispatched.
    pub fn new(name: impl Into<String>, work: Arc<dyn WorkUnit>) -> Self {
        Self {
            id: TaskId::new(),
            name: name.into(),
            description: String::new(),
            priority: Priority::Normal,
            deadline_ms: None,
            estimated_duration_secs: DEFAULT_ESTIMATED_DURATION_SECS,
            dependencies: HashSet::new(),
            resources_required: BTreeSet::new(),
            agent_id: None,
            state: TaskState::Pending,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            created_at_ms: now_ms(),
            started_at_ms: None,
            completed_at_ms: None,
            error: None,
            seq: 0,
            work,
        }
    }

    /// Create a task whose work is [`SimulatedWork`]: it sleeps for the
    /// estimated duration.
    pub fn simulated(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(SimulatedWork))
    }

    /// Set the free-form description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set an absolute deadline in milliseconds since the epoch.
    #[must_use]
    pub fn with_deadline_ms(mut self, deadline_ms: u128) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    /// Set the deadline relative to now.
    #[must_use]
    pub fn with_deadline_in(self, offset: Duration) -> Self {
        self.with_deadline_ms(now_ms() + offset.as_millis())
    }

    /// Set the estimated duration in seconds. Validated at submission.
    #[must_use]
    pub fn with_estimated_duration(mut self, secs: f64) -> Self {
        self.estimated_duration_secs = secs;
        self
    }

    /// Add a dependency that must complete before this task can run.
    #[must_use]
    pub fn with_dependency(mut self, dependency: TaskId) -> Self {
        self.dependencies.insert(dependency);
        self
    }

    /// Add several dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    /// Require one unit of a resource of `kind` while running.
    #[must_use]
    pub fn requires(mut self, kind: ResourceKind) -> Self {
        self.resources_required.insert(kind);
        self
    }

    /// Set the agent responsible for the task.
    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Set the retry limit.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Check the submission invariants. A past deadline only logs a warning.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Validation` for a non-positive or non-finite
    /// estimated duration or an empty name.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if !self.estimated_duration_secs.is_finite() || self.estimated_duration_secs <= 0.0 {
            return Err(SchedulerError::Validation(format!(
                "task `{}`: estimated duration must be positive, got {}",
                self.name, self.estimated_duration_secs
            )));
        }
        if self.name.trim().is_empty() {
            return Err(SchedulerError::Validation("task name must not be empty".into()));
        }
        if self.dependencies.contains(&self.id) {
            return Err(SchedulerError::Validation(format!(
                "task `{}` depends on itself",
                self.name
            )));
        }
        if let Some(deadline) = self.deadline_ms {
            if deadline <= now_ms() {
                tracing::warn!(task = %self.name, "task has a deadline in the past");
            }
        }
        Ok(())
    }

    /// Unique identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Priority.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Absolute deadline in milliseconds since the epoch.
    #[must_use]
    pub const fn deadline_ms(&self) -> Option<u128> {
        self.deadline_ms
    }

    /// Estimated duration in seconds.
    #[must_use]
    pub const fn estimated_duration_secs(&self) -> f64 {
        self.estimated_duration_secs
    }

    /// Estimated duration as a `Duration`, zero if invalid.
    #[must_use]
    pub fn estimated_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.estimated_duration_secs).unwrap_or_default()
    }

    /// Dependencies that must complete first.
    #[must_use]
    pub const fn dependencies(&self) -> &HashSet<TaskId> {
        &self.dependencies
    }

    /// Resource types needed while running.
    #[must_use]
    pub const fn resources_required(&self) -> &BTreeSet<ResourceKind> {
        &self.resources_required
    }

    /// Responsible agent, if any.
    #[must_use]
    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> TaskState {
        self.state
    }

    /// Retries performed so far.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Retry limit.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Creation timestamp (ms since epoch).
    #[must_use]
    pub const fn created_at_ms(&self) -> u128 {
        self.created_at_ms
    }

    /// Start of the current attempt (ms since epoch).
    #[must_use]
    pub const fn started_at_ms(&self) -> Option<u128> {
        self.started_at_ms
    }

    /// End of the current attempt (ms since epoch).
    #[must_use]
    pub const fn completed_at_ms(&self) -> Option<u128> {
        self.completed_at_ms
    }

    /// Error recorded by the last failed attempt.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Submission sequence number; lower was submitted earlier.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    /// Work unit executed on dispatch.
    #[must_use]
    pub fn work(&self) -> Arc<dyn WorkUnit> {
        Arc::clone(&self.work)
    }

    /// `Completed`, `Cancelled`, or `Failed` with no retries left.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_final() || (matches!(self.state, TaskState::Failed) && !self.can_retry())
    }

    /// Deadline has passed and the task has not completed.
    #[must_use]
    pub fn is_overdue(&self) -> bool {
        self.deadline_ms
            .is_some_and(|deadline| now_ms() > deadline && self.state != TaskState::Completed)
    }

    /// Seconds until the deadline, clamped at zero. `None` without a deadline.
    #[must_use]
    pub fn remaining_time(&self) -> Option<f64> {
        self.deadline_ms
            .map(|deadline| seconds_between(now_ms(), deadline).max(0.0))
    }

    /// Wall time of the last attempt in seconds, once it has finished.
    #[must_use]
    pub fn execution_time(&self) -> Option<f64> {
        match (self.started_at_ms, self.completed_at_ms) {
            (Some(start), Some(end)) => Some(seconds_between(start, end)),
            _ => None,
        }
    }

    /// Failed with retries remaining.
    #[must_use]
    pub const fn can_retry(&self) -> bool {
        matches!(self.state, TaskState::Failed) && self.retry_count < self.max_retries
    }

    fn transition(&mut self, to: TaskState) -> Result<(), SchedulerError> {
        if !self.state.can_transition_to(to) {
            return Err(SchedulerError::IllegalTransition {
                from: self.state,
                to,
            });
        }
        tracing::debug!(task = %self.name, from = %self.state, to = %to, "task transition");
        self.state = to;
        Ok(())
    }

    /// `Pending -> Ready`, or `Blocked -> Ready` once dependencies complete.
    ///
    /// # Errors
    ///
    /// `IllegalTransition` from any other state.
    pub fn mark_ready(&mut self) -> Result<(), SchedulerError> {
        if self.state == TaskState::Failed {
            return Err(SchedulerError::IllegalTransition {
                from: self.state,
                to: TaskState::Ready,
            });
        }
        self.transition(TaskState::Ready)
    }

    /// `Pending -> Blocked`.
    ///
    /// # Errors
    ///
    /// `IllegalTransition` from any other state.
    pub fn mark_blocked(&mut self) -> Result<(), SchedulerError> {
        self.transition(TaskState::Blocked)
    }

    /// `Ready -> Running`; records the start time.
    ///
    /// # Errors
    ///
    /// `IllegalTransition` from any other state.
    pub fn mark_running(&mut self) -> Result<(), SchedulerError> {
        self.transition(TaskState::Running)?;
        self.started_at_ms = Some(now_ms());
        Ok(())
    }

    /// `Running -> Completed`; records the completion time.
    ///
    /// # Errors
    ///
    /// `IllegalTransition` from any other state.
    pub fn mark_completed(&mut self) -> Result<(), SchedulerError> {
        self.transition(TaskState::Completed)?;
        self.stamp_completion();
        Ok(())
    }

    /// `Running -> Failed`; records the error and completion time.
    ///
    /// # Errors
    ///
    /// `IllegalTransition` from any other state.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<(), SchedulerError> {
        self.transition(TaskState::Failed)?;
        self.stamp_completion();
        self.error = Some(error.into());
        Ok(())
    }

    /// Cancel from `Pending`, `Ready`, `Blocked` or `Running`.
    ///
    /// # Errors
    ///
    /// `IllegalTransition` from a finished state.
    pub fn mark_cancelled(&mut self) -> Result<(), SchedulerError> {
        self.transition(TaskState::Cancelled)?;
        self.stamp_completion();
        Ok(())
    }

    /// `Failed -> Ready` while `retry_count < max_retries`. Clears the
    /// timestamps and error and bumps `retry_count`.
    ///
    /// # Errors
    ///
    /// `RetryExhausted` when the budget is used up, `IllegalTransition` when
    /// the task is not `Failed`.
    pub fn retry(&mut self) -> Result<(), SchedulerError> {
        if self.state != TaskState::Failed {
            return Err(SchedulerError::IllegalTransition {
                from: self.state,
                to: TaskState::Ready,
            });
        }
        if !self.can_retry() {
            return Err(SchedulerError::RetryExhausted {
                task: self.id,
                retries: self.max_retries,
            });
        }
        self.transition(TaskState::Ready)?;
        self.retry_count += 1;
        self.started_at_ms = None;
        self.completed_at_ms = None;
        self.error = None;
        tracing::info!(task = %self.name, attempt = self.retry_count, "retrying task");
        Ok(())
    }

    fn stamp_completion(&mut self) {
        let now = now_ms();
        // Keep started_at <= completed_at even if the clock steps back.
        let stamp = self.started_at_ms.map_or(now, |start| now.max(start));
        self.completed_at_ms = Some(stamp);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("state", &self.state)
            .field("deadline_ms", &self.deadline_ms)
            .field("estimated_duration_secs", &self.estimated_duration_secs)
            .field("dependencies", &self.dependencies)
            .field("resources_required", &self.resources_required)
            .field("retry_count", &self.retry_count)
            .field("max_retries", &self.max_retries)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Task({}, priority={}, state={})",
            self.name, self.priority, self.state
        )
    }
}

/// Plain-data view of a task for status queries and serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Task identifier.
    pub id: TaskId,
    /// Task name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Priority.
    pub priority: Priority,
    /// Deadline (ms since epoch).
    pub deadline_ms: Option<u128>,
    /// Estimated duration in seconds.
    pub estimated_duration_secs: f64,
    /// Dependency identifiers.
    pub dependencies: Vec<TaskId>,
    /// Required resource types.
    pub resources_required: Vec<ResourceKind>,
    /// Responsible agent.
    pub agent_id: Option<String>,
    /// Current state.
    pub state: TaskState,
    /// Retries performed.
    pub retry_count: u32,
    /// Retry limit.
    pub max_retries: u32,
    /// Creation time (ms since epoch).
    pub created_at_ms: u128,
    /// Start of the last attempt.
    pub started_at_ms: Option<u128>,
    /// End of the last attempt.
    pub completed_at_ms: Option<u128>,
    /// Last error message.
    pub error: Option<String>,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        let mut dependencies: Vec<TaskId> = task.dependencies.iter().copied().collect();
        dependencies.sort();
        Self {
            id: task.id,
            name: task.name.clone(),
            description: task.description.clone(),
            priority: task.priority,
            deadline_ms: task.deadline_ms,
            estimated_duration_secs: task.estimated_duration_secs,
            dependencies,
            resources_required: task.resources_required.iter().cloned().collect(),
            agent_id: task.agent_id.clone(),
            state: task.state,
            retry_count: task.retry_count,
            max_retries: task.max_retries,
            created_at_ms: task.created_at_ms,
            started_at_ms: task.started_at_ms,
            completed_at_ms: task.completed_at_ms,
            error: task.error.clone(),
        }
    }
}
