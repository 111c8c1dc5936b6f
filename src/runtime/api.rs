//! API-facing request/response models.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::executor::{SimulatedWork, WorkUnit};
use crate::core::task::{Task, TaskState, DEFAULT_ESTIMATED_DURATION_SECS, DEFAULT_MAX_RETRIES};
use crate::core::{SchedulerError, TaskScheduler};
use crate::runtime::Spawn;
use crate::util::serde::{Priority, ResourceKind, TaskId};

const fn default_estimated_duration() -> f64 {
    DEFAULT_ESTIMATED_DURATION_SECS
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

/// Task submission payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSubmission {
    /// Task name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Priority.
    #[serde(default)]
    pub priority: Priority,
    /// Optional deadline (ms since epoch).
    #[serde(default)]
    pub deadline_ms: Option<u128>,
    /// Estimated duration in seconds.
    #[serde(default = "default_estimated_duration")]
    pub estimated_duration_secs: f64,
    /// Tasks that must complete first.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    /// Resource types needed while running.
    #[serde(default)]
    pub resources_required: Vec<ResourceKind>,
    /// Responsible agent.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Retry limit.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl TaskSubmission {
    /// Minimal submission with defaults for everything but the name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            priority: Priority::default(),
            deadline_ms: None,
            estimated_duration_secs: DEFAULT_ESTIMATED_DURATION_SECS,
            dependencies: Vec::new(),
            resources_required: Vec::new(),
            agent_id: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Build a `Pending` task running `work`, or [`SimulatedWork`] if none is
    /// given.
    #[must_use]
    pub fn into_task(self, work: Option<Arc<dyn WorkUnit>>) -> Task {
        let work = work.unwrap_or_else(|| Arc::new(SimulatedWork));
        let mut task = Task::new(self.name, work)
            .with_description(self.description)
            .with_priority(self.priority)
            .with_estimated_duration(self.estimated_duration_secs)
            .with_dependencies(self.dependencies)
            .with_max_retries(self.max_retries);
        if let Some(deadline) = self.deadline_ms {
            task = task.with_deadline_ms(deadline);
        }
        for kind in self.resources_required {
            task = task.requires(kind);
        }
        if let Some(agent) = self.agent_id {
            task = task.with_agent(agent);
        }
        task
    }
}

/// Task status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    /// Task identifier.
    pub task_id: TaskId,
    /// Current state.
    pub state: TaskState,
    /// Last error, if the task failed.
    pub error: Option<String>,
    /// Retries performed.
    pub retry_count: u32,
}

/// Submit a request to a scheduler.
///
/// # Errors
///
/// Whatever [`TaskScheduler::submit`] rejects.
pub fn submit_task<S>(
    scheduler: &TaskScheduler<S>,
    req: TaskSubmission,
    work: Option<Arc<dyn WorkUnit>>,
) -> Result<TaskId, SchedulerError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    scheduler.submit(req.into_task(work))
}

/// Status of a submitted task.
///
/// # Errors
///
/// `NotFound` if the scheduler does not know the task.
pub fn task_status<S>(
    scheduler: &TaskScheduler<S>,
    task_id: TaskId,
) -> Result<TaskStatusResponse, SchedulerError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    let snapshot = scheduler.task(task_id).ok_or(SchedulerError::NotFound(task_id))?;
    Ok(TaskStatusResponse {
        task_id,
        state: snapshot.state,
        error: snapshot.error,
        retry_count: snapshot.retry_count,
    })
}
