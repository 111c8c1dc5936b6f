//! Work-unit abstraction executed by scheduler workers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::util::serde::{Priority, TaskId};

/// Error returned by a work unit. Stored as the task's error message and
/// never propagated to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ExecutionError(pub String);

impl ExecutionError {
    /// Build an error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for ExecutionError {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ExecutionError {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<anyhow::Error> for ExecutionError {
    fn from(value: anyhow::Error) -> Self {
        Self(format!("{value:#}"))
    }
}

/// Everything a work unit gets to know about the task it runs for.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Task identifier.
    pub task_id: TaskId,
    /// Task name.
    pub name: String,
    /// Task priority.
    pub priority: Priority,
    /// Zero-based attempt number (equals the task's retry count).
    pub attempt: u32,
    /// Estimated duration declared at submission.
    pub estimated_duration: Duration,
    /// Cooperative cancellation signal. Triggered when the task is cancelled
    /// while running; honoring it is up to the work unit.
    pub cancel: CancellationToken,
}

impl TaskContext {
    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// The opaque work a task performs.
///
/// The scheduler only observes whether `execute` returns `Ok` or `Err` and how
/// long it took.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_task_scheduler::core::{ExecutionError, TaskContext, WorkUnit};
///
/// struct Indexer;
///
/// #[async_trait]
/// impl WorkUnit for Indexer {
///     async fn execute(&self, ctx: TaskContext) -> Result<(), ExecutionError> {
///         tokio::select! {
///             () = ctx.cancel.cancelled() => Err("interrupted".into()),
///             () = rebuild_index() => Ok(()),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait WorkUnit: Send + Sync + 'static {
    /// Run the work for one attempt.
    async fn execute(&self, ctx: TaskContext) -> Result<(), ExecutionError>;
}

/// Sleeps for the task's estimated duration, stopping early on cancellation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedWork;

#[async_trait]
impl WorkUnit for SimulatedWork {
    async fn execute(&self, ctx: TaskContext) -> Result<(), ExecutionError> {
        tokio::select! {
            () = ctx.cancel.cancelled() => {
                tracing::debug!(task_id = %ctx.task_id, "simulated work interrupted");
            }
            () = tokio::time::sleep(ctx.estimated_duration) => {}
        }
        Ok(())
    }
}

/// Adapter turning an async closure into a [`WorkUnit`].
pub struct FnWork<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> WorkUnit for FnWork<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ExecutionError>> + Send + 'static,
{
    async fn execute(&self, ctx: TaskContext) -> Result<(), ExecutionError> {
        (self.f)(ctx).await
    }
}

/// Wrap an async closure as a shareable work unit.
///
/// ```rust,ignore
/// let work = work_fn(|ctx| async move {
///     tracing::info!(task = %ctx.name, "hello");
///     Ok::<(), ExecutionError>(())
/// });
/// ```
pub fn work_fn<F, Fut>(f: F) -> Arc<dyn WorkUnit>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ExecutionError>> + Send + 'static,
{
    Arc::new(FnWork { f })
}
