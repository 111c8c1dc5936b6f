//! Error types for scheduler operations.

use thiserror::Error;

use crate::core::task::TaskState;
use crate::util::serde::{ResourceId, TaskId};

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Task rejected at submission.
    #[error("validation error: {0}")]
    Validation(String),
    /// Task identifier is unknown to the scheduler.
    #[error("task not found: {0}")]
    NotFound(TaskId),
    /// Requested state change is not allowed by the task state machine.
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition {
        /// State the task was in.
        from: TaskState,
        /// State that was requested.
        to: TaskState,
    },
    /// Resource identifier already registered.
    #[error("resource already exists: {0}")]
    ResourceExists(ResourceId),
    /// Resource identifier is unknown to the ledger.
    #[error("resource not found: {0}")]
    ResourceNotFound(ResourceId),
    /// Resource still has units reserved and cannot be removed.
    #[error("resource {resource} has {allocated} units allocated")]
    ResourceInUse {
        /// Resource that was targeted.
        resource: ResourceId,
        /// Units still reserved.
        allocated: u64,
    },
    /// Not enough free units to satisfy a request. Transient.
    #[error("resource {resource} unavailable: requested {requested}, available {available}")]
    ResourceUnavailable {
        /// Resource that could not satisfy the request.
        resource: ResourceId,
        /// Units requested.
        requested: u64,
        /// Units free at the time of the request.
        available: u64,
    },
    /// No registered resource advertises the requested type with free capacity.
    #[error("no resource of kind {0} has free capacity")]
    NoResourceOfKind(String),
    /// Task already holds a ledger entry.
    #[error("task {0} already holds an allocation")]
    AllocationExists(TaskId),
    /// A partial reservation could not be undone; the ledger is inconsistent.
    #[error("allocation rollback failed: {0}")]
    AllocationRollback(String),
    /// Task reached its retry limit.
    #[error("task {task} exhausted {retries} retries")]
    RetryExhausted {
        /// Task that cannot be retried.
        task: TaskId,
        /// Retry limit that was reached.
        retries: u32,
    },
    /// Named resource pool does not exist.
    #[error("pool not found: {0}")]
    PoolNotFound(String),
    /// Configuration failed validation.
    #[error("config invalid: {0}")]
    Config(String),
    /// Async runtime missing or unusable.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl SchedulerError {
    /// Transient errors re-queue the task instead of surfacing to callers.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ResourceUnavailable { .. } | Self::NoResourceOfKind(_)
        )
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
