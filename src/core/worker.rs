//! Execution of one dispatched task on a worker slot.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, error};

use crate::core::executor::{ExecutionError, TaskContext, WorkUnit};
use crate::util::serde::TaskId;

/// Everything a worker needs to run one task attempt.
pub(crate) struct Dispatch {
    pub(crate) ctx: TaskContext,
    pub(crate) work: Arc<dyn WorkUnit>,
    /// Held for the whole attempt; dropping it frees the worker slot.
    pub(crate) permit: OwnedSemaphorePermit,
    /// Minimum wall time of a successful attempt.
    pub(crate) min_duration: Option<Duration>,
}

impl Dispatch {
    pub(crate) const fn task_id(&self) -> TaskId {
        self.ctx.task_id
    }
}

/// Run the work unit, turning a panic into an execution error. A successful
/// attempt shorter than `min_duration` is padded until the minimum elapses
/// or the task is cancelled.
pub(crate) async fn execute(
    ctx: TaskContext,
    work: Arc<dyn WorkUnit>,
    min_duration: Option<Duration>,
) -> Result<(), ExecutionError> {
    let task_id = ctx.task_id;
    let cancel = ctx.cancel.clone();
    let started = Instant::now();

    let result = match AssertUnwindSafe(work.execute(ctx)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(task_id = %task_id, panic = %message, "work unit panicked");
            Err(ExecutionError::new(format!("work unit panicked: {message}")))
        }
    };

    if result.is_ok() {
        if let Some(remaining) = min_duration.and_then(|min| min.checked_sub(started.elapsed())) {
            debug!(task_id = %task_id, ?remaining, "padding to estimated duration");
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(remaining) => {}
            }
        }
    }
    result
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".into())
}
