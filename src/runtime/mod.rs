//! Runtime adapters and the request/response API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{submit_task, task_status, TaskStatusResponse, TaskSubmission};
pub use tokio_spawner::{Spawn, TokioSpawner};
