//! Configuration models for the scheduler, its policy, and its resources.

pub mod scheduler;

pub use scheduler::{PolicyConfig, PoolConfig, ResourceConfig, SchedulerConfig, ENV_PREFIX};
