//! # Prometheus Task Scheduler
//!
//! A policy-driven task scheduler for the Prometheus AI Platform. Tasks carry
//! a priority, an optional deadline, dependencies on other tasks, and the
//! resource types they need while running. The scheduler owns their
//! lifecycle from submission to a final state.
//!
//! ## Key Features
//!
//! - **Lifecycle State Machine**: `Pending`, `Ready`, `Blocked`, `Running`,
//!   `Completed`, `Failed` and `Cancelled`, with retries of failed tasks
//! - **Dependency Tracking**: tasks stay `Blocked` until every dependency has
//!   completed; orphans can be cancelled in cascade
//! - **Resource Ledger**: typed, integer-unit resources reserved all-or-nothing
//!   per task and released when the task leaves `Running`
//! - **Pluggable Policies**: priority with aging, round-robin time slices,
//!   earliest deadline first, and a hybrid that rotates between them
//! - **Events and Audit**: lifecycle callbacks plus an optional audit trail
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//!
//! use prometheus_task_scheduler::config::SchedulerConfig;
//! use prometheus_task_scheduler::core::{EventKind, Resource, Task, TaskScheduler};
//! use prometheus_task_scheduler::util::serde::{Priority, ResourceKind};
//!
//! let scheduler = TaskScheduler::new(SchedulerConfig::default())?;
//! scheduler.ledger().add_resource(Resource::new("cpu-0", "CPU", ResourceKind::Cpu, 4)?)?;
//! scheduler.subscribe(EventKind::Completed, |event| println!("{} done", event.name));
//!
//! let setup = scheduler.submit(Task::simulated("setup").with_estimated_duration(0.5))?;
//! let process = scheduler.submit(
//!     Task::simulated("process")
//!         .with_priority(Priority::High)
//!         .with_dependency(setup)
//!         .requires(ResourceKind::Cpu),
//! )?;
//!
//! scheduler.start()?;
//! scheduler.wait_for(process, Duration::from_secs(5)).await?;
//! scheduler.stop();
//! ```
//!
//! Configuration can also come from JSON or `TASK_SCHEDULER_*` environment
//! variables, see [`config::SchedulerConfig`].

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Task model, resource ledger, scheduling policies, and the orchestrator.
pub mod core;
/// Configuration models for the scheduler, its policy, and its resources.
pub mod config;
/// Builders to construct scheduler components from configuration.
pub mod builders;
/// Runtime adapters and the request/response API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
