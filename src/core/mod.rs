//! Task model, resource ledger, scheduling policies, and the orchestrator.

pub mod audit;
pub mod dependency;
pub mod error;
pub mod events;
pub mod executor;
pub mod ledger;
pub mod policy;
pub mod ready_queue;
pub mod resource;
pub mod scheduler;
pub mod stats;
pub mod task;
pub(crate) mod worker;

pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink};
pub use dependency::{DependencyTracker, Readiness};
pub use error::{AppResult, SchedulerError};
pub use events::{EventBus, EventHandler, EventKind, TaskEvent};
pub use executor::{work_fn, ExecutionError, SimulatedWork, TaskContext, WorkUnit};
pub use ledger::{LedgerCounters, LedgerStats, Requirements, ResourceLedger};
pub use policy::{
    build_policy, DeadlinePolicy, HybridPhase, HybridPolicy, PolicyStats, PriorityPolicy,
    RoundRobinPolicy, SchedulingPolicy,
};
pub use ready_queue::ReadyQueue;
pub use resource::{Resource, ResourcePool};
pub use scheduler::TaskScheduler;
pub use stats::{SchedulerStats, TaskSummary};
pub use task::{Task, TaskSnapshot, TaskState};
