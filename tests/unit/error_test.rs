//! Tests for error types

use prometheus_task_scheduler::core::{SchedulerError, TaskState};
use prometheus_task_scheduler::util::serde::{ResourceId, TaskId};

#[test]
fn test_validation_error() {
    let err = SchedulerError::Validation("name must not be empty".to_string());
    assert_eq!(format!("{}", err), "validation error: name must not be empty");
}

#[test]
fn test_illegal_transition_error() {
    let err = SchedulerError::IllegalTransition {
        from: TaskState::Completed,
        to: TaskState::Running,
    };
    assert_eq!(format!("{}", err), "illegal transition from completed to running");
}

#[test]
fn test_resource_unavailable_error() {
    let err = SchedulerError::ResourceUnavailable {
        resource: ResourceId::new("gpu-0"),
        requested: 2,
        available: 1,
    };
    assert_eq!(
        format!("{}", err),
        "resource gpu-0 unavailable: requested 2, available 1"
    );
    assert!(err.is_transient());
}

#[test]
fn test_not_found_error_is_not_transient() {
    let id = TaskId::new();
    let err = SchedulerError::NotFound(id);
    assert_eq!(format!("{}", err), format!("task not found: {id}"));
    assert!(!err.is_transient());
}

#[test]
fn test_no_resource_of_kind_is_transient() {
    let err = SchedulerError::NoResourceOfKind("gpu".to_string());
    assert!(err.is_transient());
    assert_eq!(format!("{}", err), "no resource of kind gpu has free capacity");
}

#[test]
fn test_config_error() {
    let err = SchedulerError::Config("poll_interval_ms must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "config invalid: poll_interval_ms must be greater than 0"
    );
}
