//! Tests for utility functions

use std::str::FromStr;

use prometheus_task_scheduler::util::{
    now_ms, seconds_between, Priority, ResourceId, ResourceKind, TaskId,
};

#[test]
fn test_priority_ordering() {
    assert!(Priority::Urgent > Priority::Critical);
    assert!(Priority::Critical > Priority::High);
    assert!(Priority::High > Priority::Normal);
    assert!(Priority::Normal > Priority::Low);
    assert_eq!(Priority::default(), Priority::Normal);
}

#[test]
fn test_priority_ordinals() {
    let ordinals: Vec<u8> = Priority::all().iter().map(|p| p.ordinal()).collect();
    assert_eq!(ordinals, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_resource_kind_parse() {
    assert_eq!(ResourceKind::from_str("GPU").unwrap(), ResourceKind::Gpu);
    assert_eq!(
        ResourceKind::from_str("custom:tpu").unwrap(),
        ResourceKind::Custom("tpu".to_string())
    );
    assert!(ResourceKind::from_str("custom:").is_err());
    assert!(ResourceKind::from_str("quantum").is_err());
    assert_eq!(ResourceKind::Custom("tpu".to_string()).to_string(), "custom:tpu");
}

#[test]
fn test_resource_kind_serde() {
    let json = serde_json::to_string(&ResourceKind::Memory).unwrap();
    assert_eq!(json, "\"memory\"");
    let kind: ResourceKind = serde_json::from_str("\"storage\"").unwrap();
    assert_eq!(kind, ResourceKind::Storage);
}

#[test]
fn test_task_id() {
    let id = TaskId::new();
    assert_ne!(id, TaskId::new());
    assert_eq!(TaskId::from_str(&id.to_string()).unwrap(), id);
    assert_eq!(id.short().len(), 8);
    assert!(TaskId::from_str("not-a-uuid").is_err());
}

#[test]
fn test_resource_id() {
    let id = ResourceId::from("cpu-0");
    assert_eq!(id.as_str(), "cpu-0");
    assert_eq!(id.to_string(), "cpu-0");
}

#[test]
fn test_clock_helpers() {
    let now = now_ms();
    assert!(now > 0);
    assert!((seconds_between(now, now + 1_500) - 1.5).abs() < f64::EPSILON);
}

#[test]
fn test_init_tracing_is_idempotent() {
    prometheus_task_scheduler::util::init_tracing();
    prometheus_task_scheduler::util::init_tracing();
    tracing::info!("tracing initialized twice without panicking");
}
