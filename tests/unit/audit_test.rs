//! Tests for audit sink

use prometheus_task_scheduler::core::{build_audit_event, AuditAction, AuditSink, InMemoryAuditSink};
use prometheus_task_scheduler::util::serde::TaskId;

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);
    let task_id = TaskId::new();

    let event = build_audit_event(task_id, "task1", AuditAction::Fail, Some("boom".to_string()));

    sink.record(event.clone());
    assert_eq!(sink.events().len(), 1);

    let events = sink.events();
    assert_eq!(events[0].event_id, event.event_id);
    assert_eq!(events[0].task_id, task_id);
    assert_eq!(events[0].task_name, "task1");
    assert_eq!(events[0].action, AuditAction::Fail);
    assert_eq!(events[0].detail.as_deref(), Some("boom"));
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);
    let first = TaskId::new();
    let second = TaskId::new();
    let third = TaskId::new();

    sink.record(build_audit_event(first, "task1", AuditAction::Submit, None));
    sink.record(build_audit_event(second, "task2", AuditAction::Submit, None));
    sink.record(build_audit_event(third, "task3", AuditAction::Submit, None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].task_id, second); // First one popped
    assert_eq!(events[1].task_id, third);
}

#[test]
fn test_clones_share_buffer() {
    let sink = InMemoryAuditSink::new(10);
    let mut writer = sink.clone();
    let task_id = TaskId::new();

    writer.record(build_audit_event(task_id, "task", AuditAction::Submit, None));
    writer.record(build_audit_event(task_id, "task", AuditAction::Ready, None));
    writer.record(build_audit_event(TaskId::new(), "other", AuditAction::Submit, None));

    assert_eq!(sink.events().len(), 3);
    assert_eq!(
        sink.actions_for(task_id),
        vec![AuditAction::Submit, AuditAction::Ready]
    );
}

#[test]
fn test_audit_event_ids_are_unique() {
    let task_id = TaskId::new();
    let a = build_audit_event(task_id, "task", AuditAction::Start, None);
    let b = build_audit_event(task_id, "task", AuditAction::Start, None);
    assert_ne!(a.event_id, b.event_id);
}
