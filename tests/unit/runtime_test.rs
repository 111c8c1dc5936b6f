//! Tests for tokio spawner utilities and the request API

use std::sync::Arc;
use std::time::Duration;

use prometheus_task_scheduler::config::SchedulerConfig;
use prometheus_task_scheduler::core::{
    work_fn, ExecutionError, SchedulerError, TaskScheduler, TaskState,
};
use prometheus_task_scheduler::runtime::api::{submit_task, task_status, TaskSubmission};
use prometheus_task_scheduler::runtime::tokio_spawner::{Spawn, TokioSpawner};
use prometheus_task_scheduler::util::serde::{Priority, ResourceKind, TaskId};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_submission_defaults_from_json() {
    let req: TaskSubmission = serde_json::from_str(r#"{"name": "index"}"#).unwrap();
    assert_eq!(req, TaskSubmission::named("index"));
    assert_eq!(req.priority, Priority::Normal);
    assert_eq!(req.max_retries, 3);
    assert!((req.estimated_duration_secs - 60.0).abs() < f64::EPSILON);
}

#[test]
fn test_submission_into_task() {
    let dep = TaskId::new();
    let req: TaskSubmission = serde_json::from_str(&format!(
        r#"{{
            "name": "train",
            "description": "fine-tune",
            "priority": "high",
            "deadline_ms": 5000,
            "estimated_duration_secs": 2.5,
            "dependencies": ["{dep}"],
            "resources_required": ["gpu", "memory"],
            "agent_id": "agent-7",
            "max_retries": 1
        }}"#
    ))
    .unwrap();

    let task = req.into_task(None);
    assert_eq!(task.name(), "train");
    assert_eq!(task.description(), "fine-tune");
    assert_eq!(task.priority(), Priority::High);
    assert_eq!(task.deadline_ms(), Some(5000));
    assert_eq!(task.estimated_duration(), Duration::from_millis(2500));
    assert!(task.dependencies().contains(&dep));
    assert!(task.resources_required().contains(&ResourceKind::Gpu));
    assert!(task.resources_required().contains(&ResourceKind::Memory));
    assert_eq!(task.agent_id(), Some("agent-7"));
    assert_eq!(task.max_retries(), 1);
    assert_eq!(task.state(), TaskState::Pending);
}

#[tokio::test]
async fn test_submit_and_query_through_api() {
    let config = SchedulerConfig {
        enforce_min_duration: false,
        ..SchedulerConfig::default()
    };
    let scheduler = TaskScheduler::new(config).unwrap();
    let work = work_fn(|_ctx| async { Err::<(), _>(ExecutionError::from("disk full")) });

    let mut req = TaskSubmission::named("flaky");
    req.max_retries = 0;
    let id = submit_task(&scheduler, req, Some(Arc::clone(&work))).unwrap();
    assert_eq!(task_status(&scheduler, id).unwrap().state, TaskState::Ready);

    scheduler.start().unwrap();
    assert_eq!(
        scheduler.wait_for(id, Duration::from_secs(5)).await.unwrap(),
        TaskState::Failed
    );
    let status = task_status(&scheduler, id).unwrap();
    assert_eq!(status.error.as_deref(), Some("disk full"));
    assert_eq!(status.retry_count, 0);
    scheduler.stop();

    assert!(matches!(
        task_status(&scheduler, TaskId::new()),
        Err(SchedulerError::NotFound(_))
    ));
}
