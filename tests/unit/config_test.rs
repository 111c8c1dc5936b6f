//! Tests for configuration validation

use std::collections::HashMap;

use prometheus_task_scheduler::config::{
    PolicyConfig, PoolConfig, ResourceConfig, SchedulerConfig, ENV_PREFIX,
};
use prometheus_task_scheduler::core::{SchedulerError, TaskScheduler};
use prometheus_task_scheduler::util::serde::ResourceKind;
use tokio::sync::Semaphore;

fn gpu(id: &str, pool: Option<&str>) -> ResourceConfig {
    ResourceConfig {
        id: id.to_string(),
        name: None,
        kind: ResourceKind::Gpu,
        capacity: 2,
        unit: "devices".to_string(),
        pool: pool.map(str::to_string),
    }
}

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (format!("{ENV_PREFIX}{k}"), (*v).to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn test_default_config_is_valid() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.max_concurrent_tasks, 10);
    assert_eq!(cfg.poll_interval_ms, 100);
    assert_eq!(cfg.policy, PolicyConfig::Priority { aging_factor: 0.1 });
    assert!(cfg.enable_resource_management);
    assert!(!cfg.auto_retry);
}

#[test]
fn test_zero_limits_are_rejected() {
    let cfg = SchedulerConfig {
        max_concurrent_tasks: 0,
        ..SchedulerConfig::default()
    };
    assert!(cfg.validate().is_err());

    let cfg = SchedulerConfig {
        poll_interval_ms: 0,
        ..SchedulerConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_worker_limit_above_semaphore_capacity_is_rejected() {
    let cfg = SchedulerConfig {
        max_concurrent_tasks: usize::MAX,
        ..SchedulerConfig::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("max_concurrent_tasks"));

    let err = TaskScheduler::new(cfg).err().unwrap();
    assert!(matches!(err, SchedulerError::Config(_)));

    let cfg = SchedulerConfig {
        max_concurrent_tasks: Semaphore::MAX_PERMITS,
        ..SchedulerConfig::default()
    };
    assert!(cfg.validate().is_ok());

    let too_many = usize::MAX.to_string();
    let err = SchedulerConfig::from_lookup(lookup(&[("MAX_CONCURRENT_TASKS", too_many.as_str())]))
        .unwrap_err();
    assert!(matches!(err, SchedulerError::Config(_)));
}

#[test]
fn test_policy_parameters_are_validated() {
    let cfg = SchedulerConfig {
        policy: PolicyConfig::Hybrid { phase_length: 0 },
        ..SchedulerConfig::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("hybrid"), "{err}");

    let cfg = SchedulerConfig {
        policy: PolicyConfig::Priority { aging_factor: -1.0 },
        ..SchedulerConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_resource_pool_references() {
    let mut cfg = SchedulerConfig {
        resources: vec![gpu("gpu-0", Some("inference"))],
        ..SchedulerConfig::default()
    };
    assert!(cfg.validate().is_err());

    cfg.pools.push(PoolConfig {
        name: "inference".to_string(),
        description: "GPU nodes".to_string(),
    });
    assert!(cfg.validate().is_ok());

    cfg.resources.push(gpu("gpu-0", None));
    assert!(cfg.validate().unwrap_err().contains("duplicate"));
}

#[test]
fn test_from_json_str() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{
            "max_concurrent_tasks": 4,
            "policy": { "type": "deadline", "deadline_weight": 2.0 },
            "auto_retry": true,
            "pools": [{ "name": "compute" }],
            "resources": [
                { "id": "cpu-0", "kind": "cpu", "capacity": 8, "pool": "compute" }
            ]
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.max_concurrent_tasks, 4);
    assert_eq!(
        cfg.policy,
        PolicyConfig::Deadline {
            deadline_weight: 2.0,
            priority_weight: 0.3
        }
    );
    assert!(cfg.auto_retry);
    assert_eq!(cfg.resources[0].unit, "units");
    assert_eq!(cfg.resources[0].pool.as_deref(), Some("compute"));
}

#[test]
fn test_from_json_str_rejects_invalid() {
    let err = SchedulerConfig::from_json_str(r#"{"max_concurrent_tasks": 0}"#).unwrap_err();
    assert!(matches!(err, SchedulerError::Config(_)));
    let err = SchedulerConfig::from_json_str("not json").unwrap_err();
    assert!(matches!(err, SchedulerError::Config(_)));
}

#[test]
fn test_policy_from_name() {
    assert_eq!(PolicyConfig::from_name("round-robin").unwrap().name(), "round_robin");
    assert_eq!(PolicyConfig::from_name("HYBRID").unwrap().name(), "hybrid");
    assert!(PolicyConfig::from_name("lottery").is_err());
}

#[test]
fn test_from_lookup_overlays_defaults() {
    let cfg = SchedulerConfig::from_lookup(lookup(&[
        ("MAX_CONCURRENT_TASKS", "3"),
        ("POLICY", "round_robin"),
        ("TIME_SLICE_MS", "250"),
        ("AUTO_RETRY", "yes"),
        ("ENFORCE_MIN_DURATION", "off"),
    ]))
    .unwrap();
    assert_eq!(cfg.max_concurrent_tasks, 3);
    assert_eq!(cfg.policy, PolicyConfig::RoundRobin { time_slice_ms: 250 });
    assert!(cfg.auto_retry);
    assert!(!cfg.enforce_min_duration);
    assert_eq!(cfg.poll_interval_ms, 100);
}

#[test]
fn test_from_lookup_rejects_bad_values() {
    assert!(SchedulerConfig::from_lookup(lookup(&[("MAX_CONCURRENT_TASKS", "many")])).is_err());
    assert!(SchedulerConfig::from_lookup(lookup(&[("AUTO_RETRY", "maybe")])).is_err());
    assert!(SchedulerConfig::from_lookup(lookup(&[("MAX_CONCURRENT_TASKS", "0")])).is_err());
}
