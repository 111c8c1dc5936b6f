//! Tests for builder modules

use prometheus_task_scheduler::builders::{build_ledger, build_scheduler};
use prometheus_task_scheduler::config::{PoolConfig, ResourceConfig, SchedulerConfig};
use prometheus_task_scheduler::core::SchedulerError;
use prometheus_task_scheduler::runtime::TokioSpawner;
use prometheus_task_scheduler::util::serde::{ResourceId, ResourceKind};

fn config() -> SchedulerConfig {
    SchedulerConfig {
        pools: vec![PoolConfig {
            name: "compute".to_string(),
            description: "CPU and GPU nodes".to_string(),
        }],
        resources: vec![
            ResourceConfig {
                id: "cpu-0".to_string(),
                name: Some("Main CPU".to_string()),
                kind: ResourceKind::Cpu,
                capacity: 4,
                unit: "cores".to_string(),
                pool: Some("compute".to_string()),
            },
            ResourceConfig {
                id: "mem-0".to_string(),
                name: None,
                kind: ResourceKind::Memory,
                capacity: 16,
                unit: "GB".to_string(),
                pool: None,
            },
        ],
        ..SchedulerConfig::default()
    }
}

#[test]
fn test_build_ledger_registers_resources_and_pools() {
    let ledger = build_ledger(&config()).unwrap();

    let resources = ledger.resources();
    assert_eq!(resources.len(), 2);
    assert_eq!(resources[0].id().as_str(), "cpu-0");
    assert_eq!(resources[0].name(), "Main CPU");
    assert_eq!(resources[0].unit(), "cores");
    assert_eq!(resources[1].name(), "mem-0");

    let pool = ledger.pool("compute").unwrap();
    assert_eq!(pool.description(), "CPU and GPU nodes");
    assert!(pool.members().contains(&ResourceId::new("cpu-0")));
    assert!(!pool.members().contains(&ResourceId::new("mem-0")));

    let totals = ledger.pool_totals("compute", &ResourceKind::Cpu).unwrap();
    assert_eq!(totals.capacity, 4);
    assert_eq!(totals.available, 4);
}

#[test]
fn test_build_scheduler_from_config() {
    let scheduler = build_scheduler(&config(), TokioSpawner::default()).unwrap();
    assert_eq!(scheduler.ledger().resources().len(), 2);
    assert_eq!(scheduler.config().policy.name(), "priority");
    assert!(!scheduler.is_running());
}

#[test]
fn test_build_scheduler_rejects_invalid_config() {
    let mut cfg = config();
    cfg.resources[1].pool = Some("missing".to_string());
    let err = build_scheduler(&cfg, TokioSpawner::default()).err().unwrap();
    assert!(matches!(err, SchedulerError::Config(_)));
}
