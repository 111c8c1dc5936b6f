//! Builders to construct the ledger and scheduler from configuration.

use tracing::{debug, info};

use crate::config::SchedulerConfig;
use crate::core::ledger::ResourceLedger;
use crate::core::resource::Resource;
use crate::core::{SchedulerError, TaskScheduler};
use crate::runtime::Spawn;
use crate::util::serde::ResourceId;

/// Build a ledger holding the configured pools and resources.
///
/// # Errors
///
/// `Validation` for a resource with zero capacity, `ResourceExists` for a
/// duplicate identifier, `PoolNotFound` for an undeclared pool.
pub fn build_ledger(cfg: &SchedulerConfig) -> Result<ResourceLedger, SchedulerError> {
    let ledger = ResourceLedger::new();
    for pool in &cfg.pools {
        ledger.create_pool(&pool.name, &pool.description);
    }

    for res_cfg in &cfg.resources {
        let name = res_cfg.name.clone().unwrap_or_else(|| res_cfg.id.clone());
        let resource = Resource::new(
            res_cfg.id.as_str(),
            name,
            res_cfg.kind.clone(),
            res_cfg.capacity,
        )?
        .with_unit(res_cfg.unit.clone());
        ledger.add_resource(resource)?;

        if let Some(pool) = &res_cfg.pool {
            ledger.add_resource_to_pool(&ResourceId::new(res_cfg.id.as_str()), pool)?;
            debug!(resource = %res_cfg.id, pool = %pool, "resource added to pool");
        }
    }
    Ok(ledger)
}

/// Build a scheduler from configuration, spawning through `spawner`.
///
/// # Errors
///
/// `Config` if validation fails, or whatever [`build_ledger`] rejects.
pub fn build_scheduler<S>(
    cfg: &SchedulerConfig,
    spawner: S,
) -> Result<TaskScheduler<S>, SchedulerError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    let scheduler = TaskScheduler::with_spawner(cfg.clone(), spawner)?;
    info!(
        policy = cfg.policy.name(),
        resources = cfg.resources.len(),
        pools = scheduler.ledger().pool_names().len(),
        "scheduler built from configuration"
    );
    Ok(scheduler)
}
