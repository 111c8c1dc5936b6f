//! Resource ledger: registered resources, pools, and per-task reservations.
//!
//! All mutation goes through a single `parking_lot::Mutex` scoped to the
//! ledger, so reservations are atomic with respect to every other ledger
//! operation. For every resource, the sum of the amounts recorded against it
//! across all ledger entries equals its `allocated` counter.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::core::error::SchedulerError;
use crate::core::resource::{Resource, ResourcePool};
use crate::util::serde::{ResourceId, ResourceKind, TaskId};

/// Requested or reserved units per resource.
pub type Requirements = BTreeMap<ResourceId, u64>;

/// Running counters kept by the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCounters {
    /// Successful allocations.
    pub total_allocations: u64,
    /// Ledger entries released.
    pub total_deallocations: u64,
    /// Allocation requests refused.
    pub allocation_failures: u64,
    /// Partial reservations that had to be undone.
    pub rollbacks: u64,
}

/// Read-only snapshot of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerStats {
    /// Counters.
    pub counters: LedgerCounters,
    /// Registered resources.
    pub total_resources: usize,
    /// Registered pools.
    pub total_pools: usize,
    /// Tasks currently holding reservations.
    pub active_allocations: usize,
    /// Utilization per resource.
    pub utilization: BTreeMap<ResourceId, f64>,
}

/// Usage line for one resource in an [`AllocationSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Resource name.
    pub name: String,
    /// Resource type.
    pub kind: ResourceKind,
    /// Total capacity.
    pub capacity: u64,
    /// Reserved units.
    pub allocated: u64,
    /// Free units.
    pub available: u64,
    /// `allocated / capacity`.
    pub utilization: f64,
}

/// Per-task reservations and per-resource usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSummary {
    /// Reservations keyed by task.
    pub allocations_by_task: BTreeMap<TaskId, Requirements>,
    /// Usage keyed by resource.
    pub resource_usage: BTreeMap<ResourceId, ResourceUsage>,
}

/// Capacity totals of a pool for one resource type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolTotals {
    /// Sum of member capacities.
    pub capacity: u64,
    /// Sum of member free units.
    pub available: u64,
}

#[derive(Default)]
struct LedgerInner {
    resources: HashMap<ResourceId, Resource>,
    /// Registration order, used for first-fit resolution.
    order: Vec<ResourceId>,
    pools: BTreeMap<String, ResourcePool>,
    allocations: HashMap<TaskId, Requirements>,
    counters: LedgerCounters,
}

impl LedgerInner {
    fn allocate(
        &mut self,
        task_id: TaskId,
        requirements: &Requirements,
    ) -> Result<(), SchedulerError> {
        if self.allocations.contains_key(&task_id) {
            return Err(SchedulerError::AllocationExists(task_id));
        }

        for (resource_id, &amount) in requirements {
            if amount == 0 {
                return Err(SchedulerError::Validation(format!(
                    "task {task_id}: zero amount requested from {resource_id}"
                )));
            }
            let Some(resource) = self.resources.get(resource_id) else {
                self.counters.allocation_failures += 1;
                return Err(SchedulerError::ResourceNotFound(resource_id.clone()));
            };
            if !resource.is_available(amount) {
                self.counters.allocation_failures += 1;
                warn!(
                    task_id = %task_id,
                    resource = %resource_id,
                    requested = amount,
                    available = resource.available(),
                    "insufficient capacity"
                );
                return Err(SchedulerError::ResourceUnavailable {
                    resource: resource_id.clone(),
                    requested: amount,
                    available: resource.available(),
                });
            }
        }

        let mut applied: Vec<(ResourceId, u64)> = Vec::with_capacity(requirements.len());
        for (resource_id, &amount) in requirements {
            let outcome = match self.resources.get_mut(resource_id) {
                Some(resource) => resource.reserve(amount),
                None => Err(SchedulerError::ResourceNotFound(resource_id.clone())),
            };
            if let Err(e) = outcome {
                self.counters.allocation_failures += 1;
                self.rollback(task_id, &applied)?;
                return Err(e);
            }
            applied.push((resource_id.clone(), amount));
        }

        if !requirements.is_empty() {
            self.allocations.insert(task_id, requirements.clone());
            self.counters.total_allocations += 1;
            debug!(task_id = %task_id, reserved = ?requirements, "allocated resources");
        }
        Ok(())
    }

    /// Undo reservations made earlier in the same allocation. Availability is
    /// checked under the same lock first, so this only runs if a `reserve`
    /// still fails after the check passed.
    fn rollback(
        &mut self,
        task_id: TaskId,
        applied: &[(ResourceId, u64)],
    ) -> Result<(), SchedulerError> {
        self.counters.rollbacks += 1;
        for (resource_id, amount) in applied.iter().rev() {
            let released = match self.resources.get_mut(resource_id) {
                Some(resource) => resource.release(*amount),
                None => Err(SchedulerError::ResourceNotFound(resource_id.clone())),
            };
            if let Err(e) = released {
                error!(
                    task_id = %task_id,
                    resource = %resource_id,
                    error = %e,
                    "rollback failed, ledger is inconsistent"
                );
                return Err(SchedulerError::AllocationRollback(format!(
                    "task {task_id}: {e}"
                )));
            }
        }
        warn!(task_id = %task_id, undone = applied.len(), "rolled back partial allocation");
        Ok(())
    }

    fn first_fit(&self, kinds: &BTreeSet<ResourceKind>) -> Result<Requirements, SchedulerError> {
        let mut requirements = Requirements::new();
        for kind in kinds {
            let found = self
                .order
                .iter()
                .filter_map(|id| self.resources.get(id))
                .find(|r| r.kind() == kind && r.is_available(1))
                .ok_or_else(|| SchedulerError::NoResourceOfKind(kind.to_string()))?;
            requirements.insert(found.id().clone(), 1);
        }
        Ok(requirements)
    }
}

/// Named capacity pools with atomic all-or-nothing reservation.
#[derive(Default)]
pub struct ResourceLedger {
    inner: Mutex<LedgerInner>,
}

impl ResourceLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource.
    ///
    /// # Errors
    ///
    /// `ResourceExists` if the identifier is taken.
    pub fn add_resource(&self, resource: Resource) -> Result<(), SchedulerError> {
        let mut inner = self.inner.lock();
        if inner.resources.contains_key(resource.id()) {
            return Err(SchedulerError::ResourceExists(resource.id().clone()));
        }
        info!(
            resource = %resource.id(),
            kind = %resource.kind(),
            capacity = resource.capacity(),
            "added resource"
        );
        inner.order.push(resource.id().clone());
        inner.resources.insert(resource.id().clone(), resource);
        Ok(())
    }

    /// Unregister a resource that has nothing allocated. Also drops it from
    /// every pool.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound`, or `ResourceInUse` while units are reserved.
    pub fn remove_resource(&self, id: &ResourceId) -> Result<Resource, SchedulerError> {
        let mut inner = self.inner.lock();
        let allocated = inner
            .resources
            .get(id)
            .ok_or_else(|| SchedulerError::ResourceNotFound(id.clone()))?
            .allocated();
        if allocated > 0 {
            return Err(SchedulerError::ResourceInUse {
                resource: id.clone(),
                allocated,
            });
        }
        inner.order.retain(|existing| existing != id);
        for pool in inner.pools.values_mut() {
            pool.remove(id);
        }
        let removed = inner
            .resources
            .remove(id)
            .ok_or_else(|| SchedulerError::ResourceNotFound(id.clone()))?;
        info!(resource = %id, "removed resource");
        Ok(removed)
    }

    /// Snapshot of one resource.
    #[must_use]
    pub fn resource(&self, id: &ResourceId) -> Option<Resource> {
        self.inner.lock().resources.get(id).cloned()
    }

    /// Snapshot of all resources in registration order.
    #[must_use]
    pub fn resources(&self) -> Vec<Resource> {
        let inner = self.inner.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.resources.get(id).cloned())
            .collect()
    }

    /// Resources of `kind` with at least one free unit.
    #[must_use]
    pub fn available_by_kind(&self, kind: &ResourceKind) -> Vec<Resource> {
        let inner = self.inner.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.resources.get(id))
            .filter(|r| r.kind() == kind && r.available() > 0)
            .cloned()
            .collect()
    }

    /// Create a pool, or return the existing one with that name.
    pub fn create_pool(&self, name: &str, description: &str) -> ResourcePool {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.pools.get(name) {
            warn!(pool = name, "pool already exists");
            return existing.clone();
        }
        let pool = ResourcePool::new(name, description);
        inner.pools.insert(name.to_string(), pool.clone());
        info!(pool = name, "created resource pool");
        pool
    }

    /// Add a registered resource to a pool. Returns `false` if it was
    /// already a member.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` or `PoolNotFound`.
    pub fn add_resource_to_pool(
        &self,
        id: &ResourceId,
        pool: &str,
    ) -> Result<bool, SchedulerError> {
        let mut inner = self.inner.lock();
        if !inner.resources.contains_key(id) {
            return Err(SchedulerError::ResourceNotFound(id.clone()));
        }
        let pool_entry = inner
            .pools
            .get_mut(pool)
            .ok_or_else(|| SchedulerError::PoolNotFound(pool.to_string()))?;
        Ok(pool_entry.insert(id.clone()))
    }

    /// Snapshot of a pool.
    #[must_use]
    pub fn pool(&self, name: &str) -> Option<ResourcePool> {
        self.inner.lock().pools.get(name).cloned()
    }

    /// Names of all pools.
    #[must_use]
    pub fn pool_names(&self) -> Vec<String> {
        self.inner.lock().pools.keys().cloned().collect()
    }

    /// Capacity and free units of a pool's members of type `kind`.
    ///
    /// # Errors
    ///
    /// `PoolNotFound`.
    pub fn pool_totals(
        &self,
        pool: &str,
        kind: &ResourceKind,
    ) -> Result<PoolTotals, SchedulerError> {
        let inner = self.inner.lock();
        let pool = inner
            .pools
            .get(pool)
            .ok_or_else(|| SchedulerError::PoolNotFound(pool.to_string()))?;
        Ok(pool
            .members()
            .iter()
            .filter_map(|id| inner.resources.get(id))
            .filter(|r| r.kind() == kind)
            .fold(PoolTotals::default(), |acc, r| PoolTotals {
                capacity: acc.capacity + r.capacity(),
                available: acc.available + r.available(),
            }))
    }

    /// Reserve every requested amount for `task_id`, or nothing at all.
    ///
    /// Availability of every resource is checked before anything is
    /// reserved. If a reservation still fails midway, the ones already applied
    /// by this call are undone before the error is returned. An empty request
    /// succeeds without creating a ledger entry.
    ///
    /// # Errors
    ///
    /// `ResourceUnavailable` (transient), `ResourceNotFound`,
    /// `AllocationExists`, `Validation` for zero amounts, or
    /// `AllocationRollback` if undoing a partial reservation failed.
    pub fn allocate(
        &self,
        task_id: TaskId,
        requirements: &Requirements,
    ) -> Result<(), SchedulerError> {
        self.inner.lock().allocate(task_id, requirements)
    }

    /// Resolve one unit per resource type to the first registered resource
    /// of that type with free capacity.
    ///
    /// # Errors
    ///
    /// `NoResourceOfKind` if some type has no free resource.
    pub fn resolve_first_fit(
        &self,
        kinds: &BTreeSet<ResourceKind>,
    ) -> Result<Requirements, SchedulerError> {
        self.inner.lock().first_fit(kinds)
    }

    /// Resolve `kinds` first-fit and reserve them under one lock.
    ///
    /// # Errors
    ///
    /// As [`Self::resolve_first_fit`] and [`Self::allocate`].
    pub fn allocate_first_fit(
        &self,
        task_id: TaskId,
        kinds: &BTreeSet<ResourceKind>,
    ) -> Result<Requirements, SchedulerError> {
        let mut inner = self.inner.lock();
        let requirements = match inner.first_fit(kinds) {
            Ok(requirements) => requirements,
            Err(e) => {
                inner.counters.allocation_failures += 1;
                return Err(e);
            }
        };
        inner.allocate(task_id, &requirements)?;
        Ok(requirements)
    }

    /// Release everything recorded for `task_id`. Unknown tasks are a no-op;
    /// returns whether an entry existed.
    pub fn deallocate(&self, task_id: TaskId) -> bool {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.allocations.remove(&task_id) else {
            debug!(task_id = %task_id, "no allocation to release");
            return false;
        };
        for (resource_id, amount) in &entry {
            let released = match inner.resources.get_mut(resource_id) {
                Some(resource) => resource.release(*amount),
                None => Err(SchedulerError::ResourceNotFound(resource_id.clone())),
            };
            if let Err(e) = released {
                error!(task_id = %task_id, resource = %resource_id, error = %e, "release failed");
            }
        }
        inner.counters.total_deallocations += 1;
        debug!(task_id = %task_id, released = ?entry, "deallocated resources");
        true
    }

    /// Reservation currently held by `task_id`.
    #[must_use]
    pub fn allocation(&self, task_id: TaskId) -> Option<Requirements> {
        self.inner.lock().allocations.get(&task_id).cloned()
    }

    /// `allocated / capacity` of one resource.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound`.
    pub fn utilization(&self, id: &ResourceId) -> Result<f64, SchedulerError> {
        self.inner
            .lock()
            .resources
            .get(id)
            .map(Resource::utilization)
            .ok_or_else(|| SchedulerError::ResourceNotFound(id.clone()))
    }

    /// Utilization of every resource.
    #[must_use]
    pub fn utilization_all(&self) -> BTreeMap<ResourceId, f64> {
        self.inner
            .lock()
            .resources
            .iter()
            .map(|(id, r)| (id.clone(), r.utilization()))
            .collect()
    }

    /// Counters and utilization snapshot.
    #[must_use]
    pub fn stats(&self) -> LedgerStats {
        let inner = self.inner.lock();
        LedgerStats {
            counters: inner.counters,
            total_resources: inner.resources.len(),
            total_pools: inner.pools.len(),
            active_allocations: inner.allocations.len(),
            utilization: inner
                .resources
                .iter()
                .map(|(id, r)| (id.clone(), r.utilization()))
                .collect(),
        }
    }

    /// Reservations by task and usage by resource.
    #[must_use]
    pub fn allocation_summary(&self) -> AllocationSummary {
        let inner = self.inner.lock();
        AllocationSummary {
            allocations_by_task: inner
                .allocations
                .iter()
                .map(|(task, req)| (*task, req.clone()))
                .collect(),
            resource_usage: inner
                .resources
                .iter()
                .map(|(id, r)| {
                    (
                        id.clone(),
                        ResourceUsage {
                            name: r.name().to_string(),
                            kind: r.kind().clone(),
                            capacity: r.capacity(),
                            allocated: r.allocated(),
                            available: r.available(),
                            utilization: r.utilization(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Verify conservation: every resource satisfies
    /// `available + allocated == capacity`, and ledger entries sum to each
    /// resource's `allocated`.
    ///
    /// # Errors
    ///
    /// A description of the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        let inner = self.inner.lock();
        let mut recorded: HashMap<&ResourceId, u64> = HashMap::new();
        for entry in inner.allocations.values() {
            for (id, amount) in entry {
                *recorded.entry(id).or_default() += amount;
            }
        }
        for (id, resource) in &inner.resources {
            if !resource.is_consistent() {
                return Err(format!(
                    "{id}: available {} + allocated {} != capacity {}",
                    resource.available(),
                    resource.allocated(),
                    resource.capacity()
                ));
            }
            let sum = recorded.get(id).copied().unwrap_or(0);
            if sum != resource.allocated() {
                return Err(format!(
                    "{id}: ledger entries sum to {sum}, resource reports {}",
                    resource.allocated()
                ));
            }
        }
        Ok(())
    }
}
