//! Resources with integer capacity accounting, and named pools for reporting.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::error::SchedulerError;
use crate::util::clock::now_ms;
use crate::util::serde::{ResourceId, ResourceKind};

/// A finite capacity that tasks reserve units of while running.
///
/// `available + allocated == capacity` holds after every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    id: ResourceId,
    name: String,
    kind: ResourceKind,
    capacity: u64,
    available: u64,
    allocated: u64,
    unit: String,
    created_at_ms: u128,
    last_updated_ms: u128,
}

impl Resource {
    /// Create a resource with all capacity available.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Validation` if `capacity` is zero.
    pub fn new(
        id: impl Into<ResourceId>,
        name: impl Into<String>,
        kind: ResourceKind,
        capacity: u64,
    ) -> Result<Self, SchedulerError> {
        let id = id.into();
        if capacity == 0 {
            return Err(SchedulerError::Validation(format!(
                "resource {id}: capacity must be positive"
            )));
        }
        let now = now_ms();
        Ok(Self {
            id,
            name: name.into(),
            kind,
            capacity,
            available: capacity,
            allocated: 0,
            unit: "units".into(),
            created_at_ms: now,
            last_updated_ms: now,
        })
    }

    /// Set the unit label used in reports.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Identifier.
    #[must_use]
    pub const fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type tag.
    #[must_use]
    pub const fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Total capacity.
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Free units.
    #[must_use]
    pub const fn available(&self) -> u64 {
        self.available
    }

    /// Reserved units.
    #[must_use]
    pub const fn allocated(&self) -> u64 {
        self.allocated
    }

    /// Unit label.
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Last time the counters changed (ms since epoch).
    #[must_use]
    pub const fn last_updated_ms(&self) -> u128 {
        self.last_updated_ms
    }

    /// Whether `amount` units are free.
    #[must_use]
    pub const fn is_available(&self, amount: u64) -> bool {
        self.available >= amount
    }

    /// Conservation check.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.available + self.allocated == self.capacity
    }

    /// `allocated / capacity` in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> f64 {
        self.allocated as f64 / self.capacity as f64
    }

    /// `available / capacity` in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn availability(&self) -> f64 {
        self.available as f64 / self.capacity as f64
    }

    pub(crate) fn reserve(&mut self, amount: u64) -> Result<(), SchedulerError> {
        if !self.is_available(amount) {
            return Err(SchedulerError::ResourceUnavailable {
                resource: self.id.clone(),
                requested: amount,
                available: self.available,
            });
        }
        self.available -= amount;
        self.allocated += amount;
        self.last_updated_ms = now_ms();
        Ok(())
    }

    pub(crate) fn release(&mut self, amount: u64) -> Result<(), SchedulerError> {
        if amount > self.allocated {
            return Err(SchedulerError::AllocationRollback(format!(
                "resource {}: cannot release {amount} of {} allocated units",
                self.id, self.allocated
            )));
        }
        self.available += amount;
        self.allocated -= amount;
        self.last_updated_ms = now_ms();
        Ok(())
    }
}

/// A named group of resources, used for reporting only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePool {
    name: String,
    description: String,
    members: BTreeSet<ResourceId>,
    created_at_ms: u128,
}

impl ResourcePool {
    /// Create an empty pool.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            members: BTreeSet::new(),
            created_at_ms: now_ms(),
        }
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pool description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Member resource identifiers.
    #[must_use]
    pub const fn members(&self) -> &BTreeSet<ResourceId> {
        &self.members
    }

    /// Add a member. Returns `false` if it was already present.
    pub fn insert(&mut self, id: ResourceId) -> bool {
        self.members.insert(id)
    }

    /// Remove a member. Returns `false` if it was absent.
    pub fn remove(&mut self, id: &ResourceId) -> bool {
        self.members.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(Resource::new("cpu-0", "CPU", ResourceKind::Cpu, 0).is_err());
    }

    #[test]
    fn test_reserve_and_release_conserve_capacity() {
        let mut cpu = Resource::new("cpu-0", "CPU", ResourceKind::Cpu, 4).unwrap();
        cpu.reserve(3).unwrap();
        assert_eq!(cpu.available(), 1);
        assert_eq!(cpu.allocated(), 3);
        assert!(cpu.is_consistent());

        let err = cpu.reserve(2).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::ResourceUnavailable {
                requested: 2,
                available: 1,
                ..
            }
        ));
        assert_eq!(cpu.available(), 1);

        cpu.release(3).unwrap();
        assert_eq!(cpu.available(), 4);
        assert!(cpu.release(1).is_err());
        assert!(cpu.is_consistent());
    }

    #[test]
    fn test_utilization() {
        let mut gpu = Resource::new("gpu-0", "GPU", ResourceKind::Gpu, 4).unwrap();
        assert!(gpu.utilization().abs() < f64::EPSILON);
        gpu.reserve(1).unwrap();
        assert!((gpu.utilization() - 0.25).abs() < f64::EPSILON);
        assert!((gpu.availability() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pool_membership() {
        let mut pool = ResourcePool::new("compute", "cpu and gpu");
        assert!(pool.insert(ResourceId::new("cpu-0")));
        assert!(!pool.insert(ResourceId::new("cpu-0")));
        assert_eq!(pool.members().len(), 1);
        assert!(pool.remove(&ResourceId::new("cpu-0")));
        assert!(pool.members().is_empty());
    }
}
