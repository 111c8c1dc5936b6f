//! Scheduler, policy, and resource configuration.

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::core::error::SchedulerError;
use crate::util::serde::ResourceKind;

/// Prefix of the environment variables read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "TASK_SCHEDULER_";

const fn default_max_concurrent_tasks() -> usize {
    10
}

const fn default_poll_interval_ms() -> u64 {
    100
}

const fn default_true() -> bool {
    true
}

const fn default_aging_factor() -> f64 {
    0.1
}

const fn default_time_slice_ms() -> u64 {
    10_000
}

const fn default_deadline_weight() -> f64 {
    1.0
}

const fn default_priority_weight() -> f64 {
    0.3
}

const fn default_phase_length() -> u32 {
    10
}

fn default_unit() -> String {
    "units".into()
}

/// Scheduling policy selection and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Aged priority.
    Priority {
        /// Score added per tick spent waiting.
        #[serde(default = "default_aging_factor")]
        aging_factor: f64,
    },
    /// Round robin over tasks whose time slice elapsed.
    RoundRobin {
        /// Minimum time between two selections of the same task.
        #[serde(default = "default_time_slice_ms")]
        time_slice_ms: u64,
    },
    /// Earliest deadline first.
    Deadline {
        /// Weight of deadline proximity.
        #[serde(default = "default_deadline_weight")]
        deadline_weight: f64,
        /// Weight of the priority ordinal.
        #[serde(default = "default_priority_weight")]
        priority_weight: f64,
    },
    /// Rotates priority, deadline, round robin.
    Hybrid {
        /// Selections per phase.
        #[serde(default = "default_phase_length")]
        phase_length: u32,
    },
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::Priority {
            aging_factor: default_aging_factor(),
        }
    }
}

impl PolicyConfig {
    /// Default parameters for the policy named `name`
    /// (`priority`, `round_robin`, `deadline`, `hybrid`).
    ///
    /// # Errors
    ///
    /// A message naming the unknown policy.
    pub fn from_name(name: &str) -> Result<Self, String> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "priority" => Ok(Self::default()),
            "round_robin" => Ok(Self::RoundRobin {
                time_slice_ms: default_time_slice_ms(),
            }),
            "deadline" => Ok(Self::Deadline {
                deadline_weight: default_deadline_weight(),
                priority_weight: default_priority_weight(),
            }),
            "hybrid" => Ok(Self::Hybrid {
                phase_length: default_phase_length(),
            }),
            other => Err(format!("unknown policy `{other}`")),
        }
    }

    /// Policy name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Priority { .. } => "priority",
            Self::RoundRobin { .. } => "round_robin",
            Self::Deadline { .. } => "deadline",
            Self::Hybrid { .. } => "hybrid",
        }
    }

    /// Validate policy parameters.
    ///
    /// # Errors
    ///
    /// A message describing the first invalid parameter.
    pub fn validate(&self) -> Result<(), String> {
        let check_weight = |label: &str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(format!("{label} must be a non-negative number, got {value}"))
            }
        };
        match *self {
            Self::Priority { aging_factor } => check_weight("aging_factor", aging_factor),
            Self::RoundRobin { .. } => Ok(()),
            Self::Deadline {
                deadline_weight,
                priority_weight,
            } => {
                check_weight("deadline_weight", deadline_weight)?;
                check_weight("priority_weight", priority_weight)
            }
            Self::Hybrid { phase_length } => {
                if phase_length == 0 {
                    return Err("phase_length must be greater than 0".into());
                }
                Ok(())
            }
        }
    }
}

/// A resource registered at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Unique identifier.
    pub id: String,
    /// Display name; defaults to the identifier.
    #[serde(default)]
    pub name: Option<String>,
    /// Type tag.
    pub kind: ResourceKind,
    /// Total capacity in units.
    pub capacity: u64,
    /// Unit label.
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Pool to add the resource to.
    #[serde(default)]
    pub pool: Option<String>,
}

/// A reporting pool created at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Pool name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum tasks running at once.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    /// Delay between scheduling ticks when nothing wakes the loop earlier.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Active policy.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Reserve resources through the ledger before dispatch.
    #[serde(default = "default_true")]
    pub enable_resource_management: bool,
    /// Put failed tasks with retries left straight back into the ready set.
    #[serde(default)]
    pub auto_retry: bool,
    /// Cancel blocked tasks whose dependencies can no longer complete.
    #[serde(default)]
    pub cascade_cancel_orphans: bool,
    /// Keep a worker busy for at least the task's estimated duration.
    #[serde(default = "default_true")]
    pub enforce_min_duration: bool,
    /// Resources registered at startup.
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
    /// Pools created at startup.
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            poll_interval_ms: default_poll_interval_ms(),
            policy: PolicyConfig::default(),
            enable_resource_management: true,
            auto_retry: false,
            cascade_cancel_orphans: false,
            enforce_min_duration: true,
            resources: Vec::new(),
            pools: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    /// Poll interval as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate limits, policy parameters, resources and pool references.
    ///
    /// # Errors
    ///
    /// A message describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_tasks == 0 {
            return Err("max_concurrent_tasks must be greater than 0".into());
        }
        if self.max_concurrent_tasks > Semaphore::MAX_PERMITS {
            return Err(format!(
                "max_concurrent_tasks must be at most {}",
                Semaphore::MAX_PERMITS
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than 0".into());
        }
        self.policy
            .validate()
            .map_err(|e| format!("policy `{}` invalid: {e}", self.policy.name()))?;

        let mut pool_names = HashSet::new();
        for pool in &self.pools {
            if pool.name.trim().is_empty() {
                return Err("pool name must not be empty".into());
            }
            pool_names.insert(pool.name.as_str());
        }

        let mut ids = HashSet::new();
        for resource in &self.resources {
            if resource.id.trim().is_empty() {
                return Err("resource id must not be empty".into());
            }
            if !ids.insert(resource.id.as_str()) {
                return Err(format!("duplicate resource id `{}`", resource.id));
            }
            if resource.capacity == 0 {
                return Err(format!("resource `{}`: capacity must be greater than 0", resource.id));
            }
            if let Some(pool) = &resource.pool {
                if !pool_names.contains(pool.as_str()) {
                    return Err(format!(
                        "resource `{}` references unknown pool `{pool}`",
                        resource.id
                    ));
                }
            }
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate it.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Config` on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let cfg: Self = serde_json::from_str(input)
            .map_err(|e| SchedulerError::Config(format!("parse error: {e}")))?;
        cfg.validate().map_err(SchedulerError::Config)?;
        Ok(cfg)
    }

    /// Load `.env` if present, then overlay `TASK_SCHEDULER_*` variables on
    /// the defaults.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Config` for unparsable values or an invalid result.
    pub fn from_env() -> Result<Self, SchedulerError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "failed to load .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from a variable lookup, using the same keys as
    /// [`Self::from_env`]: `MAX_CONCURRENT_TASKS`, `POLL_INTERVAL_MS`,
    /// `POLICY`, `AGING_FACTOR`, `TIME_SLICE_MS`, `DEADLINE_WEIGHT`,
    /// `PRIORITY_WEIGHT`, `PHASE_LENGTH`, `ENABLE_RESOURCE_MANAGEMENT`,
    /// `AUTO_RETRY`, `CASCADE_CANCEL_ORPHANS`, `ENFORCE_MIN_DURATION`, each
    /// prefixed with [`ENV_PREFIX`].
    ///
    /// # Errors
    ///
    /// `SchedulerError::Config` for unparsable values or an invalid result.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SchedulerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut cfg = Self::default();

        if let Some(v) = parse_var(&var, "MAX_CONCURRENT_TASKS")? {
            cfg.max_concurrent_tasks = v;
        }
        if let Some(v) = parse_var(&var, "POLL_INTERVAL_MS")? {
            cfg.poll_interval_ms = v;
        }
        if let Some(name) = var("POLICY") {
            cfg.policy = PolicyConfig::from_name(&name).map_err(SchedulerError::Config)?;
        }
        match &mut cfg.policy {
            PolicyConfig::Priority { aging_factor } => {
                if let Some(v) = parse_var(&var, "AGING_FACTOR")? {
                    *aging_factor = v;
                }
            }
            PolicyConfig::RoundRobin { time_slice_ms } => {
                if let Some(v) = parse_var(&var, "TIME_SLICE_MS")? {
                    *time_slice_ms = v;
                }
            }
            PolicyConfig::Deadline {
                deadline_weight,
                priority_weight,
            } => {
                if let Some(v) = parse_var(&var, "DEADLINE_WEIGHT")? {
                    *deadline_weight = v;
                }
                if let Some(v) = parse_var(&var, "PRIORITY_WEIGHT")? {
                    *priority_weight = v;
                }
            }
            PolicyConfig::Hybrid { phase_length } => {
                if let Some(v) = parse_var(&var, "PHASE_LENGTH")? {
                    *phase_length = v;
                }
            }
        }
        if let Some(v) = parse_flag(&var, "ENABLE_RESOURCE_MANAGEMENT")? {
            cfg.enable_resource_management = v;
        }
        if let Some(v) = parse_flag(&var, "AUTO_RETRY")? {
            cfg.auto_retry = v;
        }
        if let Some(v) = parse_flag(&var, "CASCADE_CANCEL_ORPHANS")? {
            cfg.cascade_cancel_orphans = v;
        }
        if let Some(v) = parse_flag(&var, "ENFORCE_MIN_DURATION")? {
            cfg.enforce_min_duration = v;
        }

        cfg.validate().map_err(SchedulerError::Config)?;
        Ok(cfg)
    }
}

fn parse_var<T, F>(var: &F, name: &str) -> Result<Option<T>, SchedulerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                SchedulerError::Config(format!("{ENV_PREFIX}{name}=`{raw}`: {e}"))
            })
        })
        .transpose()
}

fn parse_flag<F>(var: &F, name: &str) -> Result<Option<bool>, SchedulerError>
where
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(SchedulerError::Config(format!(
                "{ENV_PREFIX}{name}=`{raw}`: expected a boolean"
            ))),
        })
        .transpose()
}
