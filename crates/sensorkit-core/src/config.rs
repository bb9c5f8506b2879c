//! Module configuration.

use std::collections::HashMap;

use time::Duration;

use sensorkit_types::{BatchPolicy, Sensor};

use crate::checkpoint::DEFAULT_ANCHOR_PREFIX;
use crate::error::{Error, Result};

/// How far back the first anchored fetch of a device reaches.
pub const DEFAULT_BACKFILL: Duration = Duration::days(7);

/// Configuration for [`SensorModule`](crate::SensorModule).
///
/// ```
/// use sensorkit_core::ModuleConfig;
/// use sensorkit_types::{BatchPolicy, Sensor};
/// use time::Duration;
///
/// let config = ModuleConfig::default()
///     .anchor_prefix("myapp.anchor")
///     .backfill(Duration::days(2))
///     .batch_policy(Sensor::Accelerometer, BatchPolicy::ByCount(10_000));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Prefix for persisted checkpoint keys.
    pub anchor_prefix: String,
    /// Initial lookback for devices without a checkpoint.
    pub backfill: Duration,
    /// Batch policies replacing the catalog defaults.
    pub batch_policies: HashMap<Sensor, BatchPolicy>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            anchor_prefix: DEFAULT_ANCHOR_PREFIX.to_string(),
            backfill: DEFAULT_BACKFILL,
            batch_policies: HashMap::new(),
        }
    }
}

impl ModuleConfig {
    #[must_use]
    pub fn anchor_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.anchor_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn backfill(mut self, backfill: Duration) -> Self {
        self.backfill = backfill;
        self
    }

    #[must_use]
    pub fn batch_policy(mut self, sensor: Sensor, policy: BatchPolicy) -> Self {
        self.batch_policies.insert(sensor, policy);
        self
    }

    /// The effective batch policy for `sensor`.
    #[must_use]
    pub fn policy_for(&self, sensor: Sensor) -> BatchPolicy {
        self.batch_policies
            .get(&sensor)
            .copied()
            .unwrap_or(sensor.descriptor().batch_policy)
    }

    /// Validate the configuration.
    ///
    /// Checks that:
    /// - `anchor_prefix` is non-empty and does not end with `.`
    /// - `backfill` is positive
    /// - every batch policy override can make progress
    pub fn validate(&self) -> Result<()> {
        if self.anchor_prefix.is_empty() {
            return Err(Error::invalid_config("anchor_prefix must not be empty"));
        }
        if self.anchor_prefix.ends_with('.') {
            return Err(Error::invalid_config("anchor_prefix must not end with '.'"));
        }
        if !self.backfill.is_positive() {
            return Err(Error::invalid_config(format!(
                "backfill must be positive, got {}",
                self.backfill
            )));
        }
        for policy in self.batch_policies.values() {
            policy.validate()?;
        }
        Ok(())
    }
}
