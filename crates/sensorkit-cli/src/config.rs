//! Configuration file handling.
//!
//! ```toml
//! anchor_prefix = "sensorkit.anchor"
//! backfill_days = 7
//!
//! [batch]
//! accelerometer = { count = 5000 }
//! heartRate = { minutes = 30 }
//!
//! [demo]
//! seed = 7
//! days = 9
//! denied = ["visits"]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::warn;

use sensorkit_core::ModuleConfig;
use sensorkit_types::{BatchPolicy, Sensor};

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Anchor database path
    #[serde(default)]
    pub db: Option<PathBuf>,

    /// Prefix for stored anchor keys
    #[serde(default)]
    pub anchor_prefix: Option<String>,

    /// How far back the first sync of a device reaches
    #[serde(default)]
    pub backfill_days: Option<u32>,

    /// Batch policy overrides keyed by sensor identifier
    #[serde(default)]
    pub batch: BTreeMap<String, BatchSetting>,

    /// Simulated host settings
    #[serde(default)]
    pub demo: DemoConfig,
}

/// A batch policy as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSetting {
    Count(usize),
    Minutes(u32),
}

impl From<BatchSetting> for BatchPolicy {
    fn from(setting: BatchSetting) -> Self {
        match setting {
            BatchSetting::Count(count) => BatchPolicy::ByCount(count),
            BatchSetting::Minutes(minutes) => BatchPolicy::ByTime(Duration::minutes(minutes.into())),
        }
    }
}

/// Settings for the simulated sensor host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Seed for generated sample values
    pub seed: u64,
    /// Days of history to generate
    pub days: u32,
    /// Sensors the simulated user has refused
    pub denied: Vec<String>,
    /// Deliver results out of timestamp order
    pub shuffle: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            days: 9,
            denied: Vec::new(),
            shuffle: false,
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sensorkit")
            .join("config.toml")
    }

    /// Load config from file, or return default if not found
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        warn!("Failed to parse config {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Failed to read config {}: {}", path.display(), e);
                }
            }
        }
        Self::default()
    }

    /// Build the module configuration described by this file.
    pub fn module_config(&self) -> Result<ModuleConfig> {
        let mut config = ModuleConfig::default();
        if let Some(prefix) = &self.anchor_prefix {
            config = config.anchor_prefix(prefix.clone());
        }
        if let Some(days) = self.backfill_days {
            config = config.backfill(Duration::days(days.into()));
        }
        for (id, setting) in &self.batch {
            let sensor: Sensor = id
                .parse()
                .with_context(|| format!("Invalid [batch] entry '{id}'"))?;
            config = config.batch_policy(sensor, (*setting).into());
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
