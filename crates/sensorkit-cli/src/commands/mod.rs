//! Command implementations for the CLI.

mod anchors;
mod devices;
mod fetch;
mod reset;
mod sensors;
mod sync;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use time::OffsetDateTime;

use sensorkit_core::SensorModule;
use sensorkit_store::Store;
use sensorkit_types::Sensor;

use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::demo;
use crate::format::FormatOptions;

pub use anchors::cmd_anchors;
pub use devices::cmd_devices;
pub use fetch::cmd_fetch;
pub use reset::cmd_reset;
pub use sensors::cmd_sensors;
pub use sync::cmd_sync;

/// Everything a command needs: the module facade over the simulated host,
/// the anchor database behind it and output settings.
pub struct Context {
    pub module: SensorModule,
    pub store: Arc<Store>,
    pub format: OutputFormat,
    pub quiet: bool,
    pub opts: FormatOptions,
}

impl Context {
    pub fn new(cli: &Cli, config: &Config) -> Result<Self> {
        let path = cli
            .db
            .clone()
            .or_else(|| config.db.clone())
            .unwrap_or_else(sensorkit_store::default_db_path);
        let store = Arc::new(
            Store::open(&path)
                .with_context(|| format!("Failed to open anchor database {}", path.display()))?,
        );

        let host = demo::simulated_host(&config.demo, OffsetDateTime::now_utc())?;
        let module = SensorModule::builder(Arc::new(host), store.clone())
            .config(config.module_config()?)
            .build()
            .context("Failed to initialize the sensor module")?;

        Ok(Self {
            module,
            store,
            format: cli.output_format(),
            quiet: cli.quiet,
            opts: FormatOptions::new(cli.no_color),
        })
    }

    /// Resolve a sensor identifier through the module catalog.
    pub fn sensor(&self, id: &str) -> Result<Sensor> {
        Ok(self.module.sensor(id)?)
    }

    pub fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}
