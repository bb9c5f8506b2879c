//! Command-line harness for sensorkit.
//!
//! Every command runs against a simulated sensor host whose history is
//! generated from the `[demo]` section of the config file, with query
//! anchors persisted in the SQLite anchor database.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sensors` | List the sensor catalog |
//! | `devices` | List the devices that recorded a sensor |
//! | `fetch` | Fetch the most recent window before the quarantine cutoff |
//! | `sync` | Run one anchored pass and report its batches |
//! | `anchors` | List stored query anchors |
//! | `reset` | Reset query anchors for one sensor or all of them |

mod cli;
mod commands;
mod config;
mod demo;
mod format;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::Context;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(Config::path);
    let config = Config::load(&config_path);
    let ctx = Context::new(&cli, &config)?;

    match cli.command {
        Commands::Sensors => commands::cmd_sensors(&ctx),
        Commands::Devices { sensor } => commands::cmd_devices(&ctx, &sensor).await,
        Commands::Fetch(args) => commands::cmd_fetch(&ctx, args).await,
        Commands::Sync(args) => commands::cmd_sync(&ctx, args).await,
        Commands::Anchors { sensor } => commands::cmd_anchors(&ctx, sensor.as_deref()),
        Commands::Reset { sensor, all } => commands::cmd_reset(&ctx, sensor.as_deref(), all),
    }
}
