//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "sensorkit")]
#[command(
    author,
    version,
    about = "Anchored access to on-device sensor history",
    long_about = None
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as JSON (shorthand for --format json)
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Anchor database path (defaults to the platform data directory)
    #[arg(long, global = true, env = "SENSORKIT_DB")]
    pub db: Option<PathBuf>,

    /// Configuration file path
    #[arg(long, global = true, env = "SENSORKIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// The effective output format after applying `--json`.
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the sensor catalog
    Sensors,

    /// List the devices that recorded a sensor
    Devices {
        /// Sensor identifier, e.g. heartRate
        #[arg(short, long, env = "SENSORKIT_SENSOR")]
        sensor: String,
    },

    /// Fetch the most recent window of raw samples
    Fetch(FetchArgs),

    /// Run one anchored pass and report the batches
    Sync(SyncArgs),

    /// List stored query anchors
    Anchors {
        /// Only anchors of this sensor
        #[arg(short, long)]
        sensor: Option<String>,
    },

    /// Reset query anchors so the next sync starts over
    Reset {
        /// Sensor whose anchors are removed
        #[arg(short, long, required_unless_present = "all", conflicts_with = "all")]
        sensor: Option<String>,

        /// Remove the anchors of every sensor
        #[arg(long)]
        all: bool,
    },
}

#[derive(Debug, Clone, Args)]
pub struct FetchArgs {
    /// Sensor identifier, e.g. heartRate
    #[arg(short, long, env = "SENSORKIT_SENSOR")]
    pub sensor: String,

    /// Device product type (defaults to the first device)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Hours of data ending at the quarantine cutoff
    #[arg(long, default_value = "1")]
    pub last: u32,
}

#[derive(Debug, Clone, Args)]
pub struct SyncArgs {
    /// Sensor identifier, e.g. heartRate
    #[arg(short, long, env = "SENSORKIT_SENSOR")]
    pub sensor: String,

    /// Emit a batch every N raw samples
    #[arg(long, conflicts_with = "every_minutes")]
    pub count: Option<usize>,

    /// Emit a batch per M minutes of data
    #[arg(long)]
    pub every_minutes: Option<u32>,

    /// Stop after this many batches
    #[arg(long)]
    pub limit: Option<usize>,
}
