//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Sim Bridge - scenario lifecycle, services and publishing for a driving simulator
#[derive(Parser, Debug)]
#[command(
    name = "sim-bridge",
    author,
    version,
    about = "Simulation bridge: scenario control services and sensor publishing",
    long_about = "Connects to a running simulator, builds scenarios from JSON documents,\n\
                  exposes control services over a JSON-lines TCP transport and publishes\n\
                  vehicle, sensor and transform data at a fixed rate."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SIM_BRIDGE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SIM_BRIDGE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the engine and run the bridge until interrupted
    Run(RunArgs),

    /// Validate settings, sensor catalogs and scenario documents
    Validate(ValidateArgs),

    /// Display a scenario document
    Info(InfoArgs),
}

/// Document locations shared by every command
#[derive(Parser, Debug, Clone)]
pub struct DocumentArgs {
    /// Bridge settings file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "SIM_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Sensor-definition documents, merged in order (replaces the settings list)
    #[arg(long = "sensors", value_name = "PATH", env = "SIM_BRIDGE_SENSORS", value_delimiter = ',')]
    pub sensor_paths: Vec<PathBuf>,

    /// Fallback directory for relative document paths
    #[arg(long, env = "SIM_BRIDGE_PACKAGE_ROOT")]
    pub package_root: Option<PathBuf>,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub documents: DocumentArgs,

    /// Override engine host from settings
    #[arg(long, env = "SIM_ENGINE_HOST")]
    pub host: Option<String>,

    /// Override engine port from settings
    #[arg(long, env = "SIM_ENGINE_PORT")]
    pub port: Option<u16>,

    /// Scenario document to start right after connecting
    #[arg(short, long, env = "SIM_BRIDGE_SCENARIO")]
    pub scenario: Option<PathBuf>,

    /// Publish loop rate in Hz
    #[arg(long, env = "SIM_BRIDGE_TICK_RATE")]
    pub tick_rate: Option<f64>,

    /// Service transport listen address
    #[arg(long, env = "SIM_BRIDGE_LISTEN")]
    pub listen: Option<String>,

    /// Run against the in-process mock engine instead of a simulator
    #[arg(long)]
    pub mock: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SIM_BRIDGE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub documents: DocumentArgs,

    /// Scenario documents to check against the sensor catalog
    #[arg(value_name = "SCENARIO")]
    pub scenarios: Vec<PathBuf>,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub documents: DocumentArgs,

    /// Scenario document to describe
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show per-sensor details
    #[arg(long)]
    pub sensors: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
