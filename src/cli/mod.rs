//! Command-line parsing for the retail gasoline forecaster.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use crate::domain::{AnchorDay, EngineConfig};
use crate::error::EngineError;
use crate::io::parse_timestamp;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "pf", version, about = "Retail gasoline price forecaster")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Forecast from an observation-store CSV export.
    Forecast(ForecastArgs),
    /// Forecast from generated sample data (no input needed).
    Demo(DemoArgs),
    /// Print a previously exported JSON report.
    Show(ShowArgs),
}

/// Options shared by every command that runs the engine.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Engine configuration (TOML). Missing keys take their defaults.
    #[arg(short = 'c', long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Forecast as of this instant; later observations are ignored.
    #[arg(long, value_parser = parse_timestamp)]
    pub as_of: Option<DateTime<Utc>>,

    /// Anchor day: month-end, a weekday name, or YYYY-MM-DD.
    #[arg(long)]
    pub anchor: Option<AnchorDay>,

    /// Number of simulated paths.
    #[arg(long)]
    pub paths: Option<usize>,

    /// Simulation seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Fail instead of falling back to the naive forecast when data is short.
    #[arg(long)]
    pub no_fallback: bool,

    /// Log filter when RUST_LOG is unset (e.g. info, debug).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Export the full report to JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Export the point forecast and bands to CSV.
    #[arg(long = "export-csv", value_name = "CSV")]
    pub export_csv: Option<PathBuf>,
}

impl RunArgs {
    /// Load the configuration file (or defaults) and apply command-line overrides.
    pub fn engine_config(&self) -> Result<EngineConfig, EngineError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_toml_file(path)?,
            None => EngineConfig::default(),
        };
        if let Some(anchor) = self.anchor {
            config.simulation.anchor = anchor;
        }
        if let Some(paths) = self.paths {
            config.simulation.paths = paths;
        }
        if let Some(seed) = self.seed {
            config.simulation.seed = seed;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Args)]
pub struct ForecastArgs {
    /// Observation CSV (columns: source, value, secondary_value, event_label, observed_at, as_of_date).
    #[arg(short = 'i', long, value_name = "CSV")]
    pub input: PathBuf,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Args)]
pub struct DemoArgs {
    /// Days of generated history.
    #[arg(long, default_value_t = 180)]
    pub days: usize,

    /// Seed for the generated data (independent of the simulation seed).
    #[arg(long, default_value_t = 7)]
    pub sample_seed: u64,

    /// Generate only the live feed, without the daily snapshot stream.
    #[arg(long)]
    pub live_only: bool,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// JSON report produced by `--export-json`.
    #[arg(value_name = "JSON")]
    pub report: PathBuf,
}
