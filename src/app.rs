//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and loads the engine configuration
//! - ingests an observation export (or generates sample data)
//! - runs the forecast, falling back to the naive path when data is short
//! - prints the report and writes optional exports

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, DemoArgs, ForecastArgs, RunArgs, ShowArgs};
use crate::data::{SampleConfig, Snapshot, generate_sample};
use crate::domain::{EngineConfig, ForecastReport};
use crate::error::EngineError;

pub mod pipeline;

use pipeline::ForecastRequest;

/// Entry point for the `pf` binary.
pub fn run() -> Result<(), EngineError> {
    // `pf` alone runs the demo and `pf -i obs.csv` runs a forecast.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Forecast(args) => handle_forecast(args),
        Command::Demo(args) => handle_demo(args),
        Command::Show(args) => handle_show(args),
    }
}

fn handle_forecast(args: ForecastArgs) -> Result<(), EngineError> {
    let config = args.run.engine_config()?;
    init_logging(&config);

    let ingest = crate::io::load_observations(&args.input, args.run.as_of)?;
    println!("{}", crate::report::format_ingest_summary(&ingest));

    run_engine(&ingest.snapshot, &args.run, &config)
}

fn handle_demo(args: DemoArgs) -> Result<(), EngineError> {
    let config = args.run.engine_config()?;
    init_logging(&config);

    let sample = SampleConfig {
        days: args.days,
        seed: args.sample_seed,
        with_snapshot: !args.live_only,
        ..SampleConfig::default()
    };
    let generated = generate_sample(&sample)?;
    let snapshot = match args.run.as_of {
        Some(as_of) => Snapshot::new(generated.observations().to_vec(), as_of),
        None => generated,
    };
    tracing::info!(
        days = sample.days,
        rows = snapshot.len(),
        as_of = %snapshot.as_of(),
        "Generated sample observations"
    );

    run_engine(&snapshot, &args.run, &config)
}

fn handle_show(args: ShowArgs) -> Result<(), EngineError> {
    let report = crate::io::read_report_json(&args.report)?;
    println!("{}", crate::report::format_forecast(&report));
    Ok(())
}

fn run_engine(snapshot: &Snapshot, args: &RunArgs, config: &EngineConfig) -> Result<(), EngineError> {
    let request = ForecastRequest {
        as_of: snapshot.as_of(),
        anchor: config.simulation.anchor,
    };
    let result = if args.no_fallback {
        pipeline::run_forecast(snapshot, &request, config)?
    } else {
        pipeline::forecast_or_naive(snapshot, &request, config)?
    };
    let report = ForecastReport::from(&result);

    println!("{}", crate::report::format_forecast(&report));

    // Optional exports.
    if let Some(path) = &args.export_json {
        crate::io::write_report_json(path, &report)?;
        tracing::info!(path = %path.display(), "Wrote JSON report");
    }
    if let Some(path) = &args.export_csv {
        crate::io::write_bands_csv(path, &result)?;
        tracing::info!(path = %path.display(), "Wrote bands CSV");
    }
    Ok(())
}

fn init_logging(config: &EngineConfig) {
    dotenvy::dotenv().ok();
    // Logs go to stderr so stdout stays the report.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Rewrite argv so `pf` picks a command when none is given.
///
/// Rules:
/// - `pf`                      -> `pf demo`
/// - `pf -i obs.csv ...`       -> `pf forecast -i obs.csv ...`
/// - `pf --paths 500 ...`      -> `pf demo --paths 500 ...`
/// - `pf --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("demo".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "forecast" | "demo" | "show");
    if is_subcommand {
        return argv;
    }

    if arg1.starts_with('-') {
        let has_input = argv[1..]
            .iter()
            .any(|a| a == "-i" || a == "--input" || a.starts_with("--input="));
        argv.insert(1, if has_input { "forecast" } else { "demo" }.to_string());
        return argv;
    }

    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_runs_the_demo() {
        assert_eq!(rewrite_args(args(&["pf"])), args(&["pf", "demo"]));
        assert_eq!(
            rewrite_args(args(&["pf", "--paths", "200"])),
            args(&["pf", "demo", "--paths", "200"])
        );
    }

    #[test]
    fn input_flag_selects_forecast() {
        assert_eq!(
            rewrite_args(args(&["pf", "--anchor", "friday", "-i", "obs.csv"])),
            args(&["pf", "forecast", "--anchor", "friday", "-i", "obs.csv"])
        );
        assert_eq!(
            rewrite_args(args(&["pf", "--input=obs.csv"])),
            args(&["pf", "forecast", "--input=obs.csv"])
        );
    }

    #[test]
    fn explicit_commands_and_help_are_untouched() {
        for argv in [
            args(&["pf", "show", "r.json"]),
            args(&["pf", "--help"]),
            args(&["pf", "forecast", "-i", "x.csv"]),
        ] {
            assert_eq!(rewrite_args(argv.clone()), argv);
        }
    }
}
