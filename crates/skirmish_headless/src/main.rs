//! Headless skirmish runner.
//!
//! Plays battles without graphics and prints a JSON report.
//!
//! # Usage
//!
//! ```bash
//! # Run a scenario file
//! cargo run -p skirmish_headless -- run --scenario scenarios/line_battle.ron
//!
//! # Built-in two-team skirmish, capped at 2000 ticks
//! cargo run -p skirmish_headless -- skirmish --max-ticks 2000
//!
//! # Check that repeated runs agree
//! cargo run -p skirmish_headless -- verify --scenario scenarios/line_battle.ron --runs 5
//! ```
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `info`, or `debug`
//! with `--verbose`).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skirmish_headless::{HeadlessRunner, Scenario, ScenarioError};

#[derive(Parser)]
#[command(name = "skirmish_headless")]
#[command(about = "Headless team battle runner")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file to completion
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override the scenario's tick limit
        #[arg(long)]
        max_ticks: Option<u64>,
    },

    /// Run the built-in two-team skirmish
    Skirmish {
        /// Override the tick limit
        #[arg(long)]
        max_ticks: Option<u64>,
    },

    /// Verify determinism by running the same battle several times
    Verify {
        /// Scenario file (built-in skirmish if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of verification runs
        #[arg(short, long, default_value = "3")]
        runs: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs to stderr; stdout is for the report
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run {
            scenario,
            max_ticks,
        } => Scenario::load(&scenario).and_then(|s| cmd_run(s, max_ticks, cli.verbose)),
        Commands::Skirmish { max_ticks } => cmd_run(Scenario::skirmish(), max_ticks, cli.verbose),
        Commands::Verify { scenario, runs } => {
            let scenario = match scenario {
                Some(path) => Scenario::load(&path),
                None => Ok(Scenario::skirmish()),
            };
            scenario.and_then(|s| cmd_verify(s, runs))
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Run one battle and print its report
fn cmd_run(
    scenario: Scenario,
    max_ticks: Option<u64>,
    verbose: bool,
) -> Result<ExitCode, ScenarioError> {
    let report = HeadlessRunner::new(scenario)
        .with_max_ticks(max_ticks)
        .with_telemetry(verbose)
        .run()?;

    match report.to_json() {
        Ok(json) => {
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::error!("Failed to encode report: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Verify determinism
fn cmd_verify(scenario: Scenario, runs: usize) -> Result<ExitCode, ScenarioError> {
    tracing::info!("Verifying determinism: {} ({} runs)", scenario.name, runs);

    if HeadlessRunner::new(scenario).verify_determinism(runs)? {
        println!("deterministic");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("DIVERGED");
        Ok(ExitCode::FAILURE)
    }
}
