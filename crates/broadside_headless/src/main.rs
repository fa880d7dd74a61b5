//! Headless battle runner.
//!
//! Runs battles without a presentation layer. Results go to stdout as JSON,
//! logs and the optional ASCII view go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Run a single battle
//! cargo run -p broadside_headless -- run --scenario scenarios/skirmish.ron
//!
//! # Watch it unfold at 2x speed
//! cargo run -p broadside_headless -- run --scenario scenarios/skirmish.ron --realtime --speed 2 --ascii
//!
//! # Run batch balance test
//! cargo run -p broadside_headless -- batch --scenario scenarios/skirmish.ron --count 1000 --seed 0
//!
//! # Verify determinism
//! cargo run -p broadside_headless -- verify --scenario scenarios/skirmish.ron --seed 12345 --runs 5
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use broadside_headless::{
    ascii::{render_ascii, AsciiConfig},
    batch::{run_batch, verify_determinism, BatchConfig},
    runner::{run_battle, RunConfig},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "broadside")]
#[command(about = "Headless battle runner for balance testing and CI")]
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
    /// Run a single battle and print its report
    Run {
        /// Scenario file to load (built-in skirmish if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Pace ticks in real time
        #[arg(long)]
        realtime: bool,

        /// Speed multiplier (1, 2 or 4)
        #[arg(long)]
        speed: Option<u8>,

        /// Render the field to stderr after every tick
        #[arg(long)]
        ascii: bool,

        /// Disable colored ASCII output
        #[arg(long)]
        no_color: bool,

        /// Seed override
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run batch of battles for balance testing
    Batch {
        /// Scenario file to load (built-in skirmish if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of battles to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Maximum parallel battles (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Also write the summary to this JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Scenario file to load (built-in skirmish if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries JSON only
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            realtime,
            speed,
            ascii,
            no_color,
            seed,
        } => {
            let mut config = RunConfig::fast().realtime(realtime);
            config.speed = speed;
            let ascii = ascii.then(|| AsciiConfig {
                use_color: !no_color,
                ..AsciiConfig::default()
            });
            cmd_run(scenario, seed, config, ascii);
        }
        Commands::Batch {
            scenario,
            count,
            seed,
            parallel,
            output,
        } => {
            let config = BatchConfig::new(count)
                .with_seed(seed)
                .with_parallel(parallel);
            cmd_batch(scenario, &config, output);
        }
        Commands::Verify {
            scenario,
            seed,
            runs,
        } => {
            cmd_verify(scenario, seed, runs);
        }
    }
}

fn load_scenario(path: Option<PathBuf>) -> Scenario {
    match Scenario::load_or_default(path.as_deref()) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Failed to load scenario: {e}");
            std::process::exit(1);
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to serialize output: {e}");
            std::process::exit(1);
        }
    }
}

/// Run a single battle
fn cmd_run(
    scenario: Option<PathBuf>,
    seed: Option<u64>,
    config: RunConfig,
    ascii: Option<AsciiConfig>,
) {
    let mut scenario = load_scenario(scenario);
    if let Some(seed) = seed {
        scenario = scenario.with_seed(seed);
    }

    tracing::info!(
        scenario = %scenario.name,
        realtime = config.realtime,
        speed = ?config.speed,
        "Running battle"
    );

    let result = run_battle(&scenario, config, |_, snapshot| {
        if let Some(ascii) = &ascii {
            eprintln!("{}", render_ascii(snapshot, ascii));
        }
    });

    match result {
        Ok(report) => print_json(&report),
        Err(e) => {
            eprintln!("Battle failed: {e}");
            std::process::exit(1);
        }
    }
}

/// Run batch balance test
fn cmd_batch(scenario: Option<PathBuf>, config: &BatchConfig, output: Option<PathBuf>) {
    let scenario = load_scenario(scenario);

    tracing::info!(
        scenario = %scenario.name,
        count = config.battle_count,
        seed = config.seed_start,
        parallel = config.parallel_battles,
        "Batch configuration"
    );

    let summary = match run_batch(&scenario, config) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Batch failed: {e}");
            std::process::exit(1);
        }
    };

    if let Some(path) = output {
        if let Err(e) = summary.save(&path) {
            tracing::error!(error = %e, path = %path.display(), "Failed to write summary");
        }
    }
    print_json(&summary);
}

/// Verify determinism for a seed
fn cmd_verify(scenario: Option<PathBuf>, seed: u64, runs: u32) {
    let scenario = load_scenario(scenario);
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario.name,
        seed,
        runs
    );

    match verify_determinism(&scenario, seed, runs) {
        Ok(check) if check.deterministic => {
            eprintln!("PASS: All {runs} runs produced identical results");
        }
        Ok(check) => {
            eprintln!("FAIL: Non-determinism detected! Hashes: {:?}", check.hashes);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Verification failed: {e}");
            std::process::exit(1);
        }
    }
}
