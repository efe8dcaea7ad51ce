//! Headless RTS runner.
//!
//! Drives [`rts_core::simulation::Simulation`] through [`game_runner::run_game`]
//! from either a built-in skirmish scenario or a RON scenario file, without
//! any rendering/audio/input dependency. Intended for CI balance sweeps and
//! scripted-strategy playtesting, mirroring the teacher's own headless
//! entry point.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p rts_headless -- run
//! cargo run -p rts_headless -- run --scenario scenarios/skirmish.ron --seed 7
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rts_headless::game_runner::{run_game, GameConfig};
use rts_headless::scenario::Scenario;

#[derive(Parser)]
#[command(name = "rts_headless")]
#[command(about = "Headless RTS runner for CI testing and balance sweeps")]
#[command(version)]
struct Cli {
    /// Enable verbose (debug-level) logging to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single game to completion and print the outcome.
    Run {
        /// Scenario RON file; the standard 1v1 skirmish if omitted.
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Deterministic PRNG seed.
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick ceiling; the run is declared a draw if reached with no winner.
        #[arg(long, default_value = "36000")]
        max_ticks: u64,
    },

    /// Run the same seed `runs` times and confirm every run reaches the
    /// identical outcome (§5's determinism guarantee).
    Verify {
        /// Scenario RON file; the standard 1v1 skirmish if omitted.
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Seed to verify.
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of repeated runs to compare.
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Tick ceiling per run.
        #[arg(long, default_value = "36000")]
        max_ticks: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Run { scenario, seed, max_ticks } => cmd_run(scenario, seed, max_ticks),
        Commands::Verify { scenario, seed, runs, max_ticks } => cmd_verify(scenario, seed, runs, max_ticks),
    }
}

fn load_scenario(path: Option<PathBuf>) -> Scenario {
    match path {
        Some(p) => Scenario::load(&p).unwrap_or_else(|e| {
            tracing::error!(path = %p.display(), error = %e, "failed to load scenario, falling back to skirmish_1v1");
            Scenario::skirmish_1v1()
        }),
        None => Scenario::skirmish_1v1(),
    }
}

fn cmd_run(scenario: Option<PathBuf>, seed: u64, max_ticks: u64) -> ExitCode {
    let scenario = load_scenario(scenario);
    tracing::info!(scenario = %scenario.name, seed, max_ticks, "starting run");

    let config = GameConfig { seed, max_ticks, scenario, blueprints: None };
    match run_game(config) {
        Ok(result) => {
            println!("ticks_elapsed: {}", result.ticks_elapsed);
            println!("timed_out: {}", result.timed_out);
            match &result.winner {
                Some(w) => println!("winner: {w}"),
                None => println!("winner: none (draw)"),
            }
            for (faction, (units, buildings)) in &result.final_faction_strength {
                println!("  {faction}: {units} unit(s), {buildings} building(s)");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("run failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_verify(scenario: Option<PathBuf>, seed: u64, runs: u32, max_ticks: u64) -> ExitCode {
    let scenario = load_scenario(scenario);
    tracing::info!(scenario = %scenario.name, seed, runs, "verifying determinism");

    let mut outcomes = Vec::with_capacity(runs as usize);
    for _ in 0..runs {
        let config = GameConfig { seed, max_ticks, scenario: scenario.clone(), blueprints: None };
        match run_game(config) {
            Ok(result) => outcomes.push(result),
            Err(e) => {
                eprintln!("run failed: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    let first = &outcomes[0];
    let all_match = outcomes.iter().all(|r| {
        r.winner == first.winner && r.ticks_elapsed == first.ticks_elapsed && r.final_faction_strength == first.final_faction_strength
    });

    if all_match {
        println!("PASS: all {runs} runs produced identical results");
        ExitCode::SUCCESS
    } else {
        eprintln!("FAIL: non-determinism detected across {runs} runs");
        ExitCode::FAILURE
    }
}
