//! Headless brawl match runner.
//!
//! This binary runs matches without graphics, either to completion or
//! controlled via JSON on stdin/stdout.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p brawl_headless
//!
//! # Run a single match, printing events as JSON lines
//! cargo run -p brawl_headless -- run --scenario skirmish_3v3 --seed 7
//!
//! # Run batch balance test
//! cargo run -p brawl_headless -- batch --scenario duel --count 1000 --output results/
//!
//! # Check a recorded replay
//! cargo run -p brawl_headless -- replay --file match.replay --verify
//! ```
//!
//! Logs go to stderr; `RUST_LOG` overrides the level chosen by `--verbose`.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use brawl_core::replay::{Replay, ReplayPlayer};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use brawl_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    runner::HeadlessRunner,
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "brawl_headless")]
#[command(about = "Headless brawl match runner for AI testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one match to completion, writing events to stdout
    Run {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "duel")]
        scenario: String,

        /// Seed override
        #[arg(long)]
        seed: Option<u64>,

        /// Save a replay to this path
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Serve the JSON command protocol on stdin/stdout
    Play {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "duel")]
        scenario: String,

        /// Seed override
        #[arg(long)]
        seed: Option<u64>,

        /// Output state after every tick
        #[arg(long)]
        auto_state: bool,

        /// Save a replay to this path when the session ends
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Run a batch of seeds for balance testing
    Batch {
        /// Scenario to run
        #[arg(short, long, default_value = "duel")]
        scenario: String,

        /// Number of matches to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel matches (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick limit per match (0 = scenario default)
        #[arg(long, default_value = "0")]
        max_ticks: u64,
    },

    /// Verify determinism by running the same seed multiple times
    Verify {
        /// Scenario to test
        #[arg(short, long, default_value = "skirmish_3v3")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Replay a recorded match
    Replay {
        /// Replay file path
        #[arg(short, long)]
        file: PathBuf,

        /// Verify replay produces identical hash
        #[arg(long)]
        verify: bool,
    },

    /// Run N ticks for benchmarking
    Benchmark {
        /// Number of ticks to run
        #[arg(short, long, default_value = "36000")]
        ticks: u64,

        /// Scenario to benchmark
        #[arg(short, long, default_value = "skirmish_3v3")]
        scenario: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            seed,
            record,
        }) => cmd_run(&scenario, seed, record),
        Some(Commands::Play {
            scenario,
            seed,
            auto_state,
            record,
        }) => cmd_play(&scenario, seed, auto_state, record),
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            max_ticks,
        }) => cmd_batch(scenario, count, parallel, output, seed, max_ticks),
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
        }) => cmd_verify(&scenario, seed, runs),
        Some(Commands::Replay { file, verify }) => cmd_replay(&file, verify),
        Some(Commands::Benchmark { ticks, scenario }) => cmd_benchmark(ticks, &scenario),
        None => cmd_play("duel", None, false, None),
    }
}

/// Load a scenario or exit.
fn load_scenario(name_or_path: &str) -> Scenario {
    match Scenario::resolve(name_or_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load scenario: {}", e);
            std::process::exit(1);
        }
    }
}

/// Build a runner or exit.
fn build_runner(scenario: &Scenario, seed: Option<u64>) -> HeadlessRunner {
    match HeadlessRunner::new(scenario, seed.unwrap_or(scenario.seed)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to build match: {}", e);
            std::process::exit(1);
        }
    }
}

/// Save the runner's replay if a path was given.
fn save_replay(runner: &HeadlessRunner, record: Option<PathBuf>) {
    let Some(path) = record else {
        return;
    };
    if let Err(e) = runner.replay().save(&path) {
        eprintln!("Failed to save replay: {}", e);
        std::process::exit(1);
    }
    eprintln!("Replay saved to: {}", path.display());
}

/// Run one match to completion
fn cmd_run(scenario: &str, seed: Option<u64>, record: Option<PathBuf>) {
    let scenario = load_scenario(scenario);
    let mut runner = build_runner(&scenario, seed);

    let stdout = io::stdout();
    let outcome = match runner.run_to_end(stdout.lock()) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Failed to write events: {}", e);
            std::process::exit(1);
        }
    };

    let sim = runner.simulation();
    match outcome {
        Some(o) => eprintln!("Match over at tick {}: winner {:?}", o.tick, o.winner),
        None => eprintln!("Tick limit reached at tick {}", sim.tick_count()),
    }
    eprintln!("Final state hash: {:016x}", sim.state_hash());

    save_replay(&runner, record);
}

/// Serve the JSON protocol
fn cmd_play(scenario: &str, seed: Option<u64>, auto_state: bool, record: Option<PathBuf>) {
    tracing::info!("Starting interactive session");

    let scenario = load_scenario(scenario);
    let mut runner = build_runner(&scenario, seed).with_auto_state(auto_state);

    let stdin = io::stdin();
    let stdout = io::stdout();
    if let Err(e) = runner.serve(stdin.lock(), stdout.lock()) {
        eprintln!("Session failed: {}", e);
        std::process::exit(1);
    }

    save_replay(&runner, record);
}

/// Run batch of matches for balance testing
fn cmd_batch(
    scenario: String,
    count: u32,
    parallel: u32,
    output: PathBuf,
    seed: u64,
    max_ticks: u64,
) {
    let num_cpus = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);

    tracing::info!(
        scenario = %scenario,
        count,
        parallel,
        seed,
        max_ticks,
        output = %output.display(),
        cpus_available = num_cpus,
        "Batch configuration"
    );

    let config = BatchConfig {
        scenario,
        game_count: count,
        parallel_games: parallel,
        output_dir: output.clone(),
        seed_start: seed,
        max_ticks,
    };

    let results = match run_batch(config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("FATAL: {}", e);
            std::process::exit(1);
        }
    };

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        tracing::error!(error = %e, path = %results_path.display(), "Failed to save results");
        eprintln!("FATAL: Failed to save results: {}", e);
        std::process::exit(1);
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Matches played: {}", summary.total_games);
    if !results.errors.is_empty() {
        eprintln!("Matches FAILED: {}", results.errors.len());
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!("Average length: {:.0} ticks", summary.avg_duration_ticks);
    eprintln!("Draws: {}  Timeouts: {}", summary.draws, summary.timeouts);
    eprintln!("\nWin Rates:");
    for (team, rate) in &summary.win_rates {
        eprintln!("  team {}: {:.1}%", team, rate * 100.0);
    }
    if let Some(team) = summary.dominant_team(0.1) {
        eprintln!("\nTeam {} is winning more than its share", team);
    }

    for error in results.errors.iter().take(10) {
        eprintln!(
            "  Match {} (seed {}): {}",
            error.game_index, error.seed, error.message
        );
    }

    eprintln!("\nResults saved to: {}", results_path.display());
}

/// Verify determinism
fn cmd_verify(scenario: &str, seed: u64, runs: u32) {
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario,
        seed,
        runs
    );

    let scenario = load_scenario(scenario);
    match verify_determinism(&scenario, seed, runs) {
        Ok(true) => eprintln!("PASS: All {} runs produced identical results", runs),
        Ok(false) => {
            eprintln!("FAIL: Non-determinism detected!");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("FAIL: {}", e);
            std::process::exit(1);
        }
    }
}

/// Replay a recorded match
fn cmd_replay(file: &Path, verify: bool) {
    if verify {
        tracing::info!("Verifying replay: {}", file.display());
    } else {
        tracing::info!("Playing replay: {}", file.display());
    }

    let replay = match Replay::load(file) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to load replay: {}", e);
            std::process::exit(1);
        }
    };

    eprintln!("Loaded replay:");
    eprintln!("  Scenario: {}", replay.scenario_id);
    eprintln!("  Seed: {}", replay.seed);
    eprintln!("  Actions: {}", replay.actions.len());
    eprintln!("  Duration: {} ticks", replay.duration());

    let mut player = match ReplayPlayer::new(replay) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to create replay player: {}", e);
            std::process::exit(1);
        }
    };

    if verify {
        match player.verify() {
            Ok(true) => {
                eprintln!("PASS: Replay verification successful");
                eprintln!("  Hash: {:016x}", player.replay().final_hash);
            }
            Ok(false) => {
                eprintln!("FAIL: Replay produced different hash!");
                eprintln!("  Expected: {:016x}", player.replay().final_hash);
                eprintln!("  Actual:   {:016x}", player.simulation().state_hash());
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("FAIL: Error during verification: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        while player.advance() {}

        let sim = player.simulation();
        eprintln!("Replay complete at tick {}", player.current_tick());
        eprintln!("Final state hash: {:016x}", sim.state_hash());
        eprintln!("\nFinal State:");
        for c in sim.combatants() {
            eprintln!(
                "  #{} {} (team {}): {:.1} hp, {:?}",
                c.id,
                c.name,
                c.team,
                c.health.to_num::<f64>(),
                c.state.kind()
            );
        }
    }
}

/// Run benchmark
#[allow(clippy::cast_precision_loss)]
fn cmd_benchmark(ticks: u64, scenario: &str) {
    tracing::info!("Running {} tick benchmark", ticks);

    let scenario = load_scenario(scenario);
    let mut sim = match scenario.build() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to build match: {}", e);
            std::process::exit(1);
        }
    };

    eprintln!("Starting benchmark with {} combatants", sim.combatants().len());

    let start = Instant::now();
    for _ in 0..ticks {
        sim.step();
    }
    let elapsed = start.elapsed();

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BENCHMARK RESULTS");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Ticks: {}", ticks);
    eprintln!("Duration: {:.3}s", elapsed.as_secs_f64());
    eprintln!("Ticks/second: {:.1}", ticks as f64 / elapsed.as_secs_f64());
    eprintln!("State hash: {:016x}", sim.state_hash());
}
