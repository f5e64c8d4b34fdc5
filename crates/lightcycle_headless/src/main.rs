//! Headless light-cycle arena runner.
//!
//! This binary runs the arena without graphics, controlled via JSON on
//! stdin/stdout. Designed for AI tuning, CI testing and replay verification.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p lightcycle_headless
//!
//! # Interactive session on a scenario, recorded to a replay file
//! cargo run -p lightcycle_headless -- run --scenario round --record round.replay
//!
//! # Run a batch of seeds
//! cargo run -p lightcycle_headless -- batch --scenario crowd --count 200 --output results/
//!
//! # Watch a scenario in the terminal
//! cargo run -p lightcycle_headless -- visualize --scenario duel --ticks 600
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information
//!
//! See the protocol module for command/response format.

use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lightcycle_core::replay::{Replay, ReplayPlayer};
use lightcycle_headless::{
    ascii_visualizer::{render_ascii, AsciiConfig},
    batch::{run_batch, verify_determinism, BatchConfig},
    runner::{HeadlessConfig, HeadlessRunner},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "lightcycle_headless")]
#[command(about = "Headless light-cycle arena runner for AI tuning and CI")]
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
    /// Run a single interactive session
    Run {
        /// Built-in scenario name or RON file
        #[arg(short, long)]
        scenario: Option<String>,

        /// Output state after every tick
        #[arg(long)]
        auto_state: bool,

        /// Record the session to this replay file
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Run a batch of seeds and collect statistics
    Batch {
        /// Scenario to run
        #[arg(short, long, default_value = "open_arena")]
        scenario: String,

        /// Number of runs
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel runs (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Ticks per run (0 = the scenario's budget)
        #[arg(long, default_value = "0")]
        ticks: u64,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Scenario to test
        #[arg(short, long, default_value = "crowd")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Ticks per run (0 = the scenario's budget)
        #[arg(long, default_value = "0")]
        ticks: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Replay a recorded session
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
        #[arg(short, long, default_value = "crowd")]
        scenario: String,
    },

    /// Print the arena as ASCII art while a scenario runs
    Visualize {
        /// Scenario to show
        #[arg(short, long, default_value = "open_arena")]
        scenario: String,

        /// Ticks to run
        #[arg(short, long, default_value = "600")]
        ticks: u64,

        /// Print a frame every N ticks
        #[arg(long, default_value = "120")]
        every: u64,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
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
        Some(Commands::Run {
            scenario,
            auto_state,
            record,
        }) => cmd_run(scenario, auto_state, record),
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            ticks,
        }) => cmd_batch(scenario, count, parallel, output, seed, ticks),
        Some(Commands::Verify {
            scenario,
            seed,
            ticks,
            runs,
        }) => cmd_verify(&scenario, seed, ticks, runs),
        Some(Commands::Replay { file, verify }) => cmd_replay(&file, verify),
        Some(Commands::Benchmark { ticks, scenario }) => cmd_benchmark(ticks, &scenario),
        Some(Commands::Visualize {
            scenario,
            ticks,
            every,
            no_color,
        }) => cmd_visualize(&scenario, ticks, every, no_color),
        None => cmd_run(None, false, None),
    }
}

/// Run a single interactive session
fn cmd_run(scenario: Option<String>, auto_state: bool, record: Option<PathBuf>) {
    tracing::info!("Starting interactive session");

    let config = HeadlessConfig {
        auto_state_output: auto_state,
        scenario,
        record_path: record,
    };

    let mut runner = match HeadlessRunner::new(config) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Failed to start session: {e}");
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let stdout = BufWriter::new(io::stdout());
    if let Err(e) = runner.run(stdin.lock(), stdout) {
        tracing::error!(error = %e, "Session I/O failed");
        std::process::exit(1);
    }
}

/// Run a batch of seeds
fn cmd_batch(scenario: String, count: u32, parallel: u32, output: PathBuf, seed: u64, ticks: u64) {
    let batch_start = Instant::now();

    let num_cpus = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);

    tracing::info!(
        scenario = %scenario,
        count,
        parallel,
        seed,
        ticks,
        output = %output.display(),
        cpus_available = num_cpus,
        "Batch configuration"
    );

    if let Err(e) = std::fs::create_dir_all(&output) {
        tracing::error!(error = %e, path = %output.display(), "Failed to create output directory");
        eprintln!(
            "FATAL: Cannot create output directory '{}': {e}",
            output.display()
        );
        std::process::exit(1);
    }

    let config = BatchConfig {
        scenario,
        run_count: count,
        parallel_runs: parallel,
        output_dir: output.clone(),
        seed_start: seed,
        max_ticks: ticks,
    };

    let results = run_batch(config);

    tracing::info!(
        runs_completed = results.runs.len(),
        runs_failed = results.errors.len(),
        total_duration_secs = format!("{:.1}", batch_start.elapsed().as_secs_f64()),
        "Batch execution finished"
    );

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        tracing::error!(error = %e, path = %results_path.display(), "Failed to save results");
        eprintln!("FATAL: Failed to save results: {e}");
        std::process::exit(1);
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Runs: {}", results.runs.len());
    if !results.errors.is_empty() {
        eprintln!("Runs FAILED: {}", results.errors.len());
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!("Crashes per minute: {:.2}", summary.crashes_per_minute);
    eprintln!(
        "Loot collected: {:.1}%",
        summary.avg_collection_rate * 100.0
    );
    eprintln!("Average top score: {:.0}", summary.avg_top_score);
    eprintln!("Longest life: {} ticks", summary.longest_life_ticks);

    if !summary.round_wins.is_empty() {
        let mut wins: Vec<_> = summary.round_wins.iter().collect();
        wins.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        eprintln!("\nRound wins:");
        for (name, count) in wins {
            eprintln!("  {name}: {count}");
        }
    }

    if !results.errors.is_empty() {
        eprintln!("\nRUN FAILURES:");
        for error in results.errors.iter().take(10) {
            eprintln!(
                "  Run {} (seed {}): {}",
                error.run_index, error.seed, error.message
            );
        }
        if results.errors.len() > 10 {
            eprintln!("  ... and {} more failures", results.errors.len() - 10);
        }
    }

    eprintln!("\nResults saved to: {}", results_path.display());
}

/// Verify determinism
fn cmd_verify(scenario: &str, seed: u64, ticks: u64, runs: u32) {
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario,
        seed,
        runs
    );

    match verify_determinism(scenario, seed, ticks, runs) {
        Ok(true) => eprintln!("PASS: All {runs} runs produced identical results"),
        Ok(false) => {
            eprintln!("FAIL: Non-determinism detected!");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("FAIL: {e}");
            std::process::exit(1);
        }
    }
}

/// Replay a recorded session
fn cmd_replay(file: &Path, verify: bool) {
    if verify {
        tracing::info!("Verifying replay: {}", file.display());
    } else {
        tracing::info!("Playing replay: {}", file.display());
    }

    let replay = match Replay::load(file) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to load replay: {e}");
            std::process::exit(1);
        }
    };

    eprintln!("Loaded replay:");
    eprintln!("  Scenario: {}", replay.scenario_id);
    eprintln!("  Seed: {}", replay.seed);
    eprintln!("  Inputs: {}", replay.input_count());
    eprintln!("  Duration: {} ticks", replay.duration());

    let mut player = match ReplayPlayer::new(replay) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to create replay player: {e}");
            std::process::exit(1);
        }
    };

    if verify {
        eprintln!("Verifying replay...");
        match player.verify() {
            Ok(()) => {
                eprintln!("PASS: Replay verification successful");
                eprintln!("  Hash: {:016x}", player.replay().final_hash);
            }
            Err(e) => {
                eprintln!("FAIL: {e}");
                std::process::exit(1);
            }
        }
    } else {
        let mut last_percent = 0.0;
        while player.advance() {
            let percent = player.progress_percent();
            if percent - last_percent >= 10.0 {
                eprintln!("Progress: {percent:.0}%");
                last_percent = percent;
            }
        }
        eprintln!("Replay complete at tick {}", player.current_tick());
        eprintln!(
            "Final state hash: {:016x}",
            player.simulation().state_hash()
        );

        let sim = player.simulation();
        eprintln!("\nFinal State:");
        eprintln!("  Agents: {}", sim.agents().len());
        eprintln!("  Loot laying: {}", sim.loot().laying());
    }
}

/// Run benchmark
fn cmd_benchmark(ticks: u64, scenario: &str) {
    tracing::info!("Running {} tick benchmark", ticks);

    let scenario = match Scenario::resolve(scenario) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load scenario: {e}");
            std::process::exit(1);
        }
    };
    let mut sim = match scenario.build() {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("Failed to build scenario: {e}");
            std::process::exit(1);
        }
    };

    eprintln!(
        "Starting benchmark on '{}' ({}x{} cells)",
        scenario.name,
        sim.grid().cols(),
        sim.grid().rows()
    );
    eprintln!("Running {ticks} ticks...");

    // Warmup
    for tick in 0..100 {
        sim.tick(&scenario.tick_context(tick));
    }

    let start = Instant::now();
    for tick in 100..100 + ticks {
        sim.tick(&scenario.tick_context(tick));
    }
    let elapsed = start.elapsed();

    #[allow(clippy::cast_precision_loss)]
    let tps = ticks as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    eprintln!("\nBenchmark Results:");
    eprintln!("  Total time: {:.2}s", elapsed.as_secs_f64());
    eprintln!("  Ticks/second: {tps:.0}");
    eprintln!(
        "  Real-time factor: {:.1}x",
        tps / f64::from(lightcycle_core::config::TICK_RATE)
    );
    eprintln!("  Final agents: {}", sim.agents().len());
    eprintln!("  Final hash: {:016x}", sim.state_hash());
}

/// Print ASCII frames of a scenario run
fn cmd_visualize(scenario: &str, ticks: u64, every: u64, no_color: bool) {
    let scenario = match Scenario::resolve(scenario) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load scenario: {e}");
            std::process::exit(1);
        }
    };
    let mut sim = match scenario.build() {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("Failed to build scenario: {e}");
            std::process::exit(1);
        }
    };

    let config = AsciiConfig {
        use_color: !no_color,
        ..AsciiConfig::default()
    };
    let every = every.max(1);
    for tick in 0..ticks {
        sim.tick(&scenario.tick_context(tick));
        if (tick + 1) % every == 0 {
            println!("{}", render_ascii(&sim, &scenario.name, &config));
        }
    }
}
