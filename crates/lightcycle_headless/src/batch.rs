//! Batch arena runner for tuning and regression checks.
//!
//! Runs one scenario under many seeds in parallel using rayon and collects
//! [`RunMetrics`] for each.

use crate::metrics::{BatchSummary, MetricsCollector, RunMetrics};
use crate::scenario::Scenario;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario to run (built-in name or RON path)
    pub scenario: String,
    /// Number of runs
    pub run_count: u32,
    /// Maximum parallel runs (0 = use rayon default)
    pub parallel_runs: u32,
    /// Output directory for results
    pub output_dir: PathBuf,
    /// Starting seed; run `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Ticks per run (0 = the scenario's own budget)
    pub max_ticks: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "open_arena".to_string(),
            run_count: 100,
            parallel_runs: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            max_ticks: 0,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    #[must_use]
    pub fn new(scenario: &str, run_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            run_count,
            ..Default::default()
        }
    }

    /// Set output directory
    #[must_use]
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set ticks per run
    #[must_use]
    pub const fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = ticks;
        self
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual run metrics, in seed order
    pub runs: Vec<RunMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Run index
    pub run_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Progress tracking for batch runs
#[derive(Debug)]
pub struct BatchProgress {
    /// Total runs
    pub total: u32,
    /// Completed runs
    completed: AtomicU32,
    /// Crashes seen so far
    crashes: AtomicU32,
    /// Start time
    pub start_time: Instant,
}

impl BatchProgress {
    /// Create new progress tracker
    #[must_use]
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: AtomicU32::new(0),
            crashes: AtomicU32::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed run
    pub fn record_completion(&self, crashes: u32) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.crashes.fetch_add(crashes, Ordering::Relaxed);
    }

    /// Get current completion count
    #[must_use]
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get completion percentage
    #[must_use]
    pub fn percentage(&self) -> f64 {
        f64::from(self.current()) / f64::from(self.total.max(1)) * 100.0
    }

    /// Average crashes per completed run
    #[must_use]
    pub fn crashes_per_run(&self) -> f64 {
        let completed = self.current();
        if completed == 0 {
            return 0.0;
        }
        f64::from(self.crashes.load(Ordering::Relaxed)) / f64::from(completed)
    }

    /// Get estimated time remaining
    #[must_use]
    pub fn eta(&self) -> Duration {
        let completed = self.current();
        if completed == 0 {
            return Duration::from_secs(0);
        }

        let elapsed = self.start_time.elapsed();
        let per_run = elapsed.as_secs_f64() / f64::from(completed);
        let remaining = self.total.saturating_sub(completed);
        Duration::from_secs_f64(per_run * f64::from(remaining))
    }

    /// Display progress to stderr
    pub fn display(&self) {
        let eta = self.eta();
        eprintln!("╔════════════════════════════════════╗");
        eprintln!(
            "║ Batch Progress: {:>4}/{:<4} ({:>5.1}%) ║",
            self.current(),
            self.total,
            self.percentage()
        );
        eprintln!(
            "║ ETA: {:>29} ║",
            format!("{}m {}s", eta.as_secs() / 60, eta.as_secs() % 60)
        );
        eprintln!("║ Crashes per run: {:>17.1} ║", self.crashes_per_run());
        eprintln!("╚════════════════════════════════════╝");
    }
}

/// Run one scenario to its tick budget and collect metrics.
///
/// `max_ticks` of 0 uses the scenario's own budget. Playback follows the
/// scenario's track, so round scenarios finish on schedule.
///
/// # Errors
///
/// Returns a message if the scenario cannot be loaded or built.
pub fn run_single(scenario: &str, seed: u64, max_ticks: u64) -> Result<RunMetrics, String> {
    let scenario = Scenario::resolve(scenario)
        .map_err(|e| e.to_string())?
        .with_seed(seed);
    let mut sim = scenario.build().map_err(|e| e.to_string())?;
    let ticks = if max_ticks == 0 {
        scenario.max_ticks
    } else {
        max_ticks
    };

    let run_id = format!("{}_{seed}", scenario.name);
    let mut collector = MetricsCollector::new(&run_id, &scenario.name, seed);
    for tick in 0..ticks {
        let frame = sim.tick(&scenario.tick_context(tick));
        collector.observe(&frame);
    }
    Ok(collector.finish(&sim))
}

/// Run a batch of seeds
#[must_use]
pub fn run_batch(config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    let progress = BatchProgress::new(config.run_count);

    info!(
        "Starting batch run: {} runs of '{}'",
        config.run_count, config.scenario
    );

    // Configure thread pool if specified
    if config.parallel_runs > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_runs as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let results: Vec<Result<RunMetrics, BatchError>> = (0..config.run_count)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            match run_single(&config.scenario, seed, config.max_ticks) {
                Ok(metrics) => {
                    progress.record_completion(metrics.crashes);

                    let completed = progress.current();
                    if completed % 10 == 0 {
                        debug!("Progress: {}/{}", completed, config.run_count);
                    }
                    if completed % 100 == 0 {
                        progress.display();
                    }

                    Ok(metrics)
                }
                Err(message) => {
                    warn!("Run {} failed: {}", i, message);
                    Err(BatchError {
                        run_index: i,
                        seed,
                        message,
                    })
                }
            }
        })
        .collect();

    let (runs, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let runs: Vec<RunMetrics> = runs.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_runs(&runs);
    let duration_seconds = start.elapsed().as_secs_f64();

    #[allow(clippy::cast_precision_loss)]
    let rate = runs.len() as f64 / duration_seconds.max(f64::EPSILON);
    info!(
        "Batch complete: {} runs in {:.1}s ({:.1} runs/sec)",
        runs.len(),
        duration_seconds,
        rate
    );

    BatchResults {
        config,
        runs,
        summary,
        duration_seconds,
        errors,
    }
}

/// Verify determinism by running the same seed several times.
///
/// # Errors
///
/// Returns a message if the scenario cannot be run.
pub fn verify_determinism(
    scenario: &str,
    seed: u64,
    max_ticks: u64,
    runs: u32,
) -> Result<bool, String> {
    let hashes = (0..runs.max(1))
        .map(|_| run_single(scenario, seed, max_ticks).map(|m| m.final_state_hash))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(hashes.windows(2).all(|w| w[0] == w[1]))
}
