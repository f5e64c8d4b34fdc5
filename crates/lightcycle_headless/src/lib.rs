//! Headless arena runner for AI tuning and CI verification.
//!
//! This crate drives the light-cycle simulation without a renderer. It can
//! be controlled via JSON commands on stdin, with frame snapshots on stdout.
//! This enables:
//!
//! - **AI tuning**: Batch runs across many seeds with aggregate statistics
//! - **CI verification**: Automated checks of arena logic and determinism
//! - **Replay verification**: Check that replays produce identical results
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (tick, steer, config, etc.)
//! - **stdout**: State updates and responses (JSON)
//! - **stderr**: Debug logs (human-readable)
//!
//! See [`protocol`] module for the full command/response specification.
//!
//! # Example
//!
//! ```bash
//! # Run interactively
//! echo '{"cmd":"tick","count":60}' | cargo run -p lightcycle_headless
//!
//! # Run a scenario and record it
//! cargo run -p lightcycle_headless -- run --scenario duel --record duel.replay
//!
//! # Verify the recording
//! cargo run -p lightcycle_headless -- replay --file duel.replay --verify
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ascii_visualizer;
pub mod batch;
pub mod metrics;
pub mod protocol;
pub mod runner;
pub mod scenario;

pub use ascii_visualizer::{render_ascii, AsciiConfig};
pub use batch::{run_batch, run_single, BatchConfig, BatchResults};
pub use metrics::{BatchSummary, MetricsCollector, RunMetrics};
pub use protocol::{Command, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use scenario::{Scenario, ScenarioError};
