//! # Light-Cycle Core
//!
//! Deterministic simulation core of the light-cycle arena effect.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No host IO (replay files aside)
//! - No system randomness (one seeded `ChaCha8Rng`)
//! - Fixed-point kinematics and AI scores
//!
//! This separation enables:
//! - Headless runs and batch statistics
//! - Replay verification
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`grid`] - Occupancy and owner arrays, gates, flood fill
//! - [`agent`] - Agent records, personas, lifecycle transitions
//! - [`ai`] - Candidate scoring and reaction latency
//! - [`trail`] - Move commits, trimming, erasing, crash detection
//! - [`loot`] - Drop splitting, magnetism, capture, expiry
//! - [`round`] - Round phases, rankings, persona roster
//! - [`simulation`] - The tick loop
//! - [`snapshot`] - Read-only frame data for renderers
//! - [`replay`] - Recording and verifying runs
//! - [`config`] - Effect configuration and AI tuning
//! - [`math`] - Fixed-point math and grid geometry

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod agent;
pub mod ai;
pub mod config;
pub mod error;
pub mod grid;
pub mod loot;
pub mod math;
pub mod replay;
pub mod round;
pub mod simulation;
pub mod snapshot;
pub mod trail;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{Agent, AgentId, AgentKind, AgentState, Persona, Rgb};
    pub use crate::config::{
        AiTuning, AudioAnalyser, BgPattern, ConstantLevel, EffectConfig, PlaybackContext,
        TickContext, TICK_RATE,
    };
    pub use crate::error::{Result, SimError};
    pub use crate::grid::{Gate, Grid};
    pub use crate::loot::{Loot, LootLedger};
    pub use crate::math::{Direction, Fixed, GridPos, Vec2Fixed};
    pub use crate::replay::{Replay, ReplayPlayer};
    pub use crate::round::{RoundPhase, RoundResults};
    pub use crate::simulation::{Simulation, UserInput};
    pub use crate::snapshot::{FrameSnapshot, SimEvent};
    pub use crate::trail::trail_cap;
}
