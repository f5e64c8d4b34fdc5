//! Error types for the arena simulation.
//!
//! Degenerate simulation states (no free gate, flood fill budget exhausted,
//! empty leaderboard) are never errors; they degrade to "skip this action".
//! Errors are reserved for caller mistakes and IO at the edges.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    /// Canvas or cell size cannot produce a playable grid.
    #[error("Invalid grid dimensions: {width}x{height} px at cell size {cell_size}")]
    InvalidDimensions {
        /// Canvas width in pixels.
        width: u32,
        /// Canvas height in pixels.
        height: u32,
        /// Requested cell size in pixels.
        cell_size: f32,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No agent with this id exists.
    #[error("Agent not found: {0}")]
    AgentNotFound(i32),

    /// Encoding or decoding simulation state failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Reading or writing a file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Replay file written by an incompatible version.
    #[error("Replay version mismatch: expected {expected}, got {found}")]
    ReplayVersion {
        /// Version this build understands.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// Replaying produced a different final state.
    #[error("Replay diverged at tick {tick}: expected hash {expected:016x}, got {actual:016x}")]
    ReplayMismatch {
        /// Tick at which the comparison was made.
        tick: u64,
        /// Recorded hash.
        expected: u64,
        /// Hash produced by playback.
        actual: u64,
    },
}

impl From<bincode::Error> for SimError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<ron::error::SpannedError> for SimError {
    fn from(err: ron::error::SpannedError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
