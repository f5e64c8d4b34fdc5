//! Scenario loading and configuration.
//!
//! A scenario fixes everything needed to reproduce a run: canvas size, seed,
//! effect configuration, an optional music track for round mode, static
//! walls and hand-placed agents.

use std::path::Path;

use lightcycle_core::agent::AgentKind;
use lightcycle_core::config::{EffectConfig, PlaybackContext, TickContext, TICK_RATE};
use lightcycle_core::error::SimError;
use lightcycle_core::grid::{Gate, Grid};
use lightcycle_core::math::{Direction, GridPos};
use lightcycle_core::simulation::Simulation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The arena could not be built.
    #[error("Invalid scenario: {0}")]
    Simulation(#[from] SimError),
}

/// Music track driving round mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackSetup {
    /// Track length in seconds.
    pub duration: f64,
    /// Playback position at tick 0.
    #[serde(default)]
    pub start_time: f64,
    /// Output volume.
    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_volume() -> f32 {
    1.0
}

/// Where a scripted agent enters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// One of the four gates: 0 top, 1 right, 2 bottom, 3 left.
    Gate(usize),
    /// An explicit cell and heading.
    Cell {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
        /// Initial heading.
        heading: Direction,
    },
}

/// An agent placed before the first tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPlacement {
    /// Controller.
    pub kind: AgentKind,
    /// Entry point.
    pub at: Placement,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Canvas size in pixels.
    pub canvas: (u32, u32),
    /// RNG seed.
    pub seed: u64,
    /// Tick budget for batch and benchmark runs.
    pub max_ticks: u64,
    /// Effect configuration for every tick.
    pub config: EffectConfig,
    /// Track for round mode; `None` runs without playback.
    pub track: Option<TrackSetup>,
    /// Static wall segments, each inclusive.
    pub walls: Vec<(GridPos, GridPos)>,
    /// Scripted agents, in update order.
    pub agents: Vec<AgentPlacement>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::open_arena()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or malformed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    ///
    /// # Errors
    ///
    /// Returns an error if the text is malformed or the config is invalid.
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = ron::from_str(ron)?;
        scenario.config.validate()?;
        Ok(scenario)
    }

    /// A built-in scenario by name.
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "open_arena" => Some(Self::open_arena()),
            "duel" => Some(Self::duel()),
            "round" => Some(Self::round()),
            "crowd" => Some(Self::crowd()),
            _ => None,
        }
    }

    /// A built-in name, or else a path to a RON file.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not built in and cannot be loaded.
    pub fn resolve(name: &str) -> Result<Self, ScenarioError> {
        match Self::builtin(name) {
            Some(scenario) => Ok(scenario),
            None => Self::load(name),
        }
    }

    /// Free-for-all on an 800 × 600 canvas with default settings.
    #[must_use]
    pub fn open_arena() -> Self {
        Self {
            name: "open_arena".to_string(),
            description: "Free-for-all, default spawn rate, dummies enabled".to_string(),
            canvas: (800, 600),
            seed: 0,
            max_ticks: 60 * u64::from(TICK_RATE),
            config: EffectConfig::default(),
            track: None,
            walls: Vec::new(),
            agents: Vec::new(),
        }
    }

    /// Two AIs released from opposite gates, no random spawns.
    #[must_use]
    pub fn duel() -> Self {
        Self {
            name: "duel".to_string(),
            description: "Two AIs from the left and right gates".to_string(),
            config: EffectConfig {
                spawn_rate: 0.0,
                enable_dummies: false,
                ..EffectConfig::default()
            },
            agents: vec![
                AgentPlacement {
                    kind: AgentKind::Ai,
                    at: Placement::Gate(3),
                },
                AgentPlacement {
                    kind: AgentKind::Ai,
                    at: Placement::Gate(1),
                },
            ],
            ..Self::open_arena()
        }
    }

    /// Timed round over the last minute of a three-minute track.
    #[must_use]
    pub fn round() -> Self {
        Self {
            name: "round".to_string(),
            description: "Eight personas, round mode, final 60 s of a 180 s track".to_string(),
            max_ticks: 60 * u64::from(TICK_RATE),
            config: EffectConfig {
                round_mode: true,
                max_agents: 8,
                ..EffectConfig::default()
            },
            track: Some(TrackSetup {
                duration: 180.0,
                start_time: 120.0,
                volume: 1.0,
            }),
            ..Self::open_arena()
        }
    }

    /// Busy free-for-all on a large canvas.
    #[must_use]
    pub fn crowd() -> Self {
        Self {
            name: "crowd".to_string(),
            description: "Full house on a 1600 × 1000 canvas".to_string(),
            canvas: (1600, 1000),
            config: EffectConfig {
                spawn_rate: 20.0,
                max_agents: 8,
                ..EffectConfig::default()
            },
            ..Self::open_arena()
        }
    }

    /// Same scenario with another seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build the arena: walls drawn, scripted agents placed.
    ///
    /// # Errors
    ///
    /// Returns an error if the canvas and cell size do not form a grid.
    pub fn build(&self) -> Result<Simulation, ScenarioError> {
        let mut sim = Simulation::new(self.canvas.0, self.canvas.1, &self.config, self.seed)?;
        for &(from, to) in &self.walls {
            wall_segment(sim.grid_mut(), from, to);
        }
        for placement in &self.agents {
            let gate = match placement.at {
                Placement::Gate(index) => sim.grid().gates()[index % 4],
                Placement::Cell { x, y, heading } => Gate {
                    pos: GridPos::new(x, y),
                    heading,
                },
            };
            sim.place_agent(placement.kind, gate, &self.config);
        }
        tracing::debug!(
            scenario = %self.name,
            seed = self.seed,
            walls = self.walls.len(),
            agents = self.agents.len(),
            "Scenario built"
        );
        Ok(sim)
    }

    /// Playback position after `tick` ticks.
    #[must_use]
    pub fn playback_at(&self, tick: u64) -> PlaybackContext {
        self.track.map_or_else(PlaybackContext::default, |track| {
            #[allow(clippy::cast_precision_loss)]
            let elapsed = tick as f64 / f64::from(TICK_RATE);
            PlaybackContext {
                is_playing: true,
                volume: track.volume,
                current_time: track.start_time + elapsed,
                duration: track.duration,
            }
        })
    }

    /// Tick context for `tick`.
    #[must_use]
    pub fn tick_context(&self, tick: u64) -> TickContext<'_> {
        TickContext::new(&self.config).with_playback(self.playback_at(tick))
    }
}

/// Wall every cell from `from` to `to`, x first.
fn wall_segment(grid: &mut Grid, from: GridPos, to: GridPos) {
    let mut pos = from;
    grid.place_wall(pos);
    while pos != to {
        pos = if pos.x == to.x {
            pos.offset(0, (to.y - pos.y).signum())
        } else {
            pos.offset((to.x - pos.x).signum(), 0)
        };
        grid.place_wall(pos);
    }
}
