//! Replay recording and playback.
//!
//! A replay stores the initial simulation state, the configuration and,
//! per tick, the playback position and the user inputs applied before that
//! tick. Playing it back on the same build reproduces the final state hash.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{EffectConfig, PlaybackContext, TickContext};
use crate::error::{Result, SimError};
use crate::simulation::{Simulation, UserInput};

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Inputs for one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Playback position the tick ran with.
    pub playback: PlaybackContext,
    /// User inputs applied before the tick.
    pub inputs: Vec<UserInput>,
}

/// Complete replay data structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Scenario identifier or name.
    pub scenario_id: String,
    /// Random seed of the simulation.
    pub seed: u64,
    /// Configuration every tick ran with.
    pub config: EffectConfig,
    /// Serialized initial simulation state.
    pub initial_state: Vec<u8>,
    /// One frame per tick.
    pub frames: Vec<ReplayFrame>,
    /// Hash after the last frame.
    pub final_hash: u64,
}

impl Replay {
    /// Start a replay from a simulation's current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be serialized.
    pub fn new(
        scenario_id: impl Into<String>,
        initial_state: &Simulation,
        config: &EffectConfig,
    ) -> Result<Self> {
        Ok(Self {
            version: REPLAY_VERSION,
            scenario_id: scenario_id.into(),
            seed: initial_state.seed(),
            config: config.clone(),
            initial_state: initial_state.serialize()?,
            frames: Vec::new(),
            final_hash: 0,
        })
    }

    /// Record the inputs of one tick.
    pub fn record_frame(&mut self, playback: PlaybackContext, inputs: Vec<UserInput>) {
        self.frames.push(ReplayFrame { playback, inputs });
    }

    /// Store the hash reached after the last frame.
    pub fn finalize(&mut self, final_hash: u64) {
        self.final_hash = final_hash;
    }

    /// Number of recorded ticks.
    #[must_use]
    pub fn duration(&self) -> u64 {
        self.frames.len() as u64
    }

    /// Total number of user inputs.
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.frames.iter().map(|f| f.inputs.len()).sum()
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or decoding fails, or if the file was
    /// written by a different format version.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let replay: Self = bincode::deserialize(&bytes)?;

        if replay.version != REPLAY_VERSION {
            return Err(SimError::ReplayVersion {
                expected: REPLAY_VERSION,
                found: replay.version,
            });
        }

        Ok(replay)
    }

    /// Get the initial simulation state for playback.
    ///
    /// # Errors
    ///
    /// Returns an error if state deserialization fails.
    pub fn restore_initial_state(&self) -> Result<Simulation> {
        Simulation::deserialize(&self.initial_state)
    }
}

/// Replay playback controller.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    simulation: Simulation,
    current_frame: usize,
    /// Whether playback is paused.
    pub paused: bool,
}

impl ReplayPlayer {
    /// Create a player positioned before the first frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial state cannot be restored.
    pub fn new(replay: Replay) -> Result<Self> {
        let simulation = replay.restore_initial_state()?;
        Ok(Self {
            replay,
            simulation,
            current_frame: 0,
            paused: false,
        })
    }

    fn step(&mut self) {
        let frame = &self.replay.frames[self.current_frame];
        for &input in &frame.inputs {
            self.simulation.apply_input(input);
        }
        let ctx = TickContext::new(&self.replay.config).with_playback(frame.playback);
        self.simulation.tick(&ctx);
        self.current_frame += 1;
    }

    /// Play one frame. Returns `true` while frames remain.
    pub fn advance(&mut self) -> bool {
        if !self.paused && !self.is_finished() {
            self.step();
        }
        !self.is_finished()
    }

    /// Restart from the initial state and play up to `target` frames.
    ///
    /// # Errors
    ///
    /// Returns an error if state restoration fails.
    pub fn seek(&mut self, target: u64) -> Result<()> {
        self.simulation = self.replay.restore_initial_state()?;
        self.current_frame = 0;
        while (self.current_frame as u64) < target && !self.is_finished() {
            self.step();
        }
        Ok(())
    }

    /// Frames played so far.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.current_frame as u64
    }

    /// Current simulation state.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// The replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Whether every frame has been played.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.current_frame >= self.replay.frames.len()
    }

    /// Play the whole replay and compare the final hash.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ReplayMismatch`] if the hash differs, or an
    /// error if state restoration fails.
    pub fn verify(&mut self) -> Result<()> {
        self.seek(self.replay.duration())?;
        let actual = self.simulation.state_hash();
        if actual != self.replay.final_hash {
            return Err(SimError::ReplayMismatch {
                tick: self.simulation.get_tick(),
                expected: self.replay.final_hash,
                actual,
            });
        }
        Ok(())
    }

    /// Progress as a percentage (0-100).
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        if self.replay.frames.is_empty() {
            100.0
        } else {
            (self.current_frame as f64 / self.replay.frames.len() as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Direction;

    fn config() -> EffectConfig {
        EffectConfig {
            enable_user: true,
            spawn_rate: 10.0,
            ..Default::default()
        }
    }

    fn record(ticks: u64) -> Replay {
        let config = config();
        let mut sim = Simulation::new(800, 600, &config, 99).unwrap();
        let mut replay = Replay::new("unit", &sim, &config).unwrap();

        for tick in 0..ticks {
            let inputs = match tick {
                20 => vec![UserInput::Steer(Direction::Left)],
                45 => vec![UserInput::Steer(Direction::Up)],
                70 => vec![UserInput::Restart],
                _ => Vec::new(),
            };
            for &input in &inputs {
                sim.apply_input(input);
            }
            let playback = PlaybackContext::default();
            sim.tick(&TickContext::new(&config).with_playback(playback));
            replay.record_frame(playback, inputs);
        }
        replay.finalize(sim.state_hash());
        replay
    }

    #[test]
    fn test_replay_counts() {
        let replay = record(100);
        assert_eq!(replay.version, REPLAY_VERSION);
        assert_eq!(replay.seed, 99);
        assert_eq!(replay.duration(), 100);
        assert_eq!(replay.input_count(), 3);
    }

    #[test]
    fn test_replay_verifies() {
        let mut player = ReplayPlayer::new(record(150)).unwrap();
        assert!(player.verify().is_ok());
        assert!(player.is_finished());
    }

    #[test]
    fn test_tampered_replay_fails() {
        let mut replay = record(80);
        replay.final_hash ^= 1;
        let mut player = ReplayPlayer::new(replay).unwrap();
        assert!(matches!(
            player.verify(),
            Err(SimError::ReplayMismatch { .. })
        ));
    }

    #[test]
    fn test_save_load_round_trip() {
        let replay = record(30);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arena.replay");
        replay.save(&path).unwrap();

        let loaded = Replay::load(&path).unwrap();
        assert_eq!(loaded.final_hash, replay.final_hash);
        assert_eq!(loaded.frames, replay.frames);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut replay = record(5);
        replay.version = REPLAY_VERSION + 1;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.replay");
        replay.save(&path).unwrap();

        assert!(matches!(
            Replay::load(&path),
            Err(SimError::ReplayVersion { found, .. }) if found == REPLAY_VERSION + 1
        ));
    }

    #[test]
    fn test_player_pause_and_seek() {
        let mut player = ReplayPlayer::new(record(50)).unwrap();
        player.paused = true;
        player.advance();
        assert_eq!(player.current_tick(), 0);

        player.paused = false;
        player.advance();
        assert_eq!(player.current_tick(), 1);

        player.seek(25).unwrap();
        assert_eq!(player.current_tick(), 25);
        assert!((player.progress_percent() - 50.0).abs() < 0.01);
    }
}
