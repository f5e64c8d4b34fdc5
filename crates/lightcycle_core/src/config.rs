//! Effect configuration, playback context and AI tuning.
//!
//! [`EffectConfig`] is owned by the host and handed to the simulation every
//! tick through [`TickContext`]; nothing in it is cached except the cell
//! size of the current grid. [`AiTuning`] collects the empirically tuned
//! constants of the decision engine so they can be overridden per run.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Simulation ticks per second.
pub const TICK_RATE: u32 = 60;

/// Background pattern drawn behind the arena (renderer hint only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BgPattern {
    /// Line grid aligned with the cells.
    #[default]
    Grid,
    /// A dot at every cell corner.
    Dots,
    /// Diagonal hatching.
    Hatch,
}

/// Host-facing configuration of the arena effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    /// Master switch. Disabling clears the arena immediately.
    pub enabled: bool,
    /// Base speed in cells per tick.
    pub speed: f32,
    /// Free-for-all spawn rate multiplier.
    pub spawn_rate: f32,
    /// Trail length factor; see [`crate::trail::trail_cap`].
    pub trail_length: f32,
    /// Cell size in pixels.
    pub size: f32,
    /// Population limit.
    pub max_agents: u32,
    /// Renderer hint: draw agent names.
    pub show_names: bool,
    /// Renderer hint: draw the leaderboard.
    pub show_leaderboard: bool,
    /// Spawn a keyboard-controlled agent.
    pub enable_user: bool,
    /// Allow erratic dummy agents in free-for-all.
    pub enable_dummies: bool,
    /// Renderer hint: glow on/off.
    pub glow_enabled: bool,
    /// Glow strength before audio modulation.
    pub glow_intensity: f32,
    /// Erase speed as a multiple of the agent's own speed.
    pub erasure_speed: f32,
    /// Relative spread of per-agent speed (0.1 = ±10%).
    pub speed_variance: f32,
    /// Timed round mode driven by playback time.
    pub round_mode: bool,
    /// Renderer hint: draw the background pattern.
    pub bg_enabled: bool,
    /// Renderer hint: background pattern kind.
    pub bg_pattern: BgPattern,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            speed: 1.0,
            spawn_rate: 1.0,
            trail_length: 1.0,
            size: 20.0,
            max_agents: 8,
            show_names: true,
            show_leaderboard: true,
            enable_user: false,
            enable_dummies: true,
            glow_enabled: true,
            glow_intensity: 1.0,
            erasure_speed: 2.0,
            speed_variance: 0.1,
            round_mode: false,
            bg_enabled: true,
            bg_pattern: BgPattern::Grid,
        }
    }
}

impl EffectConfig {
    /// Load a configuration from a RON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Parse and validate a RON string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: Self = ron::from_str(ron)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("size", self.size, self.size > 0.0),
            ("speed", self.speed, self.speed >= 0.0),
            ("spawn_rate", self.spawn_rate, self.spawn_rate >= 0.0),
            ("trail_length", self.trail_length, self.trail_length >= 0.0),
            ("erasure_speed", self.erasure_speed, self.erasure_speed > 0.0),
            (
                "speed_variance",
                self.speed_variance,
                (0.0..1.0).contains(&self.speed_variance),
            ),
            ("glow_intensity", self.glow_intensity, self.glow_intensity >= 0.0),
        ];

        for (name, value, ok) in checks {
            if !ok || !value.is_finite() {
                return Err(SimError::InvalidConfig(format!(
                    "{name} out of range: {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Playback state supplied by the host media player.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackContext {
    /// Whether audio is currently playing.
    pub is_playing: bool,
    /// Output volume, 0.0..=1.0.
    pub volume: f32,
    /// Playback position in seconds.
    pub current_time: f64,
    /// Track length in seconds (0 when unknown).
    pub duration: f64,
}

impl PlaybackContext {
    /// Seconds remaining in the track.
    #[must_use]
    pub fn time_left(&self) -> f64 {
        self.duration - self.current_time
    }
}

/// Source of a low-frequency magnitude sample, usually an FFT analyser.
pub trait AudioAnalyser {
    /// Average magnitude of the low band, 0.0..=255.0.
    fn low_band_average(&self) -> f32;
}

/// Analyser that always reports the same level.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConstantLevel(pub f32);

impl AudioAnalyser for ConstantLevel {
    fn low_band_average(&self) -> f32 {
        self.0
    }
}

/// Everything the host hands to [`crate::simulation::Simulation::tick`].
#[derive(Clone, Copy)]
pub struct TickContext<'a> {
    /// Configuration, re-read every tick.
    pub config: &'a EffectConfig,
    /// Playback timing and volume.
    pub playback: PlaybackContext,
    /// Optional audio analyser; `None` means silence.
    pub analyser: Option<&'a dyn AudioAnalyser>,
}

impl<'a> TickContext<'a> {
    /// Context with no playback and no analyser.
    #[must_use]
    pub fn new(config: &'a EffectConfig) -> Self {
        Self {
            config,
            playback: PlaybackContext::default(),
            analyser: None,
        }
    }

    /// Attach playback state.
    #[must_use]
    pub fn with_playback(mut self, playback: PlaybackContext) -> Self {
        self.playback = playback;
        self
    }

    /// Attach an analyser.
    #[must_use]
    pub fn with_analyser(mut self, analyser: &'a dyn AudioAnalyser) -> Self {
        self.analyser = Some(analyser);
        self
    }

    /// Sampled low-band level, zero without an analyser.
    #[must_use]
    pub fn low_band_level(&self) -> f32 {
        self.analyser
            .map_or(0.0, |a| a.low_band_average().clamp(0.0, 255.0))
    }
}

impl std::fmt::Debug for TickContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickContext")
            .field("config", self.config)
            .field("playback", &self.playback)
            .field("has_analyser", &self.analyser.is_some())
            .finish()
    }
}

/// Tuned constants of the decision engine.
///
/// The defaults were found by watching matches, not derived. Scores are
/// plain integers that get summed per candidate move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiTuning {
    /// Visited-cell budget of one flood fill.
    pub flood_fill_cap: usize,
    /// Reachable area at or above which a move counts as open.
    pub open_area: usize,
    /// Reachable area below which a move counts as certain death.
    pub doomed_area: usize,
    /// How many recent trail segments count for the self-hugging check.
    pub self_trail_window: usize,
    /// Radius in cells within which loot pulls an agent.
    pub loot_sense_radius: i32,
    /// Radius in cells within which combat heuristics engage.
    pub combat_sense_radius: i32,
    /// Radius in cells searched for the nearest opponent.
    pub opponent_search_radius: i32,
    /// Length of each ray of the 8-direction space scan.
    pub scan_ray_length: i32,
    /// Furthest clear distance credited to going straight.
    pub clear_ahead_limit: i32,
    /// Steps after a turn during which another turn is penalised.
    pub turn_cooldown_steps: u32,
    /// Steps an opponent's path is projected for the cut-off check.
    pub projection_horizon: i32,
    /// Smallest reaction gap of an AI agent, in ticks.
    pub reaction_gap_min: u32,
    /// Largest reaction gap of an AI agent, in ticks.
    pub reaction_gap_max: u32,
    /// Smallest reaction gap of a dummy, in ticks.
    pub dummy_reaction_gap_min: u32,
    /// Largest reaction gap of a dummy, in ticks.
    pub dummy_reaction_gap_max: u32,
    /// Concentration lost on each successful dodge.
    pub concentration_decay: f32,
    /// Concentration regained per tick while the way ahead is clear.
    pub concentration_regen: f32,
    /// Concentration never decays below this.
    pub concentration_floor: f32,
    /// Probability that a dummy moves at pure random.
    pub dummy_chaos: f32,
    /// Inclusive upper bound of the uniform tie-breaking jitter; 0 disables.
    pub jitter: i32,
    /// Score of a move into a wall or trail.
    pub hard_veto: i32,
    /// Score of a move into an opponent's current or next cell.
    pub opponent_veto: i32,
    /// Added when reachable area is below `doomed_area`.
    pub doomed_penalty: i32,
    /// Added when reachable area is below `open_area`.
    pub trap_penalty: i32,
    /// Added when reachable area is at least `open_area`.
    pub open_area_reward: i32,
    /// Per reachable cell, every agent.
    pub area_weight: i32,
    /// Per reachable cell, extra for the score leader.
    pub leader_area_weight: i32,
    /// Per open cell found by the ray scan.
    pub scan_weight: i32,
    /// Per blocked orthogonal neighbour of the destination.
    pub wall_adjacent_penalty: i32,
    /// Per neighbouring cell of the agent's own recent trail.
    pub self_hug_penalty: i32,
    /// Flat bonus for keeping the heading.
    pub straight_bonus: i32,
    /// Per clear cell ahead when keeping the heading.
    pub clear_ahead_weight: i32,
    /// Penalty for turning again inside the cooldown.
    pub turn_thrash_penalty: i32,
    /// Bonus for crossing an opponent's projected path at right angles.
    pub cut_off_bonus: i32,
    /// Bonus for steering into a same-heading opponent.
    pub parallel_attack_bonus: i32,
    /// Multiplier on combat bonuses when the target leads the scoreboard.
    pub leader_target_multiplier: i32,
    /// Bonus for landing exactly on loot.
    pub loot_landing_bonus: i32,
    /// Pull per loot point, divided by distance.
    pub loot_pull_weight: i32,
    /// Ceiling on the summed loot pull of one move.
    pub loot_pull_cap: i32,
}

impl Default for AiTuning {
    fn default() -> Self {
        Self {
            flood_fill_cap: 300,
            open_area: 100,
            doomed_area: 30,
            self_trail_window: 40,
            loot_sense_radius: 10,
            combat_sense_radius: 15,
            opponent_search_radius: 60,
            scan_ray_length: 6,
            clear_ahead_limit: 10,
            turn_cooldown_steps: 4,
            projection_horizon: 5,
            reaction_gap_min: 0,
            reaction_gap_max: 5,
            dummy_reaction_gap_min: 20,
            dummy_reaction_gap_max: 40,
            concentration_decay: 0.1,
            concentration_regen: 0.02,
            concentration_floor: 0.2,
            dummy_chaos: 0.5,
            jitter: 10,
            hard_veto: -1_000_000,
            opponent_veto: -500_000,
            doomed_penalty: -100_000,
            trap_penalty: -5_000,
            open_area_reward: 500,
            area_weight: 2,
            leader_area_weight: 20,
            scan_weight: 10,
            wall_adjacent_penalty: 150,
            self_hug_penalty: 400,
            straight_bonus: 200,
            clear_ahead_weight: 20,
            turn_thrash_penalty: 2_500,
            cut_off_bonus: 800,
            parallel_attack_bonus: 600,
            leader_target_multiplier: 2,
            loot_landing_bonus: 5_000,
            loot_pull_weight: 40,
            loot_pull_cap: 2_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EffectConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_cell_size() {
        let config = EffectConfig {
            size: 0.0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("size"));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let config = EffectConfig {
            speed: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_ron_fills_defaults() {
        let config = EffectConfig::from_ron_str("(round_mode: true, max_agents: 4)").unwrap();
        assert!(config.round_mode);
        assert_eq!(config.max_agents, 4);
        assert_eq!(config.size, 20.0);
    }

    #[test]
    fn test_tick_context_without_analyser_is_silent() {
        let config = EffectConfig::default();
        let ctx = TickContext::new(&config);
        assert_eq!(ctx.low_band_level(), 0.0);

        let loud = ConstantLevel(400.0);
        let ctx = ctx.with_analyser(&loud);
        assert_eq!(ctx.low_band_level(), 255.0);
    }

    #[test]
    fn test_time_left() {
        let playback = PlaybackContext {
            current_time: 560.0,
            duration: 600.0,
            ..Default::default()
        };
        assert_eq!(playback.time_left(), 40.0);
    }
}
