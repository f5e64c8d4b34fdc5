//! Test fixtures and helpers.
//!
//! Pre-built arenas and configurations for consistent testing. All arenas
//! use an 800 × 600 canvas at the default 20 px cell, which gives a 40 × 30
//! grid with three HUD rows.

use fixed::types::I32F32;
use lightcycle_core::agent::{AgentId, AgentKind};
use lightcycle_core::config::{AiTuning, EffectConfig, PlaybackContext, TickContext};
use lightcycle_core::grid::{Gate, Grid};
use lightcycle_core::math::{Direction, Fixed, GridPos};
use lightcycle_core::simulation::Simulation;
use serde::{Deserialize, Serialize};

/// Canvas width of every fixture arena, in pixels.
pub const ARENA_WIDTH: u32 = 800;
/// Canvas height of every fixture arena, in pixels.
pub const ARENA_HEIGHT: u32 = 600;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// No random spawns, no dummies, every agent at exactly base speed.
#[must_use]
pub fn quiet_config() -> EffectConfig {
    EffectConfig {
        spawn_rate: 0.0,
        enable_dummies: false,
        speed_variance: 0.0,
        ..Default::default()
    }
}

/// Free-for-all with frequent spawns and crashes.
#[must_use]
pub fn busy_config() -> EffectConfig {
    EffectConfig {
        spawn_rate: 20.0,
        max_agents: 6,
        ..Default::default()
    }
}

/// Round mode with `contestants` personas.
#[must_use]
pub fn round_config(contestants: u32) -> EffectConfig {
    EffectConfig {
        round_mode: true,
        max_agents: contestants,
        ..quiet_config()
    }
}

/// Playing track at `current_time` seconds of `duration`.
#[must_use]
pub fn playback_at(current_time: f64, duration: f64) -> PlaybackContext {
    PlaybackContext {
        is_playing: true,
        volume: 1.0,
        current_time,
        duration,
    }
}

/// AI that re-evaluates every step and never panics.
#[must_use]
pub fn sharp_tuning() -> AiTuning {
    AiTuning {
        reaction_gap_min: 0,
        reaction_gap_max: 0,
        ..AiTuning::default()
    }
}

/// Empty fixture arena.
///
/// # Panics
///
/// Panics if `config.size` does not fit the fixture canvas.
#[must_use]
pub fn empty_arena(config: &EffectConfig, seed: u64) -> Simulation {
    Simulation::new(ARENA_WIDTH, ARENA_HEIGHT, config, seed).expect("fixture canvas is valid")
}

/// Run one tick so placed agents claim their gates, then drop their
/// immortality and pin them to `speed` cells per tick.
///
/// # Panics
///
/// Panics if one of `ids` is not on the grid.
pub fn settle(sim: &mut Simulation, config: &EffectConfig, ids: &[AgentId], speed: Fixed) {
    sim.tick(&TickContext::new(config));
    for &id in ids {
        let agent = sim.agent_mut(id).expect("settled agent exists");
        agent.immortality = 0;
        agent.speed_factor = speed;
    }
}

/// Single AI entering from the left gate, with [`sharp_tuning`].
#[must_use]
pub fn solo_ai_arena(config: &EffectConfig, seed: u64) -> (Simulation, AgentId) {
    let mut sim = empty_arena(config, seed).with_tuning(sharp_tuning());
    let gate = sim.grid().gates()[3];
    let id = sim.place_agent(AgentKind::Ai, gate, config);
    (sim, id)
}

/// Wall every cell on the straight line from `from` to `to`, inclusive.
///
/// Diagonal spans are walked one axis at a time, x first.
pub fn wall_line(grid: &mut Grid, from: GridPos, to: GridPos) {
    let mut pos = from;
    grid.place_wall(pos);
    while pos != to {
        pos = if pos.x != to.x {
            pos.offset((to.x - pos.x).signum(), 0)
        } else {
            pos.offset(0, (to.y - pos.y).signum())
        };
        grid.place_wall(pos);
    }
}

/// Row of the head-on corridor.
pub const CORRIDOR_ROW: i32 = 15;

/// Two AIs facing each other six cells apart in a one-cell corridor.
///
/// Both have claimed their cells, lost their immortality and move one cell
/// per tick. The left agent updates first.
#[must_use]
pub fn head_on_arena(config: &EffectConfig, seed: u64) -> (Simulation, AgentId, AgentId) {
    let mut sim = empty_arena(config, seed).with_tuning(sharp_tuning());
    wall_line(
        sim.grid_mut(),
        GridPos::new(5, CORRIDOR_ROW - 1),
        GridPos::new(25, CORRIDOR_ROW - 1),
    );
    wall_line(
        sim.grid_mut(),
        GridPos::new(5, CORRIDOR_ROW + 1),
        GridPos::new(25, CORRIDOR_ROW + 1),
    );

    let left = sim.place_agent(
        AgentKind::Ai,
        Gate {
            pos: GridPos::new(10, CORRIDOR_ROW),
            heading: Direction::Right,
        },
        config,
    );
    let right = sim.place_agent(
        AgentKind::Ai,
        Gate {
            pos: GridPos::new(16, CORRIDOR_ROW),
            heading: Direction::Left,
        },
        config,
    );
    settle(&mut sim, config, &[left, right], Fixed::ONE);
    (sim, left, right)
}

/// One agent of an [`ArenaLayout`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutAgent {
    /// Controller.
    pub kind: AgentKind,
    /// Spawn cell and heading.
    pub gate: Gate,
}

/// Hand-drawn arena: static walls plus placed agents, loadable from RON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaLayout {
    /// RNG seed.
    pub seed: u64,
    /// Wall segments, each inclusive.
    #[serde(default)]
    pub walls: Vec<(GridPos, GridPos)>,
    /// Agents, in update order.
    #[serde(default)]
    pub agents: Vec<LayoutAgent>,
}

impl ArenaLayout {
    /// Parse a layout from RON.
    ///
    /// # Errors
    ///
    /// Returns the RON error if the text does not describe a layout.
    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    /// Build the arena. Agents claim their cells on the first tick.
    #[must_use]
    pub fn build(&self, config: &EffectConfig) -> (Simulation, Vec<AgentId>) {
        let mut sim = empty_arena(config, self.seed);
        for &(from, to) in &self.walls {
            wall_line(sim.grid_mut(), from, to);
        }
        let ids = self
            .agents
            .iter()
            .map(|a| sim.place_agent(a.kind, a.gate, config))
            .collect();
        tracing::debug!(
            walls = self.walls.len(),
            agents = self.agents.len(),
            "Layout arena built"
        );
        (sim, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightcycle_core::agent::AgentState;

    #[test]
    fn test_fixed_helpers() {
        assert_eq!(fixed(3), I32F32::from_num(3));
        assert_eq!(fixed_f(0.5), I32F32::from_num(0.5));
    }

    #[test]
    fn test_empty_arena_dimensions() {
        let sim = empty_arena(&quiet_config(), 1);
        assert_eq!((sim.grid().cols(), sim.grid().rows()), (40, 30));
        assert!(sim.agents().is_empty());
    }

    #[test]
    fn test_wall_line_inclusive() {
        let mut sim = empty_arena(&quiet_config(), 1);
        wall_line(sim.grid_mut(), GridPos::new(5, 10), GridPos::new(8, 10));
        assert_eq!(sim.grid().occupied_count(), 4);
        assert!(sim.grid().is_occupied(GridPos::new(8, 10)));
    }

    #[test]
    fn test_head_on_arena_is_settled() {
        let (sim, left, right) = head_on_arena(&quiet_config(), 1);
        for id in [left, right] {
            let agent = sim.agent(id).unwrap();
            assert_eq!(agent.state, AgentState::Running);
            assert_eq!(agent.immortality, 0);
        }
        assert_eq!(sim.agent(right).unwrap().pos.x - sim.agent(left).unwrap().pos.x, 6);
    }

    #[test]
    fn test_layout_from_ron() {
        let layout = ArenaLayout::from_ron(
            "(seed: 9, walls: [((x: 3, y: 10), (x: 3, y: 12))], \
             agents: [(kind: Ai, gate: (pos: (x: 10, y: 10), heading: Up))])",
        )
        .unwrap();
        let (sim, ids) = layout.build(&quiet_config());
        assert_eq!(ids.len(), 1);
        assert_eq!(sim.grid().occupied_count(), 3);
        assert_eq!(sim.seed(), 9);
    }
}
