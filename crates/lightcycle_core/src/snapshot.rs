//! Read-only frame data handed to renderers.
//!
//! A [`FrameSnapshot`] owns copies of everything a renderer needs for one
//! frame, so the simulation can keep mutating its own state while the
//! snapshot is drawn.

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentId, AgentKind, AgentState, Rgb};
use crate::config::{BgPattern, EffectConfig};
use crate::loot::Loot;
use crate::math::{Direction, GridPos};
use crate::round::{RoundPhase, RoundResults};

/// Something that happened during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// An agent crashed.
    Explosion {
        /// Crashed agent.
        agent: AgentId,
        /// Crash cell.
        pos: GridPos,
        /// Trail colour.
        color: Rgb,
        /// Display name.
        name: String,
    },
    /// The round moved to a new phase.
    PhaseChanged {
        /// Previous phase.
        from: RoundPhase,
        /// New phase.
        to: RoundPhase,
    },
    /// A pickup was credited.
    LootCollected {
        /// Receiving agent.
        agent: AgentId,
        /// Value credited.
        value: u32,
        /// Where.
        pos: GridPos,
    },
    /// An agent entered the arena.
    Spawned {
        /// New agent.
        agent: AgentId,
        /// Display name.
        name: String,
        /// Spawn cell.
        pos: GridPos,
    },
    /// Agents, loot and grid were wiped.
    Reset,
}

/// Renderer view of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentView {
    /// Agent id.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Trail colour.
    pub color: Rgb,
    /// Controller kind.
    pub kind: AgentKind,
    /// Lifecycle state.
    pub state: AgentState,
    /// Head cell.
    pub pos: GridPos,
    /// Heading.
    pub dir: Direction,
    /// Trail, oldest first.
    pub path: Vec<GridPos>,
    /// Current score.
    pub score: u32,
    /// Crash count.
    pub deaths: u32,
    /// Inside the post-spawn immortality window.
    pub immortal: bool,
}

impl From<&Agent> for AgentView {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.persona.name.clone(),
            color: agent.persona.color,
            kind: agent.kind,
            state: agent.state,
            pos: agent.pos,
            dir: agent.dir,
            path: agent.path.iter().copied().collect(),
            score: agent.persona.score,
            deaths: agent.persona.deaths,
            immortal: agent.is_immortal(),
        }
    }
}

/// Renderer view of one pickup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LootView {
    /// Pickup id.
    pub id: u32,
    /// Column, fractional.
    pub x: f32,
    /// Row, fractional.
    pub y: f32,
    /// Value.
    pub value: u32,
    /// Colour.
    pub color: Rgb,
}

impl From<&Loot> for LootView {
    fn from(loot: &Loot) -> Self {
        Self {
            id: loot.id,
            x: loot.pos.x.to_num(),
            y: loot.pos.y.to_num(),
            value: loot.value,
            color: loot.color,
        }
    }
}

/// One leaderboard line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Agent id.
    pub agent: AgentId,
    /// Display name.
    pub name: String,
    /// Trail colour.
    pub color: Rgb,
    /// Current score.
    pub score: u32,
}

/// Living agents by score, highest first; ties by update order.
#[must_use]
pub fn leaderboard(agents: &[Agent]) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = agents
        .iter()
        .filter(|a| a.is_alive())
        .map(|a| LeaderboardEntry {
            agent: a.id,
            name: a.persona.name.clone(),
            color: a.persona.color,
            score: a.persona.score,
        })
        .collect();
    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries
}

/// Display toggles copied from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderFlags {
    /// Draw agent names.
    pub show_names: bool,
    /// Draw the leaderboard.
    pub show_leaderboard: bool,
    /// Draw glow.
    pub glow_enabled: bool,
    /// Draw the background pattern.
    pub bg_enabled: bool,
    /// Which background pattern.
    pub bg_pattern: BgPattern,
}

impl From<&EffectConfig> for RenderFlags {
    fn from(config: &EffectConfig) -> Self {
        Self {
            show_names: config.show_names,
            show_leaderboard: config.show_leaderboard,
            glow_enabled: config.glow_enabled,
            bg_enabled: config.bg_enabled,
            bg_pattern: config.bg_pattern,
        }
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// Tick this frame was produced on.
    pub tick: u64,
    /// Grid columns.
    pub cols: i32,
    /// Grid rows.
    pub rows: i32,
    /// Cell size in pixels.
    pub cell_size: f32,
    /// HUD rows at the top.
    pub safe_zone_rows: i32,
    /// All agents, in update order.
    pub agents: Vec<AgentView>,
    /// Live pickups.
    pub loot: Vec<LootView>,
    /// Events raised this tick.
    pub events: Vec<SimEvent>,
    /// Living agents by score.
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Round phase; `None` in free-for-all.
    pub phase: Option<RoundPhase>,
    /// Seconds left in the round; `None` in free-for-all.
    pub time_left: Option<f64>,
    /// Final ranking once the round is finished.
    pub results: Option<RoundResults>,
    /// Glow strength; zero when glow is off.
    pub glow: f32,
    /// Display toggles.
    pub flags: RenderFlags,
}

impl FrameSnapshot {
    /// Agent view by id.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&AgentView> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Number of explosion events in this frame.
    #[must_use]
    pub fn explosions(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SimEvent::Explosion { .. }))
            .count()
    }
}

/// Glow strength for a low-band level and volume.
///
/// `intensity × (1 + level / 255 × volume)` when enabled, else zero.
#[must_use]
pub fn glow_level(config: &EffectConfig, level: f32, volume: f32) -> f32 {
    if !config.glow_enabled {
        return 0.0;
    }
    let level = level.clamp(0.0, 255.0);
    let volume = if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    };
    config.glow_intensity * (1.0 + level / 255.0 * volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentSpec, Persona};
    use crate::grid::Gate;
    use crate::math::Fixed;

    fn agent(id: i32, score: u32) -> Agent {
        let mut agent = Agent::new(
            id,
            AgentSpec {
                persona: Persona::new(id as u32, "RAM", 10),
                kind: AgentKind::Ai,
                gate: Gate {
                    pos: GridPos::new(3, 3),
                    heading: Direction::Up,
                },
                speed_factor: Fixed::ONE,
                reaction_gap: 0,
            },
        );
        agent.persona.score = score;
        agent
    }

    #[test]
    fn test_leaderboard_skips_dead_and_sorts() {
        let mut dead = agent(3, 999);
        dead.state = AgentState::Dead;
        let board = leaderboard(&[agent(1, 10), agent(2, 50), dead, agent(4, 50)]);
        let ids: Vec<_> = board.iter().map(|e| e.agent).collect();
        assert_eq!(ids, [2, 4, 1]);
    }

    #[test]
    fn test_glow_scales_with_level() {
        let config = EffectConfig {
            glow_enabled: true,
            glow_intensity: 2.0,
            ..Default::default()
        };
        assert_eq!(glow_level(&config, 0.0, 1.0), 2.0);
        assert_eq!(glow_level(&config, 255.0, 1.0), 4.0);
        assert_eq!(glow_level(&config, 255.0, 0.0), 2.0);

        let off = EffectConfig {
            glow_enabled: false,
            ..config
        };
        assert_eq!(glow_level(&off, 255.0, 1.0), 0.0);
    }

    #[test]
    fn test_agent_view_copies_path() {
        let mut a = agent(1, 5);
        a.path.push_back(GridPos::new(3, 3));
        a.path.push_back(GridPos::new(3, 4));
        let view = AgentView::from(&a);
        assert_eq!(view.path, vec![GridPos::new(3, 3), GridPos::new(3, 4)]);
        assert_eq!(view.score, 5);
    }
}
