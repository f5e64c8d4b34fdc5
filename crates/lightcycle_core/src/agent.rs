//! Agent records and their lifecycle.
//!
//! An [`Agent`] is one life of a light cycle: it spawns, runs, crashes,
//! erases its trail and dies. The [`Persona`] it carries (name, colour,
//! score, deaths) outlives it and is handed to the next agent when a round
//! reincarnates the player.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::grid::Gate;
use crate::math::{fixed_serde, Direction, Fixed, GridPos};

/// Opaque agent identifier; also the value written into the owner grid.
pub type AgentId = i32;

/// Stable identifier of a persona across reincarnations.
pub type PersonaId = u32;

/// Post-spawn immortality of the user agent, in ticks (3.0 s).
pub const USER_IMMORTALITY_TICKS: u32 = 180;

/// Post-spawn immortality of AI agents, in ticks (2.0 s).
pub const AI_IMMORTALITY_TICKS: u32 = 120;

/// Fixed part of the loot dropped on death.
pub const DEATH_BONUS: u32 = 200;

/// Names handed out to AI personas, in order.
pub const AGENT_NAMES: [&str; 16] = [
    "FLYNN", "RINZLER", "QUORRA", "SARK", "YORI", "RAM", "GEM", "CLU", "DUMONT", "CASTOR",
    "ZUSE", "BECK", "PAIGE", "ABLE", "ANON", "MARA",
];

/// 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl Rgb {
    /// Saturated colour for a hue in degrees.
    #[must_use]
    pub fn from_hue(hue: u16) -> Self {
        // HSL with s = 1.0, l = 0.55
        let h = f32::from(hue % 360) / 60.0;
        let c = 0.9_f32;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let m = 0.55 - c / 2.0;
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let to_byte = |v: f32| ((v + m).clamp(0.0, 1.0) * 255.0).round() as u8;
        Self {
            r: to_byte(r),
            g: to_byte(g),
            b: to_byte(b),
        }
    }

    /// `#rrggbb` form.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Identity and score that survive reincarnation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Persona {
    /// Stable id.
    pub id: PersonaId,
    /// Display name.
    pub name: String,
    /// Trail colour.
    pub color: Rgb,
    /// Hue the colour was derived from, in degrees.
    pub hue: u16,
    /// Current score.
    pub score: u32,
    /// Number of crashes.
    pub deaths: u32,
}

impl Persona {
    /// Fresh persona with zero score.
    #[must_use]
    pub fn new(id: PersonaId, name: impl Into<String>, hue: u16) -> Self {
        Self {
            id,
            name: name.into(),
            color: Rgb::from_hue(hue),
            hue: hue % 360,
            score: 0,
            deaths: 0,
        }
    }

    /// Loot value dropped when this persona crashes.
    #[must_use]
    pub const fn death_drop(&self) -> u32 {
        DEATH_BONUS + self.score / 2
    }
}

/// Who steers the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    /// Keyboard-controlled.
    User,
    /// Driven by the full decision engine.
    Ai,
    /// Erratic filler that mostly moves at random.
    Dummy,
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentState {
    /// Created this tick, not yet on the grid.
    Spawning,
    /// Moving and laying trail.
    Running,
    /// Crashed; the trail is being rewound.
    Erasing,
    /// Trail gone; awaiting removal or reincarnation.
    Dead,
}

/// Everything needed to put a new agent on a gate.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    /// Identity carried by the agent.
    pub persona: Persona,
    /// Controller kind.
    pub kind: AgentKind,
    /// Spawn cell and heading.
    pub gate: Gate,
    /// Cells per tick.
    pub speed_factor: Fixed,
    /// Ticks between full evaluations.
    pub reaction_gap: u32,
}

/// One life of a light cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique id, also written into the owner grid.
    pub id: AgentId,
    /// Identity and score.
    pub persona: Persona,
    /// Controller kind.
    pub kind: AgentKind,
    /// Lifecycle state.
    pub state: AgentState,
    /// Current cell.
    pub pos: GridPos,
    /// Cell the agent spawned on.
    pub spawn: GridPos,
    /// Heading.
    pub dir: Direction,
    /// Fractional progress towards the next cell.
    #[serde(with = "fixed_serde")]
    pub move_accumulator: Fixed,
    /// Cells per tick.
    #[serde(with = "fixed_serde")]
    pub speed_factor: Fixed,
    /// Trail, oldest cell first.
    pub path: VecDeque<GridPos>,
    /// Fractional progress of the erase animation.
    #[serde(with = "fixed_serde")]
    pub erase_accumulator: Fixed,
    /// Remaining ticks during which crashes are ignored.
    pub immortality: u32,
    /// Probability of dodging a fatal obstacle while not re-evaluating.
    #[serde(with = "fixed_serde")]
    pub concentration: Fixed,
    /// Ticks between full evaluations.
    pub reaction_gap: u32,
    /// Ticks until the next full evaluation.
    pub reaction_timer: u32,
    /// Whole-cell steps since the last turn.
    pub steps_since_turn: u32,
}

impl Agent {
    /// Create an agent in the [`AgentState::Spawning`] state.
    #[must_use]
    pub fn new(id: AgentId, spec: AgentSpec) -> Self {
        Self {
            id,
            persona: spec.persona,
            kind: spec.kind,
            state: AgentState::Spawning,
            pos: spec.gate.pos,
            spawn: spec.gate.pos,
            dir: spec.gate.heading,
            move_accumulator: Fixed::ZERO,
            speed_factor: spec.speed_factor,
            path: VecDeque::new(),
            erase_accumulator: Fixed::ZERO,
            immortality: 0,
            concentration: Fixed::ONE,
            reaction_gap: spec.reaction_gap,
            reaction_timer: 0,
            steps_since_turn: u32::MAX,
        }
    }

    /// Spawning or running.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        matches!(self.state, AgentState::Spawning | AgentState::Running)
    }

    /// On the grid and moving.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.state, AgentState::Running)
    }

    /// Keyboard-controlled.
    #[must_use]
    pub const fn is_user(&self) -> bool {
        matches!(self.kind, AgentKind::User)
    }

    /// Erratic filler.
    #[must_use]
    pub const fn is_dummy(&self) -> bool {
        matches!(self.kind, AgentKind::Dummy)
    }

    /// Crashes are currently ignored.
    #[must_use]
    pub const fn is_immortal(&self) -> bool {
        self.immortality > 0
    }

    /// Immortality granted on entering the arena.
    #[must_use]
    pub const fn spawn_immortality(&self) -> u32 {
        match self.kind {
            AgentKind::User => USER_IMMORTALITY_TICKS,
            AgentKind::Ai | AgentKind::Dummy => AI_IMMORTALITY_TICKS,
        }
    }

    /// `Spawning → Running`: start the immortality window.
    pub fn begin_run(&mut self) {
        self.state = AgentState::Running;
        self.immortality = self.spawn_immortality();
    }

    /// `Running → Erasing`. Zeroes the score and returns the loot value to
    /// drop.
    pub fn crash(&mut self) -> u32 {
        let drop = self.persona.death_drop();
        self.persona.score = 0;
        self.persona.deaths += 1;
        self.state = AgentState::Erasing;
        self.move_accumulator = Fixed::ZERO;
        self.erase_accumulator = Fixed::ZERO;
        drop
    }

    /// Change heading, tracking how long ago the last turn was.
    pub fn set_heading(&mut self, dir: Direction) {
        if dir != self.dir {
            self.steps_since_turn = 0;
            self.dir = dir;
        }
    }

    /// Whether `pos` is among the newest `window` trail cells.
    #[must_use]
    pub fn recent_trail_contains(&self, pos: GridPos, window: usize) -> bool {
        self.path.iter().rev().take(window).any(|&p| p == pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: AgentKind) -> AgentSpec {
        AgentSpec {
            persona: Persona::new(1, "FLYNN", 200),
            kind,
            gate: Gate {
                pos: GridPos::new(5, 5),
                heading: Direction::Right,
            },
            speed_factor: Fixed::ONE,
            reaction_gap: 3,
        }
    }

    #[test]
    fn test_new_agent_is_spawning() {
        let agent = Agent::new(4, spec(AgentKind::Ai));
        assert_eq!(agent.state, AgentState::Spawning);
        assert!(agent.is_alive());
        assert!(!agent.is_running());
        assert!(agent.path.is_empty());
        assert_eq!(agent.dir, Direction::Right);
    }

    #[test]
    fn test_begin_run_grants_immortality() {
        let mut user = Agent::new(1, spec(AgentKind::User));
        user.begin_run();
        assert_eq!(user.immortality, USER_IMMORTALITY_TICKS);

        let mut ai = Agent::new(2, spec(AgentKind::Ai));
        ai.begin_run();
        assert_eq!(ai.immortality, AI_IMMORTALITY_TICKS);
        assert!(ai.is_running());
    }

    #[test]
    fn test_crash_drops_bonus_plus_half_score() {
        let mut agent = Agent::new(1, spec(AgentKind::Ai));
        agent.begin_run();
        agent.persona.score = 301;
        let drop = agent.crash();
        assert_eq!(drop, 200 + 150);
        assert_eq!(agent.persona.score, 0);
        assert_eq!(agent.persona.deaths, 1);
        assert_eq!(agent.state, AgentState::Erasing);
    }

    #[test]
    fn test_set_heading_resets_turn_counter() {
        let mut agent = Agent::new(1, spec(AgentKind::Ai));
        agent.steps_since_turn = 9;
        agent.set_heading(Direction::Right);
        assert_eq!(agent.steps_since_turn, 9);
        agent.set_heading(Direction::Down);
        assert_eq!(agent.steps_since_turn, 0);
    }

    #[test]
    fn test_recent_trail_window() {
        let mut agent = Agent::new(1, spec(AgentKind::Ai));
        for x in 0..50 {
            agent.path.push_back(GridPos::new(x, 1));
        }
        assert!(agent.recent_trail_contains(GridPos::new(49, 1), 40));
        assert!(agent.recent_trail_contains(GridPos::new(10, 1), 40));
        assert!(!agent.recent_trail_contains(GridPos::new(9, 1), 40));
    }

    #[test]
    fn test_hue_colours_differ() {
        assert_ne!(Rgb::from_hue(0), Rgb::from_hue(120));
        assert_eq!(Rgb::from_hue(0).to_hex().len(), 7);
    }
}
