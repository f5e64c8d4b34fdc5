//! Collision and trail bookkeeping.
//!
//! Every write to the grid on behalf of an agent goes through this module,
//! which keeps the trail invariant: each cell in an agent's `path` is
//! occupied and owned by that agent, and no cell sits in two paths.

use std::collections::HashMap;

use crate::agent::{Agent, AgentState};
use crate::grid::Grid;
use crate::loot::LootField;
use crate::math::{Fixed, GridPos};

/// Trail length in cells for `trail_length = 1.0` at a 1 px cell.
pub const TRAIL_PIXELS: f32 = 600.0;

/// Slowest erase rate, in cells per tick, regardless of agent speed.
const MIN_ERASE_RATE: Fixed = Fixed::from_bits(1 << 28);

/// Maximum path length for a trail-length factor and cell size.
///
/// `max(2, ceil(trail_length × 600 / cell_scale))`.
#[must_use]
pub fn trail_cap(trail_length: f32, cell_scale: f32) -> usize {
    if !(cell_scale > 0.0) || !trail_length.is_finite() {
        return 2;
    }
    let cells = (trail_length.max(0.0) * TRAIL_PIXELS / cell_scale).ceil();
    (cells as usize).max(2)
}

/// Result of committing one whole-cell step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Moved into an empty cell and claimed it; carries collected loot.
    Moved {
        /// Loot value picked up on the new cell.
        collected: u32,
    },
    /// Immortal agent passed through an occupied cell without claiming it.
    Phased,
    /// Immortal agent refused to leave the play area.
    Held,
    /// Hit a wall, a trail or the border.
    Crashed,
}

/// Add fractional progress and return the number of whole cells to move.
pub fn accumulate_steps(agent: &mut Agent) -> u32 {
    agent.move_accumulator += agent.speed_factor;
    let steps = agent.move_accumulator.floor();
    agent.move_accumulator -= steps;
    steps.to_num::<u32>()
}

/// `Spawning → Running`: claim the spawn cell.
///
/// Returns `false` and leaves the agent untouched if the cell is no longer
/// free.
pub fn claim_spawn(agent: &mut Agent, grid: &mut Grid) -> bool {
    if !grid.is_safe(agent.spawn) {
        return false;
    }
    grid.set(agent.spawn, agent.id);
    agent.pos = agent.spawn;
    agent.path.clear();
    agent.path.push_back(agent.spawn);
    agent.begin_run();
    true
}

/// Move one cell along the current heading.
///
/// A crash does not touch the grid; the caller switches the agent to
/// erasing and the erase animation clears the trail.
pub fn commit_move(
    agent: &mut Agent,
    grid: &mut Grid,
    loot: &mut LootField,
    cap: usize,
) -> MoveOutcome {
    let next = agent.pos.step(agent.dir);
    agent.steps_since_turn = agent.steps_since_turn.saturating_add(1);

    if !grid.in_play(next) {
        return if agent.is_immortal() {
            MoveOutcome::Held
        } else {
            MoveOutcome::Crashed
        };
    }

    if grid.is_occupied(next) {
        if agent.is_immortal() {
            agent.pos = next;
            return MoveOutcome::Phased;
        }
        return MoveOutcome::Crashed;
    }

    grid.set(next, agent.id);
    agent.pos = next;
    agent.path.push_back(next);

    let collected = loot.collect_at(next);
    agent.persona.score += collected;

    trim(agent, grid, cap);
    MoveOutcome::Moved { collected }
}

/// Drop the oldest segments until the path fits in `cap`.
pub fn trim(agent: &mut Agent, grid: &mut Grid, cap: usize) {
    while agent.path.len() > cap {
        if let Some(tail) = agent.path.pop_front() {
            grid.clear_if_owned(tail, agent.id);
        }
    }
}

/// Advance the erase animation by one tick.
///
/// Pops from the newest end at `speed_factor × erasure_speed` cells per
/// tick, clearing each popped cell. Returns `true` once the agent is
/// [`AgentState::Dead`].
pub fn erase_step(agent: &mut Agent, grid: &mut Grid, erasure_speed: Fixed) -> bool {
    if agent.state == AgentState::Dead {
        return true;
    }

    let rate = (agent.speed_factor * erasure_speed).max(MIN_ERASE_RATE);
    agent.erase_accumulator += rate;

    while agent.erase_accumulator >= Fixed::ONE {
        agent.erase_accumulator -= Fixed::ONE;
        match agent.path.pop_back() {
            Some(cell) => {
                grid.clear_if_owned(cell, agent.id);
            }
            None => break,
        }
    }

    if agent.path.is_empty() {
        agent.state = AgentState::Dead;
        return true;
    }
    false
}

/// Clear the whole trail at once.
pub fn release_trail(agent: &mut Agent, grid: &mut Grid) {
    for cell in agent.path.drain(..) {
        grid.clear_if_owned(cell, agent.id);
    }
}

/// First violation of the trail invariant, if any.
///
/// Checks that every path cell is occupied and owned by its agent, that no
/// cell appears in two paths, and that every owned cell belongs to a path.
#[must_use]
pub fn find_trail_violation(grid: &Grid, agents: &[Agent]) -> Option<String> {
    let mut claimed: HashMap<GridPos, i32> = HashMap::new();

    for agent in agents {
        for &cell in &agent.path {
            if !grid.is_occupied(cell) {
                return Some(format!("agent {} path cell {cell:?} is empty", agent.id));
            }
            if grid.owner_at(cell) != Some(agent.id) {
                return Some(format!(
                    "agent {} path cell {cell:?} owned by {:?}",
                    agent.id,
                    grid.owner_at(cell)
                ));
            }
            if let Some(other) = claimed.insert(cell, agent.id) {
                return Some(format!(
                    "cell {cell:?} in paths of agents {other} and {}",
                    agent.id
                ));
            }
        }
    }

    let owned = grid.owners().iter().filter(|&&o| o >= 0).count();
    if owned != claimed.len() {
        return Some(format!(
            "{owned} owned cells but {} path cells",
            claimed.len()
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentKind, AgentSpec, Persona};
    use crate::grid::Gate;
    use crate::math::Direction;

    fn grid() -> Grid {
        Grid::for_canvas(800, 600, 20.0).unwrap()
    }

    fn agent(id: i32, pos: GridPos, dir: Direction) -> Agent {
        Agent::new(
            id,
            AgentSpec {
                persona: Persona::new(id as u32, "YORI", 90),
                kind: AgentKind::Ai,
                gate: Gate { pos, heading: dir },
                speed_factor: Fixed::ONE,
                reaction_gap: 0,
            },
        )
    }

    #[test]
    fn test_trail_cap() {
        assert_eq!(trail_cap(1.0, 20.0), 30);
        assert_eq!(trail_cap(0.5, 20.0), 15);
        assert_eq!(trail_cap(0.0, 20.0), 2);
        assert_eq!(trail_cap(1.0, 7.0), 86);
        assert_eq!(trail_cap(1.0, 0.0), 2);
    }

    #[test]
    fn test_accumulate_steps_carries_fraction() {
        let mut a = agent(1, GridPos::new(5, 5), Direction::Right);
        a.speed_factor = Fixed::from_num(0.5);
        assert_eq!(accumulate_steps(&mut a), 0);
        assert_eq!(accumulate_steps(&mut a), 1);
        a.speed_factor = Fixed::from_num(2.25);
        assert_eq!(accumulate_steps(&mut a), 2);
        assert_eq!(a.move_accumulator, Fixed::from_num(0.25));
    }

    #[test]
    fn test_claim_spawn_marks_cell() {
        let mut g = grid();
        let mut a = agent(3, GridPos::new(5, 5), Direction::Right);
        assert!(claim_spawn(&mut a, &mut g));
        assert_eq!(a.state, AgentState::Running);
        assert_eq!(g.owner_at(GridPos::new(5, 5)), Some(3));
        assert_eq!(a.path.len(), 1);
    }

    #[test]
    fn test_claim_spawn_fails_on_taken_cell() {
        let mut g = grid();
        g.place_wall(GridPos::new(5, 5));
        let mut a = agent(3, GridPos::new(5, 5), Direction::Right);
        assert!(!claim_spawn(&mut a, &mut g));
        assert_eq!(a.state, AgentState::Spawning);
    }

    #[test]
    fn test_move_and_trim() {
        let mut g = grid();
        let mut loot = LootField::new();
        let mut a = agent(1, GridPos::new(5, 10), Direction::Right);
        claim_spawn(&mut a, &mut g);
        a.immortality = 0;

        for _ in 0..10 {
            let outcome = commit_move(&mut a, &mut g, &mut loot, 4);
            assert_eq!(outcome, MoveOutcome::Moved { collected: 0 });
        }
        assert_eq!(a.pos, GridPos::new(15, 10));
        assert_eq!(a.path.len(), 4);
        assert!(!g.is_occupied(GridPos::new(11, 10)));
        assert!(g.is_occupied(GridPos::new(12, 10)));
        assert_eq!(find_trail_violation(&g, &[a]), None);
    }

    #[test]
    fn test_mortal_crash_leaves_grid_alone() {
        let mut g = grid();
        let mut loot = LootField::new();
        let mut a = agent(1, GridPos::new(5, 10), Direction::Right);
        claim_spawn(&mut a, &mut g);
        a.immortality = 0;
        g.place_wall(GridPos::new(6, 10));

        assert_eq!(commit_move(&mut a, &mut g, &mut loot, 30), MoveOutcome::Crashed);
        assert_eq!(a.pos, GridPos::new(5, 10));
        assert!(g.is_occupied(GridPos::new(5, 10)));
    }

    #[test]
    fn test_border_crash() {
        let mut g = grid();
        let mut loot = LootField::new();
        let mut a = agent(1, GridPos::new(1, 10), Direction::Left);
        claim_spawn(&mut a, &mut g);
        a.immortality = 0;
        assert_eq!(commit_move(&mut a, &mut g, &mut loot, 30), MoveOutcome::Crashed);
    }

    #[test]
    fn test_immortal_phases_and_holds() {
        let mut g = grid();
        let mut loot = LootField::new();
        let mut a = agent(1, GridPos::new(2, 10), Direction::Left);
        claim_spawn(&mut a, &mut g);

        a.set_heading(Direction::Right);
        g.place_wall(GridPos::new(3, 10));
        assert_eq!(commit_move(&mut a, &mut g, &mut loot, 30), MoveOutcome::Phased);
        assert_eq!(a.pos, GridPos::new(3, 10));
        assert_eq!(g.owner_at(GridPos::new(3, 10)), None);
        assert_eq!(a.path.len(), 1);

        let mut b = agent(2, GridPos::new(1, 12), Direction::Left);
        claim_spawn(&mut b, &mut g);
        assert_eq!(commit_move(&mut b, &mut g, &mut loot, 30), MoveOutcome::Held);
        assert_eq!(b.pos, GridPos::new(1, 12));
    }

    #[test]
    fn test_erase_pops_newest_first() {
        let mut g = grid();
        let mut loot = LootField::new();
        let mut a = agent(1, GridPos::new(5, 10), Direction::Right);
        claim_spawn(&mut a, &mut g);
        for _ in 0..5 {
            commit_move(&mut a, &mut g, &mut loot, 30);
        }
        a.crash();

        assert!(!erase_step(&mut a, &mut g, Fixed::from_num(2)));
        assert_eq!(a.path.len(), 4);
        assert!(!g.is_occupied(GridPos::new(10, 10)));
        assert!(!g.is_occupied(GridPos::new(9, 10)));
        assert!(g.is_occupied(GridPos::new(5, 10)));

        while !erase_step(&mut a, &mut g, Fixed::from_num(2)) {}
        assert_eq!(a.state, AgentState::Dead);
        assert_eq!(g.occupied_count(), 0);
    }

    #[test]
    fn test_violation_detects_foreign_owner() {
        let mut g = grid();
        let mut a = agent(1, GridPos::new(5, 10), Direction::Right);
        claim_spawn(&mut a, &mut g);
        g.set(GridPos::new(5, 10), 9);
        assert!(find_trail_violation(&g, &[a]).is_some());
    }
}
