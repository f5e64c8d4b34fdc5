//! Move decisions for user, AI and dummy agents.
//!
//! Every whole-cell step an agent picks one of at most three candidate
//! headings: straight, left or right (never a reversal). AI agents sum a
//! set of integer score terms per candidate and take the best; dummies
//! mostly roll dice; the user follows the buffered key press.
//!
//! Decisions are pure with respect to the simulation: [`decide`] reads an
//! [`Arena`] and an agent and returns a [`Decision`] for the caller to
//! apply. The only side effect is drawing from the caller's RNG.

use rand::Rng;

use crate::agent::{Agent, AgentId, AgentKind};
use crate::config::AiTuning;
use crate::grid::Grid;
use crate::loot::Loot;
use crate::math::{fixed_from_f32, Direction, Fixed, GridPos};

/// The eight ray directions of the space scan.
const SCAN_RAYS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Read-only view of the world handed to the decision engine.
#[derive(Debug, Clone, Copy)]
pub struct Arena<'a> {
    /// Occupancy and owners.
    pub grid: &'a Grid,
    /// Every agent, in update order.
    pub agents: &'a [Agent],
    /// Live pickups.
    pub loot: &'a [Loot],
    /// Agent with the strictly highest positive score.
    pub leader: Option<AgentId>,
    /// Scoring constants.
    pub tuning: &'a AiTuning,
}

/// How a decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    /// Full evaluation of all candidates.
    Evaluated,
    /// Kept the heading while waiting for the reaction timer.
    Repeated,
    /// Fatal heading noticed in time; full evaluation.
    Dodged,
    /// Fatal heading not noticed; kept it.
    Panicked,
    /// Dummy picked a random candidate.
    Random,
    /// Followed user input.
    User,
}

/// Heading and reaction state an agent should adopt for the next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Heading for the next step.
    pub dir: Direction,
    /// New reaction timer value.
    pub reaction_timer: u32,
    /// New concentration.
    pub concentration: Fixed,
    /// How the heading was chosen.
    pub kind: DecisionKind,
}

impl Decision {
    /// Write the decision into the agent.
    pub fn apply(self, agent: &mut Agent) {
        agent.set_heading(self.dir);
        agent.reaction_timer = self.reaction_timer;
        agent.concentration = self.concentration;
    }
}

/// Candidate headings in enumeration order: straight, left, right.
#[must_use]
pub const fn candidates(dir: Direction) -> [Direction; 3] {
    [dir, dir.turn_left(), dir.turn_right()]
}

/// Index of the best score; exact ties go to the earliest candidate.
///
/// Returns `None` for an empty slice.
#[must_use]
pub fn pick_best(scored: &[(Direction, i64)]) -> Option<Direction> {
    let mut best: Option<(Direction, i64)> = None;
    for &(dir, score) in scored {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((dir, score)),
        }
    }
    best.map(|(dir, _)| dir)
}

/// Agent with the strictly highest positive score; ties go to the first.
#[must_use]
pub fn find_leader(agents: &[Agent]) -> Option<AgentId> {
    let mut leader: Option<(AgentId, u32)> = None;
    for agent in agents.iter().filter(|a| a.is_alive()) {
        let score = agent.persona.score;
        if score == 0 {
            continue;
        }
        match leader {
            Some((_, top)) if score <= top => {}
            _ => leader = Some((agent.id, score)),
        }
    }
    leader.map(|(id, _)| id)
}

/// Follow the buffered direction unless it reverses the agent.
#[must_use]
pub fn decide_user(agent: &Agent, pending: Option<Direction>) -> Decision {
    let dir = match pending {
        Some(dir) if dir != agent.dir.opposite() => dir,
        _ => agent.dir,
    };
    Decision {
        dir,
        reaction_timer: 0,
        concentration: agent.concentration,
        kind: DecisionKind::User,
    }
}

/// Decide the next heading of an AI or dummy agent.
///
/// User agents are not handled here; see [`decide_user`].
pub fn decide<R: Rng + ?Sized>(arena: &Arena<'_>, agent: &Agent, rng: &mut R) -> Decision {
    match agent.kind {
        AgentKind::Dummy => decide_dummy(arena, agent, rng),
        AgentKind::Ai | AgentKind::User => decide_ai(arena, agent, rng),
    }
}

/// Whether moving along `dir` would kill the agent.
fn is_fatal(grid: &Grid, agent: &Agent, dir: Direction) -> bool {
    let next = agent.pos.step(dir);
    if agent.is_immortal() {
        !grid.in_play(next)
    } else {
        !grid.is_safe(next)
    }
}

fn decide_ai<R: Rng + ?Sized>(arena: &Arena<'_>, agent: &Agent, rng: &mut R) -> Decision {
    let tuning = arena.tuning;
    let fatal_ahead = is_fatal(arena.grid, agent, agent.dir);
    let regen = fixed_from_f32(tuning.concentration_regen);
    let decay = fixed_from_f32(tuning.concentration_decay);
    let floor = fixed_from_f32(tuning.concentration_floor);

    let mut concentration = agent.concentration;
    if !fatal_ahead {
        concentration = (concentration + regen).min(Fixed::ONE);
    }

    if agent.reaction_timer > 0 {
        let reaction_timer = agent.reaction_timer - 1;
        if !fatal_ahead {
            return Decision {
                dir: agent.dir,
                reaction_timer,
                concentration,
                kind: DecisionKind::Repeated,
            };
        }

        let roll = Fixed::from_bits(rng.gen_range(0..(1_i64 << 32)));
        if roll >= concentration {
            return Decision {
                dir: agent.dir,
                reaction_timer,
                concentration,
                kind: DecisionKind::Panicked,
            };
        }

        return Decision {
            dir: evaluate(arena, agent, rng),
            reaction_timer,
            concentration: (concentration - decay).max(floor),
            kind: DecisionKind::Dodged,
        };
    }

    Decision {
        dir: evaluate(arena, agent, rng),
        reaction_timer: agent.reaction_gap,
        concentration,
        kind: DecisionKind::Evaluated,
    }
}

fn decide_dummy<R: Rng + ?Sized>(arena: &Arena<'_>, agent: &Agent, rng: &mut R) -> Decision {
    let mut decision = Decision {
        dir: agent.dir,
        reaction_timer: agent.reaction_timer.saturating_sub(1),
        concentration: agent.concentration,
        kind: DecisionKind::Repeated,
    };

    if agent.reaction_timer == 0 {
        decision.reaction_timer = agent.reaction_gap;
        if rng.gen::<f32>() < arena.tuning.dummy_chaos {
            let options = candidates(agent.dir);
            decision.dir = options[rng.gen_range(0..options.len())];
            decision.kind = DecisionKind::Random;
            return decision;
        }
    }

    if is_fatal(arena.grid, agent, decision.dir) {
        let mut turns = [agent.dir.turn_left(), agent.dir.turn_right()];
        if rng.gen::<bool>() {
            turns.swap(0, 1);
        }
        if let Some(&safe) = turns.iter().find(|&&d| !is_fatal(arena.grid, agent, d)) {
            decision.dir = safe;
            decision.kind = DecisionKind::Evaluated;
        }
    }
    decision
}

/// Score all candidates and return the best heading.
pub fn evaluate<R: Rng + ?Sized>(arena: &Arena<'_>, agent: &Agent, rng: &mut R) -> Direction {
    let scored: Vec<(Direction, i64)> = candidates(agent.dir)
        .into_iter()
        .map(|dir| (dir, score_candidate(arena, agent, dir, rng)))
        .collect();
    pick_best(&scored).unwrap_or(agent.dir)
}

/// Total score of moving `agent` one step along `dir`.
///
/// A hard collision returns the veto sentinel without evaluating the other
/// terms.
pub fn score_candidate<R: Rng + ?Sized>(
    arena: &Arena<'_>,
    agent: &Agent,
    dir: Direction,
    rng: &mut R,
) -> i64 {
    let tuning = arena.tuning;
    let grid = arena.grid;
    let next = agent.pos.step(dir);

    if !grid.in_play(next) || (grid.is_occupied(next) && !agent.is_immortal()) {
        return i64::from(tuning.hard_veto);
    }

    let is_leader = arena.leader == Some(agent.id);
    let mut score = area_term(tuning, reachable_from(grid, next, tuning.flood_fill_cap), is_leader);
    score += space_term(tuning, grid, agent, next);
    score += self_hug_term(tuning, agent, next);
    score += momentum_term(tuning, grid, agent, dir, next);
    score += combat_term(arena, agent, dir, next);
    score += loot_term(tuning, arena.loot, next);
    if tuning.jitter > 0 {
        score += i64::from(rng.gen_range(0..=tuning.jitter));
    }
    score
}

fn reachable_from(grid: &Grid, next: GridPos, cap: usize) -> usize {
    if grid.is_safe(next) {
        return grid.reachable_area(next, cap);
    }
    // Immortal agent inside a trail: judge by the best way out.
    Direction::ALL
        .into_iter()
        .map(|d| grid.reachable_area(next.step(d), cap))
        .max()
        .unwrap_or(0)
}

/// Survival-space term for a reachable `area`.
#[must_use]
pub fn area_term(tuning: &AiTuning, area: usize, is_leader: bool) -> i64 {
    let area_i = i64::try_from(area).unwrap_or(i64::MAX / 4);
    let mut score = if area < tuning.doomed_area {
        i64::from(tuning.doomed_penalty)
    } else if area < tuning.open_area {
        i64::from(tuning.trap_penalty)
    } else {
        i64::from(tuning.open_area_reward)
    };
    score += area_i * i64::from(tuning.area_weight);
    if is_leader {
        score += area_i * i64::from(tuning.leader_area_weight);
    }
    score
}

fn space_term(tuning: &AiTuning, grid: &Grid, agent: &Agent, next: GridPos) -> i64 {
    let open: i32 = SCAN_RAYS
        .iter()
        .map(|&(dx, dy)| grid.clear_run(next, dx, dy, tuning.scan_ray_length))
        .sum();

    let walls = Direction::ALL
        .into_iter()
        .map(|d| next.step(d))
        .filter(|&nb| nb != agent.pos)
        .filter(|&nb| !grid.in_play(nb) || grid.is_occupied(nb))
        .count();

    i64::from(open) * i64::from(tuning.scan_weight)
        - walls as i64 * i64::from(tuning.wall_adjacent_penalty)
}

fn self_hug_term(tuning: &AiTuning, agent: &Agent, next: GridPos) -> i64 {
    let hugs = Direction::ALL
        .into_iter()
        .map(|d| next.step(d))
        .filter(|&nb| nb != agent.pos)
        .filter(|&nb| agent.recent_trail_contains(nb, tuning.self_trail_window))
        .count();
    -(hugs as i64) * i64::from(tuning.self_hug_penalty)
}

fn momentum_term(
    tuning: &AiTuning,
    grid: &Grid,
    agent: &Agent,
    dir: Direction,
    next: GridPos,
) -> i64 {
    let (dx, dy) = dir.delta();
    let clear = grid.clear_run(next, dx, dy, tuning.clear_ahead_limit);
    let mut score = i64::from(clear) * i64::from(tuning.clear_ahead_weight);

    if dir == agent.dir {
        score += i64::from(tuning.straight_bonus);
    } else if agent.steps_since_turn < tuning.turn_cooldown_steps {
        score -= i64::from(tuning.turn_thrash_penalty);
    }
    score
}

/// Nearest running opponent within the search radius; ties go to the first.
#[must_use]
pub fn nearest_opponent<'a>(arena: &Arena<'a>, agent: &Agent) -> Option<&'a Agent> {
    let radius = arena.tuning.opponent_search_radius;
    let limit = radius * radius;
    let mut best: Option<(&Agent, i32)> = None;
    for other in arena.agents {
        if other.id == agent.id || !other.is_running() {
            continue;
        }
        let d = agent.pos.distance_squared(other.pos);
        if d > limit {
            continue;
        }
        match best {
            Some((_, top)) if d >= top => {}
            _ => best = Some((other, d)),
        }
    }
    best.map(|(other, _)| other)
}

fn combat_term(arena: &Arena<'_>, agent: &Agent, dir: Direction, next: GridPos) -> i64 {
    let tuning = arena.tuning;
    let Some(opponent) = nearest_opponent(arena, agent) else {
        return 0;
    };

    let mut score = 0;
    if next == opponent.pos || next == opponent.pos.step(opponent.dir) {
        score += i64::from(tuning.opponent_veto);
    }

    if next.manhattan(opponent.pos) > tuning.combat_sense_radius {
        return score;
    }

    let mut attack = 0;
    if agent.dir == opponent.dir && dir != agent.dir {
        // side by side: reward the turn that closes the gap
        let lateral = |p: GridPos| lateral_offset(p, opponent.pos, agent.dir);
        if lateral(next) < lateral(agent.pos) {
            attack += i64::from(tuning.parallel_attack_bonus);
        }
    } else if !dir.is_parallel(opponent.dir) {
        let target = opponent.pos.step_n(opponent.dir, tuning.projection_horizon);
        if next.manhattan(target) < agent.pos.manhattan(target) {
            attack += i64::from(tuning.cut_off_bonus);
        }
    }

    if arena.leader == Some(opponent.id) {
        attack *= i64::from(tuning.leader_target_multiplier);
    }
    score + attack
}

/// Distance between `a` and `b` across the axis of `heading`.
const fn lateral_offset(a: GridPos, b: GridPos, heading: Direction) -> i32 {
    let (dx, dy) = heading.delta();
    ((a.x - b.x) * dy).abs() + ((a.y - b.y) * dx).abs()
}

fn loot_term(tuning: &AiTuning, loot: &[Loot], next: GridPos) -> i64 {
    let mut landing = 0;
    let mut pull = 0_i64;

    for item in loot.iter().filter(|l| l.value > 0) {
        let cell = item.cell();
        if cell == next {
            landing = i64::from(tuning.loot_landing_bonus);
            continue;
        }
        let distance = cell.manhattan(next);
        if distance <= tuning.loot_sense_radius {
            pull += i64::from(item.value) * i64::from(tuning.loot_pull_weight)
                / i64::from(distance + 1);
        }
    }
    landing + pull.min(i64::from(tuning.loot_pull_cap))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::agent::{AgentSpec, Persona, Rgb};
    use crate::grid::Gate;
    use crate::math::Vec2Fixed;
    use crate::trail::claim_spawn;

    fn grid() -> Grid {
        Grid::for_canvas(800, 600, 20.0).unwrap()
    }

    fn quiet() -> AiTuning {
        AiTuning {
            jitter: 0,
            ..Default::default()
        }
    }

    fn spawn(grid: &mut Grid, id: i32, kind: AgentKind, pos: GridPos, dir: Direction) -> Agent {
        let mut agent = Agent::new(
            id,
            AgentSpec {
                persona: Persona::new(id as u32, "GEM", 300),
                kind,
                gate: Gate { pos, heading: dir },
                speed_factor: Fixed::ONE,
                reaction_gap: 0,
            },
        );
        assert!(claim_spawn(&mut agent, grid));
        agent.immortality = 0;
        agent
    }

    fn arena<'a>(grid: &'a Grid, agents: &'a [Agent], loot: &'a [Loot], tuning: &'a AiTuning) -> Arena<'a> {
        Arena {
            grid,
            agents,
            loot,
            leader: None,
            tuning,
        }
    }

    fn score_with(
        grid: &Grid,
        agents: &[Agent],
        agent: &Agent,
        dir: Direction,
        tuning: &AiTuning,
        leader: Option<AgentId>,
    ) -> i64 {
        let view = Arena {
            leader,
            ..arena(grid, agents, &[], tuning)
        };
        score_candidate(&view, agent, dir, &mut ChaCha8Rng::seed_from_u64(0))
    }

    #[test]
    fn test_candidates_order() {
        assert_eq!(
            candidates(Direction::Up),
            [Direction::Up, Direction::Left, Direction::Right]
        );
    }

    #[test]
    fn test_pick_best_prefers_first_on_ties() {
        let tied = [
            (Direction::Up, 10),
            (Direction::Left, 10),
            (Direction::Right, 10),
        ];
        assert_eq!(pick_best(&tied), Some(Direction::Up));

        let tied_turns = [
            (Direction::Up, 5),
            (Direction::Left, 10),
            (Direction::Right, 10),
        ];
        assert_eq!(pick_best(&tied_turns), Some(Direction::Left));
        assert_eq!(pick_best(&[]), None);
    }

    #[test]
    fn test_user_cannot_reverse() {
        let mut g = grid();
        let agent = spawn(&mut g, 1, AgentKind::User, GridPos::new(20, 28), Direction::Up);
        assert_eq!(decide_user(&agent, Some(Direction::Down)).dir, Direction::Up);
        assert_eq!(decide_user(&agent, Some(Direction::Left)).dir, Direction::Left);
        assert_eq!(decide_user(&agent, None).dir, Direction::Up);
    }

    #[test]
    fn test_wall_is_vetoed() {
        let mut g = grid();
        let tuning = quiet();
        let agent = spawn(&mut g, 1, AgentKind::Ai, GridPos::new(1, 10), Direction::Up);
        let agents = [agent.clone()];
        let view = arena(&g, &agents, &[], &tuning);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let left = score_candidate(&view, &agent, Direction::Left, &mut rng);
        assert_eq!(left, i64::from(tuning.hard_veto));
        let up = score_candidate(&view, &agent, Direction::Up, &mut rng);
        assert!(up > left);
    }

    #[test]
    fn test_area_term_orders_doomed_below_open() {
        let tuning = AiTuning::default();
        assert!(area_term(&tuning, 29, false) < area_term(&tuning, 30, false));
        assert!(area_term(&tuning, 99, false) < area_term(&tuning, 100, false));
        assert!(area_term(&tuning, 100, true) > area_term(&tuning, 100, false));
    }

    #[test]
    fn test_avoids_dead_end_pocket() {
        let mut g = grid();
        let tuning = quiet();
        // Agent at (20, 20) heading up. A walled pocket of 15 cells opens to the left.
        for y in 17..=23 {
            g.place_wall(GridPos::new(15, y));
        }
        for x in 15..=19 {
            g.place_wall(GridPos::new(x, 17));
            g.place_wall(GridPos::new(x, 23));
        }
        for y in 18..=22 {
            if y != 20 {
                g.place_wall(GridPos::new(19, y));
            }
        }
        let agent = spawn(&mut g, 1, AgentKind::Ai, GridPos::new(20, 20), Direction::Up);
        let agents = [agent.clone()];
        let view = arena(&g, &agents, &[], &tuning);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let left = score_candidate(&view, &agent, Direction::Left, &mut rng);
        let right = score_candidate(&view, &agent, Direction::Right, &mut rng);
        assert!(left < right, "pocket {left} should score below open {right}");
        assert_ne!(evaluate(&view, &agent, &mut rng), Direction::Left);
    }

    #[test]
    fn test_loot_landing_attracts() {
        let mut g = grid();
        let tuning = quiet();
        let agent = spawn(&mut g, 1, AgentKind::Ai, GridPos::new(20, 15), Direction::Up);
        let loot = [Loot {
            id: 0,
            pos: Vec2Fixed::from_cell(GridPos::new(21, 15)),
            value: 50,
            color: Rgb::default(),
            birth_tick: 0,
        }];
        let agents = [agent.clone()];
        let view = arena(&g, &agents, &loot, &tuning);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut turned = agent.clone();
        turned.steps_since_turn = 100;
        assert_eq!(evaluate(&view, &turned, &mut rng), Direction::Right);
    }

    #[test]
    fn test_opponent_next_cell_is_vetoed() {
        let mut g = grid();
        let tuning = quiet();
        let me = spawn(&mut g, 1, AgentKind::Ai, GridPos::new(20, 15), Direction::Up);
        let other = spawn(&mut g, 2, AgentKind::Ai, GridPos::new(21, 14), Direction::Left);
        let agents = [me.clone(), other];
        let view = arena(&g, &agents, &[], &tuning);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let up = score_candidate(&view, &me, Direction::Up, &mut rng);
        assert!(up < i64::from(tuning.opponent_veto) / 2);
    }

    #[test]
    fn test_reaction_timer_repeats_heading() {
        let mut g = grid();
        let tuning = quiet();
        let mut agent = spawn(&mut g, 1, AgentKind::Ai, GridPos::new(20, 15), Direction::Up);
        agent.reaction_timer = 3;
        agent.reaction_gap = 3;
        let agents = [agent.clone()];
        let view = arena(&g, &agents, &[], &tuning);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let decision = decide(&view, &agent, &mut rng);
        assert_eq!(decision.kind, DecisionKind::Repeated);
        assert_eq!(decision.dir, Direction::Up);
        assert_eq!(decision.reaction_timer, 2);
    }

    #[test]
    fn test_full_concentration_always_dodges() {
        let mut g = grid();
        let tuning = quiet();
        let mut agent = spawn(&mut g, 1, AgentKind::Ai, GridPos::new(20, 15), Direction::Up);
        g.place_wall(GridPos::new(20, 14));
        agent.reaction_timer = 3;
        agent.concentration = Fixed::ONE;
        let agents = [agent.clone()];
        let view = arena(&g, &agents, &[], &tuning);
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        let decision = decide(&view, &agent, &mut rng);
        assert_eq!(decision.kind, DecisionKind::Dodged);
        assert_ne!(decision.dir, Direction::Up);
        assert!(decision.concentration < Fixed::ONE);
    }

    #[test]
    fn test_zero_concentration_panics() {
        let mut g = grid();
        let tuning = quiet();
        let mut agent = spawn(&mut g, 1, AgentKind::Ai, GridPos::new(20, 15), Direction::Up);
        g.place_wall(GridPos::new(20, 14));
        agent.reaction_timer = 3;
        agent.concentration = Fixed::ZERO;
        let agents = [agent.clone()];
        let view = arena(&g, &agents, &[], &tuning);
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        let decision = decide(&view, &agent, &mut rng);
        assert_eq!(decision.kind, DecisionKind::Panicked);
        assert_eq!(decision.dir, Direction::Up);
    }

    #[test]
    fn test_dummy_avoids_wall_when_not_random() {
        let mut g = grid();
        let tuning = AiTuning {
            dummy_chaos: 0.0,
            ..quiet()
        };
        let agent = spawn(&mut g, 1, AgentKind::Dummy, GridPos::new(20, 3), Direction::Up);
        let agents = [agent.clone()];
        let view = arena(&g, &agents, &[], &tuning);
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let decision = decide(&view, &agent, &mut rng);
        assert_ne!(decision.dir, Direction::Up);
    }

    #[test]
    fn test_find_leader_requires_positive_top() {
        let mut g = grid();
        let mut a = spawn(&mut g, 1, AgentKind::Ai, GridPos::new(5, 10), Direction::Up);
        let mut b = spawn(&mut g, 2, AgentKind::Ai, GridPos::new(9, 10), Direction::Up);
        assert_eq!(find_leader(&[a.clone(), b.clone()]), None);

        a.persona.score = 100;
        b.persona.score = 100;
        assert_eq!(find_leader(&[a.clone(), b.clone()]), Some(1));

        b.persona.score = 150;
        assert_eq!(find_leader(&[a, b]), Some(2));
    }

    #[test]
    fn test_turning_toward_side_by_side_opponent_is_rewarded() {
        let mut g = grid();
        let me = spawn(&mut g, 1, AgentKind::Ai, GridPos::new(20, 20), Direction::Up);
        let other = spawn(&mut g, 2, AgentKind::Ai, GridPos::new(23, 20), Direction::Up);
        let agents = [me.clone(), other];
        let with = AiTuning {
            cut_off_bonus: 0,
            ..quiet()
        };
        let without = AiTuning {
            parallel_attack_bonus: 0,
            ..with.clone()
        };
        let delta = |dir| {
            score_with(&g, &agents, &me, dir, &with, None)
                - score_with(&g, &agents, &me, dir, &without, None)
        };

        assert_eq!(delta(Direction::Right), i64::from(with.parallel_attack_bonus));
        assert_eq!(delta(Direction::Left), 0);
        assert_eq!(delta(Direction::Up), 0);
    }

    #[test]
    fn test_crossing_projected_path_earns_cut_off() {
        let mut g = grid();
        let me = spawn(&mut g, 1, AgentKind::Ai, GridPos::new(20, 20), Direction::Up);
        // Heading left; projected five steps ahead it reaches (20, 15).
        let other = spawn(&mut g, 2, AgentKind::Ai, GridPos::new(25, 15), Direction::Left);
        let agents = [me.clone(), other];
        let with = quiet();
        let without = AiTuning {
            cut_off_bonus: 0,
            ..quiet()
        };
        let delta = |dir, leader| {
            score_with(&g, &agents, &me, dir, &with, leader)
                - score_with(&g, &agents, &me, dir, &without, leader)
        };

        assert_eq!(delta(Direction::Up, None), i64::from(with.cut_off_bonus));
        assert_eq!(delta(Direction::Right, None), 0);
        assert_eq!(delta(Direction::Left, None), 0);

        // Against the leader the bonus doubles.
        assert_eq!(with.leader_target_multiplier, 2);
        assert_eq!(
            delta(Direction::Up, Some(2)),
            2 * i64::from(with.cut_off_bonus)
        );
    }

    #[test]
    fn test_hugging_own_trail_is_penalised() {
        let mut g = grid();
        let mut me = spawn(&mut g, 1, AgentKind::Ai, GridPos::new(20, 20), Direction::Up);
        // Came in from the left along row 21, then turned up.
        for cell in [GridPos::new(20, 21), GridPos::new(19, 21), GridPos::new(18, 21)] {
            g.set(cell, me.id);
            me.path.push_front(cell);
        }
        let agents = [me.clone()];
        let with = quiet();
        let without = AiTuning {
            self_hug_penalty: 0,
            ..quiet()
        };
        let delta = |dir| {
            score_with(&g, &agents, &me, dir, &without, None)
                - score_with(&g, &agents, &me, dir, &with, None)
        };

        assert_eq!(delta(Direction::Left), i64::from(with.self_hug_penalty));
        assert_eq!(delta(Direction::Right), 0);

        let mut stale = quiet();
        stale.self_trail_window = 1;
        assert_eq!(
            score_with(&g, &agents, &me, Direction::Left, &stale, None),
            score_with(&g, &agents, &me, Direction::Left, &without, None)
        );
    }

    #[test]
    fn test_turning_again_soon_is_penalised() {
        let mut g = grid();
        let mut fresh = spawn(&mut g, 1, AgentKind::Ai, GridPos::new(20, 15), Direction::Up);
        let mut settled = fresh.clone();
        fresh.steps_since_turn = 1;
        settled.steps_since_turn = 10;
        let tuning = quiet();
        let agents = [fresh.clone()];

        for dir in [Direction::Left, Direction::Right] {
            assert_eq!(
                score_with(&g, &agents, &settled, dir, &tuning, None)
                    - score_with(&g, &agents, &fresh, dir, &tuning, None),
                i64::from(tuning.turn_thrash_penalty)
            );
        }
        assert_eq!(
            score_with(&g, &agents, &settled, Direction::Up, &tuning, None),
            score_with(&g, &agents, &fresh, Direction::Up, &tuning, None)
        );
    }

    #[test]
    fn test_foreign_trail_counts_as_wall() {
        let tuning = quiet();
        let score_next_to = |block: fn(&mut Grid, GridPos)| {
            let mut g = grid();
            let me = spawn(&mut g, 1, AgentKind::Ai, GridPos::new(20, 20), Direction::Up);
            block(&mut g, GridPos::new(21, 19));
            let agents = [me.clone()];
            score_with(&g, &agents, &me, Direction::Up, &tuning, None)
        };

        let open = score_next_to(|_, _| {});
        let trail = score_next_to(|g, pos| {
            g.set(pos, 7);
        });
        let wall = score_next_to(|g, pos| {
            g.place_wall(pos);
        });
        assert_eq!(trail, wall);
        assert!(trail < open);
    }
}
