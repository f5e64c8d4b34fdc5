//! Loot economy: score pickups dropped where agents crash.
//!
//! A crash splits the dropped value into at most [`MAX_PICKUPS`] pickups
//! scattered around the wreck. Pickups drift towards the nearest running
//! agent inside [`MAGNET_RADIUS`], are captured once closer than one cell,
//! and expire after [`LOOT_TTL_TICKS`]. The [`LootLedger`] keeps the totals
//! needed to check `collected + expired + laying == spawned`.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentId, Rgb};
use crate::grid::Grid;
use crate::math::{Fixed, GridPos, Vec2Fixed};

/// Lifetime of an uncollected pickup (5 s).
pub const LOOT_TTL_TICKS: u64 = 300;

/// Maximum number of pickups per drop.
pub const MAX_PICKUPS: u32 = 20;

/// Nominal value of one pickup.
pub const PICKUP_VALUE: u32 = 50;

/// Scatter radius around the crash cell, in cells.
pub const SCATTER_RADIUS: i32 = 3;

/// Placement attempts per pickup before giving up.
pub const PLACEMENT_ATTEMPTS: u32 = 10;

/// Distance at which a pickup starts drifting towards an agent, in cells.
pub const MAGNET_RADIUS: i32 = 4;

/// Drift per tick at speed 1.0, in cells.
pub const BASE_DRIFT: Fixed = Fixed::from_bits(1 << 30);

/// One pickup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loot {
    /// Unique id.
    pub id: u32,
    /// Position in fractional cell coordinates.
    pub pos: Vec2Fixed,
    /// Score credited on capture; zero once collected.
    pub value: u32,
    /// Colour of the agent that dropped it.
    pub color: Rgb,
    /// Tick the pickup appeared.
    pub birth_tick: u64,
}

impl Loot {
    /// Cell the pickup currently sits in.
    #[must_use]
    pub fn cell(&self) -> GridPos {
        self.pos.to_cell()
    }

    /// Ticks since the pickup appeared.
    #[must_use]
    pub const fn age(&self, tick: u64) -> u64 {
        tick.saturating_sub(self.birth_tick)
    }
}

/// Running totals of loot value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LootLedger {
    /// Value ever placed on the grid.
    pub spawned: u64,
    /// Value credited to agents.
    pub collected: u64,
    /// Value lost to expiry.
    pub expired: u64,
}

/// A pickup being credited to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootCapture {
    /// Receiving agent.
    pub agent: AgentId,
    /// Value credited.
    pub value: u32,
    /// Where the capture happened.
    pub pos: GridPos,
}

/// Split a drop into pickup values that sum to exactly `value`.
///
/// Uses `ceil(value / 50)` pickups, capped at 20; larger drops get fewer,
/// larger pickups. The first `value % n` pickups carry one extra point.
#[must_use]
pub fn split_drop(value: u32) -> Vec<u32> {
    if value == 0 {
        return Vec::new();
    }
    let n = value.div_ceil(PICKUP_VALUE).min(MAX_PICKUPS);
    let base = value / n;
    let extra = value % n;
    (0..n).map(|i| base + u32::from(i < extra)).collect()
}

/// All live pickups plus the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LootField {
    items: Vec<Loot>,
    ledger: LootLedger,
    next_id: u32,
}

impl LootField {
    /// Empty field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Live pickups.
    #[must_use]
    pub fn items(&self) -> &[Loot] {
        &self.items
    }

    /// Totals so far.
    #[must_use]
    pub const fn ledger(&self) -> LootLedger {
        self.ledger
    }

    /// Value currently lying on the grid.
    #[must_use]
    pub fn laying(&self) -> u64 {
        self.items.iter().map(|l| u64::from(l.value)).sum()
    }

    /// Drop every pickup and zero the ledger.
    pub fn clear(&mut self) {
        self.items.clear();
        self.ledger = LootLedger::default();
    }

    /// Scatter a drop of `value` around `origin`.
    ///
    /// Each pickup gets up to [`PLACEMENT_ATTEMPTS`] random cells within
    /// [`SCATTER_RADIUS`]; only empty in-play cells qualify. A pickup that
    /// cannot be placed folds its value into the previously placed one (or
    /// the next one, if none was placed yet). Returns the value placed,
    /// which is `value` unless nothing at all could be placed.
    pub fn scatter<R: Rng>(
        &mut self,
        grid: &Grid,
        origin: GridPos,
        value: u32,
        color: Rgb,
        tick: u64,
        rng: &mut R,
    ) -> u32 {
        let first_new = self.items.len();
        let mut carry = 0;

        for piece in split_drop(value) {
            let piece = piece + carry;
            carry = 0;

            let spot = (0..PLACEMENT_ATTEMPTS).find_map(|_| {
                let cell = origin.offset(
                    rng.gen_range(-SCATTER_RADIUS..=SCATTER_RADIUS),
                    rng.gen_range(-SCATTER_RADIUS..=SCATTER_RADIUS),
                );
                grid.is_safe(cell).then_some(cell)
            });

            match spot {
                Some(cell) => {
                    self.items.push(Loot {
                        id: self.next_id,
                        pos: Vec2Fixed::from_cell(cell),
                        value: piece,
                        color,
                        birth_tick: tick,
                    });
                    self.next_id = self.next_id.wrapping_add(1);
                }
                None => match self.items[first_new..].last_mut() {
                    Some(previous) => previous.value += piece,
                    None => carry = piece,
                },
            }
        }

        let placed: u32 = self.items[first_new..].iter().map(|l| l.value).sum();
        if placed == 0 {
            tracing::debug!(?origin, value, "no room to scatter loot; drop skipped");
        }
        self.ledger.spawned += u64::from(placed);
        placed
    }

    /// Collect every pickup lying exactly on `cell`. Returns the value.
    pub fn collect_at(&mut self, cell: GridPos) -> u32 {
        let mut total = 0;
        for loot in self.items.iter_mut().filter(|l| l.value > 0) {
            if loot.cell() == cell {
                total += loot.value;
                loot.value = 0;
            }
        }
        self.ledger.collected += u64::from(total);
        total
    }

    /// Per-tick update: expiry, magnet drift, capture, removal.
    ///
    /// `speed` is the configured base speed; pickups drift at twice
    /// [`BASE_DRIFT`] scaled by it. Captured value is added to the
    /// receiving agent's persona score.
    pub fn update(&mut self, tick: u64, agents: &mut [Agent], speed: Fixed) -> Vec<LootCapture> {
        let step = BASE_DRIFT * 2 * speed;
        let radius = Fixed::from_num(MAGNET_RADIUS);
        let radius_sq = radius * radius;
        let mut captures = Vec::new();

        for loot in &mut self.items {
            if loot.age(tick) > LOOT_TTL_TICKS {
                self.ledger.expired += u64::from(loot.value);
                loot.value = 0;
                continue;
            }
            if loot.value == 0 {
                continue;
            }

            let nearest = agents
                .iter()
                .enumerate()
                .filter(|(_, a)| a.is_running())
                .filter_map(|(i, a)| {
                    let target = Vec2Fixed::from_cell(a.pos);
                    let delta = target - loot.pos;
                    // bounding box first, then the real distance
                    if delta.x.abs() > radius || delta.y.abs() > radius {
                        return None;
                    }
                    let dist_sq = delta.dot(delta);
                    (dist_sq <= radius_sq).then_some((i, dist_sq))
                })
                .min_by_key(|&(_, dist_sq)| dist_sq);

            let Some((index, _)) = nearest else {
                continue;
            };

            let agent = &mut agents[index];
            let target = Vec2Fixed::from_cell(agent.pos);
            if loot.pos.distance(target) <= step {
                loot.pos = target;
            } else {
                loot.pos = loot.pos + (target - loot.pos).normalize().scale(step);
            }

            if loot.pos.distance(target) < Fixed::ONE {
                agent.persona.score += loot.value;
                self.ledger.collected += u64::from(loot.value);
                captures.push(LootCapture {
                    agent: agent.id,
                    value: loot.value,
                    pos: agent.pos,
                });
                loot.value = 0;
            }
        }

        self.items.retain(|l| l.value > 0);
        captures
    }

    /// Whether any live pickup lies exactly on `cell`.
    #[must_use]
    pub fn has_loot_at(&self, cell: GridPos) -> bool {
        self.items.iter().any(|l| l.value > 0 && l.cell() == cell)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::agent::{AgentKind, AgentSpec, Persona};
    use crate::grid::Gate;
    use crate::math::Direction;

    fn grid() -> Grid {
        Grid::for_canvas(800, 600, 20.0).unwrap()
    }

    fn running_agent(id: AgentId, pos: GridPos) -> Agent {
        let mut agent = Agent::new(
            id,
            AgentSpec {
                persona: Persona::new(id as u32, "SARK", 30),
                kind: AgentKind::Ai,
                gate: Gate {
                    pos,
                    heading: Direction::Up,
                },
                speed_factor: Fixed::ONE,
                reaction_gap: 0,
            },
        );
        agent.begin_run();
        agent
    }

    #[test]
    fn test_split_drop_sums_exactly() {
        assert!(split_drop(0).is_empty());
        assert_eq!(split_drop(200), vec![50; 4]);
        assert_eq!(split_drop(230).len(), 5);
        assert_eq!(split_drop(230).iter().sum::<u32>(), 230);

        let big = split_drop(5_123);
        assert_eq!(big.len(), 20);
        assert_eq!(big.iter().sum::<u32>(), 5_123);
    }

    #[test]
    fn test_scatter_conserves_value_and_stays_near() {
        let g = grid();
        let mut field = LootField::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let origin = GridPos::new(20, 15);

        let placed = field.scatter(&g, origin, 350, Rgb::default(), 0, &mut rng);
        assert_eq!(placed, 350);
        assert_eq!(field.laying(), 350);
        assert_eq!(field.ledger().spawned, 350);
        for loot in field.items() {
            assert!(loot.cell().manhattan(origin) <= 2 * SCATTER_RADIUS);
            assert!(g.is_safe(loot.cell()));
        }
    }

    #[test]
    fn test_scatter_skipped_when_boxed_in() {
        let mut g = grid();
        let origin = GridPos::new(20, 15);
        for dy in -SCATTER_RADIUS..=SCATTER_RADIUS {
            for dx in -SCATTER_RADIUS..=SCATTER_RADIUS {
                g.place_wall(origin.offset(dx, dy));
            }
        }
        let mut field = LootField::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(field.scatter(&g, origin, 200, Rgb::default(), 0, &mut rng), 0);
        assert!(field.items().is_empty());
        assert_eq!(field.ledger().spawned, 0);
    }

    #[test]
    fn test_collect_at_exact_cell() {
        let g = grid();
        let mut field = LootField::new();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        field.scatter(&g, GridPos::new(10, 10), 50, Rgb::default(), 0, &mut rng);
        let cell = field.items()[0].cell();

        assert!(field.has_loot_at(cell));
        assert_eq!(field.collect_at(cell), 50);
        assert_eq!(field.collect_at(cell), 0);
        assert_eq!(field.ledger().collected, 50);
    }

    #[test]
    fn test_expiry_after_ttl() {
        let g = grid();
        let mut field = LootField::new();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        field.scatter(&g, GridPos::new(10, 10), 120, Rgb::default(), 0, &mut rng);

        field.update(LOOT_TTL_TICKS, &mut [], Fixed::ONE);
        assert_eq!(field.laying(), 120);

        field.update(LOOT_TTL_TICKS + 1, &mut [], Fixed::ONE);
        assert!(field.items().is_empty());
        let ledger = field.ledger();
        assert_eq!(ledger.expired, 120);
        assert_eq!(ledger.collected + ledger.expired, ledger.spawned);
    }

    #[test]
    fn test_magnet_pulls_and_captures() {
        let mut field = LootField::new();
        field.items.push(Loot {
            id: 0,
            pos: Vec2Fixed::from_cell(GridPos::new(13, 10)),
            value: 75,
            color: Rgb::default(),
            birth_tick: 0,
        });
        field.ledger.spawned = 75;

        let mut agents = vec![running_agent(1, GridPos::new(10, 10))];
        let mut captured = Vec::new();
        for tick in 1..20 {
            captured.extend(field.update(tick, &mut agents, Fixed::ONE));
        }

        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].agent, 1);
        assert_eq!(agents[0].persona.score, 75);
        assert!(field.items().is_empty());
        assert_eq!(field.ledger().collected, 75);
    }

    #[test]
    fn test_magnet_ignores_distant_agents() {
        let mut field = LootField::new();
        let start = Vec2Fixed::from_cell(GridPos::new(30, 10));
        field.items.push(Loot {
            id: 0,
            pos: start,
            value: 50,
            color: Rgb::default(),
            birth_tick: 0,
        });

        let mut agents = vec![running_agent(1, GridPos::new(10, 10))];
        field.update(1, &mut agents, Fixed::ONE);
        assert_eq!(field.items()[0].pos, start);
    }
}
