//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the arena produces identical
//! results given an identical seed, configuration and input stream.
//!
//! # Testing Strategy
//!
//! Replays and batch statistics are only meaningful if a run can be
//! reproduced bit for bit. Sources of non-determinism include:
//!
//! - **Floating-point math**: accumulators, concentration and loot drift
//!   use [`lightcycle_core::math::Fixed`]. Configuration floats are
//!   converted once per tick.
//!
//! - **Iteration order**: agents update in array order and the grid is a
//!   flat vector. No hash maps sit on the tick path.
//!
//! - **System randomness**: every roll comes from the simulation's seeded
//!   `ChaCha8Rng`, whose position is part of the state hash.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual rules (trail trim, loot split, scoring)
//! 2. **Property tests**: random configs and inputs stay reproducible
//! 3. **Integration tests**: full scenarios and replays match
//! 4. **Parallel tests**: N threads running the same arena all agree

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use lightcycle_core::config::{EffectConfig, TickContext};
use lightcycle_core::simulation::{Simulation, UserInput};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// All distinct hashes (one for a deterministic run).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            panic!(
                "Arena is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                self.unique_hashes().len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Whether all simulations finished in the same state.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic(),
            "Parallel arenas diverged after {} ticks across {} threads: {:?}",
            self.ticks,
            self.num_sims,
            self.hashes
        );
    }
}

/// Run any stateful process several times and compare final hashes.
///
/// # Example
///
/// ```ignore
/// let result = verify_determinism(
///     5,
///     100,
///     || fixtures::head_on_arena(&config, 7),
///     |sim| { sim.tick(&TickContext::new(&config)); },
///     Simulation::state_hash,
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let hashes: Vec<u64> = (0..runs)
        .map(|_| {
            let mut state = setup();
            for _ in 0..ticks {
                step(&mut state);
            }
            hash(&state)
        })
        .collect();

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks,
    }
}

/// Advance `sim` by `ticks` with a fixed configuration and no playback.
pub fn run_ticks(sim: &mut Simulation, config: &EffectConfig, ticks: u64) {
    let ctx = TickContext::new(config);
    for _ in 0..ticks {
        sim.tick(&ctx);
    }
}

/// Advance `sim` one tick per entry, applying that entry's inputs first.
pub fn run_with_inputs(sim: &mut Simulation, config: &EffectConfig, inputs: &[Vec<UserInput>]) {
    let ctx = TickContext::new(config);
    for frame in inputs {
        for &input in frame {
            sim.apply_input(input);
        }
        sim.tick(&ctx);
    }
}

/// Run two arenas built by `setup` and check their final hashes match.
pub fn verify_simulation_determinism<F>(setup: F, config: &EffectConfig, ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        ticks,
        &setup,
        |sim| run_ticks(sim, config, 1),
        Simulation::state_hash,
    )
    .is_deterministic
}

/// Run `num_sims` arenas on scoped threads and collect their final hashes.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_simulations_scoped<F>(
    setup: F,
    config: &EffectConfig,
    num_sims: usize,
    ticks: u64,
) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup();
                    run_ticks(&mut sim, config, ticks);
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    ParallelSimResult {
        hashes,
        ticks,
        num_sims,
    }
}

/// Step two arenas side by side and report the first tick they differ on.
///
/// Returns `Some(0)` if the initial states already differ.
pub fn find_first_divergence<F>(setup: F, config: &EffectConfig, ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut a = setup();
    let mut b = setup();
    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    let ctx = TickContext::new(config);
    for tick in 1..=ticks {
        a.tick(&ctx);
        b.tick(&ctx);
        if a.state_hash() != b.state_hash() {
            tracing::warn!(tick, "Arenas diverged");
            return Some(tick);
        }
    }
    None
}

/// Run, serialize, restore, then keep both copies running.
///
/// Returns `true` if the restored copy matches the original right after the
/// round trip and again `ticks` ticks later.
pub fn verify_serialization_determinism<F>(setup: F, config: &EffectConfig, ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup();
    run_ticks(&mut sim, config, ticks);

    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(mut restored) = Simulation::deserialize(&bytes) else {
        return false;
    };
    if restored.state_hash() != sim.state_hash() {
        return false;
    }

    run_ticks(&mut sim, config, ticks);
    run_ticks(&mut restored, config, ticks);
    restored.state_hash() == sim.state_hash()
}

/// Hash any hashable value with the default hasher.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for arena tests.
pub mod strategies {
    use lightcycle_core::config::{EffectConfig, PlaybackContext};
    use lightcycle_core::math::{Direction, GridPos};
    use lightcycle_core::simulation::UserInput;
    use proptest::prelude::*;

    /// Any of the four headings.
    pub fn arb_direction() -> impl Strategy<Value = Direction> {
        (0u8..4).prop_map(Direction::from_index)
    }

    /// A cell strictly inside a `cols` × `rows` border.
    pub fn arb_inner_cell(cols: i32, rows: i32) -> impl Strategy<Value = GridPos> {
        (1..cols - 1, 1..rows - 1).prop_map(|(x, y)| GridPos::new(x, y))
    }

    /// RNG seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }

    /// Canvas sizes that give at least a small playable grid at 20 px.
    pub fn arb_canvas() -> impl Strategy<Value = (u32, u32)> {
        (300u32..1200, 300u32..900)
    }

    /// Free-for-all configuration with busy spawning.
    pub fn arb_config() -> impl Strategy<Value = EffectConfig> {
        (
            0.5f32..2.0,
            0.2f32..2.0,
            1.0f32..20.0,
            1u32..9,
            any::<bool>(),
            0.0f32..0.5,
        )
            .prop_map(
                |(speed, trail_length, spawn_rate, max_agents, enable_dummies, speed_variance)| {
                    EffectConfig {
                        speed,
                        trail_length,
                        spawn_rate,
                        max_agents,
                        enable_dummies,
                        speed_variance,
                        ..Default::default()
                    }
                },
            )
    }

    /// One user input.
    pub fn arb_user_input() -> impl Strategy<Value = UserInput> {
        prop_oneof![
            8 => arb_direction().prop_map(UserInput::Steer),
            1 => Just(UserInput::Restart),
        ]
    }

    /// Per-tick input frames, mostly empty.
    pub fn arb_input_frames(max_ticks: usize) -> impl Strategy<Value = Vec<Vec<UserInput>>> {
        proptest::collection::vec(
            prop_oneof![
                6 => Just(Vec::new()),
                1 => proptest::collection::vec(arb_user_input(), 1..3),
            ],
            1..max_ticks,
        )
    }

    /// A playback position inside a 600 s track.
    pub fn arb_playback() -> impl Strategy<Value = PlaybackContext> {
        (0.0f64..600.0).prop_map(|current_time| PlaybackContext {
            is_playing: true,
            volume: 1.0,
            current_time,
            duration: 600.0,
        })
    }
}
