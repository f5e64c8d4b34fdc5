//! Core simulation loop.
//!
//! [`Simulation`] owns the grid, the agents, the loot and the seeded RNG.
//! The host calls [`Simulation::tick`] once per frame with a
//! [`TickContext`] and draws the returned [`FrameSnapshot`].
//!
//! # Determinism
//!
//! - Kinematics and AI scores use fixed-point math (see [`crate::math`])
//! - All randomness comes from one seeded `ChaCha8Rng`
//! - Agents update in array order; later agents see earlier agents' moves
//! - Same seed, configuration and inputs always produce the same state
//!
//! # Example
//!
//! ```
//! use lightcycle_core::config::{EffectConfig, TickContext};
//! use lightcycle_core::simulation::Simulation;
//!
//! let config = EffectConfig::default();
//! let mut sim = Simulation::new(800, 600, &config, 42).unwrap();
//! let frame = sim.tick(&TickContext::new(&config));
//! assert_eq!(frame.tick, 1);
//! assert_eq!((frame.cols, frame.rows), (40, 30));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentId, AgentKind, AgentSpec, AgentState, Persona};
use crate::ai::{self, Arena};
use crate::config::{AiTuning, EffectConfig, TickContext};
use crate::error::{Result, SimError};
use crate::grid::{Gate, Grid};
use crate::loot::{LootField, LootLedger};
use crate::math::{fixed_from_f32, Direction, Fixed};
use crate::round::{self, RoundPhase, RoundResults, Roster, DUMMY_SHARE, SPAWN_CHANCE};
use crate::snapshot::{self, AgentView, FrameSnapshot, LootView, RenderFlags, SimEvent};
use crate::trail::{self, MoveOutcome};

/// Input from the keyboard-controlled agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserInput {
    /// Buffer a heading for the next step.
    Steer(Direction),
    /// Respawn the user agent.
    Restart,
}

/// The arena and everything in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    grid: Grid,
    agents: Vec<Agent>,
    loot: LootField,
    roster: Roster,
    /// Personas knocked out of a round for good.
    fallen: Vec<Persona>,
    tuning: AiTuning,
    rng: ChaCha8Rng,
    seed: u64,
    tick: u64,
    width: u32,
    height: u32,
    cell_size: f32,
    next_agent_id: AgentId,
    round_mode: bool,
    round_size: u32,
    last_phase: Option<RoundPhase>,
    user_enabled: bool,
    user_pending: bool,
    user_persona: Option<Persona>,
    pending_direction: Option<Direction>,
    restart_requested: bool,
}

impl Simulation {
    /// Create an empty arena for a canvas.
    ///
    /// Modes and the user agent are picked up from the configuration on the
    /// first tick.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidDimensions`] if the canvas and the
    /// configured cell size do not form a playable grid.
    pub fn new(width: u32, height: u32, config: &EffectConfig, seed: u64) -> Result<Self> {
        let grid = Grid::for_canvas(width, height, config.size)?;
        Ok(Self {
            grid,
            agents: Vec::new(),
            loot: LootField::new(),
            roster: Roster::new(),
            fallen: Vec::new(),
            tuning: AiTuning::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            tick: 0,
            width,
            height,
            cell_size: config.size,
            next_agent_id: 0,
            round_mode: false,
            round_size: config.max_agents,
            last_phase: None,
            user_enabled: false,
            user_pending: false,
            user_persona: None,
            pending_direction: None,
            restart_requested: false,
        })
    }

    /// Replace the AI constants.
    #[must_use]
    pub fn with_tuning(mut self, tuning: AiTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Ticks simulated so far.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Seed the RNG was created with.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Current grid.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Mutable grid, for placing static walls.
    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// All agents in update order.
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Agent by id.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::AgentNotFound`] if no such agent exists.
    pub fn agent(&self, id: AgentId) -> Result<&Agent> {
        self.agents
            .iter()
            .find(|a| a.id == id)
            .ok_or(SimError::AgentNotFound(id))
    }

    /// Mutable agent by id.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::AgentNotFound`] if no such agent exists.
    pub fn agent_mut(&mut self, id: AgentId) -> Result<&mut Agent> {
        self.agents
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(SimError::AgentNotFound(id))
    }

    /// The user agent, if one is on the grid.
    #[must_use]
    pub fn user_agent(&self) -> Option<&Agent> {
        self.agents.iter().find(|a| a.is_user())
    }

    /// Live loot.
    #[must_use]
    pub const fn loot(&self) -> &LootField {
        &self.loot
    }

    /// Loot totals.
    #[must_use]
    pub const fn ledger(&self) -> LootLedger {
        self.loot.ledger()
    }

    /// Personas waiting for a gate in round mode.
    #[must_use]
    pub const fn roster(&self) -> &Roster {
        &self.roster
    }

    /// AI constants in use.
    #[must_use]
    pub const fn tuning(&self) -> &AiTuning {
        &self.tuning
    }

    /// Cell size of the current grid, in pixels.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Buffer a heading for the user agent. Only the latest one is kept.
    pub fn push_user_direction(&mut self, dir: Direction) {
        self.pending_direction = Some(dir);
    }

    /// Respawn the user agent on the next tick.
    pub fn request_restart(&mut self) {
        self.restart_requested = true;
    }

    /// Apply one user input.
    pub fn apply_input(&mut self, input: UserInput) {
        match input {
            UserInput::Steer(dir) => self.push_user_direction(dir),
            UserInput::Restart => self.request_restart(),
        }
    }

    /// Rebuild the grid for a new canvas size. Always a full reset.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidDimensions`] and keeps the current grid if
    /// the new size is not playable.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.grid = Grid::for_canvas(width, height, self.cell_size)?;
        self.width = width;
        self.height = height;
        tracing::info!(width, height, cols = self.grid.cols(), rows = self.grid.rows(), "Arena resized");
        self.reset_arena();
        Ok(())
    }

    /// Remove every agent, pickup and trail immediately.
    ///
    /// Modes are forgotten too, so the next enabled tick starts from
    /// scratch.
    pub fn clear(&mut self) {
        self.grid.reset();
        self.agents.clear();
        self.loot.clear();
        self.roster.clear();
        self.fallen.clear();
        self.round_mode = false;
        self.last_phase = None;
        self.user_enabled = false;
        self.user_pending = false;
        self.user_persona = None;
        self.pending_direction = None;
        self.restart_requested = false;
        tracing::info!(tick = self.tick, "Arena cleared");
    }

    fn is_empty(&self) -> bool {
        self.agents.is_empty() && self.loot.items().is_empty() && self.grid.occupied_count() == 0
    }

    /// Put an agent on a gate. It claims the cell on the next tick.
    pub fn place_agent(&mut self, kind: AgentKind, gate: Gate, config: &EffectConfig) -> AgentId {
        let persona = match kind {
            AgentKind::User => self.roster.mint_user(),
            AgentKind::Ai => self.roster.mint(false, &mut self.rng),
            AgentKind::Dummy => self.roster.mint(true, &mut self.rng),
        };
        self.spawn(persona, kind, gate, config)
    }

    fn spawn(&mut self, persona: Persona, kind: AgentKind, gate: Gate, config: &EffectConfig) -> AgentId {
        let speed = fixed_from_f32(config.speed);
        let speed_factor = match kind {
            AgentKind::User => speed,
            AgentKind::Ai | AgentKind::Dummy => {
                let variance = fixed_from_f32(config.speed_variance);
                let unit = Fixed::from_bits(self.rng.gen_range(-(1_i64 << 32)..=(1_i64 << 32)));
                (speed * (Fixed::ONE + variance * unit)).max(Fixed::ZERO)
            }
        };
        let reaction_gap = match kind {
            AgentKind::User => 0,
            AgentKind::Ai => roll_gap(
                &mut self.rng,
                self.tuning.reaction_gap_min,
                self.tuning.reaction_gap_max,
            ),
            AgentKind::Dummy => roll_gap(
                &mut self.rng,
                self.tuning.dummy_reaction_gap_min,
                self.tuning.dummy_reaction_gap_max,
            ),
        };

        let id = self.next_agent_id;
        self.next_agent_id += 1;
        self.agents.push(Agent::new(
            id,
            AgentSpec {
                persona,
                kind,
                gate,
                speed_factor,
                reaction_gap,
            },
        ));
        id
    }

    /// Advance the simulation by one tick.
    ///
    /// # Order
    ///
    /// 1. Apply configuration (cell size, mode and user toggles)
    /// 2. Derive the round phase; a finished round freezes here
    /// 3. Restart or spawn the user, spawn AI agents
    /// 4. Update every agent in array order
    /// 5. Loot magnetism, capture and expiry
    /// 6. Sweep dead agents, reincarnating personas in round mode
    pub fn tick(&mut self, ctx: &TickContext<'_>) -> FrameSnapshot {
        let config = ctx.config;
        let mut events = Vec::new();

        if !config.enabled {
            if !self.is_empty() {
                self.clear();
                events.push(SimEvent::Reset);
            }
            return self.snapshot(ctx, events, None, None);
        }

        self.apply_config(config, &mut events);

        let phase = self.round_mode.then(|| round::phase_for(&ctx.playback));
        self.track_phase(phase, &mut events);

        if phase == Some(RoundPhase::Finished) {
            let results = self.results();
            return self.snapshot(ctx, events, phase, Some(results));
        }

        self.handle_user(config);
        self.spawn_agents(config, phase);

        let cap = trail::trail_cap(config.trail_length, self.cell_size);
        let leader = ai::find_leader(&self.agents);
        let erasure_speed = fixed_from_f32(config.erasure_speed);
        for index in 0..self.agents.len() {
            self.update_agent(index, cap, leader, erasure_speed, &mut events);
        }

        let captures = self
            .loot
            .update(self.tick, &mut self.agents, fixed_from_f32(config.speed));
        events.extend(captures.into_iter().map(|c| SimEvent::LootCollected {
            agent: c.agent,
            value: c.value,
            pos: c.pos,
        }));

        self.sweep(phase);
        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        #[cfg(feature = "debug-validation")]
        if let Some(violation) = trail::find_trail_violation(&self.grid, &self.agents) {
            tracing::error!(tick = self.tick, %violation, "Trail invariant broken");
        }

        self.snapshot(ctx, events, phase, None)
    }

    fn apply_config(&mut self, config: &EffectConfig, events: &mut Vec<SimEvent>) {
        #[allow(clippy::float_cmp)]
        let size_changed = config.size != self.cell_size;
        if size_changed {
            match Grid::for_canvas(self.width, self.height, config.size) {
                Ok(grid) => {
                    tracing::info!(from = self.cell_size, to = config.size, "Cell size changed");
                    self.grid = grid;
                    self.cell_size = config.size;
                    self.reset_arena();
                    events.push(SimEvent::Reset);
                }
                Err(err) => tracing::warn!(%err, "Ignoring cell size change"),
            }
        }

        if config.round_mode != self.round_mode {
            tracing::info!(round_mode = config.round_mode, "Match mode changed");
            self.round_mode = config.round_mode;
            self.round_size = config.max_agents;
            self.last_phase = None;
            self.roster.clear();
            self.reset_arena();
            events.push(SimEvent::Reset);
        }

        if config.enable_user != self.user_enabled {
            self.user_enabled = config.enable_user;
            self.user_pending = config.enable_user;
            if !config.enable_user {
                self.remove_user();
            }
        }
    }

    /// Wipe grid, agents and loot. Round mode re-seeds a fresh roster.
    fn reset_arena(&mut self) {
        self.grid.reset();
        self.agents.clear();
        self.loot.clear();
        self.fallen.clear();
        self.user_pending = self.user_enabled;
        if self.round_mode {
            self.roster.clear();
            self.roster.seed(self.round_size, &mut self.rng);
        }
    }

    fn track_phase(&mut self, phase: Option<RoundPhase>, events: &mut Vec<SimEvent>) {
        if let (Some(from), Some(to)) = (self.last_phase, phase) {
            if from != to {
                tracing::info!(?from, ?to, tick = self.tick, "Round phase changed");
                events.push(SimEvent::PhaseChanged { from, to });
                if from == RoundPhase::Finished {
                    // a new track started
                    self.reset_arena();
                }
            }
        }
        self.last_phase = phase;
    }

    fn handle_user(&mut self, config: &EffectConfig) {
        if std::mem::take(&mut self.restart_requested) && self.user_enabled {
            self.remove_user();
            self.user_pending = true;
        }

        if !self.user_pending || self.agents.iter().any(Agent::is_user) {
            return;
        }

        let gate = self.grid.user_spawn();
        if !self.grid.is_safe(gate.pos) {
            tracing::debug!(pos = ?gate.pos, "User spawn cell taken; retrying next tick");
            return;
        }

        let persona = match self.user_persona.take() {
            Some(persona) => persona,
            None => self.roster.mint_user(),
        };
        self.spawn(persona, AgentKind::User, gate, config);
        self.user_pending = false;
    }

    fn remove_user(&mut self) {
        let grid = &mut self.grid;
        let saved = &mut self.user_persona;
        self.agents.retain_mut(|agent| {
            if !agent.is_user() {
                return true;
            }
            trail::release_trail(agent, grid);
            *saved = Some(agent.persona.clone());
            false
        });
    }

    fn free_gates(&self) -> Vec<Gate> {
        self.grid
            .gates()
            .into_iter()
            .filter(|gate| self.grid.is_safe(gate.pos))
            .filter(|gate| !self.agents.iter().any(|a| a.is_alive() && a.pos == gate.pos))
            .collect()
    }

    fn spawn_agents(&mut self, config: &EffectConfig, phase: Option<RoundPhase>) {
        if self.round_mode {
            if phase != Some(RoundPhase::Active) {
                return;
            }
            for gate in self.free_gates() {
                let Some(persona) = self.roster.pop_waiting() else {
                    break;
                };
                self.spawn(persona, AgentKind::Ai, gate, config);
            }
            return;
        }

        let roll: f32 = self.rng.gen();
        let alive = self
            .agents
            .iter()
            .filter(|a| !a.is_user() && a.is_alive())
            .count();
        if alive >= config.max_agents as usize || roll >= config.spawn_rate * SPAWN_CHANCE {
            return;
        }

        let free = self.free_gates();
        if free.is_empty() {
            tracing::debug!(tick = self.tick, "No free gate; spawn skipped");
            return;
        }
        let gate = free[self.rng.gen_range(0..free.len())];
        let dummy = config.enable_dummies && self.rng.gen::<f32>() < DUMMY_SHARE;
        let persona = self.roster.mint(dummy, &mut self.rng);
        let kind = if dummy { AgentKind::Dummy } else { AgentKind::Ai };
        self.spawn(persona, kind, gate, config);
    }

    fn update_agent(
        &mut self,
        index: usize,
        cap: usize,
        leader: Option<AgentId>,
        erasure_speed: Fixed,
        events: &mut Vec<SimEvent>,
    ) {
        match self.agents[index].state {
            AgentState::Spawning => {
                let agent = &mut self.agents[index];
                if trail::claim_spawn(agent, &mut self.grid) {
                    tracing::debug!(agent = agent.id, name = %agent.persona.name, "Agent spawned");
                    events.push(SimEvent::Spawned {
                        agent: agent.id,
                        name: agent.persona.name.clone(),
                        pos: agent.pos,
                    });
                } else {
                    tracing::debug!(agent = agent.id, "Spawn cell taken; spawn abandoned");
                    agent.state = AgentState::Dead;
                    if agent.is_user() {
                        self.user_pending = true;
                    }
                }
            }
            AgentState::Running => self.run_agent(index, cap, leader, events),
            AgentState::Erasing => {
                trail::erase_step(&mut self.agents[index], &mut self.grid, erasure_speed);
            }
            AgentState::Dead => {}
        }
    }

    fn run_agent(
        &mut self,
        index: usize,
        cap: usize,
        leader: Option<AgentId>,
        events: &mut Vec<SimEvent>,
    ) {
        let agent = &mut self.agents[index];
        agent.immortality = agent.immortality.saturating_sub(1);
        let steps = trail::accumulate_steps(agent);

        for _ in 0..steps {
            let decision = if self.agents[index].is_user() {
                ai::decide_user(&self.agents[index], self.pending_direction.take())
            } else {
                let arena = Arena {
                    grid: &self.grid,
                    agents: &self.agents,
                    loot: self.loot.items(),
                    leader,
                    tuning: &self.tuning,
                };
                ai::decide(&arena, &self.agents[index], &mut self.rng)
            };

            let agent = &mut self.agents[index];
            decision.apply(agent);
            match trail::commit_move(agent, &mut self.grid, &mut self.loot, cap) {
                MoveOutcome::Moved { collected } if collected > 0 => {
                    events.push(SimEvent::LootCollected {
                        agent: agent.id,
                        value: collected,
                        pos: agent.pos,
                    });
                }
                MoveOutcome::Crashed => {
                    self.crash(index, events);
                    break;
                }
                MoveOutcome::Moved { .. } | MoveOutcome::Phased | MoveOutcome::Held => {}
            }
        }
    }

    fn crash(&mut self, index: usize, events: &mut Vec<SimEvent>) {
        let agent = &mut self.agents[index];
        let value = agent.crash();
        let (id, pos, color) = (agent.id, agent.pos, agent.persona.color);
        tracing::debug!(agent = id, ?pos, value, "Agent crashed");
        events.push(SimEvent::Explosion {
            agent: id,
            pos,
            color,
            name: agent.persona.name.clone(),
        });
        self.loot
            .scatter(&self.grid, pos, value, color, self.tick, &mut self.rng);
    }

    fn sweep(&mut self, phase: Option<RoundPhase>) {
        let reincarnate = self.round_mode && phase == Some(RoundPhase::Active);
        let mut kept = Vec::with_capacity(self.agents.len());

        for agent in std::mem::take(&mut self.agents) {
            if agent.state != AgentState::Dead {
                kept.push(agent);
                continue;
            }
            if agent.is_user() {
                self.user_persona = Some(agent.persona);
            } else if reincarnate {
                tracing::debug!(persona = agent.persona.id, name = %agent.persona.name, "Persona re-queued");
                self.roster.enqueue(agent.persona);
            } else if self.round_mode {
                self.fallen.push(agent.persona);
            }
        }
        self.agents = kept;
    }

    /// Ranking of every persona that took part in the round.
    #[must_use]
    pub fn results(&self) -> RoundResults {
        let user_waiting = self
            .user_persona
            .iter()
            .filter(|_| !self.agents.iter().any(Agent::is_user));
        RoundResults::rank(
            self.agents
                .iter()
                .map(|a| &a.persona)
                .chain(self.roster.waiting())
                .chain(self.fallen.iter())
                .chain(user_waiting),
        )
    }

    /// Snapshot of the current state without advancing. Carries no events.
    #[must_use]
    pub fn frame(&self, ctx: &TickContext<'_>) -> FrameSnapshot {
        let phase = self.round_mode.then(|| round::phase_for(&ctx.playback));
        let results = (phase == Some(RoundPhase::Finished)).then(|| self.results());
        self.snapshot(ctx, Vec::new(), phase, results)
    }

    fn snapshot(
        &self,
        ctx: &TickContext<'_>,
        events: Vec<SimEvent>,
        phase: Option<RoundPhase>,
        results: Option<RoundResults>,
    ) -> FrameSnapshot {
        FrameSnapshot {
            tick: self.tick,
            cols: self.grid.cols(),
            rows: self.grid.rows(),
            cell_size: self.cell_size,
            safe_zone_rows: self.grid.safe_zone_rows(),
            agents: self.agents.iter().map(AgentView::from).collect(),
            loot: self.loot.items().iter().map(LootView::from).collect(),
            events,
            leaderboard: snapshot::leaderboard(&self.agents),
            phase,
            time_left: phase.map(|_| ctx.playback.time_left()),
            results,
            glow: snapshot::glow_level(ctx.config, ctx.low_band_level(), ctx.playback.volume),
            flags: RenderFlags::from(ctx.config),
        }
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.grid.occupancy().hash(&mut hasher);
        self.grid.owners().hash(&mut hasher);

        self.agents.len().hash(&mut hasher);
        for agent in &self.agents {
            agent.id.hash(&mut hasher);
            agent.state.hash(&mut hasher);
            agent.pos.hash(&mut hasher);
            agent.dir.hash(&mut hasher);
            agent.move_accumulator.to_bits().hash(&mut hasher);
            agent.erase_accumulator.to_bits().hash(&mut hasher);
            agent.concentration.to_bits().hash(&mut hasher);
            agent.immortality.hash(&mut hasher);
            agent.reaction_timer.hash(&mut hasher);
            agent.persona.score.hash(&mut hasher);
            agent.persona.deaths.hash(&mut hasher);
            agent.path.hash(&mut hasher);
        }

        for loot in self.loot.items() {
            loot.id.hash(&mut hasher);
            loot.pos.hash(&mut hasher);
            loot.value.hash(&mut hasher);
        }
        self.loot.ledger().hash(&mut hasher);

        for persona in self.roster.waiting() {
            persona.id.hash(&mut hasher);
        }
        self.rng.get_word_pos().hash(&mut hasher);

        hasher.finish()
    }

    /// Serialize the simulation state for replay or checkpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize simulation state from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

fn roll_gap<R: Rng + ?Sized>(rng: &mut R, a: u32, b: u32) -> u32 {
    rng.gen_range(a.min(b)..=a.max(b))
}
