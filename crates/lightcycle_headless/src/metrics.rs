//! Run metrics for tuning the arena.
//!
//! A [`MetricsCollector`] watches the frames of one run and turns the event
//! stream into per-persona counters; [`BatchSummary`] aggregates many runs.

use std::collections::HashMap;

use lightcycle_core::agent::AgentId;
use lightcycle_core::round::RoundResults;
use lightcycle_core::simulation::Simulation;
use lightcycle_core::snapshot::{FrameSnapshot, SimEvent};
use serde::{Deserialize, Serialize};

/// Complete metrics for a single run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Unique run identifier.
    pub run_id: String,
    /// Scenario name.
    pub scenario: String,
    /// Random seed used.
    pub seed: u64,
    /// Ticks simulated.
    pub duration_ticks: u64,
    /// Agents that entered the arena.
    pub spawns: u32,
    /// Crashes.
    pub crashes: u32,
    /// Pickups scattered.
    pub loot_spawned: u64,
    /// Pickups collected.
    pub loot_collected: u64,
    /// Pickups that timed out.
    pub loot_expired: u64,
    /// Most agents alive at once.
    pub peak_agents: u32,
    /// Best score seen on the leaderboard.
    pub top_score: u32,
    /// Leader at the end of the run.
    pub leader: Option<String>,
    /// Longest single life in ticks.
    pub longest_life_ticks: u64,
    /// Per-name counters.
    pub personas: HashMap<String, PersonaMetrics>,
    /// Ranking if a round finished.
    pub results: Option<RoundResults>,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl RunMetrics {
    /// Create a new run metrics instance.
    #[must_use]
    pub fn new(run_id: impl Into<String>, scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            run_id: run_id.into(),
            scenario: scenario.into(),
            seed,
            ..Default::default()
        }
    }

    /// Get or create persona metrics.
    pub fn persona_mut(&mut self, name: &str) -> &mut PersonaMetrics {
        self.personas.entry(name.to_string()).or_default()
    }

    /// Pickups collected per pickup scattered.
    #[must_use]
    pub fn collection_rate(&self) -> f64 {
        if self.loot_spawned == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.loot_collected as f64 / self.loot_spawned as f64;
        rate
    }
}

/// Counters for one persona across its lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaMetrics {
    /// Lives started.
    pub lives: u32,
    /// Crashes.
    pub crashes: u32,
    /// Pickups collected.
    pub pickups: u32,
    /// Loot value collected.
    pub loot_value: u64,
}

/// Summary statistics across multiple runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total runs.
    pub total_runs: u32,
    /// Average run length in ticks.
    pub avg_duration_ticks: f64,
    /// Average crashes per minute of play.
    pub crashes_per_minute: f64,
    /// Average pickup collection rate.
    pub avg_collection_rate: f64,
    /// Average of the best score per run.
    pub avg_top_score: f64,
    /// Highest peak population.
    pub max_peak_agents: u32,
    /// Longest life in any run.
    pub longest_life_ticks: u64,
    /// Round wins by persona name.
    pub round_wins: HashMap<String, u32>,
}

impl BatchSummary {
    /// Calculate summary from a list of run metrics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_runs(runs: &[RunMetrics]) -> Self {
        if runs.is_empty() {
            return Self::default();
        }

        let count = runs.len() as f64;
        let total_ticks: u64 = runs.iter().map(|r| r.duration_ticks).sum();
        let total_crashes: u64 = runs.iter().map(|r| u64::from(r.crashes)).sum();
        let minutes = total_ticks as f64 / f64::from(lightcycle_core::config::TICK_RATE) / 60.0;

        let mut round_wins: HashMap<String, u32> = HashMap::new();
        for results in runs.iter().filter_map(|r| r.results.as_ref()) {
            if !results.is_placeholder() {
                *round_wins.entry(results.headline.clone()).or_default() += 1;
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let total_runs = runs.len() as u32;

        Self {
            total_runs,
            avg_duration_ticks: total_ticks as f64 / count,
            crashes_per_minute: if minutes > 0.0 {
                total_crashes as f64 / minutes
            } else {
                0.0
            },
            avg_collection_rate: runs.iter().map(RunMetrics::collection_rate).sum::<f64>() / count,
            avg_top_score: runs.iter().map(|r| f64::from(r.top_score)).sum::<f64>() / count,
            max_peak_agents: runs.iter().map(|r| r.peak_agents).max().unwrap_or(0),
            longest_life_ticks: runs.iter().map(|r| r.longest_life_ticks).max().unwrap_or(0),
            round_wins,
        }
    }
}

/// Metrics collector that tracks events during a run.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: RunMetrics,
    /// Spawn tick of each living agent, by agent id.
    born: HashMap<AgentId, u64>,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    #[must_use]
    pub fn new(run_id: &str, scenario: &str, seed: u64) -> Self {
        Self {
            metrics: RunMetrics::new(run_id, scenario, seed),
            born: HashMap::new(),
        }
    }

    /// Fold one frame into the counters.
    pub fn observe(&mut self, frame: &FrameSnapshot) {
        for event in &frame.events {
            match event {
                SimEvent::Spawned { agent, name, .. } => {
                    self.metrics.spawns += 1;
                    self.metrics.persona_mut(name).lives += 1;
                    self.born.insert(*agent, frame.tick);
                }
                SimEvent::Explosion { agent, name, .. } => {
                    self.metrics.crashes += 1;
                    self.metrics.persona_mut(name).crashes += 1;
                    if let Some(born) = self.born.remove(agent) {
                        let life = frame.tick.saturating_sub(born);
                        self.metrics.longest_life_ticks = self.metrics.longest_life_ticks.max(life);
                    }
                }
                SimEvent::LootCollected { agent, value, .. } => {
                    if let Some(view) = frame.agent(*agent) {
                        let persona = self.metrics.persona_mut(&view.name);
                        persona.pickups += 1;
                        persona.loot_value += u64::from(*value);
                    }
                }
                SimEvent::Reset => self.born.clear(),
                SimEvent::PhaseChanged { from, to } => {
                    tracing::debug!(tick = frame.tick, ?from, ?to, "Phase changed");
                }
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let alive = frame.leaderboard.len() as u32;
        self.metrics.peak_agents = self.metrics.peak_agents.max(alive);
        if let Some(top) = frame.leaderboard.first() {
            self.metrics.top_score = self.metrics.top_score.max(top.score);
        }
        if frame.results.is_some() {
            self.metrics.results.clone_from(&frame.results);
        }
    }

    /// Finalize and return the metrics.
    #[must_use]
    pub fn finish(mut self, sim: &Simulation) -> RunMetrics {
        let tick = sim.get_tick();
        for born in self.born.values() {
            let life = tick.saturating_sub(*born);
            self.metrics.longest_life_ticks = self.metrics.longest_life_ticks.max(life);
        }

        let ledger = sim.ledger();
        self.metrics.duration_ticks = tick;
        self.metrics.loot_spawned = ledger.spawned;
        self.metrics.loot_collected = ledger.collected;
        self.metrics.loot_expired = ledger.expired;
        self.metrics.leader = lightcycle_core::snapshot::leaderboard(sim.agents())
            .first()
            .map(|entry| entry.name.clone());
        self.metrics.final_state_hash = sim.state_hash();
        self.metrics
    }

    /// Get current metrics (immutable).
    #[must_use]
    pub const fn current(&self) -> &RunMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightcycle_core::config::TickContext;
    use lightcycle_test_utils::fixtures;

    #[test]
    fn test_run_metrics_new() {
        let metrics = RunMetrics::new("run_001", "duel", 12345);
        assert_eq!(metrics.run_id, "run_001");
        assert_eq!(metrics.seed, 12345);
        assert!((metrics.collection_rate() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_collector_counts_busy_arena() {
        let config = fixtures::busy_config();
        let mut sim = fixtures::empty_arena(&config, 5);
        let mut collector = MetricsCollector::new("busy", "busy", 5);
        let ctx = TickContext::new(&config);
        for _ in 0..1200 {
            let frame = sim.tick(&ctx);
            collector.observe(&frame);
        }
        let metrics = collector.finish(&sim);

        assert_eq!(metrics.duration_ticks, 1200);
        assert!(metrics.spawns > 0);
        assert!(metrics.peak_agents > 0);
        assert_eq!(
            metrics.personas.values().map(|p| p.crashes).sum::<u32>(),
            metrics.crashes
        );
        assert_eq!(
            metrics.loot_collected + metrics.loot_expired + sim.loot().laying(),
            metrics.loot_spawned
        );
        assert_eq!(metrics.final_state_hash, sim.state_hash());
    }

    #[test]
    fn test_batch_summary() {
        let mut run1 = RunMetrics::new("r1", "test", 1);
        run1.duration_ticks = 3600;
        run1.crashes = 6;
        run1.top_score = 100;

        let mut run2 = RunMetrics::new("r2", "test", 2);
        run2.duration_ticks = 3600;
        run2.crashes = 2;
        run2.top_score = 300;
        run2.peak_agents = 7;

        let summary = BatchSummary::from_runs(&[run1, run2]);

        assert_eq!(summary.total_runs, 2);
        assert!((summary.avg_duration_ticks - 3600.0).abs() < 0.001);
        assert!((summary.crashes_per_minute - 4.0).abs() < 0.001);
        assert!((summary.avg_top_score - 200.0).abs() < 0.001);
        assert_eq!(summary.max_peak_agents, 7);
    }

    #[test]
    fn test_empty_batch_summary() {
        let summary = BatchSummary::from_runs(&[]);
        assert_eq!(summary.total_runs, 0);
    }
}
