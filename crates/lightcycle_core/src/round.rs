//! Match controller: free-for-all and timed rounds.
//!
//! The round phase is a pure function of the host's playback position, so
//! it can be recomputed after any pause. [`Roster`] mints personas and
//! holds the ones waiting for a free gate.

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::agent::{Persona, PersonaId, AGENT_NAMES};
use crate::config::PlaybackContext;

/// Seconds left at which sudden death begins.
pub const SUDDEN_DEATH_AT: f64 = 40.0;

/// Seconds left at which the round is over.
pub const FINISH_AT: f64 = 10.0;

/// Free-for-all spawn probability per tick at `spawn_rate = 1.0`.
pub const SPAWN_CHANCE: f32 = 0.05;

/// Share of free-for-all spawns that are dummies when enabled.
pub const DUMMY_SHARE: f32 = 0.25;

/// Headline shown when a round ends with nobody on the board.
pub const NO_SURVIVORS: &str = "NO SURVIVORS";

/// Hue of the user persona.
pub const USER_HUE: u16 = 190;

/// Phase of a timed round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoundPhase {
    /// Normal play; dead agents reincarnate.
    Active,
    /// Deaths are final.
    SuddenDeath,
    /// Simulation frozen; results on screen.
    Finished,
}

/// Phase for `time_left` seconds remaining of a track `duration` long.
///
/// A non-positive duration (unknown length) is always [`RoundPhase::Active`].
#[must_use]
pub fn phase_at(time_left: f64, duration: f64) -> RoundPhase {
    if !(duration > 0.0) {
        return RoundPhase::Active;
    }
    if time_left < FINISH_AT {
        RoundPhase::Finished
    } else if time_left < SUDDEN_DEATH_AT {
        RoundPhase::SuddenDeath
    } else {
        RoundPhase::Active
    }
}

/// Phase for the current playback position.
#[must_use]
pub fn phase_for(playback: &PlaybackContext) -> RoundPhase {
    phase_at(playback.time_left(), playback.duration)
}

/// One line of the final ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    /// 1-based rank.
    pub rank: u32,
    /// Persona id.
    pub persona: PersonaId,
    /// Display name.
    pub name: String,
    /// Final score.
    pub score: u32,
    /// Crashes during the round.
    pub deaths: u32,
}

/// Ranked outcome of a finished round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResults {
    /// Winner's name, or [`NO_SURVIVORS`].
    pub headline: String,
    /// Ranked by score, then fewer deaths, then persona id.
    pub standings: Vec<Standing>,
}

impl RoundResults {
    /// Rank a set of personas.
    #[must_use]
    pub fn rank<'a>(personas: impl IntoIterator<Item = &'a Persona>) -> Self {
        let mut sorted: Vec<&Persona> = personas.into_iter().collect();
        sorted.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.deaths.cmp(&b.deaths))
                .then(a.id.cmp(&b.id))
        });

        let standings: Vec<Standing> = sorted
            .iter()
            .zip(1..)
            .map(|(p, rank)| Standing {
                rank,
                persona: p.id,
                name: p.name.clone(),
                score: p.score,
                deaths: p.deaths,
            })
            .collect();

        let headline = standings
            .first()
            .map_or_else(|| NO_SURVIVORS.to_string(), |s| s.name.clone());

        Self {
            headline,
            standings,
        }
    }

    /// Whether nobody took part.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.standings.is_empty()
    }
}

/// Persona factory plus the queue of personas waiting to spawn.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Roster {
    next_id: PersonaId,
    waiting: VecDeque<Persona>,
}

impl Roster {
    /// Empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh AI or dummy persona with a random hue.
    pub fn mint<R: Rng + ?Sized>(&mut self, dummy: bool, rng: &mut R) -> Persona {
        let id = self.next_id;
        self.next_id += 1;
        let name = if dummy {
            format!("DUMMY-{id}")
        } else {
            let base = AGENT_NAMES[id as usize % AGENT_NAMES.len()];
            match id as usize / AGENT_NAMES.len() {
                0 => base.to_string(),
                lap => format!("{base}-{}", lap + 1),
            }
        };
        Persona::new(id, name, rng.gen_range(0..360))
    }

    /// Mint the user persona.
    pub fn mint_user(&mut self) -> Persona {
        let id = self.next_id;
        self.next_id += 1;
        Persona::new(id, "YOU", USER_HUE)
    }

    /// Queue `count` fresh personas for a new round.
    pub fn seed<R: Rng + ?Sized>(&mut self, count: u32, rng: &mut R) {
        for _ in 0..count {
            let persona = self.mint(false, rng);
            self.waiting.push_back(persona);
        }
    }

    /// Put a persona at the back of the queue.
    pub fn enqueue(&mut self, persona: Persona) {
        self.waiting.push_back(persona);
    }

    /// Put a persona back at the front (spawn abandoned).
    pub fn requeue_front(&mut self, persona: Persona) {
        self.waiting.push_front(persona);
    }

    /// Next persona waiting for a gate.
    pub fn pop_waiting(&mut self) -> Option<Persona> {
        self.waiting.pop_front()
    }

    /// Personas waiting for a gate.
    pub fn waiting(&self) -> impl Iterator<Item = &Persona> {
        self.waiting.iter()
    }

    /// Number of waiting personas.
    #[must_use]
    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    /// Forget all waiting personas; ids keep counting up.
    pub fn clear(&mut self) {
        self.waiting.clear();
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_phase_thresholds() {
        assert_eq!(phase_at(40.0, 600.0), RoundPhase::Active);
        assert_eq!(phase_at(35.0, 600.0), RoundPhase::SuddenDeath);
        assert_eq!(phase_at(10.0, 600.0), RoundPhase::SuddenDeath);
        assert_eq!(phase_at(9.0, 600.0), RoundPhase::Finished);
        assert_eq!(phase_at(5.0, 0.0), RoundPhase::Active);
    }

    #[test]
    fn test_phase_for_playback() {
        let at = |t: f64| {
            phase_for(&PlaybackContext {
                current_time: t,
                duration: 600.0,
                ..Default::default()
            })
        };
        assert_eq!(at(560.0), RoundPhase::Active);
        assert_eq!(at(565.0), RoundPhase::SuddenDeath);
        assert_eq!(at(591.0), RoundPhase::Finished);
    }

    #[test]
    fn test_rank_orders_by_score_then_deaths() {
        let mut a = Persona::new(0, "A", 0);
        let mut b = Persona::new(1, "B", 0);
        let mut c = Persona::new(2, "C", 0);
        a.score = 100;
        a.deaths = 3;
        b.score = 100;
        b.deaths = 1;
        c.score = 400;

        let results = RoundResults::rank([&a, &b, &c]);
        let names: Vec<_> = results.standings.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["C", "B", "A"]);
        assert_eq!(results.headline, "C");
        assert_eq!(results.standings[2].rank, 3);
    }

    #[test]
    fn test_empty_round_has_placeholder() {
        let results = RoundResults::rank(std::iter::empty());
        assert!(results.is_placeholder());
        assert_eq!(results.headline, NO_SURVIVORS);
    }

    #[test]
    fn test_roster_names_and_queue() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut roster = Roster::new();
        roster.seed(3, &mut rng);
        assert_eq!(roster.waiting_len(), 3);

        let first = roster.pop_waiting().unwrap();
        assert_eq!(first.name, AGENT_NAMES[0]);
        roster.requeue_front(first.clone());
        assert_eq!(roster.pop_waiting().unwrap(), first);

        let dummy = roster.mint(true, &mut rng);
        assert!(dummy.name.starts_with("DUMMY-"));
        assert_eq!(roster.mint_user().name, "YOU");
    }
}
