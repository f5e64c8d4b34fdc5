//! Headless session runner.
//!
//! [`HeadlessRunner`] owns one arena and answers protocol commands. The
//! blocking [`HeadlessRunner::run`] loop reads JSON lines from any
//! `BufRead` and writes responses to any `Write`, so tests drive it with
//! in-memory buffers and the binary with stdin/stdout.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use lightcycle_core::config::{EffectConfig, PlaybackContext, TickContext, TICK_RATE};
use lightcycle_core::replay::Replay;
use lightcycle_core::round::RoundPhase;
use lightcycle_core::simulation::{Simulation, UserInput};
use lightcycle_core::snapshot::FrameSnapshot;

use crate::protocol::{Command, Response};
use crate::scenario::{Scenario, ScenarioError};

/// Headless runner configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Output state after every tick (vs once per `tick` command).
    pub auto_state_output: bool,
    /// Scenario to load on startup; the open arena if `None`.
    pub scenario: Option<String>,
    /// Record a replay and write it here on quit.
    pub record_path: Option<PathBuf>,
}

struct Recording {
    path: PathBuf,
    replay: Replay,
}

/// One interactive arena session.
pub struct HeadlessRunner {
    settings: HeadlessConfig,
    scenario: Scenario,
    sim: Simulation,
    config: EffectConfig,
    playback: PlaybackContext,
    pending: Vec<UserInput>,
    recording: Option<Recording>,
    last_phase: Option<RoundPhase>,
    finished: bool,
}

impl HeadlessRunner {
    /// Create a runner for the configured scenario.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario cannot be loaded or built, or if the
    /// replay recording cannot be started.
    pub fn new(settings: HeadlessConfig) -> Result<Self, ScenarioError> {
        let scenario = match &settings.scenario {
            Some(name) => Scenario::resolve(name)?,
            None => Scenario::open_arena(),
        };
        let sim = scenario.build()?;
        let recording = match &settings.record_path {
            Some(path) => Some(Recording {
                path: path.clone(),
                replay: Replay::new(scenario.name.clone(), &sim, &scenario.config)?,
            }),
            None => None,
        };

        tracing::info!(scenario = %scenario.name, seed = scenario.seed, "Session ready");
        Ok(Self {
            config: scenario.config.clone(),
            playback: scenario.playback_at(0),
            settings,
            scenario,
            sim,
            pending: Vec::new(),
            recording,
            last_phase: None,
            finished: false,
        })
    }

    /// Current arena.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Whether `quit` has been handled.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Read commands until `quit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input or writing output fails.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        output.write_all(Response::ready(self.sim.get_tick()).to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let responses = match Command::from_json(line) {
                Ok(cmd) => self.handle(cmd),
                Err(e) => vec![Response::error(format!("Parse error: {e}"), None)],
            };
            for response in responses {
                output.write_all(response.to_json_line().as_bytes())?;
            }
            output.flush()?;

            if self.finished {
                return Ok(());
            }
        }

        // Input closed without quit; still flush a recording.
        for response in self.finish() {
            output.write_all(response.to_json_line().as_bytes())?;
        }
        output.flush()
    }

    /// Apply one command and return the responses to send.
    pub fn handle(&mut self, cmd: Command) -> Vec<Response> {
        let name = cmd.name();
        match cmd {
            Command::Tick { count } => self.run_ticks(count),
            Command::Query => {
                let ctx = TickContext::new(&self.config).with_playback(self.playback);
                let frame = self.sim.frame(&ctx);
                vec![Response::state(self.sim.state_hash(), frame)]
            }
            Command::Hash => vec![Response::StateHash {
                tick: self.sim.get_tick(),
                hash: self.sim.state_hash(),
            }],
            Command::Steer { dir } => {
                self.pending.push(UserInput::Steer(dir));
                vec![Response::ack(name)]
            }
            Command::Restart => {
                self.pending.push(UserInput::Restart);
                vec![Response::ack(name)]
            }
            Command::Resize { width, height } => {
                if self.recording.is_some() {
                    return vec![Response::error("Cannot resize while recording", Some(name))];
                }
                match self.sim.resize(width, height) {
                    Ok(()) => vec![Response::ack(name)],
                    Err(e) => vec![Response::error(e.to_string(), Some(name))],
                }
            }
            Command::Config { config } => {
                if self.recording.is_some() {
                    return vec![Response::error(
                        "Cannot change configuration while recording",
                        Some(name),
                    )];
                }
                match config.validate() {
                    Ok(()) => {
                        self.config = config;
                        vec![Response::ack(name)]
                    }
                    Err(e) => vec![Response::error(e.to_string(), Some(name))],
                }
            }
            Command::Playback {
                current_time,
                duration,
                is_playing,
            } => {
                self.playback = PlaybackContext {
                    is_playing,
                    current_time,
                    duration,
                    ..self.playback
                };
                vec![Response::ack(name)]
            }
            Command::Reset => {
                if self.recording.is_some() {
                    return vec![Response::error("Cannot reset while recording", Some(name))];
                }
                self.sim.clear();
                self.last_phase = None;
                vec![Response::ack(name)]
            }
            Command::LoadScenario { path } => self.load_scenario(&path),
            Command::Quit => {
                let mut responses = self.finish();
                responses.push(Response::Bye);
                responses
            }
        }
    }

    fn run_ticks(&mut self, count: u32) -> Vec<Response> {
        let mut responses = Vec::new();
        let mut last = None;
        for _ in 0..count {
            let frame = self.step();

            if frame.phase == Some(RoundPhase::Finished) && self.last_phase != frame.phase {
                if let Some(results) = &frame.results {
                    tracing::info!(tick = frame.tick, winner = %results.headline, "Round over");
                    responses.push(Response::RoundOver {
                        tick: frame.tick,
                        results: results.clone(),
                    });
                }
            }
            self.last_phase = frame.phase;

            if self.settings.auto_state_output {
                responses.push(Response::state(self.sim.state_hash(), frame.clone()));
            }
            last = Some(frame);
        }

        if !self.settings.auto_state_output {
            if let Some(frame) = last {
                responses.push(Response::state(self.sim.state_hash(), frame));
            }
        }
        responses
    }

    fn step(&mut self) -> FrameSnapshot {
        let inputs = std::mem::take(&mut self.pending);
        for &input in &inputs {
            self.sim.apply_input(input);
        }

        let ctx = TickContext::new(&self.config).with_playback(self.playback);
        let frame = self.sim.tick(&ctx);

        if let Some(recording) = &mut self.recording {
            recording.replay.record_frame(self.playback, inputs);
        }
        if self.playback.is_playing {
            self.playback.current_time += 1.0 / f64::from(TICK_RATE);
        }
        frame
    }

    fn load_scenario(&mut self, path: &str) -> Vec<Response> {
        if self.recording.is_some() {
            return vec![Response::error(
                "Cannot switch scenario while recording",
                Some("load_scenario"),
            )];
        }
        let loaded = Scenario::resolve(path).and_then(|s| s.build().map(|sim| (s, sim)));
        match loaded {
            Ok((scenario, sim)) => {
                tracing::info!(scenario = %scenario.name, "Loaded scenario");
                self.config = scenario.config.clone();
                self.playback = scenario.playback_at(0);
                self.scenario = scenario;
                self.sim = sim;
                self.pending.clear();
                self.last_phase = None;
                vec![Response::ack("load_scenario")]
            }
            Err(e) => vec![Response::error(
                format!("Failed to load scenario: {e}"),
                Some("load_scenario"),
            )],
        }
    }

    /// Write the recording, if any. Safe to call more than once.
    fn finish(&mut self) -> Vec<Response> {
        self.finished = true;
        let Some(mut recording) = self.recording.take() else {
            return Vec::new();
        };
        recording.replay.finalize(self.sim.state_hash());
        let ticks = recording.replay.duration();
        match recording.replay.save(&recording.path) {
            Ok(()) => {
                tracing::info!(path = %recording.path.display(), ticks, "Replay saved");
                vec![Response::ReplaySaved {
                    path: recording.path.display().to_string(),
                    ticks,
                }]
            }
            Err(e) => vec![Response::error(format!("Failed to save replay: {e}"), Some("quit"))],
        }
    }

    /// Name of the loaded scenario.
    #[must_use]
    pub fn scenario_name(&self) -> &str {
        &self.scenario.name
    }
}
