//! JSON protocol for headless arena sessions.
//!
//! The runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** commands from the controller
//! **Output (stdout):** frame snapshots and responses
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0","tick":0}`
//! 2. Controller sends commands as JSON lines
//! 3. Runner outputs state after each `tick` command (or every tick with
//!    auto-state) and on `query`
//! 4. When a round finishes, outputs `{"type":"round_over",...}` once
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"config","config":{"enable_user":true}}
//! <- {"type":"ack","cmd":"config"}
//! -> {"cmd":"tick","count":60}
//! <- {"type":"state","hash":1234,"frame":{"tick":60,...}}
//! -> {"cmd":"steer","dir":"Left"}
//! <- {"type":"ack","cmd":"steer"}
//! -> {"cmd":"hash"}
//! <- {"type":"state_hash","tick":60,"hash":1234}
//! ```

use lightcycle_core::config::EffectConfig;
use lightcycle_core::math::Direction;
use lightcycle_core::round::RoundResults;
use lightcycle_core::snapshot::FrameSnapshot;
use serde::{Deserialize, Serialize};

/// Protocol version reported in `ready`.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (controller -> runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance the arena by N ticks (default: 1).
    Tick {
        /// Ticks to run.
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Current frame without advancing time.
    Query,

    /// Current state hash.
    Hash,

    /// Buffer a heading for the user agent.
    Steer {
        /// New heading.
        dir: Direction,
    },

    /// Respawn the user agent.
    Restart,

    /// Rebuild the grid for a new canvas.
    Resize {
        /// Canvas width in pixels.
        width: u32,
        /// Canvas height in pixels.
        height: u32,
    },

    /// Replace the effect configuration. Omitted fields take defaults.
    Config {
        /// New configuration.
        config: EffectConfig,
    },

    /// Set the playback position of the music track.
    Playback {
        /// Position in seconds.
        current_time: f64,
        /// Track length in seconds.
        duration: f64,
        /// Whether the position advances with ticks.
        #[serde(default = "default_playing")]
        is_playing: bool,
    },

    /// Clear the arena.
    Reset,

    /// Replace the session with a scenario.
    LoadScenario {
        /// Built-in name or RON path.
        path: String,
    },

    /// Quit the session.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

fn default_playing() -> bool {
    true
}

// ============================================================================
// Output Responses (runner -> controller)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        /// Protocol version.
        version: String,
        /// Current tick.
        tick: u64,
    },

    /// Acknowledgment of a command.
    Ack {
        /// Command name.
        cmd: String,
    },

    /// Error processing a command.
    Error {
        /// What went wrong.
        message: String,
        /// Command name, if the line parsed.
        cmd: Option<String>,
    },

    /// A frame snapshot.
    State {
        /// State hash after the frame.
        hash: u64,
        /// The frame.
        frame: Box<FrameSnapshot>,
    },

    /// State hash for determinism checks.
    StateHash {
        /// Current tick.
        tick: u64,
        /// Hash.
        hash: u64,
    },

    /// A round just finished.
    RoundOver {
        /// Tick the round froze on.
        tick: u64,
        /// Final ranking.
        results: RoundResults,
    },

    /// A recording was written.
    ReplaySaved {
        /// File path.
        path: String,
        /// Ticks recorded.
        ticks: u64,
    },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    #[must_use]
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
        }
    }

    /// Create an acknowledgment.
    #[must_use]
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Create a state response.
    #[must_use]
    pub fn state(hash: u64, frame: FrameSnapshot) -> Self {
        Self::State {
            hash,
            frame: Box::new(frame),
        }
    }

    /// Serialize to JSON line (with newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    ///
    /// # Errors
    ///
    /// Returns the JSON error for malformed or unknown commands.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Command name for acknowledgments.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::Hash => "hash",
            Self::Steer { .. } => "steer",
            Self::Restart => "restart",
            Self::Resize { .. } => "resize",
            Self::Config { .. } => "config",
            Self::Playback { .. } => "playback",
            Self::Reset => "reset",
            Self::LoadScenario { .. } => "load_scenario",
            Self::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tick_command() {
        let cmd = Command::from_json(r#"{"cmd":"tick","count":60}"#).unwrap();
        assert!(matches!(cmd, Command::Tick { count: 60 }));
    }

    #[test]
    fn test_default_tick_count() {
        let cmd = Command::from_json(r#"{"cmd":"tick"}"#).unwrap();
        assert!(matches!(cmd, Command::Tick { count: 1 }));
    }

    #[test]
    fn test_parse_steer() {
        let cmd = Command::from_json(r#"{"cmd":"steer","dir":"Left"}"#).unwrap();
        assert!(matches!(cmd, Command::Steer { dir: Direction::Left }));
        assert_eq!(cmd.name(), "steer");
    }

    #[test]
    fn test_partial_config() {
        let cmd = Command::from_json(r#"{"cmd":"config","config":{"enable_user":true}}"#).unwrap();
        let Command::Config { config } = cmd else {
            panic!("expected config");
        };
        assert!(config.enable_user);
        assert_eq!(config.max_agents, EffectConfig::default().max_agents);
    }

    #[test]
    fn test_unknown_command_fails() {
        assert!(Command::from_json(r#"{"cmd":"teleport"}"#).is_err());
    }

    #[test]
    fn test_response_lines() {
        let line = Response::ready(0).to_json_line();
        assert!(line.ends_with('\n'));
        assert!(line.contains(r#""type":"ready""#));

        let line = Response::error("bad", Some("tick")).to_json_line();
        assert!(line.contains(r#""cmd":"tick""#));
    }
}
