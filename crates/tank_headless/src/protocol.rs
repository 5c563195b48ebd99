//! JSON-lines protocol between an external controller and the runner.
//!
//! **Input (stdin):** one command object per line
//! **Output (stdout):** one response object per line
//!
//! # Protocol Flow
//!
//! 1. Runner resets its starting level and outputs `{"type":"ready",...}`
//! 2. The controller sends `reset`, `step`, `step_players`, `next_stage`,
//!    `query` or `hash`
//! 3. Every command gets exactly one response
//! 4. `quit` (or end of input) ends the session with `{"type":"bye"}`
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","level":1,"tick":0}
//! -> {"cmd":"step","action":1}
//! <- {"type":"step","tick":10,"observation":{"kind":"features","data":[...]},"reward":-1.0,"done":false,"truncated":false}
//! -> {"cmd":"hash"}
//! <- {"type":"state_hash","tick":10,"hash":1234567890}
//! -> {"cmd":"reset","level":2}
//! <- {"type":"observation","tick":0,"observation":{...}}
//! -> {"cmd":"quit"}
//! <- {"type":"bye"}
//! ```

use serde::{Deserialize, Serialize};
use tank_core::observation::Observation;
use tank_core::simulation::StepResult;

/// Protocol revision announced in the ready line.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (controller -> runner)
// ============================================================================

/// Commands accepted by the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Load a level and start a fresh stage.
    Reset {
        /// Level id (default: 1).
        #[serde(default = "default_level")]
        level: u32,
    },

    /// Advance one step with player one's action index (0-5).
    Step {
        /// Action index.
        action: u8,
    },

    /// Advance one step with one action index per player.
    StepPlayers {
        /// Action indices in player-slot order.
        actions: Vec<u8>,
    },

    /// Load the stage after the current one, keeping lives and score.
    NextStage,

    /// Current observation without advancing.
    Query,

    /// Current state hash.
    Hash,

    /// End the session.
    Quit,
}

fn default_level() -> u32 {
    1
}

// ============================================================================
// Output Responses (runner -> controller)
// ============================================================================

/// Responses written by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        /// Protocol revision.
        version: String,
        /// Level loaded at startup.
        level: u32,
        /// Sub-tick counter.
        tick: u64,
    },

    /// Observation after `reset` or `query`.
    Observation {
        /// Sub-tick counter.
        tick: u64,
        /// Encoded observation.
        observation: Observation,
    },

    /// Result of `step` or `step_players`.
    Step {
        /// Sub-tick counter after the step.
        tick: u64,
        /// Encoded observation.
        observation: Observation,
        /// Reward earned during the step.
        reward: f32,
        /// Game over.
        done: bool,
        /// Stage cleared.
        truncated: bool,
    },

    /// State hash for determinism checks.
    StateHash {
        /// Sub-tick counter.
        tick: u64,
        /// Hash of the complete arena state.
        hash: u64,
    },

    /// A command could not be parsed or executed.
    Error {
        /// Human-readable reason.
        message: String,
        /// Name of the failing command, if it parsed.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        cmd: Option<String>,
    },

    /// Session ended.
    Bye,
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    pub fn ready(level: u32, tick: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            level,
            tick,
        }
    }

    /// Wrap a step result.
    pub fn step(tick: u64, result: StepResult) -> Self {
        Self::Step {
            tick,
            observation: result.observation,
            reward: result.reward,
            done: result.done,
            truncated: result.truncated,
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to a JSON line (with newline).
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
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Command name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reset { .. } => "reset",
            Self::Step { .. } => "step",
            Self::StepPlayers { .. } => "step_players",
            Self::NextStage => "next_stage",
            Self::Query => "query",
            Self::Hash => "hash",
            Self::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_step_command() {
        let cmd = Command::from_json(r#"{"cmd":"step","action":3}"#).unwrap();
        assert_eq!(cmd, Command::Step { action: 3 });
        assert_eq!(cmd.name(), "step");
    }

    #[test]
    fn test_default_reset_level() {
        let cmd = Command::from_json(r#"{"cmd":"reset"}"#).unwrap();
        assert_eq!(cmd, Command::Reset { level: 1 });
    }

    #[test]
    fn test_parse_step_players() {
        let cmd = Command::from_json(r#"{"cmd":"step_players","actions":[0,5]}"#).unwrap();
        assert_eq!(
            cmd,
            Command::StepPlayers {
                actions: vec![0, 5]
            }
        );
    }

    #[test]
    fn test_parse_next_stage() {
        let cmd = Command::from_json(r#"{"cmd":"next_stage"}"#).unwrap();
        assert_eq!(cmd, Command::NextStage);
        assert_eq!(cmd.name(), "next_stage");
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Command::from_json(r#"{"cmd":"teleport"}"#).is_err());
        assert!(Command::from_json("not json").is_err());
    }

    #[test]
    fn test_serialize_hash_response() {
        let json = Response::StateHash { tick: 10, hash: 42 }.to_json_line();
        assert_eq!(json, "{\"type\":\"state_hash\",\"tick\":10,\"hash\":42}\n");
    }

    #[test]
    fn test_error_without_cmd_omits_field() {
        let json = Response::error("bad line", None).to_json_line();
        assert!(json.contains(r#""type":"error""#));
        assert!(!json.contains("cmd"));
    }

    #[test]
    fn test_ready_announces_version() {
        let json = Response::ready(1, 0).to_json_line();
        assert!(json.contains(r#""version":"1.0""#));
        assert!(json.ends_with('\n'));
    }
}
