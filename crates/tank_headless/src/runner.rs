//! Protocol loop driving one arena from a line-based controller.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use tank_core::level::next_level_id;
use tank_core::prelude::{Action, Arena, ArenaConfig, GameError, LevelLibrary};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::protocol::{Command, Response};

/// Errors that end a runner session or a CLI command.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The arena rejected an operation.
    #[error(transparent)]
    Game(#[from] GameError),

    /// A response or report could not be encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An agent strategy could not be built.
    #[error(transparent)]
    Strategy(#[from] crate::strategies::StrategyError),
}

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Arena configuration.
    pub arena: ArenaConfig,
    /// RNG seed.
    pub seed: u64,
    /// Level loaded before the ready line.
    pub level: u32,
    /// Extra directory searched for level layouts.
    pub level_dir: Option<PathBuf>,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::rl(),
            seed: 0,
            level: 1,
            level_dir: None,
        }
    }
}

impl HeadlessConfig {
    /// Level library including the configured directory.
    pub fn library(&self) -> LevelLibrary {
        let library = LevelLibrary::builtin();
        match &self.level_dir {
            Some(dir) => library.with_directory(dir),
            None => library,
        }
    }
}

/// Session statistics returned when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Commands executed (including failed ones).
    pub commands: u64,
    /// Lines that failed to parse or execute.
    pub errors: u64,
    /// Steps taken across all stages.
    pub steps: u64,
}

/// Headless runner for externally controlled play.
#[derive(Debug)]
pub struct HeadlessRunner {
    arena: Arena,
    level: u32,
    stats: SessionStats,
}

impl HeadlessRunner {
    /// Create the arena and reset the starting level.
    ///
    /// # Errors
    ///
    /// Fails if the config is invalid or the starting level cannot be loaded.
    pub fn new(config: &HeadlessConfig) -> Result<Self, RunnerError> {
        config.arena.validate()?;
        let mut arena = Arena::new(config.arena.clone(), config.seed).with_levels(config.library());
        arena.reset(config.level)?;
        Ok(Self {
            arena,
            level: config.level,
            stats: SessionStats::default(),
        })
    }

    /// The arena being driven.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Statistics so far.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Execute one command and produce its response.
    pub fn handle(&mut self, cmd: &Command) -> Response {
        self.stats.commands += 1;
        let response = match cmd {
            Command::Reset { level } => match self.arena.reset(*level) {
                Ok(observation) => {
                    self.level = *level;
                    Response::Observation {
                        tick: self.arena.tick_count(),
                        observation,
                    }
                }
                Err(e) => Response::error(e.to_string(), Some(cmd.name())),
            },
            Command::Step { action } => match self.arena.step_index(*action) {
                Ok(result) => {
                    self.stats.steps += 1;
                    Response::step(self.arena.tick_count(), result)
                }
                Err(e) => Response::error(e.to_string(), Some(cmd.name())),
            },
            Command::StepPlayers { actions } => {
                let decoded: Result<Vec<Action>, GameError> =
                    actions.iter().map(|index| Action::from_index(*index)).collect();
                match decoded {
                    Ok(actions) => {
                        let result = self.arena.step_players(&actions);
                        self.stats.steps += 1;
                        Response::step(self.arena.tick_count(), result)
                    }
                    Err(e) => Response::error(e.to_string(), Some(cmd.name())),
                }
            }
            Command::NextStage => {
                let next = next_level_id(self.level);
                match self.arena.reset(next) {
                    Ok(observation) => {
                        info!(from = self.level, to = next, "Advancing to next stage");
                        self.level = next;
                        Response::Observation {
                            tick: self.arena.tick_count(),
                            observation,
                        }
                    }
                    Err(e) => Response::error(e.to_string(), Some(cmd.name())),
                }
            }
            Command::Query => Response::Observation {
                tick: self.arena.tick_count(),
                observation: self.arena.observe(),
            },
            Command::Hash => Response::StateHash {
                tick: self.arena.tick_count(),
                hash: self.arena.state_hash(),
            },
            Command::Quit => Response::Bye,
        };
        if matches!(response, Response::Error { .. }) {
            self.stats.errors += 1;
        }
        response
    }

    /// Run the protocol loop until `quit` or end of input.
    ///
    /// Unparsable lines get an error response and the loop continues.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        input: R,
        mut output: W,
    ) -> Result<SessionStats, RunnerError> {
        write_line(&mut output, &Response::ready(self.level, self.arena.tick_count()))?;
        info!(level = self.level, "Runner ready");

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = match Command::from_json(line) {
                Ok(cmd) => {
                    debug!(cmd = cmd.name(), "Command received");
                    self.handle(&cmd)
                }
                Err(e) => {
                    warn!(error = %e, "Unparsable command line");
                    self.stats.commands += 1;
                    self.stats.errors += 1;
                    Response::error(format!("Parse error: {e}"), None)
                }
            };
            let quit = matches!(response, Response::Bye);
            write_line(&mut output, &response)?;
            if quit {
                info!(steps = self.stats.steps, "Session ended by controller");
                return Ok(self.stats);
            }
        }

        write_line(&mut output, &Response::Bye)?;
        info!(steps = self.stats.steps, "Input closed, session ended");
        Ok(self.stats)
    }
}

fn write_line<W: Write>(output: &mut W, response: &Response) -> io::Result<()> {
    output.write_all(response.to_json_line().as_bytes())?;
    output.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> HeadlessRunner {
        HeadlessRunner::new(&HeadlessConfig::default()).unwrap()
    }

    fn session(input: &str) -> (SessionStats, Vec<serde_json::Value>) {
        let mut runner = runner();
        let mut out = Vec::new();
        let stats = runner.run(input.as_bytes(), &mut out).unwrap();
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        (stats, lines)
    }

    #[test]
    fn test_step_advances_ticks() {
        let mut runner = runner();
        let response = runner.handle(&Command::Step { action: 5 });
        assert!(matches!(response, Response::Step { tick: 10, done: false, .. }));
        assert_eq!(runner.stats().steps, 1);
    }

    #[test]
    fn test_invalid_action_is_error() {
        let mut runner = runner();
        let hash = runner.arena().state_hash();
        let response = runner.handle(&Command::Step { action: 7 });
        assert!(matches!(response, Response::Error { cmd: Some(ref c), .. } if c == "step"));
        assert_eq!(runner.arena().state_hash(), hash);
    }

    #[test]
    fn test_step_players_rejects_any_bad_index() {
        let mut runner = runner();
        let response = runner.handle(&Command::StepPlayers {
            actions: vec![0, 9],
        });
        assert!(matches!(response, Response::Error { .. }));
        assert_eq!(runner.arena().tick_count(), 0);
    }

    #[test]
    fn test_reset_missing_level() {
        let mut runner = runner();
        let response = runner.handle(&Command::Reset { level: 404 });
        assert!(matches!(response, Response::Error { .. }));
    }

    #[test]
    fn test_next_stage_follows_level_order() {
        let mut runner = runner();
        let response = runner.handle(&Command::NextStage);
        assert!(matches!(response, Response::Observation { .. }));
        assert_eq!(runner.arena().level().id(), 2);

        // stage 3 has no builtin layout
        let response = runner.handle(&Command::NextStage);
        assert!(matches!(response, Response::Error { cmd: Some(ref c), .. } if c == "next_stage"));
        assert_eq!(runner.arena().level().id(), 2);
    }

    #[test]
    fn test_session_transcript() {
        let input = "{\"cmd\":\"step\",\"action\":1}\n\
                     garbage\n\
                     \n\
                     {\"cmd\":\"hash\"}\n\
                     {\"cmd\":\"quit\"}\n\
                     {\"cmd\":\"query\"}\n";
        let (stats, lines) = session(input);

        let types: Vec<&str> = lines.iter().map(|v| v["type"].as_str().unwrap()).collect();
        assert_eq!(types, ["ready", "step", "error", "state_hash", "bye"]);
        assert_eq!(stats.commands, 4);
        assert_eq!(stats.errors, 1);
        assert_eq!(lines[3]["tick"], 10);
    }

    #[test]
    fn test_end_of_input_says_bye() {
        let (_, lines) = session("{\"cmd\":\"query\"}\n");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1]["type"], "observation");
        assert_eq!(lines[1]["observation"]["kind"], "features");
        assert_eq!(lines[2]["type"], "bye");
    }
}
