//! Built-in agents for unattended episodes.
//!
//! Agents see the arena read-only and pick player one's next action. All of
//! them are deterministic given their seed, so batch runs are reproducible.

use std::path::Path;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tank_core::components::{Action, Direction};
use tank_core::simulation::Arena;
use tank_core::tank::Tank;

/// Error type for strategy operations.
#[derive(Error, Debug)]
pub enum StrategyError {
    /// Unknown strategy name.
    #[error("Unknown strategy: {0} (expected random, hunter or a script path)")]
    Unknown(String),
    /// Script file not found.
    #[error("Script file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read script file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse script: {0}")]
    ParseError(#[from] ron::error::SpannedError),
}

/// Picks an action every step.
pub trait Agent: Send {
    /// Short name for logs and reports.
    fn name(&self) -> &str;

    /// Action for player one in the current state.
    fn act(&mut self, arena: &Arena) -> Action;
}

/// Uniformly random actions from a seeded PCG.
#[derive(Debug, Clone)]
pub struct RandomAgent {
    rng: Pcg32,
}

impl RandomAgent {
    /// Create with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }
}

impl Agent for RandomAgent {
    fn name(&self) -> &str {
        "random"
    }

    fn act(&mut self, _arena: &Arena) -> Action {
        let index = self.rng.random_range(0..Action::COUNT as u8);
        Action::from_index(index).unwrap_or_default()
    }
}

/// A fixed action list played in a loop.
///
/// Script files are RON lists of action names:
///
/// ```text
/// [MoveUp, MoveUp, Fire, MoveLeft, Fire]
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedAgent {
    actions: Vec<Action>,
    cursor: usize,
}

impl ScriptedAgent {
    /// Create from an action list. An empty list idles forever.
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions, cursor: 0 }
    }

    /// Load a script from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StrategyError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StrategyError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, StrategyError> {
        let actions: Vec<Action> = ron::from_str(ron)?;
        Ok(Self::new(actions))
    }

    /// Length of one loop.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True for the idle script.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    fn act(&mut self, _arena: &Arena) -> Action {
        if self.actions.is_empty() {
            return Action::Idle;
        }
        let action = self.actions[self.cursor % self.actions.len()];
        self.cursor += 1;
        action
    }
}

/// Lines up with the nearest enemy and shoots.
///
/// When no enemy is on the map it guards by shooting upward. Turning is
/// done by pressing a move key, which rotates the tank even if the move
/// itself is blocked.
#[derive(Debug, Clone, Copy, Default)]
pub struct HunterAgent;

/// Centres within this many pixels count as lined up.
const ALIGN_TOLERANCE: i32 = 6;

impl HunterAgent {
    fn target(arena: &Arena, player: &Tank) -> Option<(i32, i32)> {
        let origin = player.rect.center();
        arena
            .enemies()
            .iter()
            .filter(|enemy| enemy.is_alive())
            .map(|enemy| {
                let center = enemy.rect.center();
                (center.x - origin.x, center.y - origin.y)
            })
            .min_by_key(|(dx, dy)| dx * dx + dy * dy)
    }

    fn press(direction: Direction) -> Action {
        match direction {
            Direction::Up => Action::MoveUp,
            Direction::Right => Action::MoveRight,
            Direction::Down => Action::MoveDown,
            Direction::Left => Action::MoveLeft,
        }
    }
}

impl Agent for HunterAgent {
    fn name(&self) -> &str {
        "hunter"
    }

    fn act(&mut self, arena: &Arena) -> Action {
        let Some(player) = arena.players().first().filter(|p| p.is_alive()) else {
            return Action::Idle;
        };
        let Some((dx, dy)) = Self::target(arena, player) else {
            return if player.direction == Direction::Up {
                Action::Fire
            } else {
                Action::MoveUp
            };
        };

        let facing = if dx.abs() <= ALIGN_TOLERANCE {
            Some(if dy < 0 { Direction::Up } else { Direction::Down })
        } else if dy.abs() <= ALIGN_TOLERANCE {
            Some(if dx < 0 { Direction::Left } else { Direction::Right })
        } else {
            None
        };

        match facing {
            Some(direction) if direction == player.direction => Action::Fire,
            Some(direction) => Self::press(direction),
            // close the shorter gap first
            None if dx.abs() < dy.abs() => Self::press(if dx < 0 {
                Direction::Left
            } else {
                Direction::Right
            }),
            None => Self::press(if dy < 0 { Direction::Up } else { Direction::Down }),
        }
    }
}

/// Which agent an episode uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// [`RandomAgent`].
    Random,
    /// [`HunterAgent`].
    Hunter,
    /// [`ScriptedAgent`] loaded from a RON file.
    Script(String),
}

impl Default for StrategyKind {
    fn default() -> Self {
        Self::Hunter
    }
}

impl FromStr for StrategyKind {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "hunter" => Ok(Self::Hunter),
            path if path.ends_with(".ron") => Ok(Self::Script(path.to_string())),
            other => Err(StrategyError::Unknown(other.to_string())),
        }
    }
}

impl StrategyKind {
    /// Build the agent. `seed` only matters for [`StrategyKind::Random`].
    pub fn build(&self, seed: u64) -> Result<Box<dyn Agent>, StrategyError> {
        Ok(match self {
            Self::Random => Box::new(RandomAgent::new(seed)),
            Self::Hunter => Box::new(HunterAgent),
            Self::Script(path) => Box::new(ScriptedAgent::load(path)?),
        })
    }
}
