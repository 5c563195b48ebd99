//! Single agent episodes and their metrics.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tank_core::config::ArenaConfig;
use tank_core::level::LevelLibrary;
use tank_core::replay::{Recorder, Replay};
use tank_core::simulation::Arena;

use crate::runner::RunnerError;
use crate::strategies::StrategyKind;

/// How an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every queued enemy was destroyed.
    StageCleared,
    /// Lives ran out or the castle fell.
    Defeat,
    /// The step limit was reached first.
    Timeout,
}

/// Settings for one episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeConfig {
    /// Arena configuration.
    pub arena: ArenaConfig,
    /// Level to play.
    pub level: u32,
    /// Arena and agent seed.
    pub seed: u64,
    /// Step limit.
    pub max_steps: u64,
    /// Agent controlling player one.
    pub strategy: StrategyKind,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::rl(),
            level: 1,
            seed: 0,
            max_steps: 5_000,
            strategy: StrategyKind::default(),
        }
    }
}

/// Collected statistics of one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetrics {
    /// Seed used.
    pub seed: u64,
    /// Level played.
    pub level: u32,
    /// Agent name.
    pub strategy: String,
    /// Steps taken.
    pub steps: u64,
    /// Sub-ticks simulated.
    pub ticks: u64,
    /// Sum of step rewards.
    pub total_reward: f64,
    /// Score of all players.
    pub score: u64,
    /// Enemies destroyed by players.
    pub kills: u32,
    /// Bonuses collected.
    pub bonuses: u32,
    /// Lives player one has left.
    pub lives_left: u32,
    /// End condition.
    pub outcome: Outcome,
    /// State hash at the end.
    pub final_hash: u64,
}

/// Metrics plus the recorded action stream.
#[derive(Debug, Clone)]
pub struct EpisodeResult {
    /// Statistics.
    pub metrics: EpisodeMetrics,
    /// Replay of the episode.
    pub replay: Replay,
    /// Arena in its final state.
    pub arena: Arena,
}

/// Play one episode with the built-in levels.
pub fn run_episode(config: &EpisodeConfig) -> Result<EpisodeResult, RunnerError> {
    run_episode_with(config, LevelLibrary::builtin())
}

/// Play one episode with a specific level library.
pub fn run_episode_with(
    config: &EpisodeConfig,
    library: LevelLibrary,
) -> Result<EpisodeResult, RunnerError> {
    config.arena.validate()?;
    let mut agent = config.strategy.build(config.seed)?;
    let mut recorder =
        Recorder::start_with(config.arena.clone(), config.seed, config.level, library)?;

    let mut total_reward = 0.0_f64;
    let mut steps = 0;
    let mut outcome = Outcome::Timeout;

    while steps < config.max_steps {
        let action = agent.act(recorder.arena());
        let result = recorder.step(action);
        total_reward += f64::from(result.reward);
        steps += 1;

        if result.done {
            outcome = Outcome::Defeat;
            break;
        }
        if result.truncated {
            outcome = Outcome::StageCleared;
            break;
        }
    }

    let arena = recorder.arena().clone();
    let replay = recorder.finish();

    let (kills, bonuses) = arena
        .players()
        .iter()
        .filter_map(|player| player.player())
        .fold((0, 0), |(kills, bonuses), data| {
            (kills + data.trophies.kills(), bonuses + data.trophies.bonus)
        });
    let lives_left = arena
        .players()
        .first()
        .and_then(|player| player.player())
        .map_or(0, |data| data.lives);

    let metrics = EpisodeMetrics {
        seed: config.seed,
        level: config.level,
        strategy: agent.name().to_string(),
        steps,
        ticks: arena.tick_count(),
        total_reward,
        score: arena.total_score(),
        kills,
        bonuses,
        lives_left,
        outcome,
        final_hash: replay.final_hash,
    };

    debug!(seed = config.seed, ?outcome, steps, "Episode finished");
    if outcome != Outcome::Timeout {
        info!(
            seed = config.seed,
            level = config.level,
            ?outcome,
            score = metrics.score,
            kills,
            "Episode ended"
        );
    }

    Ok(EpisodeResult {
        metrics,
        replay,
        arena,
    })
}
