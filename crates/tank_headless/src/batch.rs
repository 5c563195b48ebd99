//! Batch episode runner.
//!
//! Runs many seeded episodes in parallel using rayon and aggregates their
//! metrics. Results are independent of the thread count.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tank_core::config::ArenaConfig;
use tank_core::level::LevelLibrary;

use crate::episode::{run_episode_with, EpisodeConfig, EpisodeMetrics, Outcome};
use crate::runner::RunnerError;
use crate::strategies::StrategyKind;

/// Configuration for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Arena configuration shared by every episode.
    pub arena: ArenaConfig,
    /// Level to play.
    pub level: u32,
    /// Number of episodes.
    pub episodes: u32,
    /// Worker threads (0 = rayon default).
    pub parallel: u32,
    /// Seed of the first episode; episode `i` uses `seed_start + i`.
    pub seed_start: u64,
    /// Step limit per episode.
    pub max_steps: u64,
    /// Agent for player one.
    pub strategy: StrategyKind,
    /// Extra directory searched for level layouts.
    pub level_dir: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::rl(),
            level: 1,
            episodes: 100,
            parallel: 0,
            seed_start: 0,
            max_steps: 5_000,
            strategy: StrategyKind::default(),
            level_dir: None,
        }
    }
}

impl BatchConfig {
    /// Config for `episodes` runs of `level`.
    pub fn new(level: u32, episodes: u32) -> Self {
        Self {
            level,
            episodes,
            ..Default::default()
        }
    }

    /// Set seed start.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the agent.
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the step limit.
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    fn library(&self) -> LevelLibrary {
        let library = LevelLibrary::builtin();
        match &self.level_dir {
            Some(dir) => library.with_directory(dir),
            None => library,
        }
    }

    fn episode(&self, seed: u64) -> EpisodeConfig {
        EpisodeConfig {
            arena: self.arena.clone(),
            level: self.level,
            seed,
            max_steps: self.max_steps,
            strategy: self.strategy.clone(),
        }
    }
}

/// Aggregate statistics over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Episodes that completed.
    pub total_episodes: u32,
    /// Mean summed reward.
    pub mean_reward: f64,
    /// Mean score.
    pub mean_score: f64,
    /// Mean episode length in steps.
    pub mean_steps: f64,
    /// Best score seen.
    pub best_score: u64,
    /// Fraction of episodes that cleared the stage.
    pub clear_rate: f64,
    /// Fraction of episodes lost.
    pub defeat_rate: f64,
    /// Fraction of episodes that hit the step limit.
    pub timeout_rate: f64,
}

impl BatchSummary {
    /// Summarize completed episodes.
    pub fn from_episodes(episodes: &[EpisodeMetrics]) -> Self {
        if episodes.is_empty() {
            return Self::default();
        }
        let n = episodes.len() as f64;
        let rate = |outcome: Outcome| {
            episodes.iter().filter(|e| e.outcome == outcome).count() as f64 / n
        };
        Self {
            total_episodes: episodes.len() as u32,
            mean_reward: episodes.iter().map(|e| e.total_reward).sum::<f64>() / n,
            mean_score: episodes.iter().map(|e| e.score as f64).sum::<f64>() / n,
            mean_steps: episodes.iter().map(|e| e.steps as f64).sum::<f64>() / n,
            best_score: episodes.iter().map(|e| e.score).max().unwrap_or(0),
            clear_rate: rate(Outcome::StageCleared),
            defeat_rate: rate(Outcome::Defeat),
            timeout_rate: rate(Outcome::Timeout),
        }
    }
}

/// Error during a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Episode index.
    pub episode_index: u32,
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Per-episode metrics in seed order.
    pub episodes: Vec<EpisodeMetrics>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Wall-clock runtime.
    pub duration_seconds: f64,
    /// Episodes that failed to run.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to a JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Progress tracking for batch runs.
#[derive(Debug)]
pub struct BatchProgress {
    /// Total episodes.
    pub total: u32,
    completed: AtomicU32,
    start_time: Instant,
}

impl BatchProgress {
    /// Create new progress tracker.
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: AtomicU32::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a finished episode and return the new count.
    pub fn record_completion(&self) -> u32 {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Completed episodes so far.
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Completion percentage.
    pub fn percentage(&self) -> f64 {
        f64::from(self.current()) / f64::from(self.total.max(1)) * 100.0
    }

    /// Estimated time remaining.
    pub fn eta(&self) -> Duration {
        let completed = self.current();
        if completed == 0 {
            return Duration::from_secs(0);
        }
        let per_episode = self.start_time.elapsed().as_secs_f64() / f64::from(completed);
        let remaining = self.total.saturating_sub(completed);
        Duration::from_secs_f64(per_episode * f64::from(remaining))
    }
}

/// Run a batch of episodes.
///
/// # Errors
///
/// Fails only if a dedicated thread pool cannot be built; individual
/// episode failures are collected in [`BatchResults::errors`].
pub fn run_batch(config: BatchConfig) -> Result<BatchResults, RunnerError> {
    let start = Instant::now();
    let progress = BatchProgress::new(config.episodes);
    let library = config.library();

    info!(
        level = config.level,
        episodes = config.episodes,
        strategy = ?config.strategy,
        "Starting batch run"
    );

    let run_all = || -> Vec<Result<EpisodeMetrics, BatchError>> {
        (0..config.episodes)
            .into_par_iter()
            .map(|index| {
                let seed = config.seed_start.wrapping_add(u64::from(index));
                match run_episode_with(&config.episode(seed), library.clone()) {
                    Ok(result) => {
                        let completed = progress.record_completion();
                        if completed % 10 == 0 {
                            debug!(
                                completed,
                                total = config.episodes,
                                eta_secs = progress.eta().as_secs(),
                                "Batch progress"
                            );
                        }
                        Ok(result.metrics)
                    }
                    Err(e) => {
                        warn!(episode = index, seed, error = %e, "Episode failed");
                        Err(BatchError {
                            episode_index: index,
                            seed,
                            message: e.to_string(),
                        })
                    }
                }
            })
            .collect()
    };

    let results = if config.parallel > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel as usize)
            .build()
            .map_err(|e| RunnerError::Io(std::io::Error::other(e)))?
            .install(run_all)
    } else {
        run_all()
    };

    let (episodes, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let episodes: Vec<EpisodeMetrics> = episodes.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_episodes(&episodes);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        completed = episodes.len(),
        failed = errors.len(),
        duration_secs = format!("{duration_seconds:.1}"),
        mean_score = summary.mean_score,
        "Batch complete"
    );

    Ok(BatchResults {
        config,
        episodes,
        summary,
        duration_seconds,
        errors,
    })
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismReport {
    /// Seed checked.
    pub seed: u64,
    /// Final hash of every run.
    pub hashes: Vec<u64>,
    /// Whether all hashes match.
    pub deterministic: bool,
}

/// Run the same episode `runs` times in parallel and compare final hashes.
pub fn verify_determinism(
    config: &BatchConfig,
    seed: u64,
    runs: u32,
) -> Result<DeterminismReport, RunnerError> {
    let library = config.library();
    let episode = config.episode(seed);
    let hashes = (0..runs)
        .into_par_iter()
        .map(|_| run_episode_with(&episode, library.clone()).map(|r| r.metrics.final_hash))
        .collect::<Result<Vec<u64>, RunnerError>>()?;

    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if !deterministic {
        warn!(seed, ?hashes, "Non-deterministic episode");
    }
    Ok(DeterminismReport {
        seed,
        hashes,
        deterministic,
    })
}
