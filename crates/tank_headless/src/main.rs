//! Headless tank arena runner.
//!
//! This binary runs the arena without graphics, controlled via JSON on
//! stdin/stdout or by built-in agents.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p tank_headless
//!
//! # Play one episode with the hunter agent and print the final board
//! cargo run -p tank_headless -- episode --level 1 --seed 7
//!
//! # Run batch evaluation
//! cargo run -p tank_headless -- batch --count 1000 --output results/
//!
//! # Arcade timing instead of the RL profile
//! cargo run -p tank_headless -- --profile arcade episode
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information

use std::io;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tank_core::config::ArenaConfig;
use tank_core::components::Action;
use tank_core::level::LevelLibrary;
use tank_core::replay::Replay;
use tank_core::simulation::Arena;

use tank_headless::{
    ascii_visualizer::{render_ascii, AsciiConfig},
    batch::{run_batch, verify_determinism, BatchConfig},
    episode::{run_episode_with, EpisodeConfig},
    highscore::HighScore,
    runner::{HeadlessConfig, HeadlessRunner},
    strategies::StrategyKind,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Profile {
    /// 33 ms x 10 sub-ticks per step
    Rl,
    /// 20 ms x 1 sub-tick per step
    Arcade,
}

#[derive(Parser)]
#[command(name = "tank_headless")]
#[command(about = "Headless tank arena runner for agents and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Timing profile
    #[arg(long, value_enum, default_value = "rl", global = true)]
    profile: Profile,

    /// RON arena config (overrides --profile)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extra directory searched for level layouts
    #[arg(long, global = true)]
    levels: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the JSON line protocol on stdin/stdout
    Run {
        /// Level loaded before the ready line
        #[arg(short, long, default_value = "1")]
        level: u32,

        /// Arena RNG seed
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Play one episode with a built-in agent
    Episode {
        /// Level to play
        #[arg(short, long, default_value = "1")]
        level: u32,

        /// Arena and agent seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Agent: random, hunter, or a .ron action script
        #[arg(short, long, default_value = "hunter")]
        strategy: StrategyKind,

        /// Step limit
        #[arg(long, default_value = "5000")]
        max_steps: u64,

        /// Write the replay to this file
        #[arg(long)]
        replay: Option<PathBuf>,

        /// High score file updated with the episode score
        #[arg(long)]
        highscore: Option<PathBuf>,

        /// Disable ANSI colors in the board dump
        #[arg(long)]
        no_color: bool,
    },

    /// Run a batch of episodes for evaluation
    Batch {
        /// Level to play
        #[arg(short, long, default_value = "1")]
        level: u32,

        /// Number of episodes
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel episodes (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Agent: random, hunter, or a .ron action script
        #[arg(short, long, default_value = "hunter")]
        strategy: StrategyKind,

        /// Step limit per episode
        #[arg(long, default_value = "5000")]
        max_steps: u64,
    },

    /// Verify determinism by running the same episode several times
    Verify {
        /// Level to play
        #[arg(short, long, default_value = "1")]
        level: u32,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of runs
        #[arg(short, long, default_value = "3")]
        runs: u32,
    },

    /// Replay a recorded episode
    Replay {
        /// Replay file
        file: PathBuf,

        /// Compare the final hash with the recorded one
        #[arg(long)]
        verify: bool,
    },

    /// Measure raw stepping speed
    Benchmark {
        /// Steps to run
        #[arg(short, long, default_value = "10000")]
        steps: u64,

        /// Level to play
        #[arg(short, long, default_value = "1")]
        level: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let arena = load_arena_config(&cli);

    match cli.command {
        Some(Commands::Run { level, seed }) => cmd_run(arena, level, seed, cli.levels),
        Some(Commands::Episode {
            level,
            seed,
            strategy,
            max_steps,
            replay,
            highscore,
            no_color,
        }) => {
            let config = EpisodeConfig {
                arena,
                level,
                seed,
                max_steps,
                strategy,
            };
            cmd_episode(&config, cli.levels, replay, highscore, no_color);
        }
        Some(Commands::Batch {
            level,
            count,
            parallel,
            output,
            seed,
            strategy,
            max_steps,
        }) => {
            let config = BatchConfig {
                arena,
                level,
                episodes: count,
                parallel,
                seed_start: seed,
                max_steps,
                strategy,
                level_dir: cli.levels,
            };
            cmd_batch(config, &output);
        }
        Some(Commands::Verify { level, seed, runs }) => {
            let config = BatchConfig {
                arena,
                level,
                level_dir: cli.levels,
                ..BatchConfig::default()
            };
            cmd_verify(&config, seed, runs);
        }
        Some(Commands::Replay { file, verify }) => cmd_replay(&file, verify, cli.levels),
        Some(Commands::Benchmark { steps, level }) => cmd_benchmark(arena, level, steps, cli.levels),
        None => cmd_run(arena, 1, 0, cli.levels),
    }
}

fn load_arena_config(cli: &Cli) -> ArenaConfig {
    let config = match &cli.config {
        Some(path) => match ArenaConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => match cli.profile {
            Profile::Rl => ArenaConfig::rl(),
            Profile::Arcade => ArenaConfig::arcade(),
        },
    };
    if let Err(e) = config.validate() {
        eprintln!("Invalid arena config: {e}");
        process::exit(1);
    }
    config
}

fn library(levels: Option<PathBuf>) -> LevelLibrary {
    match levels {
        Some(dir) => LevelLibrary::builtin().with_directory(dir),
        None => LevelLibrary::builtin(),
    }
}

/// Serve the protocol on stdin/stdout
fn cmd_run(arena: ArenaConfig, level: u32, seed: u64, levels: Option<PathBuf>) {
    tracing::info!(level, seed, "Starting interactive session");

    let config = HeadlessConfig {
        arena,
        seed,
        level,
        level_dir: levels,
    };
    let mut runner = match HeadlessRunner::new(&config) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Failed to start runner: {e}");
            process::exit(1);
        }
    };

    let stdin = io::stdin();
    match runner.run(stdin.lock(), io::stdout().lock()) {
        Ok(stats) => tracing::info!(
            commands = stats.commands,
            errors = stats.errors,
            steps = stats.steps,
            "Session finished"
        ),
        Err(e) => {
            eprintln!("Session failed: {e}");
            process::exit(1);
        }
    }
}

/// Play one episode and print the final board
fn cmd_episode(
    config: &EpisodeConfig,
    levels: Option<PathBuf>,
    replay_path: Option<PathBuf>,
    highscore: Option<PathBuf>,
    no_color: bool,
) {
    let result = match run_episode_with(config, library(levels)) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Episode failed: {e}");
            process::exit(1);
        }
    };

    let ascii = AsciiConfig {
        use_color: !no_color,
        ..AsciiConfig::default()
    };
    println!("{}", render_ascii(&result.arena, &ascii));

    let metrics = &result.metrics;
    eprintln!("Outcome: {:?}", metrics.outcome);
    eprintln!("Steps: {} ({} ticks)", metrics.steps, metrics.ticks);
    eprintln!("Reward: {:.1}", metrics.total_reward);
    eprintln!("Score: {}  Kills: {}  Bonuses: {}", metrics.score, metrics.kills, metrics.bonuses);
    eprintln!("Final hash: {:016x}", metrics.final_hash);

    if let Some(path) = replay_path {
        if let Err(e) = result.replay.save(&path) {
            eprintln!("Failed to save replay: {e}");
            process::exit(1);
        }
        eprintln!("Replay saved to {}", path.display());
    }

    if let Some(path) = highscore {
        let mut high = HighScore::load(path);
        match high.submit(metrics.score) {
            Ok(true) => eprintln!("New high score: {}", high.value()),
            Ok(false) => eprintln!("High score: {}", high.value()),
            Err(e) => {
                eprintln!("Failed to save high score to {}: {e}", high.path().display());
                process::exit(1);
            }
        }
    }
}

/// Run batch of episodes
fn cmd_batch(config: BatchConfig, output: &std::path::Path) {
    let num_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);

    tracing::info!(
        level = config.level,
        count = config.episodes,
        parallel = config.parallel,
        seed = config.seed_start,
        output = %output.display(),
        cpus_available = num_cpus,
        "Batch configuration"
    );

    let results = match run_batch(config) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("FATAL: Batch failed to start: {e}");
            process::exit(1);
        }
    };

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        tracing::error!(error = %e, path = %results_path.display(), "Failed to save results");
        eprintln!("FATAL: Failed to save results: {e}");
        process::exit(1);
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Episodes played: {}", summary.total_episodes);
    if !results.errors.is_empty() {
        eprintln!("Episodes failed: {}", results.errors.len());
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!("Mean reward: {:.1}", summary.mean_reward);
    eprintln!("Mean score: {:.0}  Best: {}", summary.mean_score, summary.best_score);
    eprintln!("Mean steps: {:.0}", summary.mean_steps);
    eprintln!(
        "Cleared: {:.1}%  Defeated: {:.1}%  Timed out: {:.1}%",
        summary.clear_rate * 100.0,
        summary.defeat_rate * 100.0,
        summary.timeout_rate * 100.0
    );
    eprintln!("Results saved to {}", results_path.display());
}

/// Verify determinism
fn cmd_verify(config: &BatchConfig, seed: u64, runs: u32) {
    tracing::info!(level = config.level, seed, runs, "Verifying determinism");

    match verify_determinism(config, seed, runs) {
        Ok(report) if report.deterministic => {
            eprintln!("PASS: All {runs} runs produced identical results");
            if let Some(hash) = report.hashes.first() {
                eprintln!("  Hash: {hash:016x}");
            }
        }
        Ok(report) => {
            eprintln!("FAIL: Non-determinism detected!");
            for (run, hash) in report.hashes.iter().enumerate() {
                eprintln!("  Run {run}: {hash:016x}");
            }
            process::exit(1);
        }
        Err(e) => {
            eprintln!("FAIL: Error during verification: {e}");
            process::exit(1);
        }
    }
}

/// Replay a recorded episode
fn cmd_replay(file: &std::path::Path, verify: bool, levels: Option<PathBuf>) {
    let replay = match Replay::load(file) {
        Ok(replay) => replay,
        Err(e) => {
            eprintln!("Failed to load replay: {e}");
            process::exit(1);
        }
    };

    eprintln!("Loaded replay:");
    eprintln!("  Level: {}", replay.level_id);
    eprintln!("  Seed: {}", replay.seed);
    eprintln!("  Steps: {}", replay.step_count());
    eprintln!("  Duration: {} ticks", replay.final_tick);

    if verify {
        eprintln!("Verifying replay...");
        match replay.verify_with(library(levels)) {
            Ok(()) => {
                eprintln!("PASS: Replay verification successful");
                eprintln!("  Hash: {:016x}", replay.final_hash);
            }
            Err(e) => {
                eprintln!("FAIL: {e}");
                process::exit(1);
            }
        }
        return;
    }

    match replay.play_with(library(levels)) {
        Ok(arena) => {
            println!("{}", render_ascii(&arena, &AsciiConfig::default()));
            eprintln!("Replay complete at tick {}", arena.tick_count());
            eprintln!("Final state hash: {:016x}", arena.state_hash());
        }
        Err(e) => {
            eprintln!("Failed to play replay: {e}");
            process::exit(1);
        }
    }
}

/// Run benchmark
fn cmd_benchmark(config: ArenaConfig, level: u32, steps: u64, levels: Option<PathBuf>) {
    tracing::info!(steps, level, "Running step benchmark");

    let mut arena = Arena::new(config, 1).with_levels(library(levels));
    if let Err(e) = arena.reset(level) {
        eprintln!("Failed to load level {level}: {e}");
        process::exit(1);
    }

    let cycle = [
        Action::MoveUp,
        Action::Fire,
        Action::MoveLeft,
        Action::Fire,
        Action::MoveRight,
        Action::Idle,
    ];

    // Warmup
    for action in cycle.iter().cycle().take(100) {
        arena.step(*action);
    }

    let start = Instant::now();
    let mut resets = 0u32;
    for action in cycle.iter().cycle().take(steps as usize) {
        let result = arena.step(*action);
        if result.done || result.truncated {
            resets += 1;
            if let Err(e) = arena.reset(level) {
                eprintln!("Failed to reset level {level}: {e}");
                process::exit(1);
            }
        }
    }
    let elapsed = start.elapsed();

    let sps = steps as f64 / elapsed.as_secs_f64();

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BENCHMARK RESULTS");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Steps: {steps}");
    eprintln!("Duration: {:.3}s", elapsed.as_secs_f64());
    eprintln!("Steps/second: {sps:.1}");
    eprintln!("ms/step: {:.4}", elapsed.as_secs_f64() * 1000.0 / steps.max(1) as f64);
    eprintln!("Resets: {resets}");
    eprintln!("State hash: {:016x}", arena.state_hash());
}
