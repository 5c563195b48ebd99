//! Headless arena runner for agent training, batch evaluation and CI.
//!
//! This crate drives a [`tank_core`] arena without graphics:
//!
//! - **External control**: a controller sends JSON commands on stdin and
//!   reads observations and rewards from stdout
//! - **Batch evaluation**: built-in agents play many seeded episodes in
//!   parallel
//! - **Replay verification**: recorded action streams are re-simulated and
//!   their final hash compared
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from the controller (reset, step, query, ...)
//! - **stdout**: Responses (JSON)
//! - **stderr**: Logs (human-readable)
//!
//! See [`protocol`] for the full command/response format.
//!
//! # Example
//!
//! ```bash
//! # Step once with "move up"
//! echo '{"cmd":"step","action":1}' | cargo run -p tank_headless
//!
//! # Evaluate the hunter agent on level 2
//! cargo run -p tank_headless -- batch --level 2 --count 200
//!
//! # Verify a replay
//! cargo run -p tank_headless -- replay episode.replay --verify
//! ```

pub mod ascii_visualizer;
pub mod batch;
pub mod episode;
pub mod highscore;
pub mod protocol;
pub mod runner;
pub mod strategies;

pub use ascii_visualizer::{render_ascii, AsciiConfig};
pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, BatchSummary};
pub use episode::{run_episode, EpisodeConfig, EpisodeMetrics, EpisodeResult, Outcome};
pub use highscore::HighScore;
pub use protocol::{Command, Response};
pub use runner::{HeadlessConfig, HeadlessRunner, RunnerError};
pub use strategies::{Agent, StrategyKind};
