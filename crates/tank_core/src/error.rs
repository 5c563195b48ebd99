//! Error types for the arena simulation.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all arena simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// No layout is registered or present on disk for this level id.
    #[error("Level not found: {0}")]
    LevelNotFound(u32),

    /// Action index outside the six defined actions.
    #[error("Invalid action index: {0} (expected 0..=5)")]
    InvalidAction(u8),

    /// Level layout could not be read.
    #[error("Failed to parse level {level}: {message}")]
    LevelParse {
        /// Level id being parsed.
        level: u32,
        /// Error message.
        message: String,
    },

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(u64),

    /// Configuration text could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Replay encoding or decoding failed.
    #[error("Replay error: {0}")]
    Replay(String),

    /// Re-simulating a replay produced a different final state.
    #[error("Replay diverged: expected hash {expected}, got {actual}")]
    ReplayMismatch {
        /// Hash stored in the replay.
        expected: u64,
        /// Hash produced by re-simulation.
        actual: u64,
    },

    /// Filesystem error while reading layouts or replays.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
