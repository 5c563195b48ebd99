//! Persisted high score.
//!
//! The file holds a single decimal integer. Anything else is ignored with
//! a warning and the default is used instead.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Score reported when no valid file exists.
pub const DEFAULT_HIGH_SCORE: u32 = 20_000;

/// Largest score the file may hold.
pub const MAX_HIGH_SCORE: u32 = 999_999;

/// High score backed by a text file.
#[derive(Debug, Clone)]
pub struct HighScore {
    path: PathBuf,
    value: u32,
}

impl HighScore {
    /// Read the file at `path`, falling back to [`DEFAULT_HIGH_SCORE`].
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let value = read_score(&path).unwrap_or(DEFAULT_HIGH_SCORE);
        Self { path, value }
    }

    /// Current high score.
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `score` if it beats the current value, writing the file.
    ///
    /// Returns true if the file was updated. Scores are capped at
    /// [`MAX_HIGH_SCORE`].
    pub fn submit(&mut self, score: u64) -> io::Result<bool> {
        let score = u32::try_from(score).unwrap_or(MAX_HIGH_SCORE).min(MAX_HIGH_SCORE);
        if score <= self.value {
            return Ok(false);
        }
        fs::write(&self.path, score.to_string())?;
        debug!(path = %self.path.display(), score, "High score saved");
        self.value = score;
        Ok(true)
    }
}

fn read_score(path: &Path) -> Option<u32> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "High score file unreadable");
            return None;
        }
    };
    match text.trim().parse::<u32>() {
        Ok(value) if (DEFAULT_HIGH_SCORE..=MAX_HIGH_SCORE).contains(&value) => Some(value),
        Ok(value) => {
            warn!(path = %path.display(), value, "High score out of range, ignored");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "High score file corrupt, ignored");
            None
        }
    }
}
