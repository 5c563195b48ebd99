//! Replay recording and verification.
//!
//! The arena is fully determined by its config, seed, starting level and
//! action stream, so a replay stores only those plus the final state hash.
//! Playing a replay back re-simulates every step.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::components::Action;
use crate::config::ArenaConfig;
use crate::error::{GameError, Result};
use crate::level::LevelLibrary;
use crate::simulation::{Arena, StepResult};

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// A recorded episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Level the episode started on.
    pub level_id: u32,
    /// Arena RNG seed.
    pub seed: u64,
    /// Arena configuration.
    pub config: ArenaConfig,
    /// Actions per step, one entry per player slot.
    pub steps: Vec<Vec<Action>>,
    /// Sub-tick counter at the end of the episode.
    pub final_tick: u64,
    /// State hash at the end of the episode.
    pub final_hash: u64,
}

impl Replay {
    /// Start an empty replay.
    #[must_use]
    pub fn new(level_id: u32, seed: u64, config: ArenaConfig) -> Self {
        Self {
            version: REPLAY_VERSION,
            level_id,
            seed,
            config,
            steps: Vec::new(),
            final_tick: 0,
            final_hash: 0,
        }
    }

    /// Append one step's actions.
    pub fn record(&mut self, actions: &[Action]) {
        self.steps.push(actions.to_vec());
    }

    /// Store the end state of `arena`.
    pub fn finalize(&mut self, arena: &Arena) {
        self.final_tick = arena.tick_count();
        self.final_hash = arena.state_hash();
    }

    /// Number of recorded steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| GameError::Replay(format!("Failed to serialize replay: {e}")))?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    /// Returns an error if file reading or deserialization fails, or the
    /// file was written by a different format version.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let replay: Self = bincode::deserialize(&bytes)
            .map_err(|e| GameError::Replay(format!("Failed to deserialize replay: {e}")))?;

        if replay.version != REPLAY_VERSION {
            return Err(GameError::Replay(format!(
                "Replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }

        Ok(replay)
    }

    /// Re-simulate with the built-in levels.
    ///
    /// # Errors
    /// Returns an error if the starting level cannot be loaded.
    pub fn play(&self) -> Result<Arena> {
        self.play_with(LevelLibrary::builtin())
    }

    /// Re-simulate with a specific level library.
    ///
    /// # Errors
    /// Returns an error if the starting level cannot be loaded.
    pub fn play_with(&self, library: LevelLibrary) -> Result<Arena> {
        let mut arena = Arena::new(self.config.clone(), self.seed).with_levels(library);
        arena.reset(self.level_id)?;
        for actions in &self.steps {
            arena.step_players(actions);
        }
        Ok(arena)
    }

    /// Re-simulate and compare the final hash.
    ///
    /// # Errors
    /// Returns [`GameError::ReplayMismatch`] if the hashes differ.
    pub fn verify(&self) -> Result<()> {
        self.verify_with(LevelLibrary::builtin())
    }

    /// [`Replay::verify`] with a specific level library.
    ///
    /// # Errors
    /// Returns [`GameError::ReplayMismatch`] if the hashes differ.
    pub fn verify_with(&self, library: LevelLibrary) -> Result<()> {
        let arena = self.play_with(library)?;
        let actual = arena.state_hash();
        if actual != self.final_hash {
            return Err(GameError::ReplayMismatch {
                expected: self.final_hash,
                actual,
            });
        }
        Ok(())
    }
}

/// An arena that records every step into a [`Replay`].
#[derive(Debug, Clone)]
pub struct Recorder {
    arena: Arena,
    replay: Replay,
}

impl Recorder {
    /// Reset a fresh arena on `level_id` and start recording.
    ///
    /// # Errors
    /// Returns an error if the level cannot be loaded.
    pub fn start(config: ArenaConfig, seed: u64, level_id: u32) -> Result<Self> {
        Self::start_with(config, seed, level_id, LevelLibrary::builtin())
    }

    /// [`Recorder::start`] with a specific level library.
    ///
    /// # Errors
    /// Returns an error if the level cannot be loaded.
    pub fn start_with(
        config: ArenaConfig,
        seed: u64,
        level_id: u32,
        library: LevelLibrary,
    ) -> Result<Self> {
        let mut arena = Arena::new(config.clone(), seed).with_levels(library);
        arena.reset(level_id)?;
        Ok(Self {
            arena,
            replay: Replay::new(level_id, seed, config),
        })
    }

    /// Current arena.
    #[must_use]
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Step all players and record the actions.
    pub fn step_players(&mut self, actions: &[Action]) -> StepResult {
        self.replay.record(actions);
        self.arena.step_players(actions)
    }

    /// Step player one and record the action.
    pub fn step(&mut self, action: Action) -> StepResult {
        self.step_players(&[action])
    }

    /// Stop recording and return the finalized replay.
    #[must_use]
    pub fn finish(mut self) -> Replay {
        self.replay.finalize(&self.arena);
        self.replay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(steps: usize) -> Replay {
        let mut recorder = Recorder::start(ArenaConfig::rl(), 99, 1).unwrap();
        for i in 0..steps {
            let action = Action::from_index((i % 6) as u8).unwrap();
            recorder.step(action);
        }
        recorder.finish()
    }

    #[test]
    fn test_recorder_counts_steps() {
        let replay = recorded(25);
        assert_eq!(replay.version, REPLAY_VERSION);
        assert_eq!(replay.step_count(), 25);
        assert_eq!(replay.final_tick, 250);
    }

    #[test]
    fn test_replay_verifies() {
        let replay = recorded(40);
        assert!(replay.verify().is_ok());
    }

    #[test]
    fn test_tampered_replay_mismatch() {
        let mut replay = recorded(40);
        replay.final_hash ^= 1;
        assert!(matches!(
            replay.verify(),
            Err(GameError::ReplayMismatch { .. })
        ));
    }

    #[test]
    fn test_replay_save_load() {
        let replay = recorded(10);
        let path = std::env::temp_dir().join(format!("tank_replay_{}.bin", std::process::id()));
        replay.save(&path).unwrap();

        let loaded = Replay::load(&path).unwrap();
        assert_eq!(loaded, replay);
        assert!(loaded.verify().is_ok());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let path = std::env::temp_dir().join(format!("tank_replay_bad_{}.bin", std::process::id()));
        std::fs::write(&path, b"definitely not a replay").unwrap();
        assert!(Replay::load(&path).is_err());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_level_fails_playback() {
        let replay = Replay::new(77, 1, ArenaConfig::rl());
        assert!(matches!(replay.play(), Err(GameError::LevelNotFound(77))));
    }
}
