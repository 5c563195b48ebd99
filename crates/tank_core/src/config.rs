//! Arena configuration.
//!
//! Two profiles ship with the crate:
//!
//! - [`ArenaConfig::rl`] (the default): one step is ten 33 ms sub-ticks,
//!   reward is shaped for training (step cost, life and castle penalties,
//!   hit bonus).
//! - [`ArenaConfig::arcade`]: one step is a single 20 ms tick, two players,
//!   reward is the score gained.
//!
//! Configs round-trip through RON so experiments can be described in files:
//!
//! ```
//! use tank_core::config::ArenaConfig;
//!
//! let config = ArenaConfig::from_ron("(sub_ticks_per_step: 4)").unwrap();
//! assert_eq!(config.sub_ticks_per_step, 4);
//! assert_eq!(config.tick_ms, 33);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Which encoder produces the observation returned by `reset`/`step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObservationMode {
    /// 416x416 RGB buffer.
    Pixels,
    /// 26x26 tile-category grid.
    Grid,
    /// Fixed-length numeric feature vector.
    #[default]
    Features,
}

/// Reward shaping terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Added once per step.
    pub step: f32,
    /// Added for each life lost.
    pub life_lost: f32,
    /// Added for each player bullet consumed by an enemy.
    pub enemy_hit: f32,
    /// Added when the castle falls.
    pub castle_lost: f32,
    /// Multiplied by the score gained during the step.
    pub score_weight: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            step: -1.0,
            life_lost: -30.0,
            enemy_hit: 20.0,
            castle_lost: -50.0,
            score_weight: 0.0,
        }
    }
}

impl RewardConfig {
    /// Score delta only.
    #[must_use]
    pub const fn score_only() -> Self {
        Self {
            step: 0.0,
            life_lost: 0.0,
            enemy_hit: 0.0,
            castle_lost: 0.0,
            score_weight: 1.0,
        }
    }
}

/// Every fixed duration used by the arena's timers, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Interval between enemy spawn attempts.
    pub spawn_interval_ms: u32,
    /// Length of an enemy's spawning phase.
    pub spawn_duration_ms: u32,
    /// Spawn animation frame toggle.
    pub spawn_frame_ms: u32,
    /// Shield granted on (re)spawn.
    pub respawn_shield_ms: u32,
    /// Shield granted by the helmet bonus.
    pub helmet_shield_ms: u32,
    /// Shield flicker toggle.
    pub shield_frame_ms: u32,
    /// Steel fortress duration.
    pub shovel_ms: u32,
    /// Enemy freeze duration.
    pub freeze_ms: u32,
    /// Friendly-fire paralysis duration.
    pub paralysis_ms: u32,
    /// Time before an uncollected bonus disappears.
    pub bonus_lifetime_ms: u32,
    /// Bonus blink toggle.
    pub bonus_blink_ms: u32,
    /// Interval between enemy shots.
    pub enemy_fire_ms: u32,
    /// Bonus-carrier flash toggle.
    pub enemy_flash_ms: u32,
    /// Explosion frame duration.
    pub explosion_frame_ms: u32,
    /// Score label lifetime.
    pub label_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            spawn_interval_ms: 3000,
            spawn_duration_ms: 1000,
            spawn_frame_ms: 100,
            respawn_shield_ms: 4000,
            helmet_shield_ms: 10_000,
            shield_frame_ms: 100,
            shovel_ms: 10_000,
            freeze_ms: 10_000,
            paralysis_ms: 10_000,
            bonus_lifetime_ms: 10_000,
            bonus_blink_ms: 500,
            enemy_fire_ms: 1000,
            enemy_flash_ms: 200,
            explosion_frame_ms: 100,
            label_ms: 500,
        }
    }
}

/// Complete arena configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Milliseconds fed to the timer pool per sub-tick.
    pub tick_ms: u32,
    /// Sub-ticks run by one `step` call.
    pub sub_ticks_per_step: u32,
    /// Number of player tanks (1 or 2).
    pub player_count: usize,
    /// Lives each fresh player starts with.
    pub starting_lives: u32,
    /// Observation encoder.
    pub observation: ObservationMode,
    /// Reward shaping.
    pub rewards: RewardConfig,
    /// Timer durations.
    pub timing: TimingConfig,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::rl()
    }
}

impl ArenaConfig {
    /// Single-player training profile.
    #[must_use]
    pub fn rl() -> Self {
        Self {
            tick_ms: 33,
            sub_ticks_per_step: 10,
            player_count: 1,
            starting_lives: 3,
            observation: ObservationMode::Features,
            rewards: RewardConfig::default(),
            timing: TimingConfig::default(),
        }
    }

    /// Two-player frame-by-frame profile.
    #[must_use]
    pub fn arcade() -> Self {
        Self {
            tick_ms: 20,
            sub_ticks_per_step: 1,
            player_count: 2,
            rewards: RewardConfig::score_only(),
            ..Self::rl()
        }
    }

    /// Replace the observation encoder.
    #[must_use]
    pub fn with_observation(mut self, observation: ObservationMode) -> Self {
        self.observation = observation;
        self
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if !(1..=2).contains(&self.player_count) {
            return Err(GameError::Config(format!(
                "player_count must be 1 or 2, got {}",
                self.player_count
            )));
        }
        if self.sub_ticks_per_step == 0 {
            return Err(GameError::Config(
                "sub_ticks_per_step must be at least 1".to_string(),
            ));
        }
        if self.tick_ms == 0 {
            return Err(GameError::Config("tick_ms must be at least 1".to_string()));
        }
        if self.starting_lives == 0 {
            return Err(GameError::Config(
                "starting_lives must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a RON description. Missing fields take the
    /// [`ArenaConfig::rl`] values.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Config`] on syntax errors or invalid values.
    pub fn from_ron(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| GameError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a RON config file.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Io`] if the file cannot be read, otherwise as
    /// [`ArenaConfig::from_ron`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Pretty RON text for this config.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Config`] if serialization fails.
    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GameError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles() {
        let rl = ArenaConfig::rl();
        assert_eq!(rl.sub_ticks_per_step * rl.tick_ms, 330);
        assert!((rl.rewards.life_lost + 30.0).abs() < f32::EPSILON);

        let arcade = ArenaConfig::arcade();
        assert_eq!(arcade.player_count, 2);
        assert_eq!(arcade.sub_ticks_per_step, 1);
        assert!((arcade.rewards.score_weight - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_ron_round_trip() {
        let config = ArenaConfig::arcade().with_observation(ObservationMode::Grid);
        let text = config.to_ron().unwrap();
        assert_eq!(ArenaConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = ArenaConfig::from_ron("(timing: (freeze_ms: 500))").unwrap();
        assert_eq!(config.timing.freeze_ms, 500);
        assert_eq!(config.timing.shovel_ms, 10_000);
        assert_eq!(config.player_count, 1);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ArenaConfig::from_ron("(player_count: 3)"),
            Err(GameError::Config(_))
        ));
        assert!(matches!(
            ArenaConfig::from_ron("(sub_ticks_per_step: 0)"),
            Err(GameError::Config(_))
        ));
        assert!(ArenaConfig::from_ron("not ron").is_err());
    }
}
