//! # Tank Core
//!
//! Deterministic simulation core for the tank arena.
//!
//! This crate contains **only** simulation logic:
//! - No rendering (observations are plain buffers)
//! - No audio
//! - No system randomness (one seeded PRNG owned by the arena)
//! - No floating-point in the simulation itself (integer pixels)
//!
//! This separation enables:
//! - Headless stepping by an external controller
//! - Replays and determinism checks
//! - Reproducible tests
//!
//! ## Crate Structure
//!
//! - [`timer`] - Cooperative timer pool driving every timed behavior
//! - [`level`] - Tile map, layouts and enemy quotas
//! - [`tank`] - Shared tank record with player/enemy variants
//! - [`pathfinding`] - Enemy navigation heuristic
//! - [`bullet`], [`explosion`], [`bonus`], [`castle`] - Remaining entities
//! - [`simulation`] - The arena orchestrator (`reset` / `step`)
//! - [`observation`] - Pixel, grid and feature encoders
//! - [`replay`] - Action-stream recordings

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod bonus;
pub mod bullet;
pub mod castle;
pub mod components;
pub mod config;
pub mod error;
pub mod explosion;
pub mod level;
pub mod math;
pub mod observation;
pub mod pathfinding;
pub mod replay;
pub mod simulation;
pub mod tank;
pub mod timer;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bonus::{Bonus, BonusKind};
    pub use crate::bullet::{Bullet, BulletState};
    pub use crate::castle::{Castle, CastleState};
    pub use crate::components::{Action, Direction, EntityId, Side};
    pub use crate::config::{ArenaConfig, ObservationMode, RewardConfig, TimingConfig};
    pub use crate::error::{GameError, Result};
    pub use crate::level::{Level, LevelLibrary, TileKind};
    pub use crate::math::{Point, Rect};
    pub use crate::observation::Observation;
    pub use crate::simulation::{Arena, StepResult};
    pub use crate::tank::{EnemyKind, Tank, TankState};
    pub use crate::timer::{Repeat, TimerHandle, TimerPool};
}
