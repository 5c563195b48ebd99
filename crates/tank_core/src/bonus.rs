//! Pickups dropped by bonus-carrier enemies.

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::level::ARENA_SIZE;
use crate::math::Rect;

/// Bonus footprint edge in pixels.
pub const BONUS_SIZE: i32 = 32;

/// Score for collecting any bonus.
pub const BONUS_POINTS: u32 = 500;

/// Effect applied when a player drives over the bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BonusKind {
    /// Destroy every enemy on the map.
    Grenade,
    /// Temporary shield.
    Helmet,
    /// Steel walls around the castle for a while.
    Shovel,
    /// One superpower level.
    Star,
    /// Extra life.
    Tank,
    /// Freeze all enemies for a while.
    Timer,
}

impl BonusKind {
    /// Every kind, in sprite order.
    pub const ALL: [BonusKind; 6] = [
        BonusKind::Grenade,
        BonusKind::Helmet,
        BonusKind::Shovel,
        BonusKind::Star,
        BonusKind::Tank,
        BonusKind::Timer,
    ];
}

/// A pickup lying on the map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bonus {
    /// Entity id.
    pub id: EntityId,
    /// Effect.
    pub kind: BonusKind,
    /// Footprint.
    pub rect: Rect,
    /// Cleared when collected, expired or run over by an enemy.
    pub active: bool,
    /// Blink state.
    pub visible: bool,
}

impl Bonus {
    /// Create a bonus of `kind` at `rect`.
    #[must_use]
    pub const fn new(id: EntityId, kind: BonusKind, rect: Rect) -> Self {
        Self {
            id,
            kind,
            rect,
            active: true,
            visible: true,
        }
    }

    /// Random kind at a random position fully inside the arena.
    pub fn random<R: Rng + ?Sized>(id: EntityId, rng: &mut R) -> Self {
        let max = ARENA_SIZE - BONUS_SIZE;
        let x = rng.random_range(0..=max);
        let y = rng.random_range(0..=max);
        let kind = *BonusKind::ALL.choose(rng).unwrap_or(&BonusKind::Grenade);
        Self::new(id, kind, Rect::new(x, y, BONUS_SIZE, BONUS_SIZE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_random_bonus_inside_arena() {
        let mut rng = Pcg32::seed_from_u64(3);
        for id in 0..200 {
            let bonus = Bonus::random(id, &mut rng);
            assert!(bonus.rect.x >= 0 && bonus.rect.right() <= ARENA_SIZE);
            assert!(bonus.rect.y >= 0 && bonus.rect.bottom() <= ARENA_SIZE);
            assert!(bonus.active && bonus.visible);
        }
    }
}
