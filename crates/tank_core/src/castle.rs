//! The defended objective.

use serde::{Deserialize, Serialize};

use crate::explosion::Explosion;
use crate::math::Rect;

/// Castle footprint: tiles (12, 24) to (13, 25).
pub const CASTLE_RECT: Rect = Rect::new(192, 384, 32, 32);

/// Castle lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CastleState {
    /// Intact.
    #[default]
    Standing,
    /// Hit, explosion playing.
    Exploding,
    /// Rubble.
    Destroyed,
}

/// The player's base. Losing it ends the match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Castle {
    /// Footprint.
    pub rect: Rect,
    /// Lifecycle state.
    pub state: CastleState,
    /// False from the moment it is hit.
    pub active: bool,
    /// Running explosion while [`CastleState::Exploding`].
    pub explosion: Option<Explosion>,
}

impl Default for Castle {
    fn default() -> Self {
        Self {
            rect: CASTLE_RECT,
            state: CastleState::Standing,
            active: true,
            explosion: None,
        }
    }
}

impl Castle {
    /// Restore an intact castle.
    pub fn rebuild(&mut self) {
        *self = Self::default();
    }

    /// Blow the castle up. Returns false if it was already hit.
    pub fn destroy(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.state = CastleState::Exploding;
        self.explosion = Some(Explosion::at(self.rect.top_left()));
        self.active = false;
        true
    }

    /// Finish the explosion once its animation is over.
    pub fn update(&mut self) {
        if self.state == CastleState::Exploding
            && !self.explosion.is_some_and(|explosion| explosion.active)
        {
            self.state = CastleState::Destroyed;
            self.explosion = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destroy_then_update() {
        let mut castle = Castle::default();
        assert!(castle.destroy());
        assert!(!castle.active);
        assert!(!castle.destroy());

        castle.update();
        assert_eq!(castle.state, CastleState::Exploding);

        if let Some(explosion) = castle.explosion.as_mut() {
            explosion.active = false;
        }
        castle.update();
        assert_eq!(castle.state, CastleState::Destroyed);

        castle.rebuild();
        assert!(castle.active);
        assert_eq!(castle.state, CastleState::Standing);
    }
}
