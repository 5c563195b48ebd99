//! Short frame-based animations and floating score labels.

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::math::Point;

/// Frames in every explosion animation.
pub const EXPLOSION_FRAMES: u8 = 3;

/// Explosion sprites are drawn 16 px up and left of the anchor.
const ANCHOR_OFFSET: i32 = 16;

/// A timed animation owned by a tank, bullet or the castle.
///
/// The owner discards the explosion once [`Explosion::active`] is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Explosion {
    /// Top-left corner of the animation.
    pub position: Point,
    /// Frame currently shown.
    pub frame: u8,
    /// False once all frames have been shown.
    pub active: bool,
}

impl Explosion {
    /// Start an explosion anchored at `anchor`.
    #[must_use]
    pub const fn at(anchor: Point) -> Self {
        Self {
            position: anchor.offset(-ANCHOR_OFFSET, -ANCHOR_OFFSET),
            frame: 0,
            active: true,
        }
    }

    /// Advance to the next frame, deactivating after the last one.
    pub fn advance(&mut self) {
        if self.frame + 1 < EXPLOSION_FRAMES {
            self.frame += 1;
        } else {
            self.active = false;
        }
    }
}

/// Points popup shown where something was destroyed or collected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoreLabel {
    /// Entity id of the label.
    pub id: EntityId,
    /// Anchor position.
    pub position: Point,
    /// Points shown.
    pub points: u32,
    /// Cleared by the expiry timer.
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explosion_offset() {
        let explosion = Explosion::at(Point::new(100, 50));
        assert_eq!(explosion.position, Point::new(84, 34));
    }

    #[test]
    fn test_inactive_on_third_advance() {
        let mut explosion = Explosion::at(Point::default());
        explosion.advance();
        explosion.advance();
        assert!(explosion.active);
        assert_eq!(explosion.frame, 2);
        explosion.advance();
        assert!(!explosion.active);
    }
}
