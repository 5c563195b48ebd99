//! Straight-line projectiles.
//!
//! A bullet only knows how to move itself and detect the arena edge.
//! Collisions against tiles, other bullets, tanks and the castle are
//! resolved by the arena, which owns all of those.

use serde::{Deserialize, Serialize};

use crate::components::{Direction, EntityId, Side};
use crate::explosion::Explosion;
use crate::level::ARENA_SIZE;
use crate::math::{Point, Rect};

/// Damage dealt by every bullet.
pub const BULLET_DAMAGE: i32 = 100;

/// Default travel speed in pixels per tick.
pub const BULLET_SPEED: i32 = 5;

/// Travel speed with at least one superpower level.
pub const FAST_BULLET_SPEED: i32 = 8;

/// Bullet explosions are centred 13 px up and left of the bullet.
const EXPLOSION_OFFSET: i32 = 13;

/// Bullet lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BulletState {
    /// In flight.
    Active,
    /// Stopped; explosion animation running.
    Exploding,
    /// Reaped on the next tick.
    Removed,
}

/// A projectile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bullet {
    /// Entity id.
    pub id: EntityId,
    /// Tank that fired it. May no longer exist.
    pub owner: EntityId,
    /// Side of the tank that fired it.
    owner_side: Side,
    /// Locked travel direction.
    pub direction: Direction,
    /// Damage applied on a non-friendly hit.
    pub damage: i32,
    /// Pixels per tick.
    pub speed: i32,
    /// 1 for normal bullets, 2 for steel-piercing ones.
    pub power: u8,
    /// Footprint.
    pub rect: Rect,
    /// Lifecycle state.
    pub state: BulletState,
    /// Running explosion while [`BulletState::Exploding`].
    pub explosion: Option<Explosion>,
}

impl Bullet {
    /// Spawn a bullet at the muzzle of a tank whose top-left corner is
    /// `tank_origin`.
    #[must_use]
    pub fn fired_from(
        id: EntityId,
        owner: EntityId,
        owner_side: Side,
        tank_origin: Point,
        direction: Direction,
    ) -> Self {
        let Point { x, y } = tank_origin;
        let rect = match direction {
            Direction::Up => Rect::new(x + 11, y - 8, 6, 8),
            Direction::Right => Rect::new(x + 26, y + 11, 8, 6),
            Direction::Down => Rect::new(x + 11, y + 26, 6, 8),
            Direction::Left => Rect::new(x - 8, y + 11, 8, 6),
        };
        Self {
            id,
            owner,
            owner_side,
            direction,
            damage: BULLET_DAMAGE,
            speed: BULLET_SPEED,
            power: 1,
            rect,
            state: BulletState::Active,
            explosion: None,
        }
    }

    /// Side of the shooter; fixed at creation.
    #[must_use]
    pub const fn owner_side(&self) -> Side {
        self.owner_side
    }

    /// True while the bullet is in flight.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == BulletState::Active
    }

    /// Move one tick along the travel direction.
    ///
    /// Returns false if the bullet left the arena, in which case it is
    /// already exploding.
    pub fn advance(&mut self) -> bool {
        let (dx, dy) = self.direction.delta();
        self.rect = self.rect.translate(dx * self.speed, dy * self.speed);
        let outside = match self.direction {
            Direction::Up => self.rect.y < 0,
            Direction::Right => self.rect.x > ARENA_SIZE - self.rect.w,
            Direction::Down => self.rect.y > ARENA_SIZE - self.rect.h,
            Direction::Left => self.rect.x < 0,
        };
        if outside {
            self.explode();
        }
        !outside
    }

    /// Stop and start the impact animation. Returns false if the bullet was
    /// already removed or exploding.
    pub fn explode(&mut self) -> bool {
        if self.state != BulletState::Active {
            return false;
        }
        self.state = BulletState::Exploding;
        self.explosion = Some(Explosion::at(
            self.rect
                .top_left()
                .offset(-EXPLOSION_OFFSET, -EXPLOSION_OFFSET),
        ));
        true
    }

    /// Remove without any animation.
    pub fn remove(&mut self) {
        self.state = BulletState::Removed;
        self.explosion = None;
    }

    /// Move an exploding bullet to `Removed` once its animation is over.
    pub fn update(&mut self) {
        if self.state == BulletState::Exploding
            && !self.explosion.is_some_and(|explosion| explosion.active)
        {
            self.remove();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullet(direction: Direction, origin: Point) -> Bullet {
        Bullet::fired_from(1, 9, Side::Player, origin, direction)
    }

    #[test]
    fn test_muzzle_offsets() {
        let origin = Point::new(100, 100);
        assert_eq!(bullet(Direction::Up, origin).rect, Rect::new(111, 92, 6, 8));
        assert_eq!(bullet(Direction::Right, origin).rect, Rect::new(126, 111, 8, 6));
        assert_eq!(bullet(Direction::Down, origin).rect, Rect::new(111, 126, 6, 8));
        assert_eq!(bullet(Direction::Left, origin).rect, Rect::new(92, 111, 8, 6));
    }

    #[test]
    fn test_advance_moves_by_speed() {
        let mut b = bullet(Direction::Right, Point::new(100, 100));
        assert!(b.advance());
        assert_eq!(b.rect.x, 131);
    }

    #[test]
    fn test_edge_explodes_silently() {
        let mut b = bullet(Direction::Up, Point::new(100, 5));
        // muzzle at y = -3, first move takes it to -8
        assert!(!b.advance());
        assert_eq!(b.state, BulletState::Exploding);
        assert!(b.explosion.is_some());

        let mut b = bullet(Direction::Right, Point::new(380, 100));
        assert!(!b.advance());
        assert_eq!(b.state, BulletState::Exploding);
    }

    #[test]
    fn test_exploding_bullet_removed_after_animation() {
        let mut b = bullet(Direction::Down, Point::new(100, 100));
        b.explode();
        b.update();
        assert_eq!(b.state, BulletState::Exploding);
        for _ in 0..3 {
            if let Some(explosion) = b.explosion.as_mut() {
                explosion.advance();
            }
        }
        b.update();
        assert_eq!(b.state, BulletState::Removed);
    }

    #[test]
    fn test_removed_bullet_does_not_explode() {
        let mut b = bullet(Direction::Left, Point::new(100, 100));
        b.remove();
        assert!(!b.explode());
        assert_eq!(b.state, BulletState::Removed);
    }
}
