//! Integer geometry for the arena.
//!
//! The whole simulation runs on integer pixel coordinates, so results are
//! identical on every platform. Rectangles follow screen conventions: `x`
//! grows to the right, `y` grows downward, and the origin is the top-left
//! corner of the arena.

use serde::{Deserialize, Serialize};

/// A pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Offset this point by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// An axis-aligned rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub w: i32,
    /// Height in pixels.
    pub h: i32,
}

impl Rect {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Create a rectangle with the given top-left corner and size.
    #[must_use]
    pub const fn at(top_left: Point, w: i32, h: i32) -> Self {
        Self::new(top_left.x, top_left.y, w, h)
    }

    /// Top-left corner.
    #[must_use]
    pub const fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Right edge (exclusive).
    #[must_use]
    pub const fn right(&self) -> i32 {
        self.x + self.w
    }

    /// Bottom edge (exclusive).
    #[must_use]
    pub const fn bottom(&self) -> i32 {
        self.y + self.h
    }

    /// Centre point, rounded toward the top-left.
    #[must_use]
    pub const fn center(&self) -> Point {
        Point::new(self.x + self.w / 2, self.y + self.h / 2)
    }

    /// Return a copy moved by `(dx, dy)`.
    #[must_use]
    pub const fn translate(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    /// Return a copy with the top-left corner moved to `to`.
    #[must_use]
    pub const fn moved_to(&self, to: Point) -> Self {
        Self::new(to.x, to.y, self.w, self.h)
    }

    /// Strict overlap test. Touching edges do not collide and empty
    /// rectangles never collide.
    #[must_use]
    pub const fn collides(&self, other: &Rect) -> bool {
        self.w > 0
            && self.h > 0
            && other.w > 0
            && other.h > 0
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// True if any rectangle in `others` overlaps this one.
    #[must_use]
    pub fn collides_any(&self, others: &[Rect]) -> bool {
        others.iter().any(|other| self.collides(other))
    }
}

/// Integer division rounded to the nearest integer, ties to even.
///
/// Enemy navigation snaps to the tile grid with this rule, so it has to be
/// exact rather than going through floats.
#[must_use]
pub const fn div_round_half_even(value: i32, base: i32) -> i32 {
    let quotient = value.div_euclid(base);
    let remainder = value.rem_euclid(base);
    let twice = remainder * 2;
    if twice > base || (twice == base && quotient % 2 != 0) {
        quotient + 1
    } else {
        quotient
    }
}

/// Round `value` to the nearest multiple of `base` (ties to even multiple).
#[must_use]
pub const fn nearest(value: i32, base: i32) -> i32 {
    div_round_half_even(value, base) * base
}
