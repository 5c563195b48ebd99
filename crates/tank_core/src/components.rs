//! Small shared value types.
//!
//! Everything here is plain data: identifiers, facing, sides and the
//! controller action set.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Unique identifier for entities.
///
/// Ids are allocated from one counter per arena and never reused within a
/// match, so a stale id simply fails to resolve.
pub type EntityId = u64;

/// Facing of a tank or travel direction of a bullet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Direction {
    /// Toward row 0.
    #[default]
    Up,
    /// Toward the last column.
    Right,
    /// Toward the last row.
    Down,
    /// Toward column 0.
    Left,
}

impl Direction {
    /// All directions in index order.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    /// Index in `0..4` (up, right, down, left).
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Up => 0,
            Self::Right => 1,
            Self::Down => 2,
            Self::Left => 3,
        }
    }

    /// Direction for an index, wrapping modulo 4.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self::ALL[index % 4]
    }

    /// The reverse direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        Self::from_index(self.index() + 2)
    }

    /// Unit step `(dx, dy)` in screen coordinates.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Right => (1, 0),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
        }
    }

    /// True for left/right.
    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Self::Right | Self::Left)
    }
}

/// Which side an entity fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Human or agent controlled.
    Player,
    /// Computer controlled.
    Enemy,
}

/// Discrete controller action applied at the start of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Action {
    /// Fire one bullet (subject to the bullet cap).
    Fire,
    /// Hold up for the whole step.
    MoveUp,
    /// Hold right for the whole step.
    MoveRight,
    /// Hold down for the whole step.
    MoveDown,
    /// Hold left for the whole step.
    MoveLeft,
    /// Do nothing.
    #[default]
    Idle,
}

impl Action {
    /// Number of distinct actions.
    pub const COUNT: usize = 6;

    /// Decode an action index (`0` fire, `1..=4` move up/right/down/left,
    /// `5` idle).
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidAction`] for any other index.
    pub fn from_index(index: u8) -> Result<Self> {
        match index {
            0 => Ok(Self::Fire),
            1 => Ok(Self::MoveUp),
            2 => Ok(Self::MoveRight),
            3 => Ok(Self::MoveDown),
            4 => Ok(Self::MoveLeft),
            5 => Ok(Self::Idle),
            other => Err(GameError::InvalidAction(other)),
        }
    }

    /// Index of this action.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Fire => 0,
            Self::MoveUp => 1,
            Self::MoveRight => 2,
            Self::MoveDown => 3,
            Self::MoveLeft => 4,
            Self::Idle => 5,
        }
    }

    /// Movement direction held by this action, if any.
    #[must_use]
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::MoveUp => Some(Direction::Up),
            Self::MoveRight => Some(Direction::Right),
            Self::MoveDown => Some(Direction::Down),
            Self::MoveLeft => Some(Direction::Left),
            Self::Fire | Self::Idle => None,
        }
    }
}

impl TryFrom<u8> for Action {
    type Error = GameError;

    fn try_from(value: u8) -> Result<Self> {
        Self::from_index(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_directions() {
        assert_eq!(Direction::Up.opposite(), Direction::Down);
        assert_eq!(Direction::Right.opposite(), Direction::Left);
        assert_eq!(Direction::Down.opposite(), Direction::Up);
        assert_eq!(Direction::Left.opposite(), Direction::Right);
    }

    #[test]
    fn test_action_index_round_trip() {
        for i in 0..6u8 {
            assert_eq!(Action::from_index(i).unwrap().index(), i);
        }
    }

    #[test]
    fn test_invalid_action_rejected() {
        let err = Action::from_index(6).unwrap_err();
        assert!(matches!(err, GameError::InvalidAction(6)));
    }
}
