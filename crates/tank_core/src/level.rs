//! Tile map, layout loading and per-stage enemy quotas.
//!
//! A level is a fixed 26x26 grid of 16 px tiles parsed from a plain-text
//! layout, one character per column:
//!
//! | Char | Tile |
//! |------|-------|
//! | `#`  | Brick |
//! | `@`  | Steel |
//! | `~`  | Water |
//! | `%`  | Grass |
//! | `-`  | Ice   |
//!
//! Any other character is empty ground. Characters beyond the 26th column or
//! rows beyond the 26th are ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::castle::CASTLE_RECT;
use crate::error::{GameError, Result};
use crate::math::{Point, Rect};
use crate::tank::EnemyKind;

/// Tile edge length in pixels.
pub const TILE_SIZE: i32 = 16;

/// Tiles per row and per column.
pub const GRID_SIZE: usize = 26;

/// Arena edge length in pixels.
pub const ARENA_SIZE: i32 = TILE_SIZE * GRID_SIZE as i32;

/// Maximum number of enemies on the map at once.
pub const MAX_ACTIVE_ENEMIES: usize = 4;

/// Number of stages with their own enemy quota.
pub const STAGE_COUNT: u32 = 35;

/// Cells `(col, row)` of the wall around the castle.
pub const FORTRESS_CELLS: [(usize, usize); 8] = [
    (11, 23),
    (11, 24),
    (11, 25),
    (14, 23),
    (14, 24),
    (14, 25),
    (12, 23),
    (13, 23),
];

/// Enemy counts `(basic, fast, power, armor)` for each stage.
pub const ENEMY_QUOTAS: [[u32; 4]; STAGE_COUNT as usize] = [
    [18, 2, 0, 0],
    [14, 4, 0, 2],
    [14, 4, 0, 2],
    [2, 5, 10, 3],
    [8, 5, 5, 2],
    [9, 2, 7, 2],
    [7, 4, 6, 3],
    [7, 4, 7, 2],
    [6, 4, 7, 3],
    [12, 2, 4, 2],
    [5, 5, 4, 6],
    [0, 6, 8, 6],
    [0, 8, 8, 4],
    [0, 4, 10, 6],
    [0, 2, 10, 8],
    [16, 2, 0, 2],
    [8, 2, 8, 2],
    [2, 8, 6, 4],
    [4, 4, 4, 8],
    [2, 8, 2, 8],
    [6, 2, 8, 4],
    [6, 8, 2, 4],
    [0, 10, 4, 6],
    [10, 4, 4, 2],
    [0, 8, 2, 10],
    [4, 6, 4, 6],
    [2, 8, 2, 8],
    [15, 2, 2, 1],
    [0, 4, 10, 6],
    [4, 8, 4, 4],
    [3, 8, 3, 6],
    [6, 4, 2, 8],
    [4, 4, 4, 8],
    [0, 10, 4, 6],
    [0, 6, 4, 10],
];

/// Enemy quota for a stage. Ids past the table reuse the final entry.
#[must_use]
pub fn quota_for(level_id: u32) -> [u32; 4] {
    let index = (level_id.max(1) - 1).min(STAGE_COUNT - 1) as usize;
    ENEMY_QUOTAS[index]
}

/// Stage that follows `level_id`, wrapping after the last stage.
#[must_use]
pub const fn next_level_id(level_id: u32) -> u32 {
    level_id % STAGE_COUNT + 1
}

/// Expand a stage quota into a shuffled spawn queue.
///
/// Enemies are taken from the end of the returned vector.
pub fn spawn_queue<R: Rng + ?Sized>(level_id: u32, rng: &mut R) -> Vec<EnemyKind> {
    let quota = quota_for(level_id);
    let mut queue: Vec<EnemyKind> = EnemyKind::ALL
        .iter()
        .zip(quota)
        .flat_map(|(kind, count)| std::iter::repeat(*kind).take(count as usize))
        .collect();
    queue.shuffle(rng);
    queue
}

/// Kind of a single map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TileKind {
    /// Open ground.
    #[default]
    Empty,
    /// Destroyed by any bullet.
    Brick,
    /// Destroyed only by power-2 bullets.
    Steel,
    /// Blocks tanks, bullets fly over.
    Water,
    /// Drawn above tanks, blocks nothing.
    Grass,
    /// Walkable.
    Ice,
}

impl TileKind {
    /// Decode a layout character.
    #[must_use]
    pub const fn from_char(c: char) -> Self {
        match c {
            '#' => Self::Brick,
            '@' => Self::Steel,
            '~' => Self::Water,
            '%' => Self::Grass,
            '-' => Self::Ice,
            _ => Self::Empty,
        }
    }

    /// Layout character for this tile (`.` for empty ground).
    #[must_use]
    pub const fn to_char(self) -> char {
        match self {
            Self::Empty => '.',
            Self::Brick => '#',
            Self::Steel => '@',
            Self::Water => '~',
            Self::Grass => '%',
            Self::Ice => '-',
        }
    }

    /// True if tanks cannot drive through this tile.
    #[must_use]
    pub const fn is_obstacle(self) -> bool {
        matches!(self, Self::Brick | Self::Steel | Self::Water)
    }
}

/// Pixel rectangle of the cell at `(col, row)`.
#[must_use]
pub const fn cell_rect(col: usize, row: usize) -> Rect {
    Rect::new(
        col as i32 * TILE_SIZE,
        row as i32 * TILE_SIZE,
        TILE_SIZE,
        TILE_SIZE,
    )
}

/// Mutable tile map of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Level {
    id: u32,
    tiles: Vec<TileKind>,
    /// Castle plus every obstacle tile, rebuilt after each mutation.
    obstacles: Vec<Rect>,
}

impl Level {
    /// Parse a text layout.
    #[must_use]
    pub fn parse(id: u32, layout: &str) -> Self {
        let mut tiles = vec![TileKind::Empty; GRID_SIZE * GRID_SIZE];
        for (row, line) in layout.lines().take(GRID_SIZE).enumerate() {
            for (col, c) in line.chars().take(GRID_SIZE).enumerate() {
                tiles[row * GRID_SIZE + col] = TileKind::from_char(c);
            }
        }
        let mut level = Self {
            id,
            tiles,
            obstacles: Vec::new(),
        };
        level.refresh_obstacles();
        level
    }

    /// Stage id this map was loaded for.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Tile at `(col, row)`; out-of-range cells read as empty.
    #[must_use]
    pub fn tile(&self, col: usize, row: usize) -> TileKind {
        if col >= GRID_SIZE || row >= GRID_SIZE {
            return TileKind::Empty;
        }
        self.tiles[row * GRID_SIZE + col]
    }

    /// Overwrite one cell and refresh the obstacle set.
    pub fn set_tile(&mut self, col: usize, row: usize, kind: TileKind) {
        if col < GRID_SIZE && row < GRID_SIZE {
            self.tiles[row * GRID_SIZE + col] = kind;
            self.refresh_obstacles();
        }
    }

    /// Row-major view of every cell.
    #[must_use]
    pub fn tiles(&self) -> &[TileKind] {
        &self.tiles
    }

    /// Current collidable rectangles: the castle followed by every brick,
    /// steel and water tile.
    #[must_use]
    pub fn obstacle_rects(&self) -> &[Rect] {
        &self.obstacles
    }

    /// Number of tiles of a given kind.
    #[must_use]
    pub fn count(&self, kind: TileKind) -> usize {
        self.tiles.iter().filter(|tile| **tile == kind).count()
    }

    /// Resolve a bullet striking the tile whose top-left corner is `position`.
    ///
    /// Returns `true` if the bullet is stopped. Brick is always destroyed,
    /// steel only when `power == 2`. Every other cell lets the bullet pass.
    pub fn hit_tile(&mut self, position: Point, power: u8) -> bool {
        let Some((col, row)) = cell_at(position) else {
            return false;
        };
        match self.tile(col, row) {
            TileKind::Brick => {
                self.set_tile(col, row, TileKind::Empty);
                true
            }
            TileKind::Steel => {
                if power == 2 {
                    self.set_tile(col, row, TileKind::Empty);
                }
                true
            }
            _ => false,
        }
    }

    /// Replace the eight cells around the castle with `kind`.
    pub fn build_fortress(&mut self, kind: TileKind) {
        for (col, row) in FORTRESS_CELLS {
            self.tiles[row * GRID_SIZE + col] = kind;
        }
        self.refresh_obstacles();
        debug!(level = self.id, ?kind, "Fortress rebuilt");
    }

    /// Render the map back to layout text.
    #[must_use]
    pub fn to_layout(&self) -> String {
        let mut out = String::with_capacity(GRID_SIZE * (GRID_SIZE + 1));
        for row in self.tiles.chunks(GRID_SIZE) {
            out.extend(row.iter().map(|tile| tile.to_char()));
            out.push('\n');
        }
        out
    }

    fn refresh_obstacles(&mut self) {
        self.obstacles.clear();
        self.obstacles.push(CASTLE_RECT);
        for (index, tile) in self.tiles.iter().enumerate() {
            if tile.is_obstacle() {
                self.obstacles
                    .push(cell_rect(index % GRID_SIZE, index / GRID_SIZE));
            }
        }
    }
}

/// Grid cell whose top-left corner is exactly `position`.
fn cell_at(position: Point) -> Option<(usize, usize)> {
    if position.x < 0
        || position.y < 0
        || position.x % TILE_SIZE != 0
        || position.y % TILE_SIZE != 0
    {
        return None;
    }
    let col = (position.x / TILE_SIZE) as usize;
    let row = (position.y / TILE_SIZE) as usize;
    (col < GRID_SIZE && row < GRID_SIZE).then_some((col, row))
}

const BUILTIN_LAYOUTS: [(u32, &str); 2] = [
    (1, include_str!("../levels/1")),
    (2, include_str!("../levels/2")),
];

/// Source of stage layouts.
///
/// Lookup order is inline layouts first, then `<directory>/<id>` on disk.
#[derive(Debug, Clone, Default)]
pub struct LevelLibrary {
    layouts: BTreeMap<u32, String>,
    directory: Option<PathBuf>,
}

impl LevelLibrary {
    /// Library holding only the embedded stages.
    #[must_use]
    pub fn builtin() -> Self {
        let mut library = Self::default();
        for (id, layout) in BUILTIN_LAYOUTS {
            library.insert(id, layout);
        }
        library
    }

    /// Library with no layouts at all.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Also look for layouts named by id inside `directory`.
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Register an inline layout, replacing any previous one.
    pub fn insert(&mut self, id: u32, layout: impl Into<String>) {
        self.layouts.insert(id, layout.into());
    }

    /// Layout directory, if one was configured.
    #[must_use]
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// True if an inline layout or a layout file exists for `id`.
    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.layouts.contains_key(&id) || self.layout_path(id).is_some_and(|path| path.is_file())
    }

    /// Ids of the inline layouts.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.layouts.keys().copied()
    }

    /// Load and parse the layout for `id`.
    ///
    /// # Errors
    ///
    /// [`GameError::LevelNotFound`] if there is no backing layout,
    /// [`GameError::LevelParse`] if the file is not valid UTF-8, and
    /// [`GameError::Io`] for other read failures.
    pub fn load(&self, id: u32) -> Result<Level> {
        if let Some(layout) = self.layouts.get(&id) {
            return Ok(Level::parse(id, layout));
        }
        let path = self
            .layout_path(id)
            .filter(|path| path.is_file())
            .ok_or(GameError::LevelNotFound(id))?;
        let bytes = fs::read(&path)?;
        let text = String::from_utf8(bytes).map_err(|e| GameError::LevelParse {
            level: id,
            message: e.to_string(),
        })?;
        debug!(level = id, path = %path.display(), "Layout read from disk");
        Ok(Level::parse(id, &text))
    }

    fn layout_path(&self, id: u32) -> Option<PathBuf> {
        self.directory.as_ref().map(|dir| dir.join(id.to_string()))
    }
}
