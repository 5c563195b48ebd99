//! Observation encoders.
//!
//! The arena exposes its state to external controllers in one of three
//! encodings, chosen by [`ObservationMode`]:
//!
//! | Mode | Shape | Element |
//! |------|-------|---------|
//! | Pixels | 416 x 416 x 3, row-major RGB | `u8` |
//! | Grid | 26 x 26, row-major | `u8` cell code |
//! | Features | 24 | `f32` |
//!
//! Encoders only read the arena; calling one never changes simulation state.

use serde::{Deserialize, Serialize};

use crate::bullet::Bullet;
use crate::castle::CastleState;
use crate::components::Side;
use crate::config::ObservationMode;
use crate::level::{cell_rect, TileKind, ARENA_SIZE, GRID_SIZE, TILE_SIZE};
use crate::math::{Point, Rect};
use crate::simulation::Arena;
use crate::tank::{Tank, TankState};

/// Length of the feature vector.
pub const FEATURE_LEN: usize = 24;

/// Nearest enemies included in the feature vector.
pub const FEATURE_ENEMIES: usize = 4;

/// Nearest enemy bullets included in the feature vector.
pub const FEATURE_ENEMY_BULLETS: usize = 5;

/// Length of the grid encoding.
pub const GRID_LEN: usize = GRID_SIZE * GRID_SIZE;

/// Length of the pixel encoding.
pub const PIXEL_LEN: usize = (ARENA_SIZE * ARENA_SIZE * 3) as usize;

/// Grid cell codes. Tile codes come first, overlays after.
pub mod cell {
    /// Nothing.
    pub const EMPTY: u8 = 0;
    /// Brick wall.
    pub const BRICK: u8 = 1;
    /// Steel wall.
    pub const STEEL: u8 = 2;
    /// Water.
    pub const WATER: u8 = 3;
    /// Grass.
    pub const GRASS: u8 = 4;
    /// Ice.
    pub const ICE: u8 = 5;
    /// Castle.
    pub const CASTLE: u8 = 6;
    /// Bonus pickup.
    pub const BONUS: u8 = 7;
    /// Enemy tank.
    pub const ENEMY: u8 = 8;
    /// Player tank.
    pub const PLAYER: u8 = 9;
    /// Bullet in flight.
    pub const BULLET: u8 = 10;
}

/// One encoded observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Observation {
    /// RGB frame buffer.
    Pixels(Vec<u8>),
    /// Tile-category grid.
    Grid(Vec<u8>),
    /// Numeric features.
    Features(Vec<f32>),
}

impl Observation {
    /// Which encoder produced this observation.
    #[must_use]
    pub const fn mode(&self) -> ObservationMode {
        match self {
            Self::Pixels(_) => ObservationMode::Pixels,
            Self::Grid(_) => ObservationMode::Grid,
            Self::Features(_) => ObservationMode::Features,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Pixels(data) | Self::Grid(data) => data.len(),
            Self::Features(data) => data.len(),
        }
    }

    /// True for a zero-length observation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Feature slice, if this is a feature observation.
    #[must_use]
    pub fn as_features(&self) -> Option<&[f32]> {
        match self {
            Self::Features(data) => Some(data),
            Self::Pixels(_) | Self::Grid(_) => None,
        }
    }

    /// Byte slice, if this is a pixel or grid observation.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Pixels(data) | Self::Grid(data) => Some(data),
            Self::Features(_) => None,
        }
    }
}

/// Encode the arena with the given encoder.
#[must_use]
pub fn encode(arena: &Arena, mode: ObservationMode) -> Observation {
    match mode {
        ObservationMode::Pixels => Observation::Pixels(pixels(arena)),
        ObservationMode::Grid => Observation::Grid(grid(arena)),
        ObservationMode::Features => Observation::Features(features(arena)),
    }
}

/// Feature vector relative to player one.
///
/// Layout: facing index, reload flag, own bullet, 4 nearest enemies,
/// 5 nearest enemy bullets, castle. Every entity is a (distance, angle)
/// pair with distance divided by the arena size and angle by pi. Missing
/// entities are zero pairs. Without a player the vector is all zeros.
#[must_use]
pub fn features(arena: &Arena) -> Vec<f32> {
    let mut out = vec![0.0; FEATURE_LEN];
    let Some(player) = arena.players().first() else {
        return out;
    };
    let origin = player.rect.center();

    let in_flight = arena
        .bullets()
        .iter()
        .filter(|bullet| bullet.owner == player.id && bullet.is_active())
        .count();
    out[0] = player.direction.index() as f32;
    out[1] = if player.can_fire(in_flight) { 1.0 } else { 0.0 };

    let mut slot = 2;
    let own = arena
        .bullets()
        .iter()
        .find(|bullet| bullet.owner == player.id && bullet.is_active())
        .map(|bullet| bullet.rect.center());
    write_polar(&mut out, &mut slot, origin, own.into_iter(), 1);

    let enemies = nearest(
        origin,
        arena
            .enemies()
            .iter()
            .filter(|enemy| matches!(enemy.state, TankState::Spawning | TankState::Alive))
            .map(|enemy| enemy.rect.center()),
    );
    write_polar(&mut out, &mut slot, origin, enemies.into_iter(), FEATURE_ENEMIES);

    let shots = nearest(
        origin,
        arena
            .bullets()
            .iter()
            .filter(|bullet| bullet.is_active() && bullet.owner_side() == Side::Enemy)
            .map(|bullet| bullet.rect.center()),
    );
    write_polar(&mut out, &mut slot, origin, shots.into_iter(), FEATURE_ENEMY_BULLETS);

    let castle = Some(arena.castle().rect.center());
    write_polar(&mut out, &mut slot, origin, castle.into_iter(), 1);

    out
}

fn nearest(origin: Point, points: impl Iterator<Item = Point>) -> Vec<Point> {
    let mut points: Vec<Point> = points.collect();
    points.sort_by_key(|point| {
        let dx = i64::from(point.x - origin.x);
        let dy = i64::from(point.y - origin.y);
        dx * dx + dy * dy
    });
    points
}

fn write_polar(
    out: &mut [f32],
    slot: &mut usize,
    origin: Point,
    points: impl Iterator<Item = Point>,
    count: usize,
) {
    for (index, point) in points.take(count).enumerate() {
        let at = *slot + index * 2;
        let dx = (point.x - origin.x) as f32;
        let dy = (point.y - origin.y) as f32;
        out[at] = dx.hypot(dy) / ARENA_SIZE as f32;
        out[at + 1] = dy.atan2(dx) / std::f32::consts::PI;
    }
    // unused pairs stay zero
    *slot += count * 2;
}

/// Tile-category grid with entity overlays.
///
/// Each cell starts as its tile code; the castle, active bonuses, enemies,
/// players and active bullets are then written over every cell they touch,
/// in that order.
#[must_use]
pub fn grid(arena: &Arena) -> Vec<u8> {
    let mut out: Vec<u8> = arena.level().tiles().iter().map(|tile| tile_code(*tile)).collect();
    out.resize(GRID_LEN, cell::EMPTY);

    mark(&mut out, arena.castle().rect, cell::CASTLE);
    for bonus in arena.bonuses().iter().filter(|bonus| bonus.active) {
        mark(&mut out, bonus.rect, cell::BONUS);
    }
    for enemy in arena.enemies().iter().filter(|tank| tank.state != TankState::Dead) {
        mark(&mut out, enemy.rect, cell::ENEMY);
    }
    for player in arena.players().iter().filter(|tank| tank.state != TankState::Dead) {
        mark(&mut out, player.rect, cell::PLAYER);
    }
    for bullet in arena.bullets().iter().filter(|bullet| bullet.is_active()) {
        mark(&mut out, bullet.rect, cell::BULLET);
    }
    out
}

const fn tile_code(tile: TileKind) -> u8 {
    match tile {
        TileKind::Empty => cell::EMPTY,
        TileKind::Brick => cell::BRICK,
        TileKind::Steel => cell::STEEL,
        TileKind::Water => cell::WATER,
        TileKind::Grass => cell::GRASS,
        TileKind::Ice => cell::ICE,
    }
}

fn mark(grid: &mut [u8], rect: Rect, code: u8) {
    let Some((cols, rows)) = covered_cells(rect) else {
        return;
    };
    for row in rows {
        for col in cols.clone() {
            grid[row * GRID_SIZE + col] = code;
        }
    }
}

/// Column and row ranges of the tiles a rect overlaps, clipped to the grid.
fn covered_cells(rect: Rect) -> Option<(std::ops::Range<usize>, std::ops::Range<usize>)> {
    let max = GRID_SIZE as i32 - 1;
    if rect.w <= 0 || rect.h <= 0 || rect.right() <= 0 || rect.bottom() <= 0 {
        return None;
    }
    let first_col = (rect.x / TILE_SIZE).clamp(0, max);
    let last_col = ((rect.right() - 1) / TILE_SIZE).clamp(0, max);
    let first_row = (rect.y / TILE_SIZE).clamp(0, max);
    let last_row = ((rect.bottom() - 1) / TILE_SIZE).clamp(0, max);
    let range = |first: i32, last: i32| {
        usize::try_from(first).unwrap_or(0)..usize::try_from(last).unwrap_or(0) + 1
    };
    Some((range(first_col, last_col), range(first_row, last_row)))
}

type Rgb = [u8; 3];

const BRICK: Rgb = [164, 72, 8];
const STEEL: Rgb = [188, 188, 188];
const WATER: Rgb = [56, 80, 248];
const GRASS: Rgb = [48, 128, 0];
const ICE: Rgb = [220, 220, 252];
const CASTLE: Rgb = [252, 216, 168];
const RUBBLE: Rgb = [96, 96, 96];
const BONUS: Rgb = [248, 56, 0];
const ENEMY: Rgb = [160, 160, 160];
const CARRIER: Rgb = [216, 40, 0];
const PLAYER: Rgb = [232, 208, 32];
const SHIELD: Rgb = [252, 252, 252];
const BULLET: Rgb = [255, 255, 255];
const EXPLOSION: Rgb = [252, 120, 56];

/// Flat-colour RGB frame.
///
/// Draw order: tiles except grass, castle, visible bonuses, enemies,
/// players, bullets, explosions, grass.
#[must_use]
pub fn pixels(arena: &Arena) -> Vec<u8> {
    let mut frame = vec![0u8; PIXEL_LEN];
    let level = arena.level();

    for row in 0..GRID_SIZE {
        for col in 0..GRID_SIZE {
            let colour = match level.tile(col, row) {
                TileKind::Brick => BRICK,
                TileKind::Steel => STEEL,
                TileKind::Water => WATER,
                TileKind::Ice => ICE,
                TileKind::Empty | TileKind::Grass => continue,
            };
            fill(&mut frame, cell_rect(col, row), colour);
        }
    }

    let castle = arena.castle();
    let castle_colour = if castle.state == CastleState::Standing {
        CASTLE
    } else {
        RUBBLE
    };
    fill(&mut frame, castle.rect, castle_colour);

    for bonus in arena.bonuses().iter().filter(|bonus| bonus.active && bonus.visible) {
        fill(&mut frame, bonus.rect, BONUS);
    }
    for enemy in arena.enemies() {
        draw_tank(&mut frame, enemy);
    }
    for player in arena.players() {
        draw_tank(&mut frame, player);
    }
    for bullet in arena.bullets() {
        draw_bullet(&mut frame, bullet);
    }
    if let Some(explosion) = castle.explosion {
        fill(&mut frame, Rect::at(explosion.position, 64, 64), EXPLOSION);
    }

    for row in 0..GRID_SIZE {
        for col in 0..GRID_SIZE {
            if level.tile(col, row) == TileKind::Grass {
                fill(&mut frame, cell_rect(col, row), GRASS);
            }
        }
    }
    frame
}

fn draw_tank(frame: &mut [u8], tank: &Tank) {
    match tank.state {
        TankState::Spawning => {
            // spawn star alternates between a small and a large square
            let inset = if tank.spawn_frame == 0 { 9 } else { 4 };
            let rect = tank.rect;
            fill(
                frame,
                Rect::new(rect.x + inset, rect.y + inset, rect.w - 2 * inset, rect.h - 2 * inset),
                SHIELD,
            );
        }
        TankState::Alive => {
            let colour = match tank.side() {
                Side::Player => PLAYER,
                Side::Enemy if tank.flash => CARRIER,
                Side::Enemy => ENEMY,
            };
            fill(frame, tank.rect, colour);
            if tank.shielded && tank.shield_frame == 0 {
                outline(frame, tank.rect, SHIELD);
            }
        }
        TankState::Exploding => {
            if let Some(explosion) = tank.explosion {
                fill(frame, Rect::at(explosion.position, 64, 64), EXPLOSION);
            }
        }
        TankState::Dead => {}
    }
}

fn draw_bullet(frame: &mut [u8], bullet: &Bullet) {
    if bullet.is_active() {
        fill(frame, bullet.rect, BULLET);
    } else if let Some(explosion) = bullet.explosion {
        fill(frame, Rect::at(explosion.position, 32, 32), EXPLOSION);
    }
}

fn fill(frame: &mut [u8], rect: Rect, colour: Rgb) {
    let size = ARENA_SIZE;
    let x0 = rect.x.clamp(0, size);
    let x1 = rect.right().clamp(0, size);
    let y0 = rect.y.clamp(0, size);
    let y1 = rect.bottom().clamp(0, size);
    for y in y0..y1 {
        for x in x0..x1 {
            let offset = ((y * size + x) * 3) as usize;
            frame[offset..offset + 3].copy_from_slice(&colour);
        }
    }
}

fn outline(frame: &mut [u8], rect: Rect, colour: Rgb) {
    fill(frame, Rect::new(rect.x, rect.y, rect.w, 1), colour);
    fill(frame, Rect::new(rect.x, rect.bottom() - 1, rect.w, 1), colour);
    fill(frame, Rect::new(rect.x, rect.y, 1, rect.h), colour);
    fill(frame, Rect::new(rect.right() - 1, rect.y, 1, rect.h), colour);
}

/// Colour of the pixel at `(x, y)` in a pixel observation.
#[must_use]
pub fn pixel_at(frame: &[u8], x: i32, y: i32) -> Option<Rgb> {
    if !(0..ARENA_SIZE).contains(&x) || !(0..ARENA_SIZE).contains(&y) {
        return None;
    }
    let offset = usize::try_from((y * ARENA_SIZE + x) * 3).ok()?;
    frame
        .get(offset..offset + 3)
        .and_then(|bytes| bytes.try_into().ok())
}
