//! Enemy navigation.
//!
//! Enemies do not search for routes. They pick a direction by a shuffled
//! priority list, look a few pixels ahead, and commit to a straight run of
//! random length expressed as per-tick waypoints. Whenever a waypoint turns
//! out to be blocked, a new run is generated from where the tank stands.
//!
//! All choices draw from the arena's seeded RNG, so navigation is fully
//! reproducible.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::components::{Direction, EntityId};
use crate::level::{ARENA_SIZE, TILE_SIZE};
use crate::math::{div_round_half_even, Point, Rect};
use crate::tank::{Surroundings, Tank, TANK_SIZE};

/// Distance looked ahead before committing to a direction.
const LOOKAHEAD_DISTANCE: i32 = 8;

/// Runs are a whole number of 32 px blocks plus this remainder.
const RUN_BLOCK: i32 = 32;
const RUN_EXTRA: i32 = 3;

/// Longest run, in blocks (one arena width).
const MAX_RUN_BLOCKS: i32 = 12;

/// Plan a new straight run for an enemy and store it as its path.
///
/// `direction` is tried first when given; its reverse is always the last
/// resort. With `fix_position` the tank is snapped to the lattice when it
/// actually turns.
pub fn generate_path<R: Rng + ?Sized>(
    tank: &mut Tank,
    direction: Option<Direction>,
    fix_position: bool,
    obstacles: &[Rect],
    rng: &mut R,
) {
    let opposite = direction.unwrap_or(tank.direction).opposite();

    let mut candidates: Vec<Direction> = Direction::ALL
        .into_iter()
        .filter(|d| *d != opposite)
        .collect();
    candidates.shuffle(rng);
    if let Some(preferred) = direction {
        candidates.retain(|d| *d != preferred);
        candidates.insert(0, preferred);
    }
    candidates.push(opposite);

    let new_direction = candidates
        .into_iter()
        .find(|d| is_open(tank.rect, *d, obstacles))
        .unwrap_or(opposite);

    let fix = fix_position && new_direction != tank.direction;
    tank.rotate(new_direction, fix);

    let length = rng.random_range(1..=MAX_RUN_BLOCKS) * RUN_BLOCK + RUN_EXTRA;
    let path = straight_run(tank.rect.top_left(), new_direction, length, tank.speed);
    if let Some(enemy) = tank.enemy_mut() {
        enemy.path = path.into();
    }
}

/// Advance an enemy by one waypoint.
///
/// Returns the ids of bonuses the enemy rolled over; the caller removes
/// them from the map.
pub fn navigate<R: Rng + ?Sized>(
    tank: &mut Tank,
    around: &Surroundings<'_>,
    rng: &mut R,
) -> Vec<EntityId> {
    if !tank.is_alive() || tank.paused || tank.paralysed {
        return Vec::new();
    }

    if tank.enemy().is_some_and(|enemy| enemy.path.is_empty()) {
        generate_path(tank, None, true, around.obstacles, rng);
    }
    let Some(next) = tank.enemy_mut().and_then(|enemy| enemy.path.pop_front()) else {
        return Vec::new();
    };

    let limit = ARENA_SIZE - TANK_SIZE;
    let outside = match tank.direction {
        Direction::Up => next.y < 0,
        Direction::Right => next.x > limit,
        Direction::Down => next.y > limit,
        Direction::Left => next.x < 0,
    };
    if outside {
        generate_path(tank, Some(tank.direction), true, around.obstacles, rng);
        return Vec::new();
    }

    let next_rect = tank.rect.moved_to(next);
    if next_rect.collides_any(around.obstacles) {
        generate_path(tank, Some(tank.direction), true, around.obstacles, rng);
        return Vec::new();
    }

    if next_rect.collides_any(around.tanks) {
        tank.turn_around();
        generate_path(tank, Some(tank.direction), false, around.obstacles, rng);
        return Vec::new();
    }

    let run_over = around
        .bonuses
        .iter()
        .filter(|(_, rect)| next_rect.collides(rect))
        .map(|(id, _)| *id)
        .collect();
    tank.rect = next_rect;
    run_over
}

/// Whether a tank at `rect` may start moving toward `direction`.
fn is_open(rect: Rect, direction: Direction, obstacles: &[Rect]) -> bool {
    let col = div_round_half_even(rect.x, TILE_SIZE);
    let row = div_round_half_even(rect.y, TILE_SIZE);
    let room = match direction {
        Direction::Up => row > 1,
        Direction::Right => col < 24,
        Direction::Down => row < 24,
        Direction::Left => col > 1,
    };
    if !room {
        return false;
    }
    let (dx, dy) = direction.delta();
    !rect
        .translate(dx * LOOKAHEAD_DISTANCE, dy * LOOKAHEAD_DISTANCE)
        .collides_any(obstacles)
}

/// Waypoints every `speed` pixels from `origin`, covering `length` pixels.
fn straight_run(origin: Point, direction: Direction, length: i32, speed: i32) -> Vec<Point> {
    let (dx, dy) = direction.delta();
    let step = usize::try_from(speed.max(1)).unwrap_or(1);
    (0..length)
        .step_by(step)
        .map(|px| origin.offset(dx * px, dy * px))
        .collect()
}
