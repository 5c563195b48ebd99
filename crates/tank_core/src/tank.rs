//! Shared tank record with player and enemy variants.
//!
//! Every tank carries the same movement, firing and damage state. What
//! differs between a player and an enemy lives in [`Role`]: lives, score and
//! trophies on one side, enemy kind, bonus-carrier flag and planned path on
//! the other.
//!
//! Methods here only touch the tank itself. Anything that needs other
//! entities (the bullet list, timers, the tile map) goes through the arena
//! or takes the relevant collections as arguments.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::bullet::{Bullet, FAST_BULLET_SPEED};
use crate::components::{Direction, EntityId, Side};
use crate::explosion::Explosion;
use crate::level::ARENA_SIZE;
use crate::math::{nearest, Point, Rect};
use crate::timer::TimerHandle;

/// Tank footprint edge in pixels.
pub const TANK_SIZE: i32 = 26;

/// Default speed in pixels per tick.
pub const DEFAULT_SPEED: i32 = 2;

/// Default (and player) health.
pub const DEFAULT_HEALTH: i32 = 100;

/// Highest superpower level.
pub const MAX_SUPERPOWERS: u8 = 3;

/// Enemy variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyKind {
    /// Slow.
    Basic,
    /// Fast.
    Fast,
    /// Fires fast bullets.
    Power,
    /// Takes four hits.
    Armor,
}

impl EnemyKind {
    /// All kinds in quota order.
    pub const ALL: [EnemyKind; 4] = [
        EnemyKind::Basic,
        EnemyKind::Fast,
        EnemyKind::Power,
        EnemyKind::Armor,
    ];

    /// Position in the quota table.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Basic => 0,
            Self::Fast => 1,
            Self::Power => 2,
            Self::Armor => 3,
        }
    }

    /// Points awarded for a kill.
    #[must_use]
    pub const fn points(self) -> u32 {
        (self.index() as u32 + 1) * 100
    }

    const fn speed(self) -> i32 {
        match self {
            Self::Basic => 1,
            Self::Fast => 3,
            Self::Power | Self::Armor => DEFAULT_SPEED,
        }
    }

    const fn health(self) -> i32 {
        match self {
            Self::Armor => 400,
            _ => DEFAULT_HEALTH,
        }
    }

    const fn superpowers(self) -> u8 {
        match self {
            Self::Power => 1,
            _ => 0,
        }
    }
}

/// Tank lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TankState {
    /// Entry animation; cannot move, fire or be hit.
    Spawning,
    /// Normal play.
    Alive,
    /// Explosion running; immobile and not hittable.
    Exploding,
    /// Waiting to be reaped.
    Dead,
}

/// Per-stage kill and pickup counters of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Trophies {
    /// Bonuses collected.
    pub bonus: u32,
    /// Kills per [`EnemyKind`] index.
    pub enemies: [u32; 4],
}

impl Trophies {
    /// Counter by name: `bonus` or `enemy0` to `enemy3`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<u32> {
        match key {
            "bonus" => Some(self.bonus),
            "enemy0" => Some(self.enemies[0]),
            "enemy1" => Some(self.enemies[1]),
            "enemy2" => Some(self.enemies[2]),
            "enemy3" => Some(self.enemies[3]),
            _ => None,
        }
    }

    /// Total enemies destroyed.
    #[must_use]
    pub fn kills(&self) -> u32 {
        self.enemies.iter().sum()
    }
}

/// State only players have.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerData {
    /// Player slot (0 or 1).
    pub slot: usize,
    /// Remaining lives, including the current one.
    pub lives: u32,
    /// Cumulative score.
    pub score: u32,
    /// Per-stage counters.
    pub trophies: Trophies,
    /// Respawn position.
    pub start_position: Point,
    /// Respawn facing.
    pub start_direction: Direction,
    /// Bonus overlapped this tick, granted during bonus resolution.
    pub pending_bonus: Option<EntityId>,
    /// Direction held for the current step.
    pub pressed: Option<Direction>,
}

/// State only enemies have.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnemyData {
    /// Variant.
    pub kind: EnemyKind,
    /// Drops a bonus when destroyed.
    pub carrier: bool,
    /// Upcoming waypoints (tank top-left positions).
    pub path: VecDeque<Point>,
    /// Auto-fire timer.
    pub fire_timer: Option<TimerHandle>,
    /// Carrier flash timer.
    pub flash_timer: Option<TimerHandle>,
}

/// Variant-specific part of a tank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Human or agent controlled.
    Player(PlayerData),
    /// Computer controlled.
    Enemy(EnemyData),
}

/// Timer handles a tank may own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TankTimers {
    /// Spawn animation toggle.
    pub spawn_animation: Option<TimerHandle>,
    /// End of the spawning phase.
    pub spawn_end: Option<TimerHandle>,
    /// Shield flicker toggle.
    pub shield_flicker: Option<TimerHandle>,
    /// Shield expiry.
    pub shield_expire: Option<TimerHandle>,
    /// Paralysis expiry.
    pub paralysis: Option<TimerHandle>,
}

/// Result of a bullet striking a tank. The bullet is consumed in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactOutcome {
    /// Shield took the hit.
    Absorbed,
    /// Health reduced, tank survives.
    Damaged,
    /// Health ran out; the caller must explode the tank.
    Destroyed,
    /// Enemy-on-enemy hit, or a player that is already paralysed.
    Ignored,
    /// Player-on-player hit; the caller must schedule the paralysis end.
    Paralysed,
}

/// Obstacles and neighbours a tank has to respect while moving.
#[derive(Debug, Clone, Copy)]
pub struct Surroundings<'a> {
    /// Tile obstacles plus the castle.
    pub obstacles: &'a [Rect],
    /// Tanks this one must not drive into.
    pub tanks: &'a [Rect],
    /// Bonuses on the map.
    pub bonuses: &'a [(EntityId, Rect)],
}

/// A player or enemy tank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tank {
    /// Entity id.
    pub id: EntityId,
    /// Footprint.
    pub rect: Rect,
    /// Facing.
    pub direction: Direction,
    /// Remaining health.
    pub health: i32,
    /// Pixels per move.
    pub speed: i32,
    /// Lifecycle.
    pub state: TankState,
    /// Cannot move (player friendly fire).
    pub paralysed: bool,
    /// Cannot move or fire (time freeze).
    pub paused: bool,
    /// Immune to bullets.
    pub shielded: bool,
    /// Offensive upgrade tier, 0 to 3.
    pub superpowers: u8,
    /// Cap on simultaneously active bullets.
    pub max_active_bullets: usize,
    /// Running explosion while exploding.
    pub explosion: Option<Explosion>,
    /// Spawn animation frame (0 or 1).
    pub spawn_frame: u8,
    /// Shield animation frame (0 or 1).
    pub shield_frame: u8,
    /// Carrier flash state.
    pub flash: bool,
    /// Owned timer handles.
    pub timers: TankTimers,
    /// Player or enemy part.
    pub role: Role,
}

impl Tank {
    fn base(id: EntityId, position: Point, direction: Direction, role: Role) -> Self {
        Self {
            id,
            rect: Rect::at(position, TANK_SIZE, TANK_SIZE),
            direction,
            health: DEFAULT_HEALTH,
            speed: DEFAULT_SPEED,
            state: TankState::Spawning,
            paralysed: false,
            paused: false,
            shielded: false,
            superpowers: 0,
            max_active_bullets: 1,
            explosion: None,
            spawn_frame: 0,
            shield_frame: 0,
            flash: false,
            timers: TankTimers::default(),
            role,
        }
    }

    /// Create a player tank. It stays `Spawning` until [`Tank::respawn`].
    #[must_use]
    pub fn new_player(id: EntityId, slot: usize, lives: u32, start_position: Point) -> Self {
        Self::base(
            id,
            start_position,
            Direction::Up,
            Role::Player(PlayerData {
                slot,
                lives,
                score: 0,
                trophies: Trophies::default(),
                start_position,
                start_direction: Direction::Up,
                pending_bonus: None,
                pressed: None,
            }),
        )
    }

    /// Create a spawning enemy of `kind`.
    #[must_use]
    pub fn new_enemy(
        id: EntityId,
        kind: EnemyKind,
        position: Point,
        direction: Direction,
        carrier: bool,
    ) -> Self {
        let mut tank = Self::base(
            id,
            position,
            direction,
            Role::Enemy(EnemyData {
                kind,
                carrier,
                path: VecDeque::new(),
                fire_timer: None,
                flash_timer: None,
            }),
        );
        tank.speed = kind.speed();
        tank.health = kind.health();
        tank.superpowers = kind.superpowers();
        tank
    }

    /// Which side this tank fights for.
    #[must_use]
    pub const fn side(&self) -> Side {
        match self.role {
            Role::Player(_) => Side::Player,
            Role::Enemy(_) => Side::Enemy,
        }
    }

    /// True in the `Alive` state.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state == TankState::Alive
    }

    /// Player part, if this is a player.
    #[must_use]
    pub const fn player(&self) -> Option<&PlayerData> {
        match &self.role {
            Role::Player(data) => Some(data),
            Role::Enemy(_) => None,
        }
    }

    /// Mutable player part.
    pub fn player_mut(&mut self) -> Option<&mut PlayerData> {
        match &mut self.role {
            Role::Player(data) => Some(data),
            Role::Enemy(_) => None,
        }
    }

    /// Enemy part, if this is an enemy.
    #[must_use]
    pub const fn enemy(&self) -> Option<&EnemyData> {
        match &self.role {
            Role::Enemy(data) => Some(data),
            Role::Player(_) => None,
        }
    }

    /// Mutable enemy part.
    pub fn enemy_mut(&mut self) -> Option<&mut EnemyData> {
        match &mut self.role {
            Role::Enemy(data) => Some(data),
            Role::Player(_) => None,
        }
    }

    /// True for an enemy flagged to drop a bonus.
    #[must_use]
    pub fn is_carrier(&self) -> bool {
        self.enemy().is_some_and(|enemy| enemy.carrier)
    }

    /// Face `direction`. With `fix_position`, snap each axis to the 8 px
    /// lattice (offset by 3) when it is within 4 px of it.
    pub fn rotate(&mut self, direction: Direction, fix_position: bool) {
        self.direction = direction;
        if fix_position {
            let new_x = nearest(self.rect.x, 8) + 3;
            let new_y = nearest(self.rect.y, 8) + 3;
            if (self.rect.x - new_x).abs() < 5 {
                self.rect.x = new_x;
            }
            if (self.rect.y - new_y).abs() < 5 {
                self.rect.y = new_y;
            }
        }
    }

    /// Face the opposite way without snapping.
    pub fn turn_around(&mut self) {
        self.rotate(self.direction.opposite(), false);
    }

    /// Start exploding. Returns false if already exploding or dead.
    pub fn explode(&mut self) -> bool {
        if matches!(self.state, TankState::Exploding | TankState::Dead) {
            return false;
        }
        self.state = TankState::Exploding;
        self.explosion = Some(Explosion::at(self.rect.top_left()));
        true
    }

    /// Finish the explosion once its animation is over.
    pub fn update(&mut self) {
        if self.state == TankState::Exploding
            && !self.explosion.is_some_and(|explosion| explosion.active)
        {
            self.state = TankState::Dead;
            self.explosion = None;
        }
    }

    /// Whether a new bullet may be fired given how many of this tank's
    /// bullets are still active.
    #[must_use]
    pub fn can_fire(&self, active_bullets: usize) -> bool {
        self.is_alive() && !self.paused && active_bullets < self.max_active_bullets
    }

    /// Build the bullet this tank would fire now.
    #[must_use]
    pub fn make_bullet(&self, id: EntityId) -> Bullet {
        let mut bullet = Bullet::fired_from(
            id,
            self.id,
            self.side(),
            self.rect.top_left(),
            self.direction,
        );
        if self.superpowers > 0 {
            bullet.speed = FAST_BULLET_SPEED;
        }
        if self.superpowers > 2 {
            bullet.power = 2;
        }
        bullet
    }

    /// Apply a bullet hit to this tank's own state.
    ///
    /// Side effects on other entities (explosion timers, kill credit,
    /// paralysis timer) are left to the caller based on the outcome.
    pub fn take_hit(&mut self, friendly_fire: bool, damage: i32) -> ImpactOutcome {
        if self.shielded {
            return ImpactOutcome::Absorbed;
        }
        if !friendly_fire {
            self.health -= damage;
            return if self.health < 1 {
                ImpactOutcome::Destroyed
            } else {
                ImpactOutcome::Damaged
            };
        }
        match self.side() {
            Side::Enemy => ImpactOutcome::Ignored,
            Side::Player if self.paralysed => ImpactOutcome::Ignored,
            Side::Player => {
                self.paralysed = true;
                ImpactOutcome::Paralysed
            }
        }
    }

    /// Add one superpower level. Returns the new level.
    pub fn power_up(&mut self) -> u8 {
        self.superpowers = (self.superpowers + 1).min(MAX_SUPERPOWERS);
        if self.superpowers == 2 {
            self.max_active_bullets = 2;
        }
        self.superpowers
    }

    /// Put a player back at its start position, alive.
    ///
    /// With `keep_powers` the superpower level and bullet cap survive
    /// (stage transition); otherwise they are reset (lost life).
    pub fn respawn(&mut self, keep_powers: bool) {
        let Some((position, direction)) = self
            .player()
            .map(|player| (player.start_position, player.start_direction))
        else {
            return;
        };
        self.rotate(direction, false);
        self.rect = self.rect.moved_to(position);
        if !keep_powers {
            self.superpowers = 0;
            self.max_active_bullets = 1;
        }
        self.health = DEFAULT_HEALTH;
        self.paralysed = false;
        self.paused = false;
        self.explosion = None;
        self.state = TankState::Alive;
        if let Some(player) = self.player_mut() {
            player.pressed = None;
            player.pending_bonus = None;
        }
    }

    /// Move a player one step toward `direction`.
    ///
    /// Turning snaps the tank to the lattice. The move is dropped if it
    /// would leave the arena or overlap an obstacle or a tank in
    /// `around.tanks`. Returns the last bonus the new position overlaps.
    pub fn drive(&mut self, direction: Direction, around: &Surroundings<'_>) -> Option<EntityId> {
        if !self.is_alive() {
            return None;
        }
        if self.direction != direction {
            self.rotate(direction, true);
        }
        if self.paralysed {
            return None;
        }

        let (dx, dy) = direction.delta();
        let next = self.rect.translate(dx * self.speed, dy * self.speed);
        if !in_bounds(next) {
            return None;
        }
        if next.collides_any(around.obstacles) || next.collides_any(around.tanks) {
            return None;
        }

        let bonus = around
            .bonuses
            .iter()
            .filter(|(_, rect)| next.collides(rect))
            .map(|(id, _)| *id)
            .last();
        self.rect = next;
        bonus
    }
}

/// True if a tank footprint lies inside the arena.
#[must_use]
pub const fn in_bounds(rect: Rect) -> bool {
    rect.x >= 0 && rect.y >= 0 && rect.x <= ARENA_SIZE - TANK_SIZE && rect.y <= ARENA_SIZE - TANK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Tank {
        let mut tank = Tank::new_player(1, 0, 3, Point::new(131, 387));
        tank.respawn(false);
        tank
    }

    fn open() -> Surroundings<'static> {
        Surroundings {
            obstacles: &[],
            tanks: &[],
            bonuses: &[],
        }
    }

    #[test]
    fn test_enemy_kind_stats() {
        let armor = Tank::new_enemy(2, EnemyKind::Armor, Point::new(3, 3), Direction::Down, false);
        assert_eq!(armor.health, 400);
        assert_eq!(armor.speed, DEFAULT_SPEED);
        let fast = Tank::new_enemy(3, EnemyKind::Fast, Point::new(3, 3), Direction::Down, false);
        assert_eq!(fast.speed, 3);
        let power = Tank::new_enemy(4, EnemyKind::Power, Point::new(3, 3), Direction::Down, false);
        assert_eq!(power.make_bullet(10).speed, FAST_BULLET_SPEED);
        assert_eq!(EnemyKind::Armor.points(), 400);
    }

    #[test]
    fn test_shield_absorbs_any_damage() {
        let mut tank = player();
        tank.shielded = true;
        assert_eq!(tank.take_hit(false, 10_000), ImpactOutcome::Absorbed);
        assert_eq!(tank.health, DEFAULT_HEALTH);
        assert_eq!(tank.state, TankState::Alive);
    }

    #[test]
    fn test_damage_and_destroy() {
        let mut tank = Tank::new_enemy(2, EnemyKind::Armor, Point::new(3, 3), Direction::Down, false);
        tank.state = TankState::Alive;
        for _ in 0..3 {
            assert_eq!(tank.take_hit(false, 100), ImpactOutcome::Damaged);
        }
        assert_eq!(tank.take_hit(false, 100), ImpactOutcome::Destroyed);
    }

    #[test]
    fn test_friendly_fire_rules() {
        let mut enemy = Tank::new_enemy(2, EnemyKind::Basic, Point::new(3, 3), Direction::Down, false);
        enemy.state = TankState::Alive;
        assert_eq!(enemy.take_hit(true, 100), ImpactOutcome::Ignored);
        assert_eq!(enemy.health, DEFAULT_HEALTH);

        let mut tank = player();
        assert_eq!(tank.take_hit(true, 100), ImpactOutcome::Paralysed);
        assert!(tank.paralysed);
        assert_eq!(tank.take_hit(true, 100), ImpactOutcome::Ignored);
        assert_eq!(tank.health, DEFAULT_HEALTH);
    }

    #[test]
    fn test_explode_is_monotonic() {
        let mut tank = player();
        assert!(tank.explode());
        assert!(!tank.explode());
        tank.update();
        assert_eq!(tank.state, TankState::Exploding);
        if let Some(explosion) = tank.explosion.as_mut() {
            explosion.active = false;
        }
        tank.update();
        assert_eq!(tank.state, TankState::Dead);
        assert!(!tank.explode());
    }

    #[test]
    fn test_rotate_snaps_near_lattice() {
        let mut tank = player();
        tank.rect = tank.rect.moved_to(Point::new(129, 387));
        tank.rotate(Direction::Left, true);
        // nearest(129, 8) + 3 = 131
        assert_eq!(tank.rect.x, 131);
    }

    #[test]
    fn test_power_up_bullet_cap() {
        let mut tank = player();
        tank.power_up();
        assert_eq!(tank.max_active_bullets, 1);
        tank.power_up();
        assert_eq!(tank.max_active_bullets, 2);
        tank.power_up();
        assert_eq!(tank.make_bullet(5).power, 2);
        assert_eq!(tank.power_up(), MAX_SUPERPOWERS);
    }

    #[test]
    fn test_drive_respects_bounds_and_obstacles() {
        let mut tank = player();
        tank.drive(Direction::Down, &open());
        assert_eq!(tank.rect.y, 389);
        // 391 would exceed 416 - 26
        tank.drive(Direction::Down, &open());
        assert_eq!(tank.rect.y, 389);

        let wall = [Rect::new(131, 372, 16, 16)];
        let around = Surroundings {
            obstacles: &wall,
            tanks: &[],
            bonuses: &[],
        };
        tank.drive(Direction::Up, &around);
        assert_eq!(tank.rect.y, 389);

        tank.drive(Direction::Up, &open());
        assert_eq!(tank.rect.y, 387);
    }

    #[test]
    fn test_paralysed_player_turns_but_stays() {
        let mut tank = player();
        tank.paralysed = true;
        tank.drive(Direction::Left, &open());
        assert_eq!(tank.direction, Direction::Left);
        assert_eq!(tank.rect.x, 131);
    }

    #[test]
    fn test_drive_reports_bonus_overlap() {
        let mut tank = player();
        let bonuses = [(77, Rect::new(120, 360, 32, 32))];
        let around = Surroundings {
            obstacles: &[],
            tanks: &[],
            bonuses: &bonuses,
        };
        assert_eq!(tank.drive(Direction::Up, &around), Some(77));
    }

    #[test]
    fn test_respawn_keeps_powers_on_stage_change() {
        let mut tank = player();
        tank.power_up();
        tank.power_up();
        tank.respawn(true);
        assert_eq!(tank.superpowers, 2);
        tank.respawn(false);
        assert_eq!(tank.superpowers, 0);
        assert_eq!(tank.max_active_bullets, 1);
    }
}
