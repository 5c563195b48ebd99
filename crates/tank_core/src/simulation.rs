//! The arena: owner of every entity and the per-tick system order.
//!
//! # Tick order
//!
//! One sub-tick runs, in this order:
//!
//! 1. Player movement along the held direction, then player explosion
//!    bookkeeping
//! 2. Reap dead enemies (detecting a cleared stage), then enemy explosion
//!    bookkeeping and navigation
//! 3. Pending bonus pickups and lost lives
//! 4. Reap removed bullets, then advance and collide the rest
//! 5. Sweep expired bonuses and score labels
//! 6. Castle explosion bookkeeping and the castle-lost check
//! 7. Timer pool advance (spawns, shields, freezes, animations)
//!
//! A `step` applies the controller action first and then runs
//! `sub_ticks_per_step` sub-ticks.
//!
//! # Determinism
//!
//! - All geometry is integer pixels
//! - All randomness comes from one seeded [`Pcg32`]
//! - Entities are stored in creation order, timers in scheduling order
//! - Removals are deferred to reap passes, never done mid-iteration
//!
//! # Example
//!
//! ```
//! use tank_core::prelude::*;
//!
//! let mut arena = Arena::new(ArenaConfig::rl(), 42);
//! arena.reset(1).unwrap();
//!
//! let result = arena.step(Action::MoveLeft);
//! assert!(!result.done);
//! assert_eq!(arena.players()[0].direction, Direction::Left);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bonus::{Bonus, BonusKind, BONUS_POINTS};
use crate::bullet::{Bullet, BulletState};
use crate::castle::Castle;
use crate::components::{Action, Direction, EntityId, Side};
use crate::config::ArenaConfig;
use crate::error::Result;
use crate::explosion::{ScoreLabel, EXPLOSION_FRAMES};
use crate::level::{self, Level, LevelLibrary, TileKind, MAX_ACTIVE_ENEMIES};
use crate::math::{Point, Rect};
use crate::observation::{self, Observation};
use crate::pathfinding;
use crate::tank::{
    EnemyKind, ImpactOutcome, Surroundings, Tank, TankState, TankTimers, Trophies, TANK_SIZE,
};
use crate::timer::{Repeat, TimerHandle, TimerPool};

/// Top-left corners where enemies may appear.
pub const ENEMY_SPAWN_SLOTS: [Point; 3] = [Point::new(3, 3), Point::new(195, 3), Point::new(387, 3)];

/// Start positions of player one and player two.
pub const PLAYER_SPAWNS: [Point; 2] = [Point::new(131, 387), Point::new(259, 387)];

/// One in this many spawned enemies carries a bonus.
pub const CARRIER_ODDS: u32 = 5;

/// Entity whose explosion an [`TimerEvent::ExplosionFrame`] advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExplosionOwner {
    /// A player or enemy tank.
    Tank(EntityId),
    /// A bullet.
    Bullet(EntityId),
    /// The castle.
    Castle,
}

/// Payload of every timer the arena schedules.
///
/// Recurring events name their entity and cancel themselves when that
/// entity is gone or no longer in the state the event applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerEvent {
    /// Try to bring in the next queued enemy.
    SpawnEnemy,
    /// Spawning phase over; the tank becomes alive.
    EndSpawning(EntityId),
    /// Toggle the spawn animation frame.
    SpawnAnimation(EntityId),
    /// Toggle the shield animation frame.
    ShieldFlicker(EntityId),
    /// Drop the shield.
    ShieldExpire(EntityId),
    /// Enemy auto-fire.
    EnemyFire(EntityId),
    /// Toggle the carrier flash.
    EnemyFlash(EntityId),
    /// Friendly-fire paralysis over.
    ParalysisEnd(EntityId),
    /// Advance an explosion animation.
    ExplosionFrame(ExplosionOwner),
    /// Toggle bonus visibility.
    BonusBlink(EntityId),
    /// Uncollected bonus disappears.
    BonusExpire(EntityId),
    /// Steel fortress turns back into brick.
    FortressRevert,
    /// Enemies unfreeze.
    FreezeEnd,
    /// Score label disappears.
    LabelExpire(EntityId),
}

/// Outcome of one `step` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Observation after the step.
    pub observation: Observation,
    /// Shaped reward accumulated over the step.
    pub reward: f32,
    /// All lives lost or castle destroyed.
    pub done: bool,
    /// Stage cleared.
    pub truncated: bool,
}

/// The simulated tank arena.
#[derive(Debug, Clone)]
pub struct Arena {
    config: ArenaConfig,
    library: LevelLibrary,
    seed: u64,
    rng: Pcg32,
    tick: u64,
    next_id: EntityId,
    level: Level,
    spawn_queue: Vec<EnemyKind>,
    castle: Castle,
    players: Vec<Tank>,
    enemies: Vec<Tank>,
    bullets: Vec<Bullet>,
    bonuses: Vec<Bonus>,
    labels: Vec<ScoreLabel>,
    timers: TimerPool<TimerEvent>,
    fortress_timer: Option<TimerHandle>,
    freeze_timer: Option<TimerHandle>,
    timefreeze: bool,
    game_over: bool,
    active: bool,
    reward: f32,
}

impl Arena {
    /// Create an arena with the built-in layouts. Call [`Arena::reset`]
    /// before stepping.
    #[must_use]
    pub fn new(config: ArenaConfig, seed: u64) -> Self {
        Self {
            config,
            library: LevelLibrary::builtin(),
            seed,
            rng: Pcg32::seed_from_u64(seed),
            tick: 0,
            next_id: 1,
            level: Level::parse(0, ""),
            spawn_queue: Vec::new(),
            castle: Castle::default(),
            players: Vec::new(),
            enemies: Vec::new(),
            bullets: Vec::new(),
            bonuses: Vec::new(),
            labels: Vec::new(),
            timers: TimerPool::new(),
            fortress_timer: None,
            freeze_timer: None,
            timefreeze: false,
            game_over: false,
            active: false,
            reward: 0.0,
        }
    }

    /// Replace the layout source.
    #[must_use]
    pub fn with_levels(mut self, library: LevelLibrary) -> Self {
        self.library = library;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Layout source.
    #[must_use]
    pub const fn library(&self) -> &LevelLibrary {
        &self.library
    }

    /// Seed the RNG was created from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Sub-ticks run since the last reset.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Current tile map.
    #[must_use]
    pub const fn level(&self) -> &Level {
        &self.level
    }

    /// Mutable tile map.
    pub fn level_mut(&mut self) -> &mut Level {
        &mut self.level
    }

    /// The castle.
    #[must_use]
    pub const fn castle(&self) -> &Castle {
        &self.castle
    }

    /// Player tanks by slot.
    #[must_use]
    pub fn players(&self) -> &[Tank] {
        &self.players
    }

    /// Mutable player tanks.
    pub fn players_mut(&mut self) -> &mut [Tank] {
        &mut self.players
    }

    /// Enemy tanks in spawn order.
    #[must_use]
    pub fn enemies(&self) -> &[Tank] {
        &self.enemies
    }

    /// Mutable enemy tanks.
    pub fn enemies_mut(&mut self) -> &mut [Tank] {
        &mut self.enemies
    }

    /// Bullets in firing order.
    #[must_use]
    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    /// Mutable bullets.
    pub fn bullets_mut(&mut self) -> &mut [Bullet] {
        &mut self.bullets
    }

    /// Bonuses on the map.
    #[must_use]
    pub fn bonuses(&self) -> &[Bonus] {
        &self.bonuses
    }

    /// Score labels on the map.
    #[must_use]
    pub fn labels(&self) -> &[ScoreLabel] {
        &self.labels
    }

    /// Scheduled timers.
    #[must_use]
    pub const fn timers(&self) -> &TimerPool<TimerEvent> {
        &self.timers
    }

    /// Enemies still to be spawned; the next one is last.
    #[must_use]
    pub fn spawn_queue(&self) -> &[EnemyKind] {
        &self.spawn_queue
    }

    /// Replace the remaining spawn queue; the last entry spawns first.
    pub fn set_spawn_queue(&mut self, queue: Vec<EnemyKind>) {
        self.spawn_queue = queue;
    }

    /// True once all lives are gone or the castle fell.
    #[must_use]
    pub const fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// False once the stage is cleared (and before the first reset).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// True while the timer bonus freezes enemies.
    #[must_use]
    pub const fn is_time_frozen(&self) -> bool {
        self.timefreeze
    }

    /// Look up a player or enemy by id.
    #[must_use]
    pub fn tank(&self, id: EntityId) -> Option<&Tank> {
        self.players
            .iter()
            .chain(self.enemies.iter())
            .find(|tank| tank.id == id)
    }

    /// Mutable lookup of a player or enemy by id.
    pub fn tank_mut(&mut self, id: EntityId) -> Option<&mut Tank> {
        self.players
            .iter_mut()
            .chain(self.enemies.iter_mut())
            .find(|tank| tank.id == id)
    }

    /// Sum of all player scores.
    #[must_use]
    pub fn total_score(&self) -> u64 {
        self.players
            .iter()
            .filter_map(Tank::player)
            .map(|player| u64::from(player.score))
            .sum()
    }

    fn alloc_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Load `level_id` and start a fresh stage.
    ///
    /// Bullets, enemies, bonuses, labels and timers are cleared and the
    /// castle is rebuilt. Players are created anew after a game over (or on
    /// the first reset); otherwise they keep lives, score and superpowers
    /// while their per-stage trophies are cleared.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::GameError::LevelNotFound`] if the library has
    /// no layout for `level_id`. The arena is left untouched in that case.
    pub fn reset(&mut self, level_id: u32) -> Result<Observation> {
        let level = self.library.load(level_id)?;

        self.bullets.clear();
        self.enemies.clear();
        self.bonuses.clear();
        self.labels.clear();
        self.timers.clear();
        self.castle.rebuild();
        self.level = level;
        self.timefreeze = false;
        self.fortress_timer = None;
        self.freeze_timer = None;
        self.spawn_queue = level::spawn_queue(level_id, &mut self.rng);

        let player_count = self.config.player_count.min(PLAYER_SPAWNS.len());
        let fresh = self.game_over
            || self.players.len() != player_count
            || self
                .players
                .iter()
                .filter_map(Tank::player)
                .any(|player| player.lives == 0);
        if fresh {
            self.players.clear();
            for (slot, start) in PLAYER_SPAWNS.iter().enumerate().take(player_count) {
                let id = self.alloc_id();
                self.players
                    .push(Tank::new_player(id, slot, self.config.starting_lives, *start));
            }
        }

        let shield_ms = self.config.timing.respawn_shield_ms;
        for index in 0..self.players.len() {
            let player = &mut self.players[index];
            player.respawn(!fresh);
            player.shielded = false;
            player.timers = TankTimers::default();
            if let Some(data) = player.player_mut() {
                data.trophies = Trophies::default();
            }
            let id = player.id;
            self.shield_player(id, Some(shield_ms));
        }

        self.timers.schedule(
            self.config.timing.spawn_interval_ms,
            TimerEvent::SpawnEnemy,
            Repeat::Forever,
        );
        self.tick = 0;
        self.game_over = false;
        self.active = true;

        info!(
            level = level_id,
            players = self.players.len(),
            enemies = self.spawn_queue.len(),
            fresh,
            "Level loaded"
        );
        Ok(self.observe())
    }

    /// Apply `action` to player one and advance one step.
    pub fn step(&mut self, action: Action) -> StepResult {
        self.step_players(std::slice::from_ref(&action))
    }

    /// Decode an action index and step.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::GameError::InvalidAction`] for indices
    /// outside `0..=5`; the arena is not advanced.
    pub fn step_index(&mut self, index: u8) -> Result<StepResult> {
        let action = Action::from_index(index)?;
        Ok(self.step(action))
    }

    /// Apply one action per player slot and advance one step.
    ///
    /// Missing entries leave the corresponding players idle.
    pub fn step_players(&mut self, actions: &[Action]) -> StepResult {
        let score_before = self.total_score();
        self.reward = self.config.rewards.step;

        for (slot, action) in actions.iter().enumerate() {
            self.apply_action(slot, *action);
        }
        for _ in 0..self.config.sub_ticks_per_step {
            self.sub_tick();
        }
        for player in &mut self.players {
            if let Some(data) = player.player_mut() {
                data.pressed = None;
            }
        }

        let gained = self.total_score().saturating_sub(score_before);
        self.reward += self.config.rewards.score_weight * gained as f32;

        #[cfg(feature = "debug-validation")]
        self.check_invariants();

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            debug!(tick = self.tick, state_hash = hash, "Arena state hash");
        }

        StepResult {
            observation: self.observe(),
            reward: self.reward,
            done: self.game_over,
            truncated: !self.active,
        }
    }

    #[cfg(feature = "debug-validation")]
    fn check_invariants(&self) {
        assert!(self.enemies.len() <= MAX_ACTIVE_ENEMIES, "enemy cap exceeded");
        let carriers = self
            .enemies
            .iter()
            .filter(|enemy| enemy.is_carrier() && enemy.state != TankState::Dead)
            .count();
        assert!(carriers <= 1, "{carriers} bonus carriers on the map");
        for player in &self.players {
            assert!(
                crate::tank::in_bounds(player.rect),
                "player {} left the arena",
                player.id
            );
        }
    }

    fn apply_action(&mut self, slot: usize, action: Action) {
        let Some(player) = self.players.get_mut(slot) else {
            return;
        };
        if !player.is_alive() {
            return;
        }
        if action == Action::Fire {
            let id = player.id;
            self.fire(id);
        } else if let Some(direction) = action.direction() {
            if let Some(data) = player.player_mut() {
                data.pressed = Some(direction);
            }
        }
    }

    /// Run one sub-tick of the system order.
    pub fn sub_tick(&mut self) {
        let playing = !self.game_over && self.active;
        for index in 0..self.players.len() {
            let pressed = self.players[index].player().and_then(|data| data.pressed);
            if playing && self.players[index].is_alive() {
                if let Some(direction) = pressed {
                    self.drive_player(index, direction);
                }
            }
            self.players[index].update();
        }

        self.update_enemies();

        if !self.game_over && self.active {
            self.resolve_players();
        }

        self.update_bullets();

        self.bonuses.retain(|bonus| bonus.active);
        self.labels.retain(|label| label.active);

        self.castle.update();
        if !self.castle.active && !self.game_over {
            self.game_over = true;
            self.reward += self.config.rewards.castle_lost;
            info!(level = self.level.id(), "Castle destroyed, game over");
        }

        self.run_timers(self.config.tick_ms);
        self.tick += 1;
    }

    fn drive_player(&mut self, index: usize, direction: Direction) {
        let tanks: Vec<Rect> = self
            .players
            .iter()
            .enumerate()
            .filter(|(other, player)| *other != index && player.is_alive())
            .map(|(_, player)| player.rect)
            .chain(self.enemies.iter().map(|enemy| enemy.rect))
            .collect();
        let bonuses = self.active_bonus_rects();
        let around = Surroundings {
            obstacles: self.level.obstacle_rects(),
            tanks: &tanks,
            bonuses: &bonuses,
        };
        let player = &mut self.players[index];
        if let Some(bonus) = player.drive(direction, &around) {
            if let Some(data) = player.player_mut() {
                data.pending_bonus = Some(bonus);
            }
        }
    }

    fn active_bonus_rects(&self) -> Vec<(EntityId, Rect)> {
        self.bonuses
            .iter()
            .filter(|bonus| bonus.active)
            .map(|bonus| (bonus.id, bonus.rect))
            .collect()
    }

    fn update_enemies(&mut self) {
        if !self.game_over && self.active {
            let before = self.enemies.len();
            let mut stale = Vec::new();
            for enemy in &mut self.enemies {
                if enemy.state != TankState::Dead {
                    continue;
                }
                if let Some(data) = enemy.enemy_mut() {
                    stale.extend(data.fire_timer.take());
                    stale.extend(data.flash_timer.take());
                }
            }
            for handle in stale {
                self.timers.cancel(handle);
            }
            self.enemies.retain(|enemy| enemy.state != TankState::Dead);
            if self.enemies.len() != before && self.enemies.is_empty() && self.spawn_queue.is_empty()
            {
                self.active = false;
                info!(level = self.level.id(), "Stage cleared");
            }
        }

        for index in 0..self.enemies.len() {
            self.enemies[index].update();
            if !self.enemies[index].is_alive() || self.enemies[index].paused {
                continue;
            }
            let tanks: Vec<Rect> = self
                .enemies
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != index)
                .map(|(_, enemy)| enemy.rect)
                .chain(self.players.iter().map(|player| player.rect))
                .collect();
            let bonuses = self.active_bonus_rects();
            let around = Surroundings {
                obstacles: self.level.obstacle_rects(),
                tanks: &tanks,
                bonuses: &bonuses,
            };
            let run_over = pathfinding::navigate(&mut self.enemies[index], &around, &mut self.rng);
            for id in run_over {
                if let Some(bonus) = self.bonuses.iter_mut().find(|bonus| bonus.id == id) {
                    bonus.active = false;
                    debug!(bonus = id, "Bonus run over by enemy");
                }
            }
        }
    }

    fn resolve_players(&mut self) {
        for index in 0..self.players.len() {
            let id = self.players[index].id;
            match self.players[index].state {
                TankState::Alive => {
                    let pending = self.players[index]
                        .player_mut()
                        .and_then(|data| data.pending_bonus.take());
                    if let Some(bonus) = pending {
                        self.trigger_bonus(bonus, id);
                    }
                }
                TankState::Dead => {
                    self.reward += self.config.rewards.life_lost;
                    let lives = self.players[index].player_mut().map_or(0, |data| {
                        data.lives = data.lives.saturating_sub(1);
                        data.lives
                    });
                    if lives > 0 {
                        self.respawn_player(index);
                        debug!(player = id, lives, "Player respawned");
                    } else {
                        self.game_over = true;
                        info!(player = id, "Out of lives, game over");
                    }
                }
                TankState::Spawning | TankState::Exploding => {}
            }
        }
    }

    fn respawn_player(&mut self, index: usize) {
        let player = &mut self.players[index];
        player.respawn(false);
        let id = player.id;
        if let Some(handle) = player.timers.paralysis.take() {
            self.timers.cancel(handle);
        }
        self.shield_player(id, Some(self.config.timing.respawn_shield_ms));
    }

    /// Fire a bullet from tank `id`.
    ///
    /// Rejected (returns false) if the tank is missing, not alive, paused,
    /// or already has its cap of active bullets in flight.
    pub fn fire(&mut self, id: EntityId) -> bool {
        let in_flight = self
            .bullets
            .iter()
            .filter(|bullet| bullet.owner == id && bullet.is_active())
            .count();
        if !self.tank(id).is_some_and(|tank| tank.can_fire(in_flight)) {
            return false;
        }
        let bullet_id = self.alloc_id();
        let Some(bullet) = self.tank(id).map(|tank| tank.make_bullet(bullet_id)) else {
            return false;
        };
        self.bullets.push(bullet);
        true
    }

    fn update_bullets(&mut self) {
        self.bullets
            .retain(|bullet| bullet.state != BulletState::Removed);
        for index in 0..self.bullets.len() {
            self.update_bullet(index);
        }
    }

    /// Advance one bullet and resolve at most one collision category, in
    /// priority order: arena edge, tiles, opposing bullets, players,
    /// enemies, castle.
    fn update_bullet(&mut self, index: usize) {
        let bullet = &mut self.bullets[index];
        bullet.update();
        if !bullet.is_active() {
            return;
        }
        let id = bullet.id;
        if !bullet.advance() {
            self.schedule_explosion(ExplosionOwner::Bullet(id));
            return;
        }

        let rect = bullet.rect;
        let power = bullet.power;
        let side = bullet.owner_side();
        let owner = bullet.owner;
        let damage = bullet.damage;

        let struck: Vec<Point> = self
            .level
            .obstacle_rects()
            .iter()
            .filter(|tile| tile.collides(&rect))
            .map(Rect::top_left)
            .collect();
        let mut stopped = false;
        for position in struck {
            stopped |= self.level.hit_tile(position, power);
        }
        if stopped {
            self.explode_bullet(index);
            return;
        }

        let opposing = self.bullets.iter().position(|other| {
            other.id != id
                && other.is_active()
                && other.owner_side() != side
                && other.rect.collides(&rect)
        });
        if let Some(other) = opposing {
            self.bullets[other].remove();
            self.explode_bullet(index);
            return;
        }

        let victim = self
            .players
            .iter()
            .find(|player| player.is_alive() && player.rect.collides(&rect))
            .map(|player| player.id);
        if let Some(victim) = victim {
            self.bullets[index].remove();
            self.bullet_impact(victim, side == Side::Player, damage, owner);
            return;
        }

        let victim = self
            .enemies
            .iter()
            .find(|enemy| enemy.is_alive() && enemy.rect.collides(&rect))
            .map(|enemy| enemy.id);
        if let Some(victim) = victim {
            let friendly_fire = side == Side::Enemy;
            self.bullets[index].remove();
            self.bullet_impact(victim, friendly_fire, damage, owner);
            if !friendly_fire {
                self.reward += self.config.rewards.enemy_hit;
            }
            return;
        }

        if self.castle.active && self.castle.rect.collides(&rect) {
            self.bullets[index].remove();
            if self.castle.destroy() {
                self.schedule_explosion(ExplosionOwner::Castle);
            }
        }
    }

    fn explode_bullet(&mut self, index: usize) {
        let bullet = &mut self.bullets[index];
        if bullet.explode() {
            let id = bullet.id;
            self.schedule_explosion(ExplosionOwner::Bullet(id));
        }
    }

    /// Apply a bullet hit on tank `victim` fired by `attacker`.
    ///
    /// A destroyed enemy credits the attacking player with a trophy, its
    /// kill points and a score label; a player hit by another player is
    /// paralysed instead of damaged.
    pub fn bullet_impact(
        &mut self,
        victim: EntityId,
        friendly_fire: bool,
        damage: i32,
        attacker: EntityId,
    ) -> Option<ImpactOutcome> {
        let tank = self.tank_mut(victim)?;
        let outcome = tank.take_hit(friendly_fire, damage);
        match outcome {
            ImpactOutcome::Destroyed => {
                let kind = tank.enemy().map(|enemy| enemy.kind);
                let position = tank.rect.top_left();
                if let Some(kind) = kind {
                    if let Some(data) = self.tank_mut(attacker).and_then(Tank::player_mut) {
                        data.trophies.enemies[kind.index()] += 1;
                        data.score += kind.points();
                    }
                    self.add_label(position, kind.points());
                    debug!(enemy = victim, ?kind, attacker, "Enemy destroyed");
                }
                self.explode_tank(victim);
            }
            ImpactOutcome::Paralysed => {
                let handle = self.timers.schedule(
                    self.config.timing.paralysis_ms,
                    TimerEvent::ParalysisEnd(victim),
                    Repeat::ONCE,
                );
                if let Some(tank) = self.tank_mut(victim) {
                    tank.timers.paralysis = Some(handle);
                }
            }
            ImpactOutcome::Absorbed | ImpactOutcome::Damaged | ImpactOutcome::Ignored => {}
        }
        Some(outcome)
    }

    /// Start a tank's explosion; a bonus carrier also drops a bonus.
    pub fn explode_tank(&mut self, id: EntityId) -> bool {
        let Some(tank) = self.tank_mut(id) else {
            return false;
        };
        if !tank.explode() {
            return false;
        }
        let carrier = tank.is_carrier();
        self.schedule_explosion(ExplosionOwner::Tank(id));
        if carrier {
            self.spawn_bonus();
        }
        true
    }

    fn schedule_explosion(&mut self, owner: ExplosionOwner) {
        self.timers.schedule(
            self.config.timing.explosion_frame_ms,
            TimerEvent::ExplosionFrame(owner),
            Repeat::Times(u32::from(EXPLOSION_FRAMES)),
        );
    }

    fn add_label(&mut self, position: Point, points: u32) {
        let id = self.alloc_id();
        self.labels.push(ScoreLabel {
            id,
            position,
            points,
            active: true,
        });
        self.timers.schedule(
            self.config.timing.label_ms,
            TimerEvent::LabelExpire(id),
            Repeat::ONCE,
        );
    }

    /// Bring in the next queued enemy.
    ///
    /// Fails without consuming the queue when the map already holds the
    /// maximum number of enemies, time is frozen, or every spawn slot
    /// overlaps a tank.
    pub fn spawn_enemy(&mut self) -> Option<EntityId> {
        if self.enemies.len() >= MAX_ACTIVE_ENEMIES || self.spawn_queue.is_empty() || self.timefreeze
        {
            return None;
        }
        let position = self.free_spawn_slot()?;
        let kind = self.spawn_queue.pop()?;
        let direction = *[Direction::Right, Direction::Down, Direction::Left].choose(&mut self.rng)?;
        let roll = self.rng.random_range(1..=CARRIER_ODDS);
        let carrier = roll == 1
            && !self
                .enemies
                .iter()
                .any(|enemy| enemy.is_carrier() && enemy.state != TankState::Dead);
        Some(self.add_enemy(kind, position, direction, carrier, TankState::Spawning))
    }

    /// Put an already-alive enemy at `position`, bypassing the queue, the
    /// slot check and the enemy cap.
    ///
    /// The single-carrier rule is not enforced either: a caller passing
    /// `carrier = true` must make sure no other live carrier exists.
    pub fn place_enemy(
        &mut self,
        kind: EnemyKind,
        position: Point,
        direction: Direction,
        carrier: bool,
    ) -> EntityId {
        self.add_enemy(kind, position, direction, carrier, TankState::Alive)
    }

    fn free_spawn_slot(&mut self) -> Option<Point> {
        let mut slots = ENEMY_SPAWN_SLOTS;
        slots.shuffle(&mut self.rng);
        slots.into_iter().find(|slot| {
            let rect = Rect::at(*slot, TANK_SIZE, TANK_SIZE);
            !self
                .enemies
                .iter()
                .chain(self.players.iter())
                .any(|tank| tank.rect.collides(&rect))
        })
    }

    fn add_enemy(
        &mut self,
        kind: EnemyKind,
        position: Point,
        direction: Direction,
        carrier: bool,
        state: TankState,
    ) -> EntityId {
        let id = self.alloc_id();
        let timing = self.config.timing;
        let mut tank = Tank::new_enemy(id, kind, position, direction, carrier);
        tank.state = state;
        tank.paused = self.timefreeze;
        pathfinding::generate_path(
            &mut tank,
            Some(direction),
            false,
            self.level.obstacle_rects(),
            &mut self.rng,
        );

        if state == TankState::Spawning {
            tank.timers.spawn_animation = Some(self.timers.schedule(
                timing.spawn_frame_ms,
                TimerEvent::SpawnAnimation(id),
                Repeat::Forever,
            ));
            tank.timers.spawn_end = Some(self.timers.schedule(
                timing.spawn_duration_ms,
                TimerEvent::EndSpawning(id),
                Repeat::ONCE,
            ));
        }
        let fire = self
            .timers
            .schedule(timing.enemy_fire_ms, TimerEvent::EnemyFire(id), Repeat::Forever);
        let flash = carrier.then(|| {
            self.timers
                .schedule(timing.enemy_flash_ms, TimerEvent::EnemyFlash(id), Repeat::Forever)
        });
        if let Some(enemy) = tank.enemy_mut() {
            enemy.fire_timer = Some(fire);
            enemy.flash_timer = flash;
        }

        debug!(
            enemy = id,
            ?kind,
            carrier,
            x = position.x,
            y = position.y,
            queued = self.spawn_queue.len(),
            "Enemy spawned"
        );
        self.enemies.push(tank);
        id
    }

    fn spawn_bonus(&mut self) -> Option<EntityId> {
        if self.bonuses.iter().any(|bonus| bonus.active) {
            return None;
        }
        let id = self.alloc_id();
        let bonus = Bonus::random(id, &mut self.rng);
        debug!(bonus = id, kind = ?bonus.kind, x = bonus.rect.x, y = bonus.rect.y, "Bonus dropped");
        self.insert_bonus(bonus);
        Some(id)
    }

    /// Put a bonus of `kind` at `rect` with the usual blink and expiry
    /// timers.
    pub fn place_bonus(&mut self, kind: BonusKind, rect: Rect) -> EntityId {
        let id = self.alloc_id();
        self.insert_bonus(Bonus::new(id, kind, rect));
        id
    }

    fn insert_bonus(&mut self, bonus: Bonus) {
        let id = bonus.id;
        self.bonuses.push(bonus);
        self.timers.schedule(
            self.config.timing.bonus_blink_ms,
            TimerEvent::BonusBlink(id),
            Repeat::Forever,
        );
        self.timers.schedule(
            self.config.timing.bonus_lifetime_ms,
            TimerEvent::BonusExpire(id),
            Repeat::ONCE,
        );
    }

    /// Grant bonus `bonus_id` to player `player_id`.
    ///
    /// Returns false if the bonus is gone or was already collected. The
    /// effect is applied before the bonus leaves the map.
    pub fn trigger_bonus(&mut self, bonus_id: EntityId, player_id: EntityId) -> bool {
        let Some((kind, position)) = self
            .bonuses
            .iter()
            .find(|bonus| bonus.id == bonus_id && bonus.active)
            .map(|bonus| (bonus.kind, bonus.rect.top_left()))
        else {
            return false;
        };
        let Some(data) = self.tank_mut(player_id).and_then(Tank::player_mut) else {
            return false;
        };
        data.trophies.bonus += 1;
        data.score += BONUS_POINTS;

        let timing = self.config.timing;
        match kind {
            BonusKind::Grenade => {
                let ids: Vec<EntityId> = self.enemies.iter().map(|enemy| enemy.id).collect();
                for id in ids {
                    self.explode_tank(id);
                }
            }
            BonusKind::Helmet => self.shield_player(player_id, Some(timing.helmet_shield_ms)),
            BonusKind::Shovel => {
                self.level.build_fortress(TileKind::Steel);
                let handle =
                    self.timers
                        .schedule(timing.shovel_ms, TimerEvent::FortressRevert, Repeat::ONCE);
                if let Some(old) = self.fortress_timer.replace(handle) {
                    self.timers.cancel(old);
                }
            }
            BonusKind::Star => {
                if let Some(tank) = self.tank_mut(player_id) {
                    tank.power_up();
                }
            }
            BonusKind::Tank => {
                if let Some(data) = self.tank_mut(player_id).and_then(Tank::player_mut) {
                    data.lives += 1;
                }
            }
            BonusKind::Timer => {
                self.set_enemy_freeze(true);
                let handle = self
                    .timers
                    .schedule(timing.freeze_ms, TimerEvent::FreezeEnd, Repeat::ONCE);
                if let Some(old) = self.freeze_timer.replace(handle) {
                    self.timers.cancel(old);
                }
            }
        }

        if let Some(bonus) = self.bonuses.iter_mut().find(|bonus| bonus.id == bonus_id) {
            bonus.active = false;
        }
        self.add_label(position, BONUS_POINTS);
        debug!(bonus = bonus_id, ?kind, player = player_id, "Bonus collected");
        true
    }

    /// Shield tank `id`, optionally only for `duration_ms`.
    ///
    /// A new grant replaces the previous flicker and expiry timers.
    pub fn shield_player(&mut self, id: EntityId, duration_ms: Option<u32>) {
        if self.tank(id).is_none() {
            return;
        }
        let flicker = self.timers.schedule(
            self.config.timing.shield_frame_ms,
            TimerEvent::ShieldFlicker(id),
            Repeat::Forever,
        );
        let expire = duration_ms
            .map(|ms| self.timers.schedule(ms, TimerEvent::ShieldExpire(id), Repeat::ONCE));

        let mut stale = Vec::new();
        if let Some(tank) = self.tank_mut(id) {
            tank.shielded = true;
            stale.extend(tank.timers.shield_flicker.replace(flicker));
            if expire.is_some() {
                stale.extend(std::mem::replace(&mut tank.timers.shield_expire, expire));
            }
        }
        for handle in stale {
            self.timers.cancel(handle);
        }
    }

    fn unshield(&mut self, id: EntityId) {
        let Some(tank) = self.tank_mut(id) else {
            return;
        };
        tank.shielded = false;
        tank.timers.shield_expire = None;
        if let Some(handle) = tank.timers.shield_flicker.take() {
            self.timers.cancel(handle);
        }
    }

    /// Pause or release every enemy and set the time-freeze flag, which
    /// also blocks spawning.
    pub fn set_enemy_freeze(&mut self, freeze: bool) {
        for enemy in &mut self.enemies {
            enemy.paused = freeze;
        }
        self.timefreeze = freeze;
        debug!(freeze, "Enemy freeze toggled");
    }

    fn run_timers(&mut self, elapsed_ms: u32) {
        for handle in self.timers.begin_tick(elapsed_ms) {
            while let Some(event) = self.timers.take_due(handle) {
                self.on_timer(handle, event);
            }
        }
    }

    fn on_timer(&mut self, handle: TimerHandle, event: TimerEvent) {
        let keep = match event {
            TimerEvent::SpawnEnemy => {
                self.spawn_enemy();
                true
            }
            TimerEvent::EndSpawning(id) => {
                if let Some(tank) = self.tank_mut(id) {
                    tank.timers.spawn_end = None;
                    if tank.state == TankState::Spawning {
                        tank.state = TankState::Alive;
                    }
                }
                true
            }
            TimerEvent::SpawnAnimation(id) => match self.tank_mut(id) {
                Some(tank) if tank.state == TankState::Spawning => {
                    tank.spawn_frame ^= 1;
                    true
                }
                _ => false,
            },
            TimerEvent::ShieldFlicker(id) => match self.tank_mut(id) {
                Some(tank) if tank.is_alive() => {
                    if tank.shielded {
                        tank.shield_frame ^= 1;
                    }
                    true
                }
                _ => false,
            },
            TimerEvent::ShieldExpire(id) => {
                self.unshield(id);
                true
            }
            TimerEvent::EnemyFire(id) => {
                let armed = self
                    .tank(id)
                    .is_some_and(|tank| matches!(tank.state, TankState::Spawning | TankState::Alive));
                if armed {
                    self.fire(id);
                }
                armed
            }
            TimerEvent::EnemyFlash(id) => match self.tank_mut(id) {
                Some(tank) if matches!(tank.state, TankState::Spawning | TankState::Alive) => {
                    tank.flash = !tank.flash;
                    true
                }
                _ => false,
            },
            TimerEvent::ParalysisEnd(id) => {
                if let Some(tank) = self.tank_mut(id) {
                    tank.timers.paralysis = None;
                    if tank.is_alive() {
                        tank.paralysed = false;
                    }
                }
                true
            }
            TimerEvent::ExplosionFrame(owner) => {
                let explosion = match owner {
                    ExplosionOwner::Tank(id) => self
                        .tank_mut(id)
                        .and_then(|tank| tank.explosion.as_mut()),
                    ExplosionOwner::Bullet(id) => self
                        .bullets
                        .iter_mut()
                        .find(|bullet| bullet.id == id)
                        .and_then(|bullet| bullet.explosion.as_mut()),
                    ExplosionOwner::Castle => self.castle.explosion.as_mut(),
                };
                match explosion {
                    Some(explosion) => {
                        explosion.advance();
                        true
                    }
                    None => false,
                }
            }
            TimerEvent::BonusBlink(id) => {
                match self.bonuses.iter_mut().find(|bonus| bonus.id == id && bonus.active) {
                    Some(bonus) => {
                        bonus.visible = !bonus.visible;
                        true
                    }
                    None => false,
                }
            }
            TimerEvent::BonusExpire(id) => {
                if let Some(bonus) = self.bonuses.iter_mut().find(|bonus| bonus.id == id) {
                    bonus.active = false;
                }
                true
            }
            TimerEvent::FortressRevert => {
                self.fortress_timer = None;
                self.level.build_fortress(TileKind::Brick);
                true
            }
            TimerEvent::FreezeEnd => {
                self.freeze_timer = None;
                self.set_enemy_freeze(false);
                true
            }
            TimerEvent::LabelExpire(id) => {
                if let Some(label) = self.labels.iter_mut().find(|label| label.id == id) {
                    label.active = false;
                }
                true
            }
        };
        if !keep {
            self.timers.cancel(handle);
        }
    }

    /// Observation in the configured encoding.
    #[must_use]
    pub fn observe(&self) -> Observation {
        observation::encode(self, self.config.observation)
    }

    /// Hash of the complete simulation state.
    ///
    /// Two arenas with the same seed, level and action stream produce the
    /// same hash after every step.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.next_id.hash(&mut hasher);
        self.level.hash(&mut hasher);
        self.spawn_queue.hash(&mut hasher);
        self.castle.hash(&mut hasher);
        self.players.hash(&mut hasher);
        self.enemies.hash(&mut hasher);
        self.bullets.hash(&mut hasher);
        self.bonuses.hash(&mut hasher);
        self.labels.hash(&mut hasher);
        self.timers.hash(&mut hasher);
        self.timefreeze.hash(&mut hasher);
        self.game_over.hash(&mut hasher);
        self.active.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GameError;

    fn arena() -> Arena {
        let mut arena = Arena::new(ArenaConfig::rl(), 7);
        arena.reset(1).unwrap();
        arena
    }

    #[test]
    fn test_reset_creates_shielded_players() {
        let arena = arena();
        assert_eq!(arena.players().len(), 1);
        let player = &arena.players()[0];
        assert!(player.is_alive());
        assert!(player.shielded);
        assert_eq!(player.rect.top_left(), PLAYER_SPAWNS[0]);
        assert_eq!(arena.spawn_queue().len(), 20);
        assert!(arena.is_active());
    }

    #[test]
    fn test_reset_missing_level() {
        let mut arena = Arena::new(ArenaConfig::rl(), 1);
        assert!(matches!(arena.reset(99), Err(GameError::LevelNotFound(99))));
        assert!(!arena.is_active());
    }

    #[test]
    fn test_invalid_action_index() {
        let mut arena = arena();
        let hash = arena.state_hash();
        assert!(matches!(arena.step_index(6), Err(GameError::InvalidAction(6))));
        assert_eq!(arena.state_hash(), hash);
    }

    #[test]
    fn test_first_enemy_after_spawn_interval() {
        let mut arena = arena();
        // 9 steps = 2970 ms
        for _ in 0..9 {
            arena.step(Action::Idle);
        }
        assert!(arena.enemies().is_empty());
        arena.step(Action::Idle);
        assert_eq!(arena.enemies().len(), 1);
        assert_eq!(arena.spawn_queue().len(), 19);
        assert_eq!(arena.enemies()[0].state, TankState::Spawning);
    }

    #[test]
    fn test_step_reward_is_step_cost() {
        let mut arena = arena();
        let result = arena.step(Action::Idle);
        assert!((result.reward + 1.0).abs() < f32::EPSILON);
        assert!(!result.done);
        assert!(!result.truncated);
    }

    #[test]
    fn test_fire_respects_bullet_cap() {
        let mut arena = arena();
        let id = arena.players()[0].id;
        assert!(arena.fire(id));
        assert!(!arena.fire(id));
        assert_eq!(arena.bullets().len(), 1);
    }

    #[test]
    fn test_spawn_fails_without_consuming_queue() {
        let mut arena = arena();
        for slot in ENEMY_SPAWN_SLOTS {
            arena.place_enemy(EnemyKind::Basic, slot, Direction::Down, false);
        }
        let queued = arena.spawn_queue().len();
        assert_eq!(arena.spawn_enemy(), None);
        assert_eq!(arena.spawn_queue().len(), queued);
        assert_eq!(arena.enemies().len(), 3);
    }

    #[test]
    fn test_castle_loss_ends_game() {
        let mut arena = arena();
        arena.castle.destroy();
        let result = arena.step(Action::Idle);
        assert!(result.done);
        assert!((result.reward - (-1.0 - 50.0)).abs() < f32::EPSILON);
    }

    #[test]
    fn test_state_hash_deterministic() {
        let mut a = Arena::new(ArenaConfig::rl(), 11);
        let mut b = Arena::new(ArenaConfig::rl(), 11);
        a.reset(2).unwrap();
        b.reset(2).unwrap();
        for i in 0..60u8 {
            let action = Action::from_index(i % 6).unwrap();
            a.step(action);
            b.step(action);
            assert_eq!(a.state_hash(), b.state_hash());
        }
    }
}
