//! Scenario tests that drive the arena through whole encounters.
//!
//! Every scenario starts from an inline layout with enemy spawning disabled
//! and places exactly the entities it needs.

use tank_core::bonus::BONUS_POINTS;
use tank_core::bullet::BulletState;
use tank_core::level::{FORTRESS_CELLS, TILE_SIZE};
use tank_core::prelude::*;
use tank_core::simulation::{TimerEvent, ENEMY_SPAWN_SLOTS};
use tank_core::tank::ImpactOutcome;
use tank_test_utils::fixtures::{
    player_one, quiet_config, single_tick_config, step_n, teleport, unshield_players,
    ArenaFixture, NEVER_MS,
};

fn single_tick() -> ArenaFixture {
    ArenaFixture::new().config(single_tick_config())
}

// =============================================================================
// Tiles and bullets
// =============================================================================

#[test]
fn steel_needs_power_two() {
    let mut arena = single_tick().tile(8, 20, TileKind::Steel).build();
    let player = player_one(&arena);

    assert!(arena.fire(player));
    step_n(&mut arena, Action::Idle, 15);
    assert_eq!(arena.level().tile(8, 20), TileKind::Steel);
    assert!(arena.bullets().iter().all(|b| !b.is_active()));

    arena.players_mut()[0].superpowers = 3;
    assert!(arena.fire(player));
    step_n(&mut arena, Action::Idle, 15);
    assert_eq!(arena.level().tile(8, 20), TileKind::Empty);
}

#[test]
fn brick_hit_removes_one_obstacle() {
    let mut arena = single_tick().fortress().build();
    let before = arena.level().obstacle_rects().len();
    assert_eq!(before, 1 + FORTRESS_CELLS.len());

    let position = Point::new(11 * TILE_SIZE, 24 * TILE_SIZE);
    assert!(arena.level_mut().hit_tile(position, 1));
    assert_eq!(arena.level().obstacle_rects().len(), before - 1);
    assert_eq!(arena.level().tile(11, 24), TileKind::Empty);
}

#[test]
fn bullet_at_edge_explodes_then_is_reaped() {
    let mut arena = single_tick().build();
    let player = player_one(&arena);
    teleport(&mut arena, player, Point::new(131, 3), Direction::Up);

    assert!(arena.fire(player));
    arena.step(Action::Idle);
    let bullet = &arena.bullets()[0];
    assert_eq!(bullet.state, BulletState::Exploding);
    assert!(bullet.explosion.is_some());

    arena.step(Action::Idle);
    assert_eq!(arena.bullets().len(), 1);

    step_n(&mut arena, Action::Idle, 20);
    assert!(arena.bullets().is_empty());
    assert!(arena.castle().active);
}

#[test]
fn opposing_bullets_cancel_out() {
    let mut arena = single_tick().build();
    let player = player_one(&arena);
    let enemy = arena.place_enemy(EnemyKind::Basic, Point::new(131, 200), Direction::Down, false);

    assert!(arena.fire(player));
    assert!(arena.fire(enemy));
    step_n(&mut arena, Action::Idle, 20);

    assert!(arena.bullets().iter().all(|b| !b.is_active()));
    assert_eq!(arena.players()[0].health, 100);
    assert_eq!(arena.tank(enemy).map(|t| t.health), Some(100));
}

#[test]
fn enemy_bullet_destroys_castle() {
    let mut arena = single_tick().build();
    let enemy = arena.place_enemy(EnemyKind::Basic, Point::new(195, 340), Direction::Down, false);
    assert!(arena.fire(enemy));

    let (reward, last) = step_n(&mut arena, Action::Idle, 5);
    assert!(!arena.castle().active);
    assert!(last.is_some_and(|result| result.done));
    assert!(reward < -50.0);
}

// =============================================================================
// Kills, lives and stage flow
// =============================================================================

#[test]
fn basic_enemy_kill_credits_player() {
    let mut arena = single_tick().build();
    let player = player_one(&arena);
    let enemy = arena.place_enemy(EnemyKind::Basic, Point::new(131, 340), Direction::Down, false);
    arena.enemies_mut()[0].paused = true;

    assert!(arena.fire(player));
    let mut rewards = Vec::new();
    for _ in 0..5 {
        rewards.push(arena.step(Action::Idle).reward);
    }

    assert_eq!(arena.tank(enemy).map(|t| t.state), Some(TankState::Exploding));
    let data = arena.players()[0].player().cloned().unwrap();
    assert_eq!(data.trophies.get("enemy0"), Some(1));
    assert_eq!(data.score, 100);
    assert!(rewards.iter().any(|r| (r - 19.0).abs() < f32::EPSILON));
    assert_eq!(arena.labels().len(), 1);

    step_n(&mut arena, Action::Idle, 20);
    assert!(arena.enemies().is_empty());
    assert!(arena.is_active());
}

#[test]
fn armor_takes_four_hits() {
    let mut arena = single_tick().build();
    let player = player_one(&arena);
    let enemy = arena.place_enemy(EnemyKind::Armor, Point::new(200, 100), Direction::Down, false);

    for _ in 0..3 {
        assert_eq!(
            arena.bullet_impact(enemy, false, 100, player),
            Some(ImpactOutcome::Damaged)
        );
    }
    assert_eq!(
        arena.bullet_impact(enemy, false, 100, player),
        Some(ImpactOutcome::Destroyed)
    );
    let data = arena.players()[0].player().cloned().unwrap();
    assert_eq!(data.trophies.enemies, [0, 0, 0, 1]);
    assert_eq!(data.score, 400);
}

#[test]
fn lost_life_respawns_with_shield() {
    let mut arena = ArenaFixture::new().build();
    unshield_players(&mut arena);
    let player = player_one(&arena);
    teleport(&mut arena, player, Point::new(300, 200), Direction::Left);

    assert_eq!(
        arena.bullet_impact(player, false, 100, 0),
        Some(ImpactOutcome::Destroyed)
    );
    let (reward, last) = step_n(&mut arena, Action::Idle, 3);

    let tank = &arena.players()[0];
    assert_eq!(tank.player().map(|p| p.lives), Some(2));
    assert!(tank.is_alive());
    assert!(tank.shielded);
    assert_eq!(tank.rect.top_left(), Point::new(131, 387));
    assert_eq!(tank.direction, Direction::Up);
    assert!((reward - (-3.0 - 30.0)).abs() < f32::EPSILON);
    assert!(last.is_some_and(|result| !result.done));
}

#[test]
fn last_life_ends_game() {
    let mut arena = ArenaFixture::new()
        .with_config(|config| config.starting_lives = 1)
        .build();
    unshield_players(&mut arena);
    let player = player_one(&arena);
    arena.bullet_impact(player, false, 100, 0);

    let (_, last) = step_n(&mut arena, Action::Idle, 3);
    assert!(last.is_some_and(|result| result.done));
    assert!(arena.is_game_over());
    assert_eq!(arena.players()[0].state, TankState::Dead);
}

#[test]
fn clearing_stage_truncates_and_keeps_progress() {
    let mut arena = single_tick().build();
    let player = player_one(&arena);
    arena.set_spawn_queue(Vec::new());
    let enemy = arena.place_enemy(EnemyKind::Fast, Point::new(200, 100), Direction::Down, false);
    arena.players_mut()[0].power_up();

    arena.bullet_impact(enemy, false, 100, player);
    let (_, last) = step_n(&mut arena, Action::Idle, 20);
    let last = last.unwrap();
    assert!(last.truncated);
    assert!(!last.done);
    assert!(!arena.is_active());

    arena.reset(1).unwrap();
    let tank = &arena.players()[0];
    assert_eq!(tank.id, player);
    assert_eq!(tank.superpowers, 1);
    assert_eq!(tank.player().map(|p| p.score), Some(200));
    assert_eq!(tank.player().map(|p| p.trophies.kills()), Some(0));
}

#[test]
fn reset_after_game_over_creates_fresh_players() {
    let mut arena = ArenaFixture::new()
        .with_config(|config| config.starting_lives = 1)
        .build();
    unshield_players(&mut arena);
    let player = player_one(&arena);
    arena.bullet_impact(player, false, 100, 0);
    step_n(&mut arena, Action::Idle, 3);
    assert!(arena.is_game_over());

    arena.reset(1).unwrap();
    assert_ne!(player_one(&arena), player);
    assert!(!arena.is_game_over());
    assert!(arena.players()[0].is_alive());
}

// =============================================================================
// Spawning
// =============================================================================

#[test]
fn spawn_fails_when_all_slots_blocked() {
    let mut arena = single_tick().build();
    for slot in ENEMY_SPAWN_SLOTS {
        arena.place_enemy(EnemyKind::Basic, slot, Direction::Down, false);
    }
    let queued = arena.spawn_queue().len();

    assert_eq!(arena.spawn_enemy(), None);
    assert_eq!(arena.enemies().len(), 3);
    assert_eq!(arena.spawn_queue().len(), queued);
}

#[test]
fn spawned_enemy_avoids_occupied_slots() {
    let mut arena = single_tick().build();
    arena.place_enemy(EnemyKind::Basic, ENEMY_SPAWN_SLOTS[0], Direction::Down, false);
    arena.place_enemy(EnemyKind::Basic, ENEMY_SPAWN_SLOTS[1], Direction::Down, false);

    let id = arena.spawn_enemy().unwrap();
    let spawned = arena.tank(id).unwrap();
    assert_eq!(spawned.rect.top_left(), ENEMY_SPAWN_SLOTS[2]);
    assert_eq!(spawned.state, TankState::Spawning);
}

#[test]
fn spawning_enemy_becomes_alive_after_a_second() {
    let mut arena = ArenaFixture::new().build();
    let id = arena.spawn_enemy().unwrap();

    step_n(&mut arena, Action::Idle, 3);
    assert_eq!(arena.tank(id).map(|t| t.state), Some(TankState::Spawning));
    step_n(&mut arena, Action::Idle, 1);
    assert_eq!(arena.tank(id).map(|t| t.state), Some(TankState::Alive));
}

#[test]
fn enemy_cap_blocks_spawn() {
    let mut arena = single_tick().build();
    for x in [3, 60, 120, 300] {
        arena.place_enemy(EnemyKind::Basic, Point::new(x, 200), Direction::Down, false);
    }
    assert_eq!(arena.spawn_enemy(), None);
}

#[test]
fn builtin_level_keeps_quota_and_single_carrier() {
    for seed in [1, 2, 3] {
        let mut config = ArenaConfig::rl();
        config.timing.spawn_interval_ms = 500;
        let mut arena = Arena::new(config, seed);
        arena.reset(1).unwrap();

        for step in 0..150u32 {
            let action = Action::from_index((step % 6) as u8).unwrap();
            arena.step(action);
            let carriers = arena
                .enemies()
                .iter()
                .filter(|e| e.is_carrier() && e.state != TankState::Dead)
                .count();
            assert!(carriers <= 1, "seed {seed} step {step}: {carriers} carriers");
            assert!(arena.spawn_queue().len() + arena.enemies().len() <= 20);
            assert!(arena.enemies().len() <= 4);
            if arena.is_game_over() {
                break;
            }
        }
    }
}

// =============================================================================
// Bonuses
// =============================================================================

#[test]
fn star_twice_raises_bullet_cap_on_second() {
    let mut arena = single_tick().build();

    arena.place_bonus(BonusKind::Star, Rect::new(131, 370, 32, 32));
    arena.step(Action::MoveUp);
    let tank = &arena.players()[0];
    assert_eq!(tank.superpowers, 1);
    assert_eq!(tank.max_active_bullets, 1);
    assert!(arena.bonuses().is_empty());

    arena.place_bonus(BonusKind::Star, Rect::new(131, 360, 32, 32));
    arena.step(Action::MoveUp);
    let tank = &arena.players()[0];
    assert_eq!(tank.superpowers, 2);
    assert_eq!(tank.max_active_bullets, 2);

    let data = tank.player().unwrap();
    assert_eq!(data.trophies.bonus, 2);
    assert_eq!(data.score, 2 * BONUS_POINTS);
}

#[test]
fn grenade_explodes_every_enemy_without_credit() {
    let mut arena = single_tick().build();
    let player = player_one(&arena);
    for x in [3, 60, 120, 180, 240] {
        arena.place_enemy(EnemyKind::Basic, Point::new(x, 100), Direction::Down, false);
    }
    let bonus = arena.place_bonus(BonusKind::Grenade, Rect::new(300, 300, 32, 32));

    assert!(arena.trigger_bonus(bonus, player));
    assert_eq!(arena.enemies().len(), 5);
    assert!(arena
        .enemies()
        .iter()
        .all(|e| e.state == TankState::Exploding));

    let data = arena.players()[0].player().unwrap();
    assert_eq!(data.trophies.kills(), 0);
    assert_eq!(data.score, BONUS_POINTS);

    assert!(!arena.trigger_bonus(bonus, player));
}

#[test]
fn shovel_fortress_reverts_to_brick() {
    let mut arena = ArenaFixture::new().fortress().build();
    let player = player_one(&arena);
    arena
        .level_mut()
        .hit_tile(Point::new(11 * TILE_SIZE, 24 * TILE_SIZE), 1);

    let bonus = arena.place_bonus(BonusKind::Shovel, Rect::new(300, 300, 32, 32));
    assert!(arena.trigger_bonus(bonus, player));
    for (col, row) in FORTRESS_CELLS {
        assert_eq!(arena.level().tile(col, row), TileKind::Steel);
    }

    // 30 steps of 330 ms stay below the 10 s duration, the 31st crosses it
    step_n(&mut arena, Action::Idle, 30);
    assert_eq!(arena.level().tile(12, 23), TileKind::Steel);
    arena.step(Action::Idle);
    for (col, row) in FORTRESS_CELLS {
        assert_eq!(arena.level().tile(col, row), TileKind::Brick);
    }
}

#[test]
fn timer_bonus_freezes_enemies() {
    let mut arena = ArenaFixture::new().build();
    let player = player_one(&arena);
    let enemy = arena.place_enemy(EnemyKind::Fast, Point::new(195, 150), Direction::Down, false);
    let bonus = arena.place_bonus(BonusKind::Timer, Rect::new(300, 300, 32, 32));

    assert!(arena.trigger_bonus(bonus, player));
    assert!(arena.is_time_frozen());
    let frozen_at = arena.tank(enemy).map(|t| t.rect);
    step_n(&mut arena, Action::Idle, 10);
    assert_eq!(arena.tank(enemy).map(|t| t.rect), frozen_at);
    assert!(arena.bullets().is_empty());
    assert_eq!(arena.spawn_enemy(), None);

    step_n(&mut arena, Action::Idle, 21);
    assert!(!arena.is_time_frozen());
    assert_eq!(arena.tank(enemy).map(|t| t.paused), Some(false));
}

#[test]
fn helmet_regrant_extends_shield() {
    let mut arena = ArenaFixture::new().build();
    unshield_players(&mut arena);
    let player = player_one(&arena);

    let first = arena.place_bonus(BonusKind::Helmet, Rect::new(300, 300, 32, 32));
    assert!(arena.trigger_bonus(first, player));
    step_n(&mut arena, Action::Idle, 20);

    let second = arena.place_bonus(BonusKind::Helmet, Rect::new(300, 300, 32, 32));
    assert!(arena.trigger_bonus(second, player));
    step_n(&mut arena, Action::Idle, 15);
    assert!(arena.players()[0].shielded);

    step_n(&mut arena, Action::Idle, 16);
    assert!(!arena.players()[0].shielded);
}

#[test]
fn tank_bonus_adds_life() {
    let mut arena = single_tick().build();
    let player = player_one(&arena);
    let bonus = arena.place_bonus(BonusKind::Tank, Rect::new(300, 300, 32, 32));
    assert!(arena.trigger_bonus(bonus, player));
    assert_eq!(arena.players()[0].player().map(|p| p.lives), Some(4));
}

#[test]
fn uncollected_bonus_expires() {
    let mut arena = ArenaFixture::new().build();
    arena.place_bonus(BonusKind::Helmet, Rect::new(300, 100, 32, 32));
    step_n(&mut arena, Action::Idle, 30);
    assert_eq!(arena.bonuses().len(), 1);
    step_n(&mut arena, Action::Idle, 1);
    assert!(arena.bonuses().is_empty());
}

// =============================================================================
// Timers
// =============================================================================

fn timers_for(arena: &Arena, id: EntityId) -> Vec<TimerEvent> {
    arena
        .timers()
        .iter()
        .map(|(_, entry)| entry.event)
        .filter(|event| match event {
            TimerEvent::EnemyFire(owner)
            | TimerEvent::EnemyFlash(owner)
            | TimerEvent::ShieldFlicker(owner)
            | TimerEvent::ShieldExpire(owner) => *owner == id,
            _ => false,
        })
        .collect()
}

#[test]
fn dead_enemy_leaves_no_recurring_timers() {
    let mut arena = ArenaFixture::new().build();
    let player = player_one(&arena);
    let enemy = arena.place_enemy(EnemyKind::Basic, Point::new(200, 100), Direction::Down, true);
    let scheduled = timers_for(&arena, enemy);
    assert!(scheduled.contains(&TimerEvent::EnemyFire(enemy)));
    assert!(scheduled.contains(&TimerEvent::EnemyFlash(enemy)));

    arena.bullet_impact(enemy, false, 100, player);
    for _ in 0..20 {
        if arena.tank(enemy).is_none() {
            break;
        }
        arena.step(Action::Idle);
    }
    assert!(arena.tank(enemy).is_none());
    assert!(timers_for(&arena, enemy).is_empty());
}

#[test]
fn shield_flicker_timer_ends_with_shield() {
    let mut arena = ArenaFixture::new().build();
    let player = player_one(&arena);
    arena.shield_player(player, Some(1000));
    assert!(arena.players()[0].shielded);
    let flickers = |arena: &Arena| {
        timers_for(arena, player)
            .into_iter()
            .filter(|event| *event == TimerEvent::ShieldFlicker(player))
            .count()
    };
    assert_eq!(flickers(&arena), 1);

    step_n(&mut arena, Action::Idle, 5);
    assert!(!arena.players()[0].shielded);
    assert_eq!(flickers(&arena), 0);
    assert!(timers_for(&arena, player).is_empty());
}

// =============================================================================
// Two players
// =============================================================================

#[test]
fn friendly_fire_paralyses_player() {
    let mut arena = ArenaFixture::new()
        .config(ArenaConfig::arcade())
        .with_config(|config| config.timing.spawn_interval_ms = NEVER_MS)
        .build();
    unshield_players(&mut arena);
    let one = arena.players()[0].id;
    let two = arena.players()[1].id;
    teleport(&mut arena, one, Point::new(131, 200), Direction::Up);
    teleport(&mut arena, two, Point::new(259, 200), Direction::Left);

    arena.step_players(&[Action::Idle, Action::Fire]);
    for _ in 0..25 {
        arena.step_players(&[Action::Idle, Action::Idle]);
    }
    let victim = &arena.players()[0];
    assert!(victim.paralysed);
    assert_eq!(victim.health, 100);
    assert!(victim.is_alive());

    arena.step_players(&[Action::MoveLeft, Action::Idle]);
    let victim = &arena.players()[0];
    assert_eq!(victim.direction, Direction::Left);
    assert_eq!(victim.rect.x, 131);

    for _ in 0..500 {
        arena.step_players(&[Action::Idle, Action::Idle]);
    }
    assert!(!arena.players()[0].paralysed);
}

#[test]
fn step_index_rejects_out_of_range() {
    let mut arena = ArenaFixture::new().build();
    let tick = arena.tick_count();
    assert!(matches!(arena.step_index(9), Err(GameError::InvalidAction(9))));
    assert_eq!(arena.tick_count(), tick);
    assert!(arena.step_index(5).is_ok());
}

#[test]
fn quiet_config_has_rl_timing() {
    let config = quiet_config();
    assert_eq!(config.tick_ms, 33);
    assert_eq!(config.sub_ticks_per_step, 10);
}
