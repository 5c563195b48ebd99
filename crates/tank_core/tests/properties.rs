//! Property tests over random layouts, damage values and action streams.

use proptest::prelude::*;
use tank_core::level::{Level, GRID_SIZE, TILE_SIZE};
use tank_core::prelude::*;
use tank_core::replay::Recorder;
use tank_core::tank::ImpactOutcome;
use tank_test_utils::determinism::{find_first_divergence, strategies};
use tank_test_utils::fixtures::{empty_layout, player_one, ArenaFixture};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn steel_survives_power_one(
        col in 0..GRID_SIZE,
        row in 0..GRID_SIZE,
        power in 1u8..=2,
    ) {
        let mut level = Level::parse(1, &empty_layout());
        level.set_tile(col, row, TileKind::Steel);
        let position = Point::new(col as i32 * TILE_SIZE, row as i32 * TILE_SIZE);

        prop_assert!(level.hit_tile(position, power));
        let expected = if power == 2 { TileKind::Empty } else { TileKind::Steel };
        prop_assert_eq!(level.tile(col, row), expected);
    }

    #[test]
    fn non_solid_tiles_let_bullets_pass(
        col in 0..GRID_SIZE,
        row in 0..GRID_SIZE,
        kind in strategies::arb_tile_kind(),
        power in 1u8..=2,
    ) {
        prop_assume!(!matches!(kind, TileKind::Brick | TileKind::Steel));
        let mut level = Level::parse(1, &empty_layout());
        level.set_tile(col, row, kind);
        let position = Point::new(col as i32 * TILE_SIZE, row as i32 * TILE_SIZE);

        prop_assert!(!level.hit_tile(position, power));
        prop_assert_eq!(level.tile(col, row), kind);
    }

    #[test]
    fn shield_absorbs_any_hit(damage in 1i32..1_000_000, friendly in any::<bool>()) {
        let mut arena = ArenaFixture::new().build();
        let player = player_one(&arena);

        let outcome = arena.bullet_impact(player, friendly, damage, 0);
        prop_assert_eq!(outcome, Some(ImpactOutcome::Absorbed));
        let tank = &arena.players()[0];
        prop_assert_eq!(tank.health, 100);
        prop_assert!(!tank.paralysed);
        prop_assert!(tank.is_alive());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn random_actions_never_diverge(
        seed in strategies::arb_seed(),
        actions in strategies::arb_actions(1..80),
    ) {
        let divergence = find_first_divergence(
            || {
                let mut arena = Arena::new(ArenaConfig::rl(), seed);
                arena.reset(1).unwrap();
                arena
            },
            &actions,
        );
        prop_assert_eq!(divergence, None);
    }

    #[test]
    fn recorded_episodes_verify(
        seed in strategies::arb_seed(),
        actions in strategies::arb_actions(1..60),
    ) {
        let mut recorder = Recorder::start(ArenaConfig::rl(), seed, 2).unwrap();
        for action in &actions {
            recorder.step(*action);
        }
        let replay = recorder.finish();
        prop_assert_eq!(replay.step_count(), actions.len());
        prop_assert!(replay.verify().is_ok());
    }

    #[test]
    fn enemy_population_stays_bounded(
        seed in strategies::arb_seed(),
        actions in strategies::arb_actions(50..120),
    ) {
        let mut config = ArenaConfig::rl();
        config.timing.spawn_interval_ms = 400;
        let mut arena = Arena::new(config, seed);
        arena.reset(2).unwrap();

        for action in actions {
            arena.step(action);
            prop_assert!(arena.enemies().len() <= 4);
            prop_assert!(arena.spawn_queue().len() + arena.enemies().len() <= 20);
            let carriers = arena
                .enemies()
                .iter()
                .filter(|enemy| enemy.is_carrier() && enemy.state != TankState::Dead)
                .count();
            prop_assert!(carriers <= 1);
        }
    }
}
