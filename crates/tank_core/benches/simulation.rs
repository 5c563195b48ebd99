//! Arena benchmarks.
//!
//! Run with: `cargo bench -p tank_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use tank_core::prelude::*;

const ACTION_CYCLE: [Action; 6] = [
    Action::Idle,
    Action::MoveUp,
    Action::Fire,
    Action::MoveLeft,
    Action::Fire,
    Action::MoveRight,
];

fn arena(mode: ObservationMode) -> Arena {
    let mut arena = Arena::new(ArenaConfig::rl().with_observation(mode), 42);
    arena.reset(1).expect("builtin level 1");
    arena
}

/// 100 steps of the RL profile per iteration, one group per encoder.
pub fn step_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_100");
    for (name, mode) in [
        ("features", ObservationMode::Features),
        ("grid", ObservationMode::Grid),
        ("pixels", ObservationMode::Pixels),
    ] {
        group.bench_function(name, |b| {
            b.iter_batched(
                || arena(mode),
                |mut arena| {
                    for action in ACTION_CYCLE.iter().cycle().take(100) {
                        black_box(arena.step(*action));
                    }
                    arena
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

pub fn reset_benchmark(c: &mut Criterion) {
    let mut arena = arena(ObservationMode::Features);
    c.bench_function("reset", |b| {
        b.iter(|| black_box(arena.reset(black_box(2))));
    });
}

pub fn hash_benchmark(c: &mut Criterion) {
    let mut arena = arena(ObservationMode::Features);
    for action in ACTION_CYCLE.iter().cycle().take(60) {
        arena.step(*action);
    }
    c.bench_function("state_hash", |b| b.iter(|| black_box(arena.state_hash())));
}

criterion_group!(benches, step_benchmark, reset_benchmark, hash_benchmark);
criterion_main!(benches);
