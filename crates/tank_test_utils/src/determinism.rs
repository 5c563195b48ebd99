//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the arena produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Replays, batch evaluation and reward comparisons all assume the arena
//! is 100% deterministic. Sources of non-determinism include:
//!
//! - **System randomness**: every random choice must come from the arena's
//!   seeded PCG, never from `thread_rng` or the clock.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Entities live in vectors and timers in a `BTreeMap`, both iterated in
//!   creation order.
//!
//! - **Floating-point math**: only the reward and feature encoder use
//!   floats; simulation geometry is integer pixels.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual modules (timer pool, pathing) are seeded
//! 2. **Property tests**: random action streams must still replay exactly
//! 3. **Integration tests**: full episodes are reproducible
//! 4. **Parallel tests**: running N arenas on threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use tank_core::components::Action;
use tank_core::simulation::Arena;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps simulated.
    pub steps: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic arena).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the arena was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Arena is non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `steps` - Number of steps per run
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance by one step, given the step index
/// * `hash` - Function to compute the state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S, u64),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for index in 0..steps {
            step(&mut state, index);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        steps,
    }
}

/// Run two arenas from the same setup through the same action stream and
/// compare their final hashes.
pub fn verify_arena_determinism<F>(setup_fn: F, actions: &[Action]) -> DeterminismResult
where
    F: Fn() -> Arena,
{
    verify_determinism(
        2,
        actions.len() as u64,
        &setup_fn,
        |arena, index| {
            arena.step(actions[index as usize]);
        },
        Arena::state_hash,
    )
}

/// Run `runs` arenas on scoped threads through the same action stream and
/// collect their final hashes.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_arenas<F>(setup_fn: F, runs: usize, actions: &[Action]) -> DeterminismResult
where
    F: Fn() -> Arena + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..runs)
            .map(|_| {
                s.spawn(|| {
                    let mut arena = setup_fn();
                    for action in actions {
                        arena.step(*action);
                    }
                    arena.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("arena worker panicked"))
            .collect()
    });

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        steps: actions.len() as u64,
    }
}

/// Compare two arena runs step-by-step, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs match throughout, `Some(step)` for the first step
/// (1-based, 0 for the initial state) whose hashes differ.
pub fn find_first_divergence<F>(setup_fn: F, actions: &[Action]) -> Option<u64>
where
    F: Fn() -> Arena,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    if first.state_hash() != second.state_hash() {
        return Some(0);
    }

    for (index, action) in actions.iter().enumerate() {
        first.step(*action);
        second.step(*action);

        if first.state_hash() != second.state_hash() {
            return Some(index as u64 + 1);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
pub mod strategies {
    use proptest::prelude::*;
    use tank_core::components::{Action, Direction};
    use tank_core::level::TileKind;

    /// Any of the six actions.
    pub fn arb_action() -> impl Strategy<Value = Action> {
        (0u8..6).prop_map(|index| Action::from_index(index).unwrap_or_default())
    }

    /// An action stream of `len` steps.
    pub fn arb_actions(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<Action>> {
        prop::collection::vec(arb_action(), len)
    }

    /// Any direction.
    pub fn arb_direction() -> impl Strategy<Value = Direction> {
        (0usize..4).prop_map(Direction::from_index)
    }

    /// Any tile kind.
    pub fn arb_tile_kind() -> impl Strategy<Value = TileKind> {
        prop_oneof![
            Just(TileKind::Empty),
            Just(TileKind::Brick),
            Just(TileKind::Steel),
            Just(TileKind::Water),
            Just(TileKind::Grass),
            Just(TileKind::Ice),
        ]
    }

    /// A seed for the arena RNG.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }
}
