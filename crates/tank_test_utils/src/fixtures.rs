//! Test fixtures and helpers.
//!
//! Arenas built from inline layouts, with enemy spawning pushed out of the
//! way so scenarios can place exactly the entities they need.

use tank_core::config::ArenaConfig;
use tank_core::level::{LevelLibrary, TileKind, GRID_SIZE};
use tank_core::prelude::*;

/// Level id fixtures load their layout under.
pub const FIXTURE_LEVEL: u32 = 1;

/// Spawn interval long enough that no enemy appears during a test.
pub const NEVER_MS: u32 = 3_600_000;

/// A 26x26 layout with no tiles at all.
#[must_use]
pub fn empty_layout() -> String {
    let row = ".".repeat(GRID_SIZE);
    let mut layout = String::with_capacity((GRID_SIZE + 1) * GRID_SIZE);
    for _ in 0..GRID_SIZE {
        layout.push_str(&row);
        layout.push('\n');
    }
    layout
}

/// RL profile with enemy spawning disabled.
#[must_use]
pub fn quiet_config() -> ArenaConfig {
    let mut config = ArenaConfig::rl();
    config.timing.spawn_interval_ms = NEVER_MS;
    config
}

/// RL profile with spawning disabled and one sub-tick per step, for
/// pixel-exact scenarios.
#[must_use]
pub fn single_tick_config() -> ArenaConfig {
    let mut config = quiet_config();
    config.sub_ticks_per_step = 1;
    config
}

/// Builder for a reset arena on an inline layout.
///
/// ```
/// use tank_core::level::TileKind;
/// use tank_test_utils::fixtures::ArenaFixture;
///
/// let arena = ArenaFixture::new().tile(8, 20, TileKind::Steel).build();
/// assert_eq!(arena.level().tile(8, 20), TileKind::Steel);
/// ```
#[derive(Debug, Clone)]
pub struct ArenaFixture {
    config: ArenaConfig,
    seed: u64,
    cells: Vec<Vec<char>>,
}

impl Default for ArenaFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaFixture {
    /// Empty layout, quiet config, seed 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: quiet_config(),
            seed: 1,
            cells: vec![vec!['.'; GRID_SIZE]; GRID_SIZE],
        }
    }

    /// Replace the whole layout. Rows beyond 26 and characters beyond
    /// column 26 are dropped, missing cells stay empty.
    #[must_use]
    pub fn layout(mut self, layout: &str) -> Self {
        self.cells = vec![vec!['.'; GRID_SIZE]; GRID_SIZE];
        for (row, line) in layout.lines().take(GRID_SIZE).enumerate() {
            for (col, c) in line.chars().take(GRID_SIZE).enumerate() {
                self.cells[row][col] = c;
            }
        }
        self
    }

    /// Set one tile.
    #[must_use]
    pub fn tile(mut self, col: usize, row: usize, kind: TileKind) -> Self {
        if let Some(cell) = self.cells.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = kind.to_char();
        }
        self
    }

    /// Put the fortress bricks around the castle.
    #[must_use]
    pub fn fortress(mut self) -> Self {
        for (col, row) in tank_core::level::FORTRESS_CELLS {
            self.cells[row][col] = TileKind::Brick.to_char();
        }
        self
    }

    /// Replace the config.
    #[must_use]
    pub fn config(mut self, config: ArenaConfig) -> Self {
        self.config = config;
        self
    }

    /// Edit the config in place.
    #[must_use]
    pub fn with_config(mut self, edit: impl FnOnce(&mut ArenaConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// RNG seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Layout text as currently configured.
    #[must_use]
    pub fn layout_text(&self) -> String {
        let mut text = String::new();
        for row in &self.cells {
            text.extend(row.iter());
            text.push('\n');
        }
        text
    }

    /// Build and reset the arena on [`FIXTURE_LEVEL`].
    ///
    /// # Panics
    ///
    /// Panics if the fixture level fails to load, which only happens if
    /// the library itself is broken.
    #[must_use]
    pub fn build(self) -> Arena {
        let mut library = LevelLibrary::empty();
        library.insert(FIXTURE_LEVEL, self.layout_text());
        let mut arena = Arena::new(self.config, self.seed).with_levels(library);
        arena
            .reset(FIXTURE_LEVEL)
            .expect("fixture level must load");
        tracing::debug!(seed = self.seed, "Fixture arena built");
        arena
    }
}

/// Drop player one's spawn shield so it can be hit.
pub fn unshield_players(arena: &mut Arena) {
    for player in arena.players_mut() {
        player.shielded = false;
    }
}

/// Move a tank to `position` without collision checks.
pub fn teleport(arena: &mut Arena, id: EntityId, position: Point, facing: Direction) {
    if let Some(tank) = arena.tank_mut(id) {
        tank.rect = tank.rect.moved_to(position);
        tank.direction = facing;
    }
}

/// Step `count` times with `action`, returning the summed reward and the
/// last result.
pub fn step_n(arena: &mut Arena, action: Action, count: usize) -> (f32, Option<StepResult>) {
    let mut total = 0.0;
    let mut last = None;
    for _ in 0..count {
        let result = arena.step(action);
        total += result.reward;
        last = Some(result);
    }
    (total, last)
}

/// Player one's id.
///
/// # Panics
///
/// Panics if the arena has no players.
#[must_use]
pub fn player_one(arena: &Arena) -> EntityId {
    arena.players()[0].id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_layout_dimensions() {
        let layout = empty_layout();
        assert_eq!(layout.lines().count(), GRID_SIZE);
        assert!(layout.lines().all(|line| line.len() == GRID_SIZE));
    }

    #[test]
    fn test_fixture_builds_quiet_arena() {
        let mut arena = ArenaFixture::new().fortress().build();
        assert_eq!(arena.level().tile(11, 24), TileKind::Brick);
        step_n(&mut arena, Action::Idle, 20);
        assert!(arena.enemies().is_empty());
    }

    #[test]
    fn test_layout_is_clipped() {
        let wide = "#".repeat(40);
        let fixture = ArenaFixture::new().layout(&wide);
        let text = fixture.layout_text();
        assert_eq!(text.lines().next().map(str::len), Some(GRID_SIZE));
    }
}
