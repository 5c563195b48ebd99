//! ASCII arena visualizer.
//!
//! Draws the tile-category grid as text for quick terminal review of an
//! episode's final state.

use tank_core::castle::CastleState;
use tank_core::level::GRID_SIZE;
use tank_core::observation::{self, cell};
use tank_core::simulation::Arena;

/// ASCII visualization configuration.
#[derive(Debug, Clone)]
pub struct AsciiConfig {
    /// Print every cell twice so tiles look square in a terminal.
    pub double_width: bool,
    /// Show the symbol legend.
    pub show_legend: bool,
    /// Show the score and lives line.
    pub show_status: bool,
    /// Use colored output (ANSI).
    pub use_color: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            double_width: true,
            show_legend: true,
            show_status: true,
            use_color: true,
        }
    }
}

/// ANSI color codes.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";

    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const RED: &str = "\x1b[31m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const GREEN: &str = "\x1b[32m";
    pub const WHITE: &str = "\x1b[37m";
    pub const GRAY: &str = "\x1b[90m";
}

/// Glyph and color for a grid code.
fn glyph(code: u8) -> (char, &'static str) {
    match code {
        cell::BRICK => ('#', colors::RED),
        cell::STEEL => ('=', colors::WHITE),
        cell::WATER => ('~', colors::BLUE),
        cell::GRASS => ('"', colors::GREEN),
        cell::ICE => ('-', colors::CYAN),
        cell::CASTLE => ('H', colors::YELLOW),
        cell::BONUS => ('+', colors::BOLD),
        cell::ENEMY => ('E', colors::GRAY),
        cell::PLAYER => ('P', colors::YELLOW),
        cell::BULLET => ('*', colors::WHITE),
        _ => ('.', ""),
    }
}

/// Render the arena as ASCII art.
pub fn render_ascii(arena: &Arena, config: &AsciiConfig) -> String {
    let grid = observation::grid(arena);
    let repeat = if config.double_width { 2 } else { 1 };
    let inner = GRID_SIZE * repeat;
    let (bold, reset) = if config.use_color {
        (colors::BOLD, colors::RESET)
    } else {
        ("", "")
    };

    let mut output = String::new();
    output.push_str(&format!(
        "{bold}╔══ Level {} │ Tick {} ══╗{reset}\n",
        arena.level().id(),
        arena.tick_count()
    ));
    output.push_str(&format!("╔{}╗\n", "═".repeat(inner)));

    for row in grid.chunks(GRID_SIZE) {
        output.push('║');
        for &code in row {
            let (ch, color) = glyph(code);
            let cell: String = std::iter::repeat(ch).take(repeat).collect();
            if config.use_color && !color.is_empty() {
                output.push_str(color);
                output.push_str(&cell);
                output.push_str(colors::RESET);
            } else {
                output.push_str(&cell);
            }
        }
        output.push_str("║\n");
    }
    output.push_str(&format!("╚{}╝\n", "═".repeat(inner)));

    if config.show_status {
        output.push_str(&status_line(arena));
        output.push('\n');
    }
    if config.show_legend {
        output.push_str("# brick  = steel  ~ water  \" grass  - ice  H castle\n");
        output.push_str("+ bonus  E enemy  P player  * bullet\n");
    }
    output
}

/// One-line summary of score, lives and remaining enemies.
pub fn status_line(arena: &Arena) -> String {
    let players: Vec<String> = arena
        .players()
        .iter()
        .filter_map(|tank| tank.player())
        .map(|data| {
            format!(
                "P{} score {} lives {} kills {}",
                data.slot + 1,
                data.score,
                data.lives,
                data.trophies.kills()
            )
        })
        .collect();
    let castle = match arena.castle().state {
        CastleState::Standing => "standing",
        CastleState::Exploding => "exploding",
        CastleState::Destroyed => "destroyed",
    };
    let mut line = format!(
        "{} │ enemies queued {} on field {} │ castle {castle}",
        players.join(" │ "),
        arena.spawn_queue().len(),
        arena.enemies().len()
    );
    if arena.is_time_frozen() {
        line.push_str(" │ frozen");
    }
    if arena.is_game_over() {
        line.push_str(" │ GAME OVER");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use tank_test_utils::fixtures::ArenaFixture;

    fn plain() -> AsciiConfig {
        AsciiConfig {
            double_width: false,
            show_legend: false,
            show_status: false,
            use_color: false,
        }
    }

    #[test]
    fn test_plain_render_has_grid_rows() {
        let arena = ArenaFixture::new().build();
        let text = render_ascii(&arena, &plain());
        let rows: Vec<&str> = text.lines().filter(|line| line.starts_with('║')).collect();
        assert_eq!(rows.len(), GRID_SIZE);
        assert!(rows.iter().all(|row| row.chars().count() == GRID_SIZE + 2));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn test_castle_and_player_drawn() {
        let arena = ArenaFixture::new().build();
        let text = render_ascii(&arena, &plain());
        assert!(text.contains('H'));
        assert!(text.contains('P'));
    }

    #[test]
    fn test_double_width_and_color() {
        let arena = ArenaFixture::new().build();
        let text = render_ascii(&arena, &AsciiConfig::default());
        assert!(text.contains(colors::RESET));
        assert!(text.contains("PP"));
        assert!(text.contains("E enemy"));
    }

    #[test]
    fn test_status_line() {
        let arena = ArenaFixture::new().build();
        let line = status_line(&arena);
        assert!(line.starts_with("P1 score 0 lives"));
        assert!(line.contains("castle standing"));
        assert!(!line.contains("GAME OVER"));
    }
}
