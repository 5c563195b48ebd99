//! Level layout validation.
//!
//! A layout file is 26 lines of 26 characters from the tile alphabet
//! (`.`, `#`, `@`, `~`, `%`, `-`). The arena parser tolerates anything,
//! silently dropping extra cells and reading unknown characters as empty
//! ground, so this checker is where such mistakes surface.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use tank_core::castle::CASTLE_RECT;
use tank_core::level::{cell_rect, TileKind, GRID_SIZE};
use tank_core::math::Rect;
use tank_core::simulation::{ENEMY_SPAWN_SLOTS, PLAYER_SPAWNS};
use tank_core::tank::TANK_SIZE;

/// Characters a layout may contain.
pub const TILE_ALPHABET: [char; 6] = ['.', '#', '@', '~', '%', '-'];

/// Error that prevents validation from running at all.
#[derive(Error, Debug)]
pub enum ValidateError {
    /// The path is not a directory.
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Reading the directory or a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// What is wrong with a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// Character outside the tile alphabet.
    UnknownChar {
        /// The character found.
        found: char,
        /// Zero-based column.
        col: usize,
    },
    /// Line longer than the grid.
    RowTooLong {
        /// Characters on the line.
        len: usize,
    },
    /// More lines than the grid has rows.
    TooManyRows {
        /// Lines in the file.
        count: usize,
    },
    /// Obstacle tile on a cell that must stay free.
    BlockedCell {
        /// Zero-based column.
        col: usize,
        /// What the cell is reserved for.
        reserved: Reserved,
    },
    /// File is not valid UTF-8.
    NotUtf8,
}

/// Cells kept free of obstacles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reserved {
    /// Under the castle.
    Castle,
    /// Player respawn point.
    PlayerSpawn(usize),
    /// Enemy spawn slot.
    EnemySpawn(usize),
}

impl fmt::Display for Reserved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Castle => write!(f, "castle"),
            Self::PlayerSpawn(slot) => write!(f, "player {} spawn", slot + 1),
            Self::EnemySpawn(slot) => write!(f, "enemy spawn slot {slot}"),
        }
    }
}

/// One problem, located by file and zero-based row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// File the problem is in.
    pub file: PathBuf,
    /// Zero-based row, if the problem has one.
    pub row: Option<usize>,
    /// Problem.
    pub kind: IssueKind,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let Some(row) = self.row {
            write!(f, ":{}", row + 1)?;
        }
        match &self.kind {
            IssueKind::UnknownChar { found, col } => {
                write!(f, ": unknown character {found:?} at column {}", col + 1)
            }
            IssueKind::RowTooLong { len } => {
                write!(f, ": row has {len} cells, expected at most {GRID_SIZE}")
            }
            IssueKind::TooManyRows { count } => {
                write!(f, ": {count} rows, expected at most {GRID_SIZE}")
            }
            IssueKind::BlockedCell { col, reserved } => {
                write!(f, ": obstacle at column {} blocks the {reserved}", col + 1)
            }
            IssueKind::NotUtf8 => write!(f, ": not valid UTF-8"),
        }
    }
}

/// Result of validating a directory.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Layout files examined.
    pub files_checked: usize,
    /// Problems found.
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// True when no problem was found.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

fn reserved_areas() -> Vec<(Rect, Reserved)> {
    let mut areas = vec![(CASTLE_RECT, Reserved::Castle)];
    for (slot, point) in PLAYER_SPAWNS.iter().enumerate() {
        areas.push((Rect::at(*point, TANK_SIZE, TANK_SIZE), Reserved::PlayerSpawn(slot)));
    }
    for (slot, point) in ENEMY_SPAWN_SLOTS.iter().enumerate() {
        areas.push((Rect::at(*point, TANK_SIZE, TANK_SIZE), Reserved::EnemySpawn(slot)));
    }
    areas
}

/// Check one layout's text.
pub fn validate_layout(file: &Path, text: &str) -> Vec<Issue> {
    let issue = |row: Option<usize>, kind| Issue {
        file: file.to_path_buf(),
        row,
        kind,
    };
    let reserved = reserved_areas();
    let mut issues = Vec::new();

    let rows: Vec<&str> = text.lines().collect();
    if rows.len() > GRID_SIZE {
        issues.push(issue(None, IssueKind::TooManyRows { count: rows.len() }));
    }

    for (row, line) in rows.iter().enumerate() {
        let len = line.chars().count();
        if len > GRID_SIZE {
            issues.push(issue(Some(row), IssueKind::RowTooLong { len }));
        }
        for (col, c) in line.chars().enumerate() {
            if !TILE_ALPHABET.contains(&c) {
                issues.push(issue(Some(row), IssueKind::UnknownChar { found: c, col }));
                continue;
            }
            if row >= GRID_SIZE || col >= GRID_SIZE || !TileKind::from_char(c).is_obstacle() {
                continue;
            }
            let cell = cell_rect(col, row);
            if let Some((_, what)) = reserved.iter().find(|(area, _)| area.collides(&cell)) {
                issues.push(issue(
                    Some(row),
                    IssueKind::BlockedCell {
                        col,
                        reserved: *what,
                    },
                ));
            }
        }
    }
    issues
}

/// Validate every layout file in a directory.
///
/// Every regular file whose name is a level id is checked. Other files
/// are skipped.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed or a file cannot be
/// read. Layout problems are reported in the [`ValidationReport`].
pub fn validate_level_directory(path: &Path) -> Result<ValidationReport, ValidateError> {
    if !path.is_dir() {
        return Err(ValidateError::NotADirectory(path.to_path_buf()));
    }
    let io_err = |source| ValidateError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut files: Vec<PathBuf> = fs::read_dir(path)
        .map_err(io_err)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|file| file.is_file())
        .filter(|file| {
            file.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.parse::<u32>().is_ok())
        })
        .collect();
    files.sort();

    let mut report = ValidationReport::default();
    for file in files {
        let bytes = fs::read(&file).map_err(|source| ValidateError::Io {
            path: file.clone(),
            source,
        })?;
        report.files_checked += 1;
        let issues = match String::from_utf8(bytes) {
            Ok(text) => validate_layout(&file, &text),
            Err(_) => vec![Issue {
                file: file.clone(),
                row: None,
                kind: IssueKind::NotUtf8,
            }],
        };
        if issues.is_empty() {
            debug!(file = %file.display(), "Layout clean");
        } else {
            warn!(file = %file.display(), issues = issues.len(), "Layout has problems");
        }
        report.issues.extend(issues);
    }

    info!(
        files = report.files_checked,
        issues = report.issues.len(),
        "Validation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> Vec<String> {
        vec![".".repeat(GRID_SIZE); GRID_SIZE]
    }

    fn put(rows: &mut [String], col: usize, row: usize, c: char) {
        rows[row].replace_range(col..=col, &c.to_string());
    }

    fn check(rows: &[String]) -> Vec<IssueKind> {
        validate_layout(Path::new("t"), &rows.join("\n"))
            .into_iter()
            .map(|issue| issue.kind)
            .collect()
    }

    #[test]
    fn test_blank_layout_is_clean() {
        assert!(check(&blank()).is_empty());
    }

    #[test]
    fn test_unknown_character() {
        let mut rows = blank();
        put(&mut rows, 5, 5, 'x');
        assert_eq!(check(&rows), [IssueKind::UnknownChar { found: 'x', col: 5 }]);
    }

    #[test]
    fn test_oversized_layout() {
        let mut rows = blank();
        rows[3].push('.');
        rows.push(".".repeat(GRID_SIZE));
        let issues = check(&rows);
        assert!(issues.contains(&IssueKind::TooManyRows { count: 27 }));
        assert!(issues.contains(&IssueKind::RowTooLong { len: 27 }));
    }

    #[test]
    fn test_reserved_cells() {
        let mut rows = blank();
        put(&mut rows, 12, 24, '#');
        put(&mut rows, 8, 25, '@');
        put(&mut rows, 25, 1, '~');
        assert_eq!(
            check(&rows),
            [
                IssueKind::BlockedCell {
                    col: 25,
                    reserved: Reserved::EnemySpawn(2)
                },
                IssueKind::BlockedCell {
                    col: 12,
                    reserved: Reserved::Castle
                },
                IssueKind::BlockedCell {
                    col: 8,
                    reserved: Reserved::PlayerSpawn(0)
                },
            ]
        );
    }

    #[test]
    fn test_grass_and_ice_may_cover_spawns() {
        let mut rows = blank();
        put(&mut rows, 0, 0, '%');
        put(&mut rows, 9, 24, '-');
        assert!(check(&rows).is_empty());
    }

    #[test]
    fn test_issue_display() {
        let issue = Issue {
            file: PathBuf::from("levels/3"),
            row: Some(0),
            kind: IssueKind::BlockedCell {
                col: 12,
                reserved: Reserved::EnemySpawn(1),
            },
        };
        assert_eq!(
            issue.to_string(),
            "levels/3:1: obstacle at column 13 blocks the enemy spawn slot 1"
        );
    }

    #[test]
    fn test_builtin_levels_are_valid() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../tank_core/levels");
        let report = validate_level_directory(&dir).unwrap();
        assert_eq!(report.files_checked, 2);
        assert!(report.is_clean(), "{:?}", report.issues);
    }

    #[test]
    fn test_directory_scan() {
        let dir = tempfile::tempdir().unwrap();
        let mut rows = blank();
        fs::write(dir.path().join("1"), rows.join("\n")).unwrap();
        put(&mut rows, 2, 2, '?');
        fs::write(dir.path().join("2"), rows.join("\n")).unwrap();
        fs::write(dir.path().join("3"), b"\xff\xfe").unwrap();
        fs::write(dir.path().join("README"), "not a level").unwrap();

        let report = validate_level_directory(dir.path()).unwrap();
        assert_eq!(report.files_checked, 3);
        let kinds: Vec<&IssueKind> = report.issues.iter().map(|i| &i.kind).collect();
        assert_eq!(
            kinds,
            [
                &IssueKind::UnknownChar { found: '?', col: 2 },
                &IssueKind::NotUtf8
            ]
        );
    }

    #[test]
    fn test_missing_directory() {
        assert!(matches!(
            validate_level_directory(Path::new("/no/such/levels")),
            Err(ValidateError::NotADirectory(_))
        ));
    }
}
