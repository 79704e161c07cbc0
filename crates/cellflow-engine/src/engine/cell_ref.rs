//! Cell reference parsing and formatting.
//!
//! Provides bidirectional conversion between spreadsheet-style cell references
//! (e.g., "A1", "J5") and zero-indexed column/row coordinates, plus the fixed
//! address space ([`GridBounds`]) every entry point validates against.
//!
//! # Examples
//!
//! ```ignore
//! let cell = CellRef::from_str("B3").unwrap();
//! assert_eq!(cell.col, 1);  // 0-indexed
//! assert_eq!(cell.row, 2);
//! assert_eq!(cell.to_string(), "B3");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Identifiers are a single column letter, so the grid can never be wider than this.
pub const MAX_COLUMNS: usize = 26;

/// A reference to a cell by column and row indices (0-indexed).
///
/// Serialized as its A1 name so snapshots can key cells by identifier.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(col: usize, row: usize) -> CellRef {
        CellRef { row, col }
    }

    /// Parse a cell reference from spreadsheet notation (e.g., "A1", "c4").
    /// Returns None if the input is not one letter followed by a 1-based row.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(name: &str) -> Option<CellRef> {
        Self::parse_a1(name)
    }

    fn parse_a1(name: &str) -> Option<CellRef> {
        let caps = a1_re().captures(name.trim())?;
        let letter = caps["letter"].to_ascii_uppercase().bytes().next()?;
        let col = (letter - b'A') as usize;
        let row = caps["numbers"].parse::<usize>().ok()?.checked_sub(1)?;
        Some(CellRef::new(col, row))
    }

    /// Convert column index to its letter (0 -> A, 9 -> J).
    /// Columns past Z have no single-letter name and render as `?`.
    pub fn col_to_letter(col: usize) -> char {
        if col < MAX_COLUMNS {
            (b'A' + col as u8) as char
        } else {
            '?'
        }
    }
}

fn a1_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?<letter>[A-Za-z])(?<numbers>[0-9]+)$").expect("A1 regex must compile")
    })
}

impl std::str::FromStr for CellRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_a1(s).ok_or_else(|| format!("Invalid cell reference: {}", s))
    }
}

impl TryFrom<String> for CellRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CellRef> for String {
    fn from(value: CellRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CellRef::col_to_letter(self.col), self.row + 1)
    }
}

/// Row-major ordering, so "A2" sorts after "J1".
impl Ord for CellRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.row.cmp(&other.row).then(self.col.cmp(&other.col))
    }
}

impl PartialOrd for CellRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// The fixed addressable space: `columns` letters starting at `A`, rows `1..=rows`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GridBounds {
    pub columns: usize,
    pub rows: usize,
}

impl GridBounds {
    /// Clamps `columns` to the single-letter range and `rows` to at least one.
    pub fn new(columns: usize, rows: usize) -> GridBounds {
        GridBounds {
            columns: columns.clamp(1, MAX_COLUMNS),
            rows: rows.max(1),
        }
    }

    pub fn contains(&self, cell: &CellRef) -> bool {
        cell.col < self.columns && cell.row < self.rows
    }

    /// True iff `name` parses as an identifier and falls inside the grid.
    pub fn is_valid_reference(&self, name: &str) -> bool {
        CellRef::from_str(name).is_some_and(|cell| self.contains(&cell))
    }

    /// Parse and bounds-check in one step.
    pub fn resolve(&self, name: &str) -> Option<CellRef> {
        CellRef::from_str(name).filter(|cell| self.contains(cell))
    }

    pub fn cell_count(&self) -> usize {
        self.columns * self.rows
    }

    /// Every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.columns).map(move |col| CellRef::new(col, row)))
    }
}

impl Default for GridBounds {
    fn default() -> Self {
        GridBounds::new(10, 5)
    }
}

#[cfg(test)]
mod tests {
    use super::{CellRef, GridBounds};

    #[test]
    fn test_from_str_single_letter_columns() {
        let a1 = CellRef::from_str("A1").unwrap();
        assert_eq!((a1.col, a1.row), (0, 0));

        let j5 = CellRef::from_str("J5").unwrap();
        assert_eq!((j5.col, j5.row), (9, 4));

        let lower = CellRef::from_str("c3").unwrap();
        assert_eq!((lower.col, lower.row), (2, 2));
    }

    #[test]
    fn test_from_str_invalid_inputs() {
        assert!(CellRef::from_str("").is_none());
        assert!(CellRef::from_str("123").is_none());
        assert!(CellRef::from_str("AA1").is_none());
        assert!(CellRef::from_str("A0").is_none());
        assert!(CellRef::from_str("1A").is_none());
        assert!(CellRef::from_str("A 1").is_none());
        assert!(CellRef::from_str("A99999999999999999999999").is_none());
    }

    #[test]
    fn test_display_round_trip() {
        assert_eq!(CellRef::new(3, 1).to_string(), "D2");
        assert_eq!("D2".parse::<CellRef>().unwrap(), CellRef::new(3, 1));
    }

    #[test]
    fn test_default_bounds_are_ten_by_five() {
        let bounds = GridBounds::default();
        assert!(bounds.is_valid_reference("A1"));
        assert!(bounds.is_valid_reference("J5"));
        assert!(!bounds.is_valid_reference("K1"));
        assert!(!bounds.is_valid_reference("A6"));
        assert!(!bounds.is_valid_reference("A0"));
        assert_eq!(bounds.cell_count(), 50);
        assert_eq!(bounds.cells().count(), 50);
    }

    #[test]
    fn test_bounds_clamp_columns_to_single_letters() {
        let bounds = GridBounds::new(40, 0);
        assert_eq!(bounds.columns, 26);
        assert_eq!(bounds.rows, 1);
    }

    #[test]
    fn test_row_major_ordering() {
        let mut cells = vec![CellRef::new(0, 1), CellRef::new(9, 0), CellRef::new(0, 0)];
        cells.sort();
        let names: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["A1", "J1", "A2"]);
    }
}
