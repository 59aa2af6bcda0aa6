//! Grid coordinate parsing and formatting.
//!
//! Provides bidirectional conversion between spreadsheet-style cell
//! addresses (e.g. "A1", "B2", "AA100") and zero-indexed row/column
//! coordinates.
//!
//! # Examples
//!
//! ```ignore
//! let pos = Position::parse("B3").unwrap();
//! assert_eq!(pos.col, 1);
//! assert_eq!(pos.row, 2);
//! assert_eq!(pos.format(), "B3");
//! ```

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// The largest row index one past the valid range (`kMaxRows` in the
/// original design).
pub const MAX_ROWS: usize = 16384;
/// The largest column index one past the valid range.
pub const MAX_COLS: usize = 16384;

/// A grid coordinate, zero-indexed.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Position {
        Position { row, col }
    }

    /// Whether this position falls inside `[0, MAX_ROWS) x [0, MAX_COLS)`.
    pub fn is_valid(&self) -> bool {
        self.row < MAX_ROWS && self.col < MAX_COLS
    }

    /// Parse a position from spreadsheet notation (e.g. "A1", "AA10").
    /// Case-sensitive: lowercase letters are rejected.
    pub fn parse(text: &str) -> Option<Position> {
        let caps = position_re().captures(text)?;
        let letters = &caps["letters"];
        let digits = &caps["digits"];

        let mut col_acc = 0usize;
        for c in letters.bytes() {
            let digit = (c - b'A') as usize + 1;
            col_acc = col_acc.checked_mul(26)?.checked_add(digit)?;
        }
        let col = col_acc.checked_sub(1)?;
        let row = digits.parse::<usize>().ok()?.checked_sub(1)?;

        let pos = Position::new(row, col);
        if pos.is_valid() { Some(pos) } else { None }
    }

    /// Render the bijective base-26 column letters for `col` (0 -> "A",
    /// 25 -> "Z", 26 -> "AA").
    pub fn col_to_letters(col: usize) -> String {
        let mut result = String::new();
        let mut n = col as u128 + 1;
        while n > 0 {
            n -= 1;
            result.insert(0, (b'A' + (n % 26) as u8) as char);
            n /= 26;
        }
        result
    }

    /// Render this position in spreadsheet notation, or the empty string
    /// if it is out of the valid range.
    pub fn format(&self) -> String {
        if !self.is_valid() {
            return String::new();
        }
        format!("{}{}", Position::col_to_letters(self.col), self.row + 1)
    }
}

fn position_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?<letters>[A-Z]+)(?<digits>[1-9][0-9]*)$")
            .expect("position grammar regex must compile")
    })
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

/// The printable bounding box of a sheet: one past the highest populated
/// row/column, or `(0, 0)` when nothing is populated.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct Size {
    pub rows: usize,
    pub cols: usize,
}

impl Size {
    pub fn new(rows: usize, cols: usize) -> Size {
        Size { rows, cols }
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }
}
