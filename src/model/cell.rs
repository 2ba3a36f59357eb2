//! A1 notation for cells and rectangular ranges, e.g. `B3` and `A1:Z100`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A zero-based (row, column) cell position. Displays and parses as A1 notation, so
/// `CellRef::new(0, 0)` is `A1` and `CellRef::new(9, 27)` is `AB10`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct CellRef {
    row: usize,
    col: usize,
}

impl CellRef {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row + 1)
    }
}

impl FromStr for CellRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (col, row) = parse_bound(s)?;
        match row {
            Some(row) => Ok(CellRef::new(row, col)),
            None => anyhow::bail!("Cell reference must have a row number, got: {s}"),
        }
    }
}

impl Serialize for CellRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CellRef::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A rectangular range such as `A1:Z100`, or whole columns such as `A:Z`. Both bounds are
/// inclusive. A column-only end bound has no last row.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct CellRange {
    start: CellRef,
    end_col: usize,
    end_row: Option<usize>,
}

impl CellRange {
    pub fn start(&self) -> CellRef {
        self.start
    }

    /// Whether the zero-based `(row, col)` falls inside this range.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.start.row
            && col >= self.start.col
            && col <= self.end_col
            && self.end_row.map_or(true, |end| row <= end)
    }
}

impl FromStr for CellRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (first, second) = match s.split_once(':') {
            Some((a, b)) => (a, b),
            None => (s, s),
        };
        let (start_col, start_row) = parse_bound(first)?;
        let (end_col, end_row) = parse_bound(second)?;
        if end_col < start_col || matches!((start_row, end_row), (Some(a), Some(b)) if b < a) {
            anyhow::bail!("Range end comes before its start: {s}");
        }
        Ok(Self {
            start: CellRef::new(start_row.unwrap_or(0), start_col),
            end_col,
            end_row,
        })
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end_row {
            Some(end_row) => write!(
                f,
                "{}:{}",
                self.start,
                CellRef::new(end_row, self.end_col)
            ),
            None => write!(
                f,
                "{}:{}",
                column_letters(self.start.col),
                column_letters(self.end_col)
            ),
        }
    }
}

/// Converts a zero-based column index to letters: 0 -> `A`, 25 -> `Z`, 26 -> `AA`.
pub fn column_letters(col: usize) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Parses `AB12` into zero-based `(27, Some(11))`, or `AB` into `(27, None)`.
fn parse_bound(s: &str) -> anyhow::Result<(usize, Option<usize>)> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(s.len());
    let (letters, digits) = s.split_at(split);
    if letters.is_empty() {
        anyhow::bail!("Cell reference must start with a column letter, got: {s}");
    }

    let mut col: usize = 0;
    for c in letters.chars() {
        let value = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(value))
            .ok_or_else(|| anyhow::anyhow!("Column is too large: {letters}"))?;
    }

    let row = if digits.is_empty() {
        None
    } else {
        let row = digits
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("Invalid row number in '{s}': {e}"))?;
        if row == 0 {
            anyhow::bail!("Row numbers start at 1, got: {s}");
        }
        Some(row - 1)
    };

    Ok((col - 1, row))
}
