use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cell::{EXCEL_MAX_COLS, EXCEL_MAX_ROWS};

/// A reference to a single cell within a sheet.
///
/// Rows and columns are **0-indexed**:
/// - `row = 0` is row `1` in A1 notation
/// - `col = 0` is column `A`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    /// 0-indexed row.
    pub row: u32,
    /// 0-indexed column.
    pub col: u32,
}

impl CellRef {
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Returns true if the coordinate lies inside the addressable grid.
    #[inline]
    pub const fn in_bounds(self) -> bool {
        self.row < EXCEL_MAX_ROWS && self.col < EXCEL_MAX_COLS
    }

    /// Convert to A1 notation (e.g. `A1`, `BC32`).
    pub fn to_a1(self) -> String {
        format!("{}{}", col_to_name(self.col), self.row + 1)
    }

    /// Parse an A1-style reference (e.g. `A1`, `$B$2`).
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }

        let body = s.strip_prefix('$').unwrap_or(s);
        let col_len = body
            .bytes()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        if col_len == 0 {
            return Err(A1ParseError::MissingColumn);
        }
        let (col_str, rest) = body.split_at(col_len);
        let rest = rest.strip_prefix('$').unwrap_or(rest);
        if rest.is_empty() {
            return Err(A1ParseError::MissingRow);
        }
        if !rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(A1ParseError::TrailingCharacters);
        }

        let col = name_to_col(col_str)?;
        let row_1_based: u32 = rest.parse().map_err(|_| A1ParseError::InvalidRow)?;
        if row_1_based == 0 || row_1_based > EXCEL_MAX_ROWS {
            return Err(A1ParseError::InvalidRow);
        }

        Ok(Self::new(row_1_based - 1, col))
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// A rectangular, inclusive region within a sheet.
///
/// The range is always normalized such that `start.row <= end.row` and
/// `start.col <= end.col`; every constructor goes through [`Range::new`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawRange")]
pub struct Range {
    pub start: CellRef,
    pub end: CellRef,
}

#[derive(Deserialize)]
struct RawRange {
    start: CellRef,
    end: CellRef,
}

impl From<RawRange> for Range {
    fn from(raw: RawRange) -> Self {
        Range::new(raw.start, raw.end)
    }
}

impl Range {
    /// Construct a new range, normalizing coordinates if needed.
    pub const fn new(a: CellRef, b: CellRef) -> Self {
        let start_row = if a.row <= b.row { a.row } else { b.row };
        let end_row = if a.row <= b.row { b.row } else { a.row };
        let start_col = if a.col <= b.col { a.col } else { b.col };
        let end_col = if a.col <= b.col { b.col } else { a.col };
        Self {
            start: CellRef::new(start_row, start_col),
            end: CellRef::new(end_row, end_col),
        }
    }

    /// Build a range from raw row/column bounds in any order.
    pub const fn from_bounds(row_a: u32, col_a: u32, row_b: u32, col_b: u32) -> Self {
        Self::new(CellRef::new(row_a, col_a), CellRef::new(row_b, col_b))
    }

    pub const fn single(cell: CellRef) -> Self {
        Self { start: cell, end: cell }
    }

    /// Every column of `row`.
    pub const fn full_row(row: u32) -> Self {
        Self::from_bounds(row, 0, row, EXCEL_MAX_COLS - 1)
    }

    /// Every row of `col`.
    pub const fn full_col(col: u32) -> Self {
        Self::from_bounds(0, col, EXCEL_MAX_ROWS - 1, col)
    }

    pub const fn full_sheet() -> Self {
        Self::from_bounds(0, 0, EXCEL_MAX_ROWS - 1, EXCEL_MAX_COLS - 1)
    }

    #[inline]
    pub const fn contains(&self, cell: CellRef) -> bool {
        cell.row >= self.start.row
            && cell.row <= self.end.row
            && cell.col >= self.start.col
            && cell.col <= self.end.col
    }

    #[inline]
    pub const fn contains_range(&self, other: &Range) -> bool {
        self.contains(other.start) && self.contains(other.end)
    }

    #[inline]
    pub const fn intersects(&self, other: &Range) -> bool {
        self.start.row <= other.end.row
            && other.start.row <= self.end.row
            && self.start.col <= other.end.col
            && other.start.col <= self.end.col
    }

    pub fn intersection(&self, other: &Range) -> Option<Range> {
        if !self.intersects(other) {
            return None;
        }
        Some(Range::from_bounds(
            self.start.row.max(other.start.row),
            self.start.col.max(other.start.col),
            self.end.row.min(other.end.row),
            self.end.col.min(other.end.col),
        ))
    }

    /// Smallest range covering both `self` and `other`.
    pub fn union(&self, other: &Range) -> Range {
        Range::from_bounds(
            self.start.row.min(other.start.row),
            self.start.col.min(other.start.col),
            self.end.row.max(other.end.row),
            self.end.col.max(other.end.col),
        )
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Number of cells covered. Computed in `u64` because a full sheet overflows `u32`.
    #[inline]
    pub const fn cell_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    #[inline]
    pub const fn is_single_cell(&self) -> bool {
        self.start.row == self.end.row && self.start.col == self.end.col
    }

    pub const fn spans_all_rows(&self) -> bool {
        self.start.row == 0 && self.end.row == EXCEL_MAX_ROWS - 1
    }

    pub const fn spans_all_cols(&self) -> bool {
        self.start.col == 0 && self.end.col == EXCEL_MAX_COLS - 1
    }

    /// Iterate the covered cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        let (start_col, end_col) = (self.start.col, self.end.col);
        (self.start.row..=self.end.row)
            .flat_map(move |row| (start_col..=end_col).map(move |col| CellRef::new(row, col)))
    }

    /// Parse an A1-style range like `A1:B2`, or a single cell like `C3`.
    pub fn from_a1(a1: &str) -> Result<Self, RangeParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(RangeParseError::Empty);
        }

        match s.split_once(':') {
            None => Ok(Range::single(CellRef::from_a1(s)?)),
            Some((a, b)) => Ok(Range::new(CellRef::from_a1(a)?, CellRef::from_a1(b)?)),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum A1ParseError {
    #[error("empty A1 reference")]
    Empty,
    #[error("missing column in A1 reference")]
    MissingColumn,
    #[error("missing row in A1 reference")]
    MissingRow,
    #[error("invalid column in A1 reference")]
    InvalidColumn,
    #[error("invalid row in A1 reference")]
    InvalidRow,
    #[error("trailing characters in A1 reference")]
    TrailingCharacters,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum RangeParseError {
    #[error("empty A1 range")]
    Empty,
    #[error("invalid cell reference in range: {0}")]
    Cell(#[from] A1ParseError),
}

pub(crate) fn col_to_name(col: u32) -> String {
    // A1 columns are 1-based; we store 0-based.
    let mut n = col + 1;
    let mut out = Vec::<u8>::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

fn name_to_col(s: &str) -> Result<u32, A1ParseError> {
    let mut col: u32 = 0;
    for b in s.bytes() {
        let v = (b.to_ascii_uppercase() - b'A') as u32 + 1;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(v))
            .ok_or(A1ParseError::InvalidColumn)?;
    }
    if col == 0 || col > EXCEL_MAX_COLS {
        return Err(A1ParseError::InvalidColumn);
    }
    Ok(col - 1)
}
