use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{normalize_formula_text, CellRef, CellValue};

/// Maximum rows per sheet (1,048,576).
pub const EXCEL_MAX_ROWS: u32 = 1_048_576;

/// Maximum columns per sheet (16,384).
pub const EXCEL_MAX_COLS: u32 = 16_384;

const COL_BITS: u32 = 14; // 2^14 = 16,384 columns.
const COL_MASK: u64 = (1u64 << COL_BITS) - 1;

/// Compact key used for sparse cell storage.
///
/// The key is a packed `(row, col)` pair:
///
/// ```text
/// key = (row << 14) | col
/// ```
///
/// Ordering on the packed value is row-major, so a `BTreeMap<CellKey, _>` can be
/// range-scanned by row.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(transparent)]
pub struct CellKey(u64);

impl CellKey {
    /// Encode an in-bounds coordinate. Returns `None` outside the grid.
    #[inline]
    pub const fn try_new(row: u32, col: u32) -> Option<Self> {
        if row >= EXCEL_MAX_ROWS || col >= EXCEL_MAX_COLS {
            return None;
        }
        Some(Self(((row as u64) << COL_BITS) | (col as u64)))
    }

    /// First key of `row`, for row-ordered range scans.
    #[inline]
    pub const fn row_start(row: u32) -> Self {
        Self((row as u64) << COL_BITS)
    }

    #[inline]
    pub const fn row(self) -> u32 {
        (self.0 >> COL_BITS) as u32
    }

    #[inline]
    pub const fn col(self) -> u32 {
        (self.0 & COL_MASK) as u32
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn to_ref(self) -> CellRef {
        CellRef::new(self.row(), self.col())
    }

    #[inline]
    pub const fn from_ref(cell: CellRef) -> Option<Self> {
        Self::try_new(cell.row, cell.col)
    }
}

impl<'de> Deserialize<'de> for CellKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = u64::deserialize(deserializer)?;
        let row = raw >> COL_BITS;
        let col = raw & COL_MASK;
        if row >= EXCEL_MAX_ROWS as u64 {
            return Err(D::Error::custom(format!("CellKey row out of bounds: {row}")));
        }
        Ok(CellKey(((row) << COL_BITS) | col))
    }
}

impl From<CellKey> for u64 {
    fn from(value: CellKey) -> Self {
        value.0
    }
}

/// State of a single cell: `{ value, formula, style_id }`.
///
/// `value` is [`CellValue::Empty`] for a formula cell whose result has not been
/// supplied by the external evaluator yet. Cells are stored sparsely: a cell with
/// no value, no formula and style `0` is never kept in a sheet store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub value: CellValue,

    /// Canonical formula text (trimmed, no leading `=`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    /// Index into the document style table. `0` means "no overrides".
    #[serde(default)]
    pub style_id: u32,
}

impl Cell {
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    /// A formula cell with no computed value yet.
    pub fn from_formula(formula: &str) -> Self {
        let formula = normalize_formula_text(formula);
        Self {
            value: CellValue::Empty,
            formula: (!formula.is_empty()).then_some(formula),
            style_id: 0,
        }
    }

    /// Returns true if this cell has no observable content or formatting.
    pub fn is_truly_empty(&self) -> bool {
        self.value.is_empty() && self.formula.is_none() && self.style_id == 0
    }

    /// Returns true if the cell carries no value or formula (style is ignored).
    pub fn has_no_content(&self) -> bool {
        self.value.is_empty() && self.formula.is_none()
    }

    /// Replace value/formula with `input`, keeping the current style.
    pub fn with_input(&self, input: &CellInput) -> Cell {
        let mut next = match input {
            CellInput::Value(value) => Cell::new(value.clone()),
            CellInput::Formula(formula) => Cell::from_formula(formula),
        };
        next.style_id = self.style_id;
        next
    }
}

/// User-facing input for a single cell write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellInput {
    Value(CellValue),
    Formula(String),
}

impl CellInput {
    pub const fn empty() -> Self {
        CellInput::Value(CellValue::Empty)
    }
}

/// Text beginning with `=` is a formula; anything else is a literal string.
impl From<&str> for CellInput {
    fn from(value: &str) -> Self {
        if value.trim_start().starts_with('=') {
            CellInput::Formula(value.to_string())
        } else {
            CellInput::Value(CellValue::from(value))
        }
    }
}

impl From<f64> for CellInput {
    fn from(value: f64) -> Self {
        CellInput::Value(CellValue::Number(value))
    }
}

impl From<i32> for CellInput {
    fn from(value: i32) -> Self {
        CellInput::Value(CellValue::Number(value as f64))
    }
}

impl From<bool> for CellInput {
    fn from(value: bool) -> Self {
        CellInput::Value(CellValue::Boolean(value))
    }
}

impl From<CellValue> for CellInput {
    fn from(value: CellValue) -> Self {
        CellInput::Value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_key_roundtrip_and_order() {
        let key = CellKey::try_new(EXCEL_MAX_ROWS - 1, EXCEL_MAX_COLS - 1).unwrap();
        assert_eq!(key.row(), EXCEL_MAX_ROWS - 1);
        assert_eq!(key.col(), EXCEL_MAX_COLS - 1);

        assert!(CellKey::try_new(EXCEL_MAX_ROWS, 0).is_none());
        assert!(CellKey::try_new(0, EXCEL_MAX_COLS).is_none());

        let a = CellKey::try_new(1, 16_000).unwrap();
        let b = CellKey::try_new(2, 0).unwrap();
        assert!(a < b, "keys order row-major");
        assert!(CellKey::row_start(2) <= b);
    }

    #[test]
    fn cell_key_deserialize_validates_bounds() {
        let too_large = (EXCEL_MAX_ROWS as u64) << COL_BITS;
        let err = serde_json::from_str::<CellKey>(&too_large.to_string()).unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
    }

    #[test]
    fn formula_input_is_detected_and_normalized() {
        let input = CellInput::from("=1+1");
        assert_eq!(input, CellInput::Formula("=1+1".to_string()));

        let cell = Cell {
            style_id: 7,
            ..Cell::new(CellValue::Number(3.0))
        }
        .with_input(&input);
        assert_eq!(cell.formula.as_deref(), Some("1+1"));
        assert_eq!(cell.value, CellValue::Empty);
        assert_eq!(cell.style_id, 7);
    }

    #[test]
    fn empty_formula_clears_the_formula() {
        let cell = Cell::from_formula("  =  ");
        assert!(cell.is_truly_empty());
    }
}
