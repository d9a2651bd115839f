//! Row ordering for range sorts.

use std::cmp::Ordering;

use formula_model::{Cell, CellRef, CellValue};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKey {
    /// Absolute sheet column.
    pub column: u32,
    #[serde(default)]
    pub descending: bool,
}

impl SortKey {
    pub const fn ascending(column: u32) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub const fn descending(column: u32) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub keys: Vec<SortKey>,
    /// The first row of the range is a header and stays in place.
    #[serde(default)]
    pub has_header: bool,
}

/// Evaluator results for formula cells, consulted when sorting.
pub trait ComputedValues {
    fn computed_value(&self, sheet_id: &str, cell: CellRef) -> Option<CellValue>;
}

impl<F> ComputedValues for F
where
    F: Fn(&str, CellRef) -> Option<CellValue>,
{
    fn computed_value(&self, sheet_id: &str, cell: CellRef) -> Option<CellValue> {
        self(sheet_id, cell)
    }
}

/// Comparable projection of one key cell.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum SortValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Error(String),
    Blank,
}

impl SortValue {
    fn from_value(value: &CellValue) -> Self {
        if value.is_blank() {
            return SortValue::Blank;
        }
        match value {
            CellValue::Number(n) => SortValue::Number(*n),
            CellValue::String(s) => SortValue::Text(s.to_lowercase()),
            CellValue::Boolean(b) => SortValue::Bool(*b),
            CellValue::Error(e) => SortValue::Error(e.clone()),
            CellValue::Image(image) => image
                .text()
                .map_or(SortValue::Blank, |text| SortValue::Text(text.to_lowercase())),
            CellValue::Empty => SortValue::Blank,
        }
    }

    /// Formula cells use the supplied result, then the stored value, then the
    /// formula text itself.
    pub(crate) fn of_cell(cell: &Cell, computed: Option<CellValue>) -> Self {
        if let Some(formula) = &cell.formula {
            if let Some(value) = computed {
                return SortValue::from_value(&value);
            }
            if !cell.value.is_empty() {
                return SortValue::from_value(&cell.value);
            }
            return SortValue::Text(formula.to_lowercase());
        }
        SortValue::from_value(&cell.value)
    }

    const fn rank(&self) -> u8 {
        match self {
            SortValue::Number(_) => 0,
            SortValue::Text(_) => 1,
            SortValue::Bool(_) => 2,
            SortValue::Error(_) => 3,
            SortValue::Blank => 4,
        }
    }

    fn cmp_non_blank(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Bool(a), SortValue::Bool(b)) => a.cmp(b),
            (SortValue::Error(a), SortValue::Error(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Compare two rows' key values. Blanks sort last in either direction.
pub(crate) fn compare_rows(a: &[SortValue], b: &[SortValue], keys: &[SortKey]) -> Ordering {
    for (idx, key) in keys.iter().enumerate() {
        let (Some(left), Some(right)) = (a.get(idx), b.get(idx)) else {
            continue;
        };
        let ordering = match (left, right) {
            (SortValue::Blank, SortValue::Blank) => Ordering::Equal,
            (SortValue::Blank, _) => Ordering::Greater,
            (_, SortValue::Blank) => Ordering::Less,
            _ if key.descending => left.cmp_non_blank(right).reverse(),
            _ => left.cmp_non_blank(right),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Stable permutation: `result[i]` is the source row index that lands at row `i`.
pub(crate) fn sorted_permutation(rows: &[Vec<SortValue>], keys: &[SortKey]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| compare_rows(&rows[a], &rows[b], keys));
    order
}

#[cfg(test)]
mod tests {
    use formula_model::ImageValue;
    use pretty_assertions::assert_eq;

    use super::*;

    fn value(v: CellValue) -> SortValue {
        SortValue::of_cell(&Cell::new(v), None)
    }

    #[test]
    fn mixed_types_order_numbers_text_bools_errors_blanks() {
        let rows = vec![
            vec![value(CellValue::Error("#N/A".into()))],
            vec![value(CellValue::Empty)],
            vec![value(CellValue::Boolean(false))],
            vec![value(CellValue::String("b".into()))],
            vec![value(CellValue::Number(2.0))],
            vec![value(CellValue::String("A".into()))],
            vec![value(CellValue::Number(-1.0))],
        ];
        let keys = [SortKey::ascending(0)];
        assert_eq!(sorted_permutation(&rows, &keys), vec![6, 4, 5, 3, 2, 0, 1]);
    }

    #[test]
    fn descending_keeps_blanks_last_and_ties_stable() {
        let rows = vec![
            vec![value(CellValue::Empty)],
            vec![value(CellValue::Number(1.0))],
            vec![value(CellValue::Number(3.0))],
            vec![value(CellValue::Number(1.0))],
        ];
        let keys = [SortKey::descending(0)];
        assert_eq!(sorted_permutation(&rows, &keys), vec![2, 1, 3, 0]);
    }

    #[test]
    fn formula_cells_prefer_computed_values() {
        let cell = Cell::from_formula("=B1*2");
        assert_eq!(
            SortValue::of_cell(&cell, Some(CellValue::Number(4.0))),
            SortValue::Number(4.0)
        );
        assert_eq!(SortValue::of_cell(&cell, None), SortValue::Text("b1*2".into()));

        let stored = Cell {
            value: CellValue::Number(9.0),
            ..cell
        };
        assert_eq!(SortValue::of_cell(&stored, None), SortValue::Number(9.0));
    }

    #[test]
    fn images_sort_by_alt_text() {
        let mut with_alt = ImageValue::new("img-1");
        with_alt.alt_text = Some("Logo".into());
        assert_eq!(
            value(CellValue::Image(with_alt)),
            SortValue::Text("logo".into())
        );
        assert_eq!(value(CellValue::Image(ImageValue::new("img-2"))), SortValue::Blank);
    }
}
