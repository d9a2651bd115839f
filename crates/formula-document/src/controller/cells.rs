use formula_model::{Cell, CellInput, CellRef, CellValue, Range, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};

use super::DocumentController;
use crate::error::{ApplyOutcome, RejectReason};

impl DocumentController {
    pub fn set_cell_value(&mut self, sheet_id: &str, cell: CellRef, value: impl Into<CellValue>) -> ApplyOutcome {
        self.set_cell_input(sheet_id, cell, CellInput::Value(value.into()))
    }

    /// Store formula text (a leading `=` is optional). Any previous value is
    /// dropped until the evaluator supplies a result.
    pub fn set_cell_formula(&mut self, sheet_id: &str, cell: CellRef, formula: &str) -> ApplyOutcome {
        self.set_cell_input(sheet_id, cell, CellInput::Formula(formula.to_string()))
    }

    pub fn set_cell_input(&mut self, sheet_id: &str, cell: CellRef, input: CellInput) -> ApplyOutcome {
        if let Err(reason) = self.writable(sheet_id) {
            return ApplyOutcome::Rejected(reason);
        }
        if !cell.in_bounds() {
            return ApplyOutcome::Rejected(RejectReason::OutOfBounds);
        }
        self.run_mutation("Edit cell", |doc| {
            doc.ensure_sheet(sheet_id);
            let next = doc.get_cell(sheet_id, cell).with_input(&input);
            if doc.write_cell(sheet_id, cell, next) {
                doc.mark_range(sheet_id, Range::single(cell));
            }
        });
        ApplyOutcome::Applied
    }

    /// Write a block of inputs anchored at `origin`. Rows may differ in length.
    pub fn set_range_values(&mut self, sheet_id: &str, origin: CellRef, rows: &[Vec<CellInput>]) -> ApplyOutcome {
        if let Err(reason) = self.writable(sheet_id) {
            return ApplyOutcome::Rejected(reason);
        }
        let height = rows.len() as u64;
        let width = rows.iter().map(Vec::len).max().unwrap_or(0) as u64;
        if height == 0 || width == 0 {
            return ApplyOutcome::Applied;
        }
        let last_row = u64::from(origin.row) + height - 1;
        let last_col = u64::from(origin.col) + width - 1;
        if last_row >= u64::from(EXCEL_MAX_ROWS) || last_col >= u64::from(EXCEL_MAX_COLS) {
            return ApplyOutcome::Rejected(RejectReason::OutOfBounds);
        }
        let bounds = Range::from_bounds(origin.row, origin.col, last_row as u32, last_col as u32);

        self.run_mutation("Edit cells", |doc| {
            doc.ensure_sheet(sheet_id);
            let mut changed = false;
            for (dr, row) in rows.iter().enumerate() {
                for (dc, input) in row.iter().enumerate() {
                    let cell = CellRef::new(origin.row + dr as u32, origin.col + dc as u32);
                    let next = doc.get_cell(sheet_id, cell).with_input(input);
                    changed |= doc.write_cell(sheet_id, cell, next);
                }
            }
            if changed {
                doc.mark_range(sheet_id, bounds);
            }
        });
        ApplyOutcome::Applied
    }

    /// Remove values and formulas in `range`, keeping cell formatting.
    pub fn clear_range(&mut self, sheet_id: &str, range: Range) -> ApplyOutcome {
        if let Err(reason) = self.writable(sheet_id) {
            return ApplyOutcome::Rejected(reason);
        }
        let targets: Vec<(CellRef, u32)> = self
            .sheet_store(sheet_id)
            .map(|store| {
                store
                    .cells_in_range(range)
                    .filter(|(_, cell)| !cell.has_no_content())
                    .map(|(at, cell)| (at, cell.style_id))
                    .collect()
            })
            .unwrap_or_default();
        if targets.is_empty() {
            return ApplyOutcome::Applied;
        }
        self.run_mutation("Clear contents", |doc| {
            for (at, style_id) in targets {
                doc.write_cell(
                    sheet_id,
                    at,
                    Cell {
                        style_id,
                        ..Cell::default()
                    },
                );
            }
            doc.mark_range(sheet_id, range);
        });
        ApplyOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn formula_text_is_stored_canonically() {
        let mut doc = DocumentController::new();
        assert!(doc
            .set_cell_formula("Sheet1", CellRef::new(0, 0), " =SUM(A2:A3) ")
            .is_applied());
        assert_eq!(
            doc.get_cell("Sheet1", CellRef::new(0, 0)).formula.as_deref(),
            Some("SUM(A2:A3)")
        );
    }

    #[test]
    fn writing_the_same_value_records_nothing() {
        let mut doc = DocumentController::new();
        let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 0), 1.0);
        let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 0), 1.0);
        assert_eq!(doc.stack_depths().undo, 1);
    }

    #[test]
    fn range_values_accept_jagged_rows() {
        let mut doc = DocumentController::new();
        let rows = vec![
            vec![CellInput::from(1.0), CellInput::from("x")],
            vec![CellInput::from("=A1*2")],
        ];
        assert!(doc
            .set_range_values("Sheet1", CellRef::new(4, 2), &rows)
            .is_applied());
        assert_eq!(
            doc.get_cell("Sheet1", CellRef::new(4, 3)).value,
            CellValue::String("x".into())
        );
        assert_eq!(
            doc.get_cell("Sheet1", CellRef::new(5, 2)).formula.as_deref(),
            Some("A1*2")
        );
        assert_eq!(doc.stack_depths().undo, 1);
    }

    #[test]
    fn range_past_the_grid_edge_is_rejected() {
        let mut doc = DocumentController::new();
        let rows = vec![vec![CellInput::from(1.0), CellInput::from(2.0)]];
        let outcome = doc.set_range_values("Sheet1", CellRef::new(0, EXCEL_MAX_COLS - 1), &rows);
        assert_eq!(outcome, ApplyOutcome::Rejected(RejectReason::OutOfBounds));
        assert_eq!(doc.stack_depths().undo, 0);
    }

    #[test]
    fn clear_range_keeps_formatting() {
        let mut doc = DocumentController::new();
        let at = CellRef::new(1, 1);
        let _ = doc.set_cell_value("Sheet1", at, "hello");
        let bold = doc.intern_style(formula_model::Style::bold());
        let _ = doc.set_range_format("Sheet1", Range::single(at), Some(&formula_model::Style::bold()));
        let _ = doc.clear_range("Sheet1", Range::from_bounds(0, 0, 5, 5));

        let cell = doc.get_cell("Sheet1", at);
        assert_eq!(cell.value, CellValue::Empty);
        assert_eq!(cell.style_id, bold);
    }
}
