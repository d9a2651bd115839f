use std::collections::BTreeMap;

use formula_model::{Cell, CellRef};

use super::DocumentController;
use crate::error::{ApplyOutcome, RejectReason};
use crate::store::Axis;

impl DocumentController {
    pub fn insert_rows(&mut self, sheet_id: &str, index: u32, count: u32) -> ApplyOutcome {
        self.shift_axis(sheet_id, Axis::Row, index, count, true)
    }

    pub fn delete_rows(&mut self, sheet_id: &str, index: u32, count: u32) -> ApplyOutcome {
        self.shift_axis(sheet_id, Axis::Row, index, count, false)
    }

    pub fn insert_cols(&mut self, sheet_id: &str, index: u32, count: u32) -> ApplyOutcome {
        self.shift_axis(sheet_id, Axis::Col, index, count, true)
    }

    pub fn delete_cols(&mut self, sheet_id: &str, index: u32, count: u32) -> ApplyOutcome {
        self.shift_axis(sheet_id, Axis::Col, index, count, false)
    }

    /// Move everything at or after `index` along `axis`: down/right by `count`
    /// for inserts, up/left for deletes (dropping the deleted band).
    ///
    /// Cells, layer styles and size overrides move together. Formula text is
    /// left untouched. An insert that would push a stored cell off the grid is
    /// rejected; layer styles and sizes pushed off the grid are dropped.
    fn shift_axis(&mut self, sheet_id: &str, axis: Axis, index: u32, count: u32, insert: bool) -> ApplyOutcome {
        if let Err(reason) = self.writable(sheet_id) {
            return ApplyOutcome::Rejected(reason);
        }
        let limit = axis.limit();
        if index >= limit {
            return ApplyOutcome::Rejected(RejectReason::OutOfBounds);
        }
        if count == 0 {
            return ApplyOutcome::Applied;
        }
        let count = if insert { count } else { count.min(limit - index) };
        let remap = move |pos: u32| -> Option<u32> {
            if pos < index {
                Some(pos)
            } else if insert {
                pos.checked_add(count).filter(|next| *next < limit)
            } else if pos - index < count {
                None
            } else {
                Some(pos - count)
            }
        };

        let (cells, styles, sizes) = match self.sheet_store(sheet_id) {
            Some(store) => (
                store
                    .iter_cells()
                    .filter(|(at, _)| axis.coord(*at) >= index)
                    .map(|(at, cell)| (at, cell.clone()))
                    .collect::<Vec<_>>(),
                store
                    .axis_styles(axis)
                    .range(index..)
                    .map(|(k, v)| (*k, *v))
                    .collect::<Vec<_>>(),
                store
                    .axis_sizes(axis)
                    .range(index..)
                    .map(|(k, v)| (*k, *v))
                    .collect::<Vec<_>>(),
            ),
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        if insert && cells.iter().any(|(at, _)| remap(axis.coord(*at)).is_none()) {
            log::debug!("insert of {count} at {index} would push cells off the grid");
            return ApplyOutcome::Rejected(RejectReason::OutOfBounds);
        }
        let label = match (axis, insert) {
            (Axis::Row, true) => "Insert rows",
            (Axis::Row, false) => "Delete rows",
            (Axis::Col, true) => "Insert columns",
            (Axis::Col, false) => "Delete columns",
        };

        self.run_mutation(label, |doc| {
            doc.ensure_sheet(sheet_id);
            let mut changed = false;

            let moved: BTreeMap<CellRef, Cell> = cells
                .iter()
                .filter_map(|(at, cell)| {
                    remap(axis.coord(*at)).map(|next| (axis.with_coord(*at, next), cell.clone()))
                })
                .collect();
            for (at, _) in &cells {
                if !moved.contains_key(at) {
                    changed |= doc.write_cell(sheet_id, *at, Cell::default());
                }
            }
            for (at, cell) in moved {
                changed |= doc.write_cell(sheet_id, at, cell);
            }

            let moved: BTreeMap<u32, u32> = styles
                .iter()
                .filter_map(|(pos, style_id)| remap(*pos).map(|next| (next, *style_id)))
                .collect();
            for (pos, _) in &styles {
                if !moved.contains_key(pos) {
                    changed |= doc.write_axis_style(sheet_id, axis, *pos, 0);
                }
            }
            for (pos, style_id) in moved {
                changed |= doc.write_axis_style(sheet_id, axis, pos, style_id);
            }

            let moved: BTreeMap<u32, f64> = sizes
                .iter()
                .filter_map(|(pos, size)| remap(*pos).map(|next| (next, *size)))
                .collect();
            for (pos, _) in &sizes {
                if !moved.contains_key(pos) {
                    changed |= doc.write_axis_size(sheet_id, axis, *pos, None);
                }
            }
            for (pos, size) in moved {
                changed |= doc.write_axis_size(sheet_id, axis, pos, Some(size));
            }

            if changed {
                doc.mark_range(sheet_id, axis.tail_range(index));
            }
        });
        ApplyOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use formula_model::{CellValue, Style, EXCEL_MAX_ROWS};
    use pretty_assertions::assert_eq;

    use super::*;

    fn number(doc: &DocumentController, row: u32, col: u32) -> Option<f64> {
        doc.get_cell("Sheet1", CellRef::new(row, col)).value.as_number()
    }

    #[test]
    fn insert_rows_shifts_cells_styles_and_heights() {
        let mut doc = DocumentController::new();
        let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 0), 1.0);
        let _ = doc.set_cell_value("Sheet1", CellRef::new(2, 0), 3.0);
        let _ = doc.set_row_format("Sheet1", 2, Some(&Style::bold()));
        let _ = doc.set_row_height("Sheet1", 2, 40.0);

        assert!(doc.insert_rows("Sheet1", 1, 2).is_applied());

        assert_eq!(number(&doc, 0, 0), Some(1.0));
        assert_eq!(number(&doc, 2, 0), None);
        assert_eq!(number(&doc, 4, 0), Some(3.0));
        let store = doc.sheet_store("Sheet1").unwrap();
        assert_eq!(store.row_style(2), 0);
        assert_ne!(store.row_style(4), 0);
        assert_eq!(store.row_height(4), Some(40.0));
    }

    #[test]
    fn delete_cols_drops_the_band_and_pulls_left() {
        let mut doc = DocumentController::new();
        for col in 0..5 {
            let _ = doc.set_cell_value("Sheet1", CellRef::new(0, col), f64::from(col));
        }
        assert!(doc.delete_cols("Sheet1", 1, 2).is_applied());
        let row: Vec<_> = (0..5).map(|col| number(&doc, 0, col)).collect();
        assert_eq!(row, vec![Some(0.0), Some(3.0), Some(4.0), None, None]);

        assert!(doc.undo());
        let row: Vec<_> = (0..5).map(|col| number(&doc, 0, col)).collect();
        assert_eq!(
            row,
            vec![Some(0.0), Some(1.0), Some(2.0), Some(3.0), Some(4.0)]
        );
    }

    #[test]
    fn insert_that_pushes_content_off_the_grid_is_rejected() {
        let mut doc = DocumentController::new();
        let _ = doc.set_cell_value("Sheet1", CellRef::new(EXCEL_MAX_ROWS - 1, 0), 1.0);
        let depth = doc.stack_depths();
        assert_eq!(
            doc.insert_rows("Sheet1", 0, 1),
            ApplyOutcome::Rejected(RejectReason::OutOfBounds)
        );
        assert_eq!(doc.stack_depths(), depth);
        assert_eq!(
            doc.get_cell("Sheet1", CellRef::new(EXCEL_MAX_ROWS - 1, 0)).value,
            CellValue::Number(1.0)
        );
    }

    #[test]
    fn formulas_move_verbatim() {
        let mut doc = DocumentController::new();
        let _ = doc.set_cell_formula("Sheet1", CellRef::new(3, 0), "=A1+A2");
        let _ = doc.delete_rows("Sheet1", 0, 1);
        assert_eq!(
            doc.get_cell("Sheet1", CellRef::new(2, 0)).formula.as_deref(),
            Some("A1+A2")
        );
    }
}
