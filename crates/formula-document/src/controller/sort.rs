use formula_model::{Cell, CellRef, Range};

use super::DocumentController;
use crate::error::{ApplyOutcome, RejectReason};
use crate::sort::{sorted_permutation, ComputedValues, SortSpec, SortValue};

impl DocumentController {
    /// Reorder the rows of `range` by `spec` as one undo unit.
    ///
    /// Whole rows move within the range's columns, carrying value, formula and
    /// style. Formula cells compare by the value from `computed` when given.
    pub fn sort_range(
        &mut self,
        sheet_id: &str,
        range: Range,
        spec: &SortSpec,
        computed: Option<&dyn ComputedValues>,
    ) -> ApplyOutcome {
        if let Err(reason) = self.writable(sheet_id) {
            return ApplyOutcome::Rejected(reason);
        }
        if !range.end.in_bounds() {
            return ApplyOutcome::Rejected(RejectReason::OutOfBounds);
        }
        let cells = range.cell_count();
        if cells > self.config.max_sort_cells {
            log::warn!(
                "sort of {cells} cells exceeds limit {}",
                self.config.max_sort_cells
            );
            return ApplyOutcome::too_large(cells, self.config.max_sort_cells);
        }
        if spec
            .keys
            .iter()
            .any(|key| key.column < range.start.col || key.column > range.end.col)
        {
            return ApplyOutcome::Rejected(RejectReason::OutOfBounds);
        }

        let first = range.start.row + u32::from(spec.has_header);
        if spec.keys.is_empty() || first >= range.end.row {
            return ApplyOutcome::Applied;
        }

        let rows: Vec<Vec<Cell>> = (first..=range.end.row)
            .map(|row| {
                (range.start.col..=range.end.col)
                    .map(|col| self.get_cell(sheet_id, CellRef::new(row, col)))
                    .collect()
            })
            .collect();
        let keys: Vec<Vec<SortValue>> = rows
            .iter()
            .enumerate()
            .map(|(offset, row)| {
                spec.keys
                    .iter()
                    .map(|key| {
                        let cell = &row[(key.column - range.start.col) as usize];
                        let value = match (&cell.formula, computed) {
                            (Some(_), Some(source)) => {
                                let at = CellRef::new(first + offset as u32, key.column);
                                source.computed_value(sheet_id, at)
                            }
                            _ => None,
                        };
                        SortValue::of_cell(cell, value)
                    })
                    .collect()
            })
            .collect();

        let order = sorted_permutation(&keys, &spec.keys);
        if order.iter().enumerate().all(|(dest, src)| dest == *src) {
            return ApplyOutcome::Applied;
        }

        self.run_mutation("Sort", |doc| {
            doc.ensure_sheet(sheet_id);
            let mut changed = false;
            for (offset, src) in order.iter().enumerate() {
                let row = first + offset as u32;
                for (col_offset, cell) in rows[*src].iter().enumerate() {
                    let at = CellRef::new(row, range.start.col + col_offset as u32);
                    changed |= doc.write_cell(sheet_id, at, cell.clone());
                }
            }
            if changed {
                doc.mark_range(sheet_id, range);
            }
        });
        ApplyOutcome::Applied
    }
}
