use formula_model::{Cell, CellRef, Range, Style, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};

use super::DocumentController;
use crate::error::{ApplyOutcome, RejectReason};
use crate::store::{Axis, FrozenPanes};

impl DocumentController {
    /// Apply `patch` to every cell of `range`; `None` clears formatting.
    ///
    /// Whole-column, whole-row and whole-sheet ranges format the matching layer
    /// instead of individual cells. Other ranges larger than
    /// `max_range_format_cells` are rejected.
    pub fn set_range_format(&mut self, sheet_id: &str, range: Range, patch: Option<&Style>) -> ApplyOutcome {
        if let Err(reason) = self.writable(sheet_id) {
            return ApplyOutcome::Rejected(reason);
        }
        if !range.end.in_bounds() {
            return ApplyOutcome::Rejected(RejectReason::OutOfBounds);
        }
        let limit = self.config.max_range_format_cells;
        match (range.spans_all_rows(), range.spans_all_cols()) {
            (true, true) => self.set_sheet_format(sheet_id, patch),
            (true, false) => {
                self.run_mutation("Format columns", |doc| {
                    doc.ensure_sheet(sheet_id);
                    let mut changed = false;
                    for col in range.start.col..=range.end.col {
                        changed |= doc.format_axis(sheet_id, Axis::Col, col, patch);
                    }
                    if changed {
                        doc.mark_range(sheet_id, range);
                    }
                });
                ApplyOutcome::Applied
            }
            (false, true) => {
                let rows = u64::from(range.height());
                if rows > limit {
                    return ApplyOutcome::too_large(rows, limit);
                }
                self.run_mutation("Format rows", |doc| {
                    doc.ensure_sheet(sheet_id);
                    let mut changed = false;
                    for row in range.start.row..=range.end.row {
                        changed |= doc.format_axis(sheet_id, Axis::Row, row, patch);
                    }
                    if changed {
                        doc.mark_range(sheet_id, range);
                    }
                });
                ApplyOutcome::Applied
            }
            (false, false) => {
                let cells = range.cell_count();
                if cells > limit {
                    return ApplyOutcome::too_large(cells, limit);
                }
                self.run_mutation("Format cells", |doc| {
                    doc.ensure_sheet(sheet_id);
                    let mut changed = false;
                    for at in range.cells() {
                        changed |= doc.patch_cell_style(sheet_id, at, patch);
                    }
                    if changed {
                        doc.mark_range(sheet_id, range);
                    }
                });
                ApplyOutcome::Applied
            }
        }
    }

    pub fn set_row_format(&mut self, sheet_id: &str, row: u32, patch: Option<&Style>) -> ApplyOutcome {
        self.set_axis_format(sheet_id, Axis::Row, row, patch)
    }

    pub fn set_col_format(&mut self, sheet_id: &str, col: u32, patch: Option<&Style>) -> ApplyOutcome {
        self.set_axis_format(sheet_id, Axis::Col, col, patch)
    }

    fn set_axis_format(&mut self, sheet_id: &str, axis: Axis, index: u32, patch: Option<&Style>) -> ApplyOutcome {
        if let Err(reason) = self.writable(sheet_id) {
            return ApplyOutcome::Rejected(reason);
        }
        if index >= axis.limit() {
            return ApplyOutcome::Rejected(RejectReason::OutOfBounds);
        }
        let (label, range) = match axis {
            Axis::Row => ("Format row", Range::full_row(index)),
            Axis::Col => ("Format column", Range::full_col(index)),
        };
        self.run_mutation(label, |doc| {
            doc.ensure_sheet(sheet_id);
            if doc.format_axis(sheet_id, axis, index, patch) {
                doc.mark_range(sheet_id, range);
            }
        });
        ApplyOutcome::Applied
    }

    /// Format the sheet default layer. Row, column and cell overrides are
    /// patched too so the new formatting shows everywhere.
    pub fn set_sheet_format(&mut self, sheet_id: &str, patch: Option<&Style>) -> ApplyOutcome {
        if let Err(reason) = self.writable(sheet_id) {
            return ApplyOutcome::Rejected(reason);
        }
        self.run_mutation("Format sheet", |doc| {
            doc.ensure_sheet(sheet_id);
            let store = doc.sheet_store(sheet_id);
            let sheet_style = store.map_or(0, |store| store.sheet_style());
            let rows = store.map(|store| pairs(store.row_styles())).unwrap_or_default();
            let cols = store.map(|store| pairs(store.col_styles())).unwrap_or_default();
            let cells: Vec<CellRef> = store
                .map(|store| {
                    store
                        .iter_cells()
                        .filter(|(_, cell)| cell.style_id != 0)
                        .map(|(at, _)| at)
                        .collect()
                })
                .unwrap_or_default();

            let mut changed = {
                let next = doc.patched_style_id(sheet_style, patch);
                doc.write_sheet_style(sheet_id, next)
            };
            for (axis, entries) in [(Axis::Row, rows), (Axis::Col, cols)] {
                for (index, style_id) in entries {
                    let next = doc.patched_style_id(style_id, patch);
                    changed |= doc.write_axis_style(sheet_id, axis, index, next);
                }
            }
            for at in cells {
                changed |= doc.patch_cell_style(sheet_id, at, patch);
            }
            if changed {
                doc.mark_range(sheet_id, Range::full_sheet());
            }
        });
        ApplyOutcome::Applied
    }

    fn patched_style_id(&mut self, base: u32, patch: Option<&Style>) -> u32 {
        match patch {
            Some(patch) => self.styles.apply_patch(base, patch),
            None => 0,
        }
    }

    fn patch_cell_style(&mut self, sheet_id: &str, at: CellRef, patch: Option<&Style>) -> bool {
        let current = self.get_cell(sheet_id, at);
        let style_id = self.patched_style_id(current.style_id, patch);
        if style_id == current.style_id {
            return false;
        }
        self.write_cell(sheet_id, at, Cell { style_id, ..current })
    }

    /// Patch one row/column layer plus the explicitly styled cells inside it.
    ///
    /// Column formatting also materializes cells where the column crosses a
    /// formatted row, since row formatting otherwise takes precedence there.
    fn format_axis(&mut self, sheet_id: &str, axis: Axis, index: u32, patch: Option<&Style>) -> bool {
        let line = match axis {
            Axis::Row => Range::full_row(index),
            Axis::Col => Range::full_col(index),
        };
        let (current, targets) = match self.sheet_store(sheet_id) {
            Some(store) => {
                let mut targets: Vec<CellRef> = store
                    .cells_in_range(line)
                    .filter(|(_, cell)| cell.style_id != 0)
                    .map(|(at, _)| at)
                    .collect();
                if axis == Axis::Col && patch.is_some() {
                    for row in store.row_styles().keys() {
                        let at = CellRef::new(*row, index);
                        if !targets.contains(&at) {
                            targets.push(at);
                        }
                    }
                }
                (store.axis_style(axis, index), targets)
            }
            None => (0, Vec::new()),
        };

        let next = self.patched_style_id(current, patch);
        let mut changed = self.write_axis_style(sheet_id, axis, index, next);
        for at in targets {
            changed |= self.patch_cell_style(sheet_id, at, patch);
        }
        changed
    }

    pub fn set_row_height(&mut self, sheet_id: &str, row: u32, height: f64) -> ApplyOutcome {
        self.set_axis_size(sheet_id, Axis::Row, row, Some(height))
    }

    pub fn reset_row_height(&mut self, sheet_id: &str, row: u32) -> ApplyOutcome {
        self.set_axis_size(sheet_id, Axis::Row, row, None)
    }

    pub fn set_col_width(&mut self, sheet_id: &str, col: u32, width: f64) -> ApplyOutcome {
        self.set_axis_size(sheet_id, Axis::Col, col, Some(width))
    }

    pub fn reset_col_width(&mut self, sheet_id: &str, col: u32) -> ApplyOutcome {
        self.set_axis_size(sheet_id, Axis::Col, col, None)
    }

    /// Sizes must be finite and non-negative.
    fn set_axis_size(&mut self, sheet_id: &str, axis: Axis, index: u32, size: Option<f64>) -> ApplyOutcome {
        if let Err(reason) = self.writable(sheet_id) {
            return ApplyOutcome::Rejected(reason);
        }
        let valid_size = size.map_or(true, |size| size.is_finite() && size >= 0.0);
        if index >= axis.limit() || !valid_size {
            return ApplyOutcome::Rejected(RejectReason::OutOfBounds);
        }
        let (label, range) = match axis {
            Axis::Row => ("Resize row", Range::full_row(index)),
            Axis::Col => ("Resize column", Range::full_col(index)),
        };
        self.run_mutation(label, |doc| {
            doc.ensure_sheet(sheet_id);
            if doc.write_axis_size(sheet_id, axis, index, size) {
                doc.mark_range(sheet_id, range);
            }
        });
        ApplyOutcome::Applied
    }

    pub fn set_frozen_panes(&mut self, sheet_id: &str, rows: u32, cols: u32) -> ApplyOutcome {
        if let Err(reason) = self.writable(sheet_id) {
            return ApplyOutcome::Rejected(reason);
        }
        if rows >= EXCEL_MAX_ROWS || cols >= EXCEL_MAX_COLS {
            return ApplyOutcome::Rejected(RejectReason::OutOfBounds);
        }
        self.run_mutation("Freeze panes", |doc| {
            doc.ensure_sheet(sheet_id);
            if doc.write_frozen_panes(sheet_id, FrozenPanes { rows, cols }) {
                doc.mark_range(sheet_id, Range::full_sheet());
            }
        });
        ApplyOutcome::Applied
    }
}

fn pairs(map: &std::collections::BTreeMap<u32, u32>) -> Vec<(u32, u32)> {
    map.iter().map(|(k, v)| (*k, *v)).collect()
}

#[cfg(test)]
mod tests {
    use formula_model::CellStyleLayers;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn full_column_range_formats_the_column_layer() {
        let mut doc = DocumentController::new();
        let outcome = doc.set_range_format("Sheet1", Range::full_col(2), Some(&Style::bold()));
        assert!(outcome.is_applied());
        let bold = doc.intern_style(Style::bold());
        assert_eq!(doc.sheet_store("Sheet1").unwrap().col_style(2), bold);
        assert_eq!(doc.sheet_store("Sheet1").unwrap().cell_count(), 0);
    }

    #[test]
    fn oversized_cell_range_is_rejected_without_touching_history() {
        let mut doc = DocumentController::new();
        let outcome = doc.set_range_format(
            "Sheet1",
            Range::from_bounds(0, 0, 1_999, 999),
            Some(&Style::bold()),
        );
        assert_eq!(
            outcome,
            ApplyOutcome::Rejected(RejectReason::TooLarge {
                cells: 2_000_000,
                limit: 1_000_000
            })
        );
        assert_eq!(doc.stack_depths().undo, 0);
        assert!(!doc.is_dirty());
    }

    #[test]
    fn row_format_patches_styled_cells_in_the_row() {
        let mut doc = DocumentController::new();
        let fill = Style::with_background(formula_model::Color::new_argb(0xFF00FF00));
        let _ = doc.set_range_format("Sheet1", Range::single(CellRef::new(3, 1)), Some(&fill));
        let _ = doc.set_row_format("Sheet1", 3, Some(&Style::bold()));

        let resolved = doc.resolve_cell_style("Sheet1", CellRef::new(3, 1));
        assert!(resolved.bold);
        assert!(resolved.background_color.is_some());
        assert_eq!(doc.stack_depths().undo, 2);
    }

    #[test]
    fn column_format_wins_over_existing_row_format_at_intersections() {
        let mut doc = DocumentController::new();
        let not_bold = Style {
            font: formula_model::FontStyle {
                bold: Some(false),
                ..Default::default()
            },
            ..Default::default()
        };
        let _ = doc.set_row_format("Sheet1", 4, Some(&not_bold));
        let _ = doc.set_col_format("Sheet1", 1, Some(&Style::bold()));

        assert!(doc.resolve_cell_style("Sheet1", CellRef::new(4, 1)).bold);
        assert!(!doc.resolve_cell_style("Sheet1", CellRef::new(4, 0)).bold);
        assert!(doc.resolve_cell_style("Sheet1", CellRef::new(9, 1)).bold);
    }

    #[test]
    fn clearing_the_sheet_format_resets_every_layer() {
        let mut doc = DocumentController::new();
        let _ = doc.set_row_format("Sheet1", 0, Some(&Style::bold()));
        let _ = doc.set_sheet_format("Sheet1", Some(&Style::bold()));
        let _ = doc.set_range_format("Sheet1", Range::full_sheet(), None);
        assert_eq!(
            doc.cell_style_layers("Sheet1", CellRef::new(0, 0)),
            CellStyleLayers::default()
        );
    }

    #[test]
    fn sizes_and_frozen_panes_show_in_the_view() {
        let mut doc = DocumentController::new();
        let _ = doc.set_row_height("Sheet1", 2, 30.0);
        let _ = doc.set_col_width("Sheet1", 0, 120.0);
        let _ = doc.set_frozen_panes("Sheet1", 1, 2);
        let view = doc.get_sheet_view("Sheet1");
        assert_eq!((view.frozen_rows, view.frozen_cols), (1, 2));
        assert_eq!(view.row_heights.get(&2), Some(&30.0));
        assert_eq!(view.col_widths.get(&0), Some(&120.0));

        let _ = doc.reset_row_height("Sheet1", 2);
        assert!(doc.get_sheet_view("Sheet1").row_heights.is_empty());
        assert_eq!(
            doc.set_col_width("Sheet1", 0, f64::NAN),
            ApplyOutcome::Rejected(RejectReason::OutOfBounds)
        );
    }
}
