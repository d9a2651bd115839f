use formula_model::{normalize_formula_text, Cell, CellRef, CellValue, Range};
use serde::{Deserialize, Serialize};

use super::DocumentController;
use crate::delta::Delta;
use crate::events::{ChangeSource, SheetRange};

/// One cell change produced outside the editing session.
///
/// `before` is informational; the document records whatever it actually held.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDelta {
    pub sheet_id: String,
    pub row: u32,
    pub col: u32,
    #[serde(default)]
    pub before: Cell,
    pub after: Cell,
}

impl ExternalDelta {
    pub fn new(sheet_id: impl Into<String>, cell: CellRef, after: Cell) -> Self {
        Self {
            sheet_id: sheet_id.into(),
            row: cell.row,
            col: cell.col,
            before: Cell::default(),
            after,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExternalDeltaOptions {
    pub source: ChangeSource,
    /// Whether the change makes the document dirty (until the next save).
    pub mark_dirty: bool,
    /// Record the deltas as one undo unit instead of bypassing history.
    pub undoable: bool,
}

impl Default for ExternalDeltaOptions {
    fn default() -> Self {
        Self::new(ChangeSource::Collab)
    }
}

impl ExternalDeltaOptions {
    pub const fn new(source: ChangeSource) -> Self {
        Self {
            source,
            mark_dirty: true,
            undoable: false,
        }
    }

    pub const fn without_dirty(mut self) -> Self {
        self.mark_dirty = false;
        self
    }

    pub const fn undoable(mut self) -> Self {
        self.undoable = true;
        self
    }
}

impl DocumentController {
    /// Write externally produced cell states immediately.
    ///
    /// Deltas for deleted sheets or out-of-grid cells are skipped; unknown
    /// sheets are created. Unless `undoable` is set the undo and redo stacks are
    /// untouched. Returns the number of cells that changed.
    pub fn apply_external_deltas(&mut self, deltas: &[ExternalDelta], options: ExternalDeltaOptions) -> usize {
        if options.undoable {
            return self.apply_external_undoable(deltas, options.source);
        }

        let registry_before = self.registry.snapshot();
        let mut applied = Vec::new();
        let mut ranges = Vec::new();
        for delta in deltas {
            let Some((cell, after)) = self.accept_external(delta) else {
                continue;
            };
            if !self.registry.contains(&delta.sheet_id) {
                self.registry.create_lazily(&delta.sheet_id);
            }
            let before = self.store_mut(&delta.sheet_id).set_cell(cell, after.clone());
            if before != after {
                applied.push(Delta::Cell {
                    sheet_id: delta.sheet_id.clone(),
                    cell,
                    before,
                    after,
                });
                ranges.push(SheetRange::new(delta.sheet_id.clone(), Range::single(cell)));
            }
        }

        let changed = applied.len();
        let registry_after = self.registry.snapshot();
        if registry_before != registry_after {
            applied.insert(
                0,
                Delta::Sheets {
                    before: registry_before,
                    after: registry_after,
                },
            );
        }
        if applied.is_empty() {
            return 0;
        }
        if options.mark_dirty {
            self.history.mark_unreachable();
        }
        log::debug!("applied {changed} external cell change(s) from {:?}", options.source);
        self.publish(options.source, None, applied, ranges);
        changed
    }

    fn apply_external_undoable(&mut self, deltas: &[ExternalDelta], source: ChangeSource) -> usize {
        self.batch(super::MutationOptions::from_source(source), |doc| {
            let mut changed = 0;
            for delta in deltas {
                let Some((cell, after)) = doc.accept_external(delta) else {
                    continue;
                };
                doc.ensure_sheet(&delta.sheet_id);
                if doc.write_cell(&delta.sheet_id, cell, after) {
                    doc.mark_range(&delta.sheet_id, Range::single(cell));
                    changed += 1;
                }
            }
            changed
        })
    }

    /// Validate one incoming delta; `None` when it must be skipped.
    fn accept_external(&self, delta: &ExternalDelta) -> Option<(CellRef, Cell)> {
        if self.registry.is_deleted(&delta.sheet_id) {
            log::debug!("skipping external delta for deleted sheet {}", delta.sheet_id);
            return None;
        }
        let cell = CellRef::new(delta.row, delta.col);
        if !cell.in_bounds() {
            log::warn!("skipping external delta outside the grid at {cell:?}");
            return None;
        }
        let mut after = delta.after.clone();
        after.formula = after
            .formula
            .as_deref()
            .map(normalize_formula_text)
            .filter(|formula| !formula.is_empty());
        if !self.styles.contains(after.style_id) {
            log::warn!("unknown style id {} in external delta; using default", after.style_id);
            after.style_id = 0;
        }
        Some((cell, after))
    }

    /// Store evaluator results for formula cells (source `Recalc`, never dirtying).
    ///
    /// Entries for cells without a formula are ignored.
    pub fn apply_computed_values(
        &mut self,
        sheet_id: &str,
        values: impl IntoIterator<Item = (CellRef, CellValue)>,
    ) -> usize {
        let deltas: Vec<ExternalDelta> = values
            .into_iter()
            .filter_map(|(at, value)| {
                let current = self.get_cell(sheet_id, at);
                current.formula.as_ref()?;
                Some(ExternalDelta {
                    sheet_id: sheet_id.to_string(),
                    row: at.row,
                    col: at.col,
                    after: Cell {
                        value,
                        ..current.clone()
                    },
                    before: current,
                })
            })
            .collect();
        self.apply_external_deltas(
            &deltas,
            ExternalDeltaOptions::new(ChangeSource::Recalc).without_dirty(),
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn computed_values_only_land_on_formula_cells() {
        let mut doc = DocumentController::new();
        let _ = doc.set_cell_formula("Sheet1", CellRef::new(0, 0), "=1+1");
        let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 1), 5.0);
        doc.mark_saved();

        let changed = doc.apply_computed_values(
            "Sheet1",
            [
                (CellRef::new(0, 0), CellValue::Number(2.0)),
                (CellRef::new(0, 1), CellValue::Number(99.0)),
            ],
        );
        assert_eq!(changed, 1);
        let cell = doc.get_cell("Sheet1", CellRef::new(0, 0));
        assert_eq!(cell.value, CellValue::Number(2.0));
        assert_eq!(cell.formula.as_deref(), Some("1+1"));
        assert_eq!(
            doc.get_cell("Sheet1", CellRef::new(0, 1)).value,
            CellValue::Number(5.0)
        );
        assert!(!doc.is_dirty());
    }

    #[test]
    fn unknown_style_ids_fail_closed() {
        let mut doc = DocumentController::new();
        let after = Cell {
            style_id: 42,
            ..Cell::new(CellValue::Boolean(true))
        };
        doc.apply_external_deltas(
            &[ExternalDelta::new("Sheet1", CellRef::new(0, 0), after)],
            ExternalDeltaOptions::default(),
        );
        assert_eq!(doc.get_cell("Sheet1", CellRef::new(0, 0)).style_id, 0);
    }
}
