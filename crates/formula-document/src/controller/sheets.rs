use formula_model::{Cell, Range, SheetVisibility, TabColor};

use super::DocumentController;
use crate::delta::Delta;
use crate::error::SheetError;
use crate::registry::{InsertPosition, MoveTarget, SheetRegistry};
use crate::store::{Axis, FrozenPanes};

impl DocumentController {
    /// Apply a registry edit as one undoable change. `edit` must leave the
    /// registry untouched when it fails.
    fn edit_registry<T>(
        &mut self,
        label: &str,
        edit: impl FnOnce(&mut SheetRegistry) -> Result<T, SheetError>,
    ) -> Result<T, SheetError> {
        let before = self.registry.snapshot();
        let out = edit(&mut self.registry)?;
        let after = self.registry.snapshot();
        if before != after {
            self.run_mutation(label, |doc| doc.record(Delta::Sheets { before, after }));
        }
        Ok(out)
    }

    /// Create a sheet named `name`; returns the generated id.
    pub fn add_sheet(&mut self, name: &str, position: InsertPosition) -> Result<String, SheetError> {
        let id = self.edit_registry("Insert sheet", |registry| registry.add(name, &position))?;
        log::debug!("added sheet {id}");
        Ok(id)
    }

    pub fn rename_sheet(&mut self, sheet_id: &str, name: &str) -> Result<(), SheetError> {
        self.edit_registry("Rename sheet", |registry| registry.rename(sheet_id, name))
    }

    /// Delete a sheet and its contents as one undoable unit.
    ///
    /// The id is tombstoned: later writes to it are rejected and never recreate it.
    pub fn delete_sheet(&mut self, sheet_id: &str) -> Result<(), SheetError> {
        self.registry.check_removable(sheet_id)?;
        self.run_mutation("Delete sheet", |doc| {
            doc.clear_sheet(sheet_id);
            doc.mark_range(sheet_id, Range::full_sheet());
            let before = doc.registry.snapshot();
            doc.registry.remove(sheet_id)?;
            let after = doc.registry.snapshot();
            doc.record(Delta::Sheets { before, after });
            doc.stores.remove(sheet_id);
            Ok::<(), SheetError>(())
        })?;
        log::debug!("deleted sheet {sheet_id}");
        Ok(())
    }

    pub fn set_sheet_visibility(&mut self, sheet_id: &str, visibility: SheetVisibility) -> Result<(), SheetError> {
        let label = match visibility {
            SheetVisibility::Visible => "Unhide sheet",
            SheetVisibility::Hidden | SheetVisibility::VeryHidden => "Hide sheet",
        };
        self.edit_registry(label, |registry| registry.set_visibility(sheet_id, visibility))
    }

    pub fn hide_sheet(&mut self, sheet_id: &str) -> Result<(), SheetError> {
        self.set_sheet_visibility(sheet_id, SheetVisibility::Hidden)
    }

    pub fn unhide_sheet(&mut self, sheet_id: &str) -> Result<(), SheetError> {
        self.set_sheet_visibility(sheet_id, SheetVisibility::Visible)
    }

    pub fn set_sheet_tab_color(&mut self, sheet_id: &str, color: Option<TabColor>) -> Result<(), SheetError> {
        self.edit_registry("Tab color", |registry| registry.set_tab_color(sheet_id, color))
    }

    pub fn move_sheet(&mut self, sheet_id: &str, target: MoveTarget) -> Result<(), SheetError> {
        self.edit_registry("Move sheet", |registry| registry.move_sheet(sheet_id, &target))
    }

    /// Reset every stored piece of a sheet to defaults, recording each change.
    fn clear_sheet(&mut self, sheet_id: &str) {
        let Some(store) = self.sheet_store(sheet_id) else {
            return;
        };
        let cells: Vec<_> = store.iter_cells().map(|(at, _)| at).collect();
        let rows: Vec<u32> = store.row_styles().keys().copied().collect();
        let cols: Vec<u32> = store.col_styles().keys().copied().collect();
        let heights: Vec<u32> = store.axis_sizes(Axis::Row).keys().copied().collect();
        let widths: Vec<u32> = store.axis_sizes(Axis::Col).keys().copied().collect();

        for at in cells {
            self.write_cell(sheet_id, at, Cell::default());
        }
        for row in rows {
            self.write_axis_style(sheet_id, Axis::Row, row, 0);
        }
        for col in cols {
            self.write_axis_style(sheet_id, Axis::Col, col, 0);
        }
        self.write_sheet_style(sheet_id, 0);
        for row in heights {
            self.write_axis_size(sheet_id, Axis::Row, row, None);
        }
        for col in widths {
            self.write_axis_size(sheet_id, Axis::Col, col, None);
        }
        self.write_frozen_panes(sheet_id, FrozenPanes::default());
    }
}
