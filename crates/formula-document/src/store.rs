use std::collections::BTreeMap;

use formula_model::{Cell, CellKey, CellRef, CellStyleLayers, Range, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};
use serde::{Deserialize, Serialize};

/// Frozen pane split: the first `rows` rows and `cols` columns stay in view.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrozenPanes {
    pub rows: u32,
    pub cols: u32,
}

/// Row/column axis for structural edits and layer formatting.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    Row,
    Col,
}

impl Axis {
    pub(crate) const fn coord(self, cell: CellRef) -> u32 {
        match self {
            Axis::Row => cell.row,
            Axis::Col => cell.col,
        }
    }

    pub(crate) const fn with_coord(self, cell: CellRef, value: u32) -> CellRef {
        match self {
            Axis::Row => CellRef::new(value, cell.col),
            Axis::Col => CellRef::new(cell.row, value),
        }
    }

    pub(crate) const fn limit(self) -> u32 {
        match self {
            Axis::Row => EXCEL_MAX_ROWS,
            Axis::Col => EXCEL_MAX_COLS,
        }
    }

    /// Range covering every cell at or after `index` along this axis.
    pub(crate) const fn tail_range(self, index: u32) -> Range {
        match self {
            Axis::Row => Range::from_bounds(index, 0, EXCEL_MAX_ROWS - 1, EXCEL_MAX_COLS - 1),
            Axis::Col => Range::from_bounds(0, index, EXCEL_MAX_ROWS - 1, EXCEL_MAX_COLS - 1),
        }
    }
}

/// Sparse storage for one sheet.
///
/// Cells live in a row-major `BTreeMap`; a cell with no value, no formula and
/// style `0` is never stored. Layer styles and size overrides are sparse maps
/// where absence means "default".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SheetStore {
    cells: BTreeMap<CellKey, Cell>,
    row_styles: BTreeMap<u32, u32>,
    col_styles: BTreeMap<u32, u32>,
    sheet_style: u32,
    row_heights: BTreeMap<u32, f64>,
    col_widths: BTreeMap<u32, f64>,
    frozen: FrozenPanes,
}

impl SheetStore {
    pub fn cell(&self, cell: CellRef) -> Option<&Cell> {
        CellKey::from_ref(cell).and_then(|key| self.cells.get(&key))
    }

    /// Store `next` at `cell`, returning the previous state (default when absent).
    pub(crate) fn set_cell(&mut self, cell: CellRef, next: Cell) -> Cell {
        let Some(key) = CellKey::from_ref(cell) else {
            return Cell::default();
        };
        let previous = if next.is_truly_empty() {
            self.cells.remove(&key)
        } else {
            self.cells.insert(key, next)
        };
        previous.unwrap_or_default()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn iter_cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> + '_ {
        self.cells.iter().map(|(key, cell)| (key.to_ref(), cell))
    }

    /// Stored cells inside `range`, row-major.
    pub fn cells_in_range(&self, range: Range) -> impl Iterator<Item = (CellRef, &Cell)> + '_ {
        let lo = CellKey::row_start(range.start.row);
        let hi = CellKey::row_start(range.end.row.saturating_add(1));
        self.cells
            .range(lo..hi)
            .map(|(key, cell)| (key.to_ref(), cell))
            .filter(move |(cell, _)| cell.col >= range.start.col && cell.col <= range.end.col)
    }

    /// Bounding box of stored cells.
    pub fn used_range(&self) -> Option<Range> {
        let first = self.cells.keys().next()?.row();
        let last = self.cells.keys().next_back()?.row();
        let (min_col, max_col) = self
            .cells
            .keys()
            .fold((u32::MAX, 0), |(lo, hi), key| (lo.min(key.col()), hi.max(key.col())));
        Some(Range::from_bounds(first, min_col, last, max_col))
    }

    pub fn row_style(&self, row: u32) -> u32 {
        self.row_styles.get(&row).copied().unwrap_or(0)
    }

    pub fn col_style(&self, col: u32) -> u32 {
        self.col_styles.get(&col).copied().unwrap_or(0)
    }

    pub fn sheet_style(&self) -> u32 {
        self.sheet_style
    }

    pub fn row_styles(&self) -> &BTreeMap<u32, u32> {
        &self.row_styles
    }

    pub fn col_styles(&self) -> &BTreeMap<u32, u32> {
        &self.col_styles
    }

    pub(crate) fn axis_style(&self, axis: Axis, index: u32) -> u32 {
        match axis {
            Axis::Row => self.row_style(index),
            Axis::Col => self.col_style(index),
        }
    }

    pub(crate) fn axis_styles(&self, axis: Axis) -> &BTreeMap<u32, u32> {
        match axis {
            Axis::Row => &self.row_styles,
            Axis::Col => &self.col_styles,
        }
    }

    pub(crate) fn set_axis_style(&mut self, axis: Axis, index: u32, style_id: u32) -> u32 {
        let map = match axis {
            Axis::Row => &mut self.row_styles,
            Axis::Col => &mut self.col_styles,
        };
        let previous = if style_id == 0 {
            map.remove(&index)
        } else {
            map.insert(index, style_id)
        };
        previous.unwrap_or(0)
    }

    pub(crate) fn set_sheet_style(&mut self, style_id: u32) -> u32 {
        std::mem::replace(&mut self.sheet_style, style_id)
    }

    pub fn row_height(&self, row: u32) -> Option<f64> {
        self.row_heights.get(&row).copied()
    }

    pub fn col_width(&self, col: u32) -> Option<f64> {
        self.col_widths.get(&col).copied()
    }

    pub(crate) fn axis_sizes(&self, axis: Axis) -> &BTreeMap<u32, f64> {
        match axis {
            Axis::Row => &self.row_heights,
            Axis::Col => &self.col_widths,
        }
    }

    pub(crate) fn set_axis_size(&mut self, axis: Axis, index: u32, size: Option<f64>) -> Option<f64> {
        let map = match axis {
            Axis::Row => &mut self.row_heights,
            Axis::Col => &mut self.col_widths,
        };
        match size {
            Some(size) => map.insert(index, size),
            None => map.remove(&index),
        }
    }

    pub fn frozen_panes(&self) -> FrozenPanes {
        self.frozen
    }

    pub(crate) fn set_frozen_panes(&mut self, frozen: FrozenPanes) -> FrozenPanes {
        std::mem::replace(&mut self.frozen, frozen)
    }

    pub fn style_layers(&self, cell: CellRef) -> CellStyleLayers {
        CellStyleLayers {
            sheet: self.sheet_style,
            col: self.col_style(cell.col),
            row: self.row_style(cell.row),
            cell: self.cell(cell).map_or(0, |c| c.style_id),
        }
    }

    pub fn view(&self) -> SheetView {
        SheetView {
            frozen_rows: self.frozen.rows,
            frozen_cols: self.frozen.cols,
            row_heights: self.row_heights.clone(),
            col_widths: self.col_widths.clone(),
        }
    }

    /// True when the store holds nothing but defaults.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
            && self.row_styles.is_empty()
            && self.col_styles.is_empty()
            && self.sheet_style == 0
            && self.row_heights.is_empty()
            && self.col_widths.is_empty()
            && self.frozen == FrozenPanes::default()
    }
}

/// View state for one sheet.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetView {
    pub frozen_rows: u32,
    pub frozen_cols: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub row_heights: BTreeMap<u32, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub col_widths: BTreeMap<u32, f64>,
}
