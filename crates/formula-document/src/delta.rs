//! Typed before/after records of every document change.
//!
//! A mutation batch records one [`Delta`] per touched key. Undo replays a unit's
//! deltas backwards writing `before`; redo replays them forwards writing `after`.

use std::collections::HashMap;

use formula_model::{Cell, CellRef};
use serde::Serialize;

use crate::registry::RegistrySnapshot;
use crate::store::FrozenPanes;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Delta {
    Cell {
        sheet_id: String,
        cell: CellRef,
        before: Cell,
        after: Cell,
    },
    RowStyle {
        sheet_id: String,
        row: u32,
        before: u32,
        after: u32,
    },
    ColStyle {
        sheet_id: String,
        col: u32,
        before: u32,
        after: u32,
    },
    SheetStyle {
        sheet_id: String,
        before: u32,
        after: u32,
    },
    RowHeight {
        sheet_id: String,
        row: u32,
        before: Option<f64>,
        after: Option<f64>,
    },
    ColWidth {
        sheet_id: String,
        col: u32,
        before: Option<f64>,
        after: Option<f64>,
    },
    FrozenPanes {
        sheet_id: String,
        before: FrozenPanes,
        after: FrozenPanes,
    },
    /// Whole-registry snapshot pair (sheet list plus tombstones).
    Sheets {
        before: RegistrySnapshot,
        after: RegistrySnapshot,
    },
}

/// Identity of the state a delta touches; two deltas with equal keys coalesce.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeltaKey {
    Cell(String, CellRef),
    RowStyle(String, u32),
    ColStyle(String, u32),
    SheetStyle(String),
    RowHeight(String, u32),
    ColWidth(String, u32),
    FrozenPanes(String),
    Sheets,
}

impl Delta {
    pub fn key(&self) -> DeltaKey {
        match self {
            Delta::Cell { sheet_id, cell, .. } => DeltaKey::Cell(sheet_id.clone(), *cell),
            Delta::RowStyle { sheet_id, row, .. } => DeltaKey::RowStyle(sheet_id.clone(), *row),
            Delta::ColStyle { sheet_id, col, .. } => DeltaKey::ColStyle(sheet_id.clone(), *col),
            Delta::SheetStyle { sheet_id, .. } => DeltaKey::SheetStyle(sheet_id.clone()),
            Delta::RowHeight { sheet_id, row, .. } => DeltaKey::RowHeight(sheet_id.clone(), *row),
            Delta::ColWidth { sheet_id, col, .. } => DeltaKey::ColWidth(sheet_id.clone(), *col),
            Delta::FrozenPanes { sheet_id, .. } => DeltaKey::FrozenPanes(sheet_id.clone()),
            Delta::Sheets { .. } => DeltaKey::Sheets,
        }
    }

    /// Sheet the delta belongs to; `None` for registry changes.
    pub fn sheet_id(&self) -> Option<&str> {
        match self {
            Delta::Cell { sheet_id, .. }
            | Delta::RowStyle { sheet_id, .. }
            | Delta::ColStyle { sheet_id, .. }
            | Delta::SheetStyle { sheet_id, .. }
            | Delta::RowHeight { sheet_id, .. }
            | Delta::ColWidth { sheet_id, .. }
            | Delta::FrozenPanes { sheet_id, .. } => Some(sheet_id),
            Delta::Sheets { .. } => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        match self {
            Delta::Cell { before, after, .. } => before == after,
            Delta::RowStyle { before, after, .. }
            | Delta::ColStyle { before, after, .. }
            | Delta::SheetStyle { before, after, .. } => before == after,
            Delta::RowHeight { before, after, .. } | Delta::ColWidth { before, after, .. } => {
                before == after
            }
            Delta::FrozenPanes { before, after, .. } => before == after,
            Delta::Sheets { before, after } => before == after,
        }
    }

    /// The delta that undoes this one.
    pub fn inverted(&self) -> Delta {
        let mut inverted = self.clone();
        match &mut inverted {
            Delta::Cell { before, after, .. } => std::mem::swap(before, after),
            Delta::RowStyle { before, after, .. }
            | Delta::ColStyle { before, after, .. }
            | Delta::SheetStyle { before, after, .. } => std::mem::swap(before, after),
            Delta::RowHeight { before, after, .. } | Delta::ColWidth { before, after, .. } => {
                std::mem::swap(before, after)
            }
            Delta::FrozenPanes { before, after, .. } => std::mem::swap(before, after),
            Delta::Sheets { before, after } => std::mem::swap(before, after),
        }
        inverted
    }

    /// Replace `after` with the later delta's `after`. Keys must match.
    fn absorb(&mut self, later: Delta) {
        match (self, later) {
            (Delta::Cell { after, .. }, Delta::Cell { after: next, .. }) => *after = next,
            (Delta::RowStyle { after, .. }, Delta::RowStyle { after: next, .. })
            | (Delta::ColStyle { after, .. }, Delta::ColStyle { after: next, .. })
            | (Delta::SheetStyle { after, .. }, Delta::SheetStyle { after: next, .. }) => {
                *after = next
            }
            (Delta::RowHeight { after, .. }, Delta::RowHeight { after: next, .. })
            | (Delta::ColWidth { after, .. }, Delta::ColWidth { after: next, .. }) => {
                *after = next
            }
            (Delta::FrozenPanes { after, .. }, Delta::FrozenPanes { after: next, .. }) => {
                *after = next
            }
            (Delta::Sheets { after, .. }, Delta::Sheets { after: next, .. }) => *after = next,
            (this, later) => {
                log::error!("delta kinds differ for one key: {:?} vs {:?}", this.key(), later.key());
            }
        }
    }
}

/// Net effect of an open batch, one entry per key in first-touch order.
#[derive(Debug, Default)]
pub(crate) struct DeltaRecorder {
    order: Vec<DeltaKey>,
    entries: HashMap<DeltaKey, Delta>,
}

impl DeltaRecorder {
    pub(crate) fn record(&mut self, delta: Delta) {
        let key = delta.key();
        match self.entries.get_mut(&key) {
            Some(existing) => existing.absorb(delta),
            None => {
                self.order.push(key.clone());
                self.entries.insert(key, delta);
            }
        }
    }

    /// Recorded deltas in first-touch order, with no-ops dropped.
    pub(crate) fn into_deltas(mut self) -> Vec<Delta> {
        self.order
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .filter(|delta| !delta.is_noop())
            .collect()
    }
}
