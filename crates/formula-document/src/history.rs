use serde::Serialize;

use crate::delta::Delta;
use crate::events::{ChangeSource, SheetRange};

/// One committed batch: the unit undo and redo operate on.
#[derive(Clone, Debug, PartialEq)]
pub struct UndoUnit {
    pub id: u64,
    pub label: Option<String>,
    pub source: ChangeSource,
    pub deltas: Vec<Delta>,
    pub ranges: Vec<SheetRange>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StackDepths {
    pub undo: usize,
    pub redo: usize,
}

/// Marker compared against the undo-stack top to derive dirtiness.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SavePoint {
    /// Id of the unit on top of the undo stack when saved.
    At(u64),
    /// Something changed outside the stacks; only a new save cleans the document.
    Unreachable,
}

#[derive(Debug)]
pub(crate) struct History {
    undo: Vec<UndoUnit>,
    redo: Vec<UndoUnit>,
    next_id: u64,
    /// Id standing for the state below the oldest kept unit.
    floor: u64,
    save_point: SavePoint,
    max_depth: Option<usize>,
}

impl History {
    pub(crate) fn new(max_depth: Option<usize>) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            next_id: 1,
            floor: 0,
            save_point: SavePoint::At(0),
            max_depth,
        }
    }

    /// Push a freshly committed unit; clears the redo stack.
    pub(crate) fn push(
        &mut self,
        label: Option<String>,
        source: ChangeSource,
        deltas: Vec<Delta>,
        ranges: Vec<SheetRange>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.redo.clear();
        self.undo.push(UndoUnit {
            id,
            label,
            source,
            deltas,
            ranges,
        });
        if let Some(max) = self.max_depth {
            if self.undo.len() > max {
                let overflow = self.undo.len() - max;
                if let Some(dropped) = self.undo.drain(..overflow).last() {
                    self.floor = dropped.id;
                }
                log::trace!("dropped {overflow} oldest undo unit(s)");
            }
        }
        id
    }

    pub(crate) fn take_undo(&mut self) -> Option<UndoUnit> {
        self.undo.pop()
    }

    pub(crate) fn push_redo(&mut self, unit: UndoUnit) {
        self.redo.push(unit);
    }

    pub(crate) fn take_redo(&mut self) -> Option<UndoUnit> {
        self.redo.pop()
    }

    /// Return a redone unit to the undo stack without touching redo.
    pub(crate) fn push_undone(&mut self, unit: UndoUnit) {
        self.undo.push(unit);
    }

    pub(crate) fn depths(&self) -> StackDepths {
        StackDepths {
            undo: self.undo.len(),
            redo: self.redo.len(),
        }
    }

    fn top_id(&self) -> u64 {
        self.undo.last().map_or(self.floor, |unit| unit.id)
    }

    pub(crate) fn mark_saved(&mut self) {
        self.save_point = SavePoint::At(self.top_id());
    }

    pub(crate) fn mark_unreachable(&mut self) {
        self.save_point = SavePoint::Unreachable;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        match self.save_point {
            SavePoint::At(id) => id != self.top_id(),
            SavePoint::Unreachable => true,
        }
    }

    pub(crate) fn peek_undo(&self) -> Option<&UndoUnit> {
        self.undo.last()
    }

    pub(crate) fn peek_redo(&self) -> Option<&UndoUnit> {
        self.redo.last()
    }
}
