//! The document controller: owns every sheet, the style table, history and
//! change notification, and funnels all writes through mutation batches.

mod cells;
mod external;
mod format;
mod sheets;
mod sort;
mod structure;

use std::collections::HashMap;

use formula_model::{
    resolve_style, Cell, CellRef, CellStyleLayers, Range, ResolvedStyle, SheetMeta, Style,
    StyleTable,
};
use serde::Serialize;

use crate::config::DocumentConfig;
use crate::delta::{Delta, DeltaRecorder};
use crate::error::RejectReason;
use crate::events::{ChangeNotifier, ChangeSource, DocumentEvent, EventKind, ListenerId, SheetRange};
use crate::format_cache::StyleSource;
use crate::history::{History, StackDepths};
use crate::registry::{RegistrySnapshot, SheetRegistry};
use crate::store::{Axis, FrozenPanes, SheetStore, SheetView};

pub use external::{ExternalDelta, ExternalDeltaOptions};

/// Label and origin attached to a batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationOptions {
    pub label: Option<String>,
    pub source: ChangeSource,
}

impl MutationOptions {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            source: ChangeSource::User,
        }
    }

    pub fn from_source(source: ChangeSource) -> Self {
        Self {
            label: None,
            source,
        }
    }

    pub fn with_source(mut self, source: ChangeSource) -> Self {
        self.source = source;
        self
    }
}

/// A committed change that collaborators have not seen yet.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundChange {
    pub source: ChangeSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub deltas: Vec<Delta>,
}

#[derive(Debug)]
struct OpenBatch {
    depth: usize,
    label: Option<String>,
    source: ChangeSource,
    recorder: DeltaRecorder,
    ranges: Vec<SheetRange>,
}

/// In-memory spreadsheet document.
///
/// Every mutator runs inside a batch. Outside an explicit
/// [`begin_batch`](Self::begin_batch)/[`end_batch`](Self::end_batch) pair a
/// mutator opens and closes its own, so each call is one undo unit; inside,
/// nested calls coalesce into the outermost batch.
#[derive(Debug)]
pub struct DocumentController {
    config: DocumentConfig,
    styles: StyleTable,
    registry: SheetRegistry,
    stores: HashMap<String, SheetStore>,
    history: History,
    notifier: ChangeNotifier,
    outbox: Vec<OutboundChange>,
    batch: Option<OpenBatch>,
}

impl Default for DocumentController {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentController {
    /// A clean document with a single empty `Sheet1`.
    pub fn new() -> Self {
        Self::with_config(DocumentConfig::default())
    }

    pub fn with_config(config: DocumentConfig) -> Self {
        let config = config.sanitized();
        let mut registry = SheetRegistry::new();
        registry.create_lazily("Sheet1");
        Self {
            history: History::new(config.max_undo_depth),
            config,
            styles: StyleTable::new(),
            registry,
            stores: HashMap::new(),
            notifier: ChangeNotifier::default(),
            outbox: Vec::new(),
            batch: None,
        }
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    /// Intern a style record (ids are stable; the table only grows).
    pub fn intern_style(&mut self, style: Style) -> u32 {
        self.styles.intern(style)
    }

    // ---- sheets (read) ----

    pub fn sheet_ids(&self) -> Vec<String> {
        self.registry.sheet_ids()
    }

    pub fn visible_sheet_ids(&self) -> Vec<String> {
        self.registry.visible_sheet_ids()
    }

    pub fn sheets(&self) -> &[SheetMeta] {
        self.registry.sheets()
    }

    pub fn sheet_meta(&self, sheet_id: &str) -> Option<&SheetMeta> {
        self.registry.sheet(sheet_id)
    }

    pub fn is_sheet_deleted(&self, sheet_id: &str) -> bool {
        self.registry.is_deleted(sheet_id)
    }

    pub fn registry_snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    pub fn sheet_store(&self, sheet_id: &str) -> Option<&SheetStore> {
        self.stores.get(sheet_id)
    }

    // ---- cells and styles (read) ----

    pub fn get_cell(&self, sheet_id: &str, cell: CellRef) -> Cell {
        self.stores
            .get(sheet_id)
            .and_then(|store| store.cell(cell))
            .cloned()
            .unwrap_or_default()
    }

    pub fn used_range(&self, sheet_id: &str) -> Option<Range> {
        self.stores.get(sheet_id).and_then(SheetStore::used_range)
    }

    pub fn cell_style_layers(&self, sheet_id: &str, cell: CellRef) -> CellStyleLayers {
        self.stores
            .get(sheet_id)
            .map(|store| store.style_layers(cell))
            .unwrap_or_default()
    }

    /// Layer tuples for every cell of `range`, row-major.
    pub fn cell_format_style_ids(
        &self,
        sheet_id: &str,
        range: Range,
    ) -> Result<Vec<Vec<CellStyleLayers>>, RejectReason> {
        let cells = range.cell_count();
        if cells > self.config.max_range_format_cells {
            return Err(RejectReason::TooLarge {
                cells,
                limit: self.config.max_range_format_cells,
            });
        }
        Ok((range.start.row..=range.end.row)
            .map(|row| {
                (range.start.col..=range.end.col)
                    .map(|col| self.cell_style_layers(sheet_id, CellRef::new(row, col)))
                    .collect()
            })
            .collect())
    }

    /// Effective formatting without caching.
    pub fn resolve_cell_style(&self, sheet_id: &str, cell: CellRef) -> ResolvedStyle {
        resolve_style(&self.styles, self.cell_style_layers(sheet_id, cell))
    }

    pub fn get_sheet_view(&self, sheet_id: &str) -> SheetView {
        self.stores
            .get(sheet_id)
            .map(SheetStore::view)
            .unwrap_or_default()
    }

    // ---- batching ----

    /// Open a batch, or nest inside the open one. Nested calls keep the outer
    /// label and source. While nested, [`undo`](Self::undo) and
    /// [`redo`](Self::redo) are refused so the outer `end_batch` calls still
    /// close one unit.
    pub fn begin_batch(&mut self, options: MutationOptions) {
        match self.batch.as_mut() {
            Some(batch) => batch.depth += 1,
            None => {
                self.batch = Some(OpenBatch {
                    depth: 1,
                    label: options.label,
                    source: options.source,
                    recorder: DeltaRecorder::default(),
                    ranges: Vec::new(),
                });
            }
        }
    }

    pub fn end_batch(&mut self) {
        let Some(batch) = self.batch.as_mut() else {
            log::warn!("end_batch called without an open batch");
            return;
        };
        if batch.depth > 1 {
            batch.depth -= 1;
            return;
        }
        self.commit_open_batch();
    }

    pub fn is_batching(&self) -> bool {
        self.batch.is_some()
    }

    /// Run `f` inside one batch.
    pub fn batch<R>(&mut self, options: MutationOptions, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_batch(options);
        let out = f(self);
        self.end_batch();
        out
    }

    pub(crate) fn run_mutation<R>(&mut self, label: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        self.batch(MutationOptions::labeled(label), f)
    }

    fn commit_open_batch(&mut self) {
        let Some(batch) = self.batch.take() else {
            return;
        };
        let OpenBatch {
            label,
            source,
            recorder,
            ranges,
            ..
        } = batch;
        let deltas = recorder.into_deltas();
        if deltas.is_empty() {
            log::trace!("discarding empty batch {label:?}");
            return;
        }
        log::debug!(
            "commit {label:?} from {source:?}: {} delta(s), {} range(s)",
            deltas.len(),
            ranges.len()
        );
        self.history
            .push(label.clone(), source, deltas.clone(), ranges.clone());
        self.publish(source, label, deltas, ranges);
    }

    fn publish(
        &mut self,
        source: ChangeSource,
        label: Option<String>,
        deltas: Vec<Delta>,
        ranges: Vec<SheetRange>,
    ) {
        if !source.is_external() {
            self.outbox.push(OutboundChange {
                source,
                label: label.clone(),
                deltas: deltas.clone(),
            });
        }
        self.notifier.enqueue(source, label, deltas, ranges);
    }

    // ---- recorded writes ----

    pub(crate) fn record(&mut self, delta: Delta) {
        match self.batch.as_mut() {
            Some(batch) => batch.recorder.record(delta),
            None => log::error!("change to {:?} recorded outside of a batch", delta.key()),
        }
    }

    pub(crate) fn mark_range(&mut self, sheet_id: &str, range: Range) {
        if let Some(batch) = self.batch.as_mut() {
            let range = SheetRange::new(sheet_id, range);
            if !batch.ranges.contains(&range) {
                batch.ranges.push(range);
            }
        }
    }

    /// Stale (deleted) sheet ids reject every write.
    pub(crate) fn writable(&self, sheet_id: &str) -> Result<(), RejectReason> {
        if self.registry.is_deleted(sheet_id) {
            log::debug!("ignoring write to deleted sheet {sheet_id}");
            return Err(RejectReason::SheetDeleted);
        }
        Ok(())
    }

    /// Create an unknown, never-deleted sheet on first write.
    pub(crate) fn ensure_sheet(&mut self, sheet_id: &str) {
        if self.registry.contains(sheet_id) || self.registry.is_deleted(sheet_id) {
            return;
        }
        let before = self.registry.snapshot();
        self.registry.create_lazily(sheet_id);
        log::debug!("created sheet {sheet_id} on first reference");
        let after = self.registry.snapshot();
        self.record(Delta::Sheets { before, after });
    }

    fn store_mut(&mut self, sheet_id: &str) -> &mut SheetStore {
        self.stores.entry(sheet_id.to_string()).or_default()
    }

    pub(crate) fn write_cell(&mut self, sheet_id: &str, cell: CellRef, next: Cell) -> bool {
        let before = self.store_mut(sheet_id).set_cell(cell, next.clone());
        if before == next {
            return false;
        }
        self.record(Delta::Cell {
            sheet_id: sheet_id.to_string(),
            cell,
            before,
            after: next,
        });
        true
    }

    pub(crate) fn write_axis_style(&mut self, sheet_id: &str, axis: Axis, index: u32, style_id: u32) -> bool {
        let before = self.store_mut(sheet_id).set_axis_style(axis, index, style_id);
        if before == style_id {
            return false;
        }
        let sheet_id = sheet_id.to_string();
        self.record(match axis {
            Axis::Row => Delta::RowStyle {
                sheet_id,
                row: index,
                before,
                after: style_id,
            },
            Axis::Col => Delta::ColStyle {
                sheet_id,
                col: index,
                before,
                after: style_id,
            },
        });
        true
    }

    pub(crate) fn write_sheet_style(&mut self, sheet_id: &str, style_id: u32) -> bool {
        let before = self.store_mut(sheet_id).set_sheet_style(style_id);
        if before == style_id {
            return false;
        }
        self.record(Delta::SheetStyle {
            sheet_id: sheet_id.to_string(),
            before,
            after: style_id,
        });
        true
    }

    pub(crate) fn write_axis_size(&mut self, sheet_id: &str, axis: Axis, index: u32, size: Option<f64>) -> bool {
        let before = self.store_mut(sheet_id).set_axis_size(axis, index, size);
        if before == size {
            return false;
        }
        let sheet_id = sheet_id.to_string();
        self.record(match axis {
            Axis::Row => Delta::RowHeight {
                sheet_id,
                row: index,
                before,
                after: size,
            },
            Axis::Col => Delta::ColWidth {
                sheet_id,
                col: index,
                before,
                after: size,
            },
        });
        true
    }

    pub(crate) fn write_frozen_panes(&mut self, sheet_id: &str, frozen: FrozenPanes) -> bool {
        let before = self.store_mut(sheet_id).set_frozen_panes(frozen);
        if before == frozen {
            return false;
        }
        self.record(Delta::FrozenPanes {
            sheet_id: sheet_id.to_string(),
            before,
            after: frozen,
        });
        true
    }

    // ---- history ----

    /// Revert the most recent undo unit. Commits an open batch first; returns
    /// `false` inside a nested batch.
    pub fn undo(&mut self) -> bool {
        if self.batch_is_nested() {
            log::warn!("undo refused inside a nested batch");
            return false;
        }
        self.commit_open_batch();
        let Some(unit) = self.history.take_undo() else {
            return false;
        };
        for delta in unit.deltas.iter().rev() {
            self.apply_raw(delta, false);
        }
        log::debug!("undo {:?}", unit.label);
        let deltas = unit.deltas.iter().rev().map(Delta::inverted).collect();
        self.publish(ChangeSource::Undo, unit.label.clone(), deltas, unit.ranges.clone());
        self.history.push_redo(unit);
        true
    }

    /// Reapply the most recently undone unit. Commits an open batch first; returns
    /// `false` inside a nested batch.
    pub fn redo(&mut self) -> bool {
        if self.batch_is_nested() {
            log::warn!("redo refused inside a nested batch");
            return false;
        }
        self.commit_open_batch();
        let Some(unit) = self.history.take_redo() else {
            return false;
        };
        for delta in &unit.deltas {
            self.apply_raw(delta, true);
        }
        log::debug!("redo {:?}", unit.label);
        self.publish(
            ChangeSource::Redo,
            unit.label.clone(),
            unit.deltas.clone(),
            unit.ranges.clone(),
        );
        self.history.push_undone(unit);
        true
    }

    fn batch_is_nested(&self) -> bool {
        self.batch.as_ref().is_some_and(|batch| batch.depth > 1)
    }

    pub fn can_undo(&self) -> bool {
        self.history.peek_undo().is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.history.peek_redo().is_some()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.history.peek_undo().and_then(|unit| unit.label.as_deref())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.history.peek_redo().and_then(|unit| unit.label.as_deref())
    }

    pub fn stack_depths(&self) -> StackDepths {
        self.history.depths()
    }

    pub fn is_dirty(&self) -> bool {
        self.history.is_dirty()
    }

    /// Commit any open batch, record the save point, and deliver pending events.
    pub fn mark_saved(&mut self) {
        self.commit_open_batch();
        self.history.mark_saved();
        self.flush_events();
    }

    fn apply_raw(&mut self, delta: &Delta, forward: bool) {
        macro_rules! side {
            ($before:expr, $after:expr) => {
                if forward {
                    $after
                } else {
                    $before
                }
            };
        }
        match delta {
            Delta::Cell {
                sheet_id,
                cell,
                before,
                after,
            } => {
                self.store_mut(sheet_id).set_cell(*cell, side!(before, after).clone());
            }
            Delta::RowStyle {
                sheet_id,
                row,
                before,
                after,
            } => {
                self.store_mut(sheet_id)
                    .set_axis_style(Axis::Row, *row, *side!(before, after));
            }
            Delta::ColStyle {
                sheet_id,
                col,
                before,
                after,
            } => {
                self.store_mut(sheet_id)
                    .set_axis_style(Axis::Col, *col, *side!(before, after));
            }
            Delta::SheetStyle {
                sheet_id,
                before,
                after,
            } => {
                self.store_mut(sheet_id).set_sheet_style(*side!(before, after));
            }
            Delta::RowHeight {
                sheet_id,
                row,
                before,
                after,
            } => {
                self.store_mut(sheet_id)
                    .set_axis_size(Axis::Row, *row, *side!(before, after));
            }
            Delta::ColWidth {
                sheet_id,
                col,
                before,
                after,
            } => {
                self.store_mut(sheet_id)
                    .set_axis_size(Axis::Col, *col, *side!(before, after));
            }
            Delta::FrozenPanes {
                sheet_id,
                before,
                after,
            } => {
                self.store_mut(sheet_id).set_frozen_panes(*side!(before, after));
            }
            Delta::Sheets { before, after } => {
                self.registry.replay(side!(before, after), side!(after, before));
                let registry = &self.registry;
                self.stores
                    .retain(|id, store| registry.contains(id) || !store.is_empty());
            }
        }
    }

    // ---- events ----

    /// Subscribe to change or update events. Events are delivered by
    /// [`flush_events`](Self::flush_events).
    pub fn on(&mut self, kind: EventKind, listener: impl FnMut(&DocumentEvent) + 'static) -> ListenerId {
        self.notifier.on(kind, Box::new(listener))
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.notifier.off(id)
    }

    pub fn pending_events(&self) -> usize {
        self.notifier.pending_len()
    }

    /// Deliver queued change events followed by one update event.
    pub fn flush_events(&mut self) -> usize {
        self.notifier.flush()
    }

    /// Drain changes made by this session (user edits, undo, redo) for
    /// re-synchronization. Externally sourced changes never appear here.
    pub fn take_outbound_changes(&mut self) -> Vec<OutboundChange> {
        std::mem::take(&mut self.outbox)
    }
}

impl StyleSource for DocumentController {
    fn style_table(&self) -> &StyleTable {
        &self.styles
    }

    fn style_layers(&self, sheet_id: &str, cell: CellRef) -> CellStyleLayers {
        self.cell_style_layers(sheet_id, cell)
    }
}

#[cfg(test)]
mod tests {
    use formula_model::CellValue;

    use super::*;

    #[test]
    fn starts_with_one_clean_sheet() {
        let doc = DocumentController::new();
        assert_eq!(doc.sheet_ids(), vec!["Sheet1"]);
        assert!(!doc.is_dirty());
        assert_eq!(doc.stack_depths(), StackDepths::default());
    }

    #[test]
    fn nested_batches_coalesce_into_the_outermost() {
        let mut doc = DocumentController::new();
        doc.begin_batch(MutationOptions::labeled("Outer"));
        doc.begin_batch(MutationOptions::labeled("Inner"));
        let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 0), 1.0);
        doc.end_batch();
        assert!(doc.is_batching());
        let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 1), 2.0);
        doc.end_batch();

        assert!(!doc.is_batching());
        assert_eq!(doc.stack_depths().undo, 1);
        assert_eq!(doc.undo_label(), Some("Outer"));
    }

    #[test]
    fn unmatched_end_batch_is_ignored() {
        let mut doc = DocumentController::new();
        doc.end_batch();
        assert_eq!(doc.stack_depths().undo, 0);
    }

    #[test]
    fn undo_commits_an_open_batch_first() {
        let mut doc = DocumentController::new();
        doc.begin_batch(MutationOptions::default());
        let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 0), 7.0);
        assert!(doc.undo());
        assert!(!doc.is_batching());
        assert_eq!(doc.get_cell("Sheet1", CellRef::new(0, 0)).value, CellValue::Empty);
        assert_eq!(doc.stack_depths(), StackDepths { undo: 0, redo: 1 });
    }

    #[test]
    fn undo_is_refused_inside_a_nested_batch() {
        let mut doc = DocumentController::new();
        let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 0), 1.0);
        doc.begin_batch(MutationOptions::labeled("Outer"));
        doc.begin_batch(MutationOptions::default());
        let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 1), 2.0);
        assert!(!doc.undo());
        assert!(!doc.redo());
        assert!(doc.is_batching());
        let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 2), 3.0);
        doc.end_batch();
        doc.end_batch();

        assert!(!doc.is_batching());
        assert_eq!(doc.stack_depths(), StackDepths { undo: 2, redo: 0 });
        assert!(doc.undo());
        assert_eq!(doc.get_cell("Sheet1", CellRef::new(0, 1)).value, CellValue::Empty);
        assert_eq!(doc.get_cell("Sheet1", CellRef::new(0, 2)).value, CellValue::Empty);
        assert_eq!(doc.get_cell("Sheet1", CellRef::new(0, 0)).value, CellValue::Number(1.0));
    }
}
