//! Change notification.
//!
//! Committed batches become [`ChangeEvent`]s. Events queue up until
//! [`ChangeNotifier::flush`], which delivers every queued change in commit order
//! followed by one coalesced [`UpdateEvent`].

use std::collections::VecDeque;

use formula_model::Range;
use serde::{Deserialize, Serialize};

use crate::delta::Delta;

/// Who caused a change.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeSource {
    #[default]
    User,
    Undo,
    Redo,
    Macro,
    Python,
    Script,
    Pivot,
    Pipeline,
    Collab,
    Recalc,
    ApplyState,
}

impl ChangeSource {
    /// Changes that originate outside this client's editing session.
    ///
    /// These are never echoed back to collaborators.
    pub const fn is_external(self) -> bool {
        matches!(
            self,
            ChangeSource::Macro
                | ChangeSource::Python
                | ChangeSource::Script
                | ChangeSource::Pivot
                | ChangeSource::Pipeline
                | ChangeSource::Collab
                | ChangeSource::Recalc
                | ChangeSource::ApplyState
        )
    }
}

/// A rectangle on a specific sheet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRange {
    pub sheet_id: String,
    pub range: Range,
}

impl SheetRange {
    pub fn new(sheet_id: impl Into<String>, range: Range) -> Self {
        Self {
            sheet_id: sheet_id.into(),
            range,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Monotonic per-document sequence number.
    pub seq: u64,
    pub source: ChangeSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub deltas: Vec<Delta>,
    /// Dirty ranges, one per mutator call that changed something.
    pub ranges: Vec<SheetRange>,
}

impl ChangeEvent {
    /// True when the sheet list (names, order, visibility, membership) changed.
    pub fn sheets_changed(&self) -> bool {
        self.deltas
            .iter()
            .any(|delta| matches!(delta, Delta::Sheets { .. }))
    }
}

/// Summary of everything delivered in one flush.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvent {
    pub change_count: usize,
    pub sources: Vec<ChangeSource>,
    pub ranges: Vec<SheetRange>,
    pub sheets_changed: bool,
}

impl UpdateEvent {
    fn coalesce(changes: &[ChangeEvent]) -> Self {
        let mut update = UpdateEvent {
            change_count: changes.len(),
            ..UpdateEvent::default()
        };
        for change in changes {
            if !update.sources.contains(&change.source) {
                update.sources.push(change.source);
            }
            for range in &change.ranges {
                if !update.ranges.contains(range) {
                    update.ranges.push(range.clone());
                }
            }
            update.sheets_changed |= change.sheets_changed();
        }
        update
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DocumentEvent {
    Change(ChangeEvent),
    Update(UpdateEvent),
}

impl DocumentEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DocumentEvent::Change(_) => EventKind::Change,
            DocumentEvent::Update(_) => EventKind::Update,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Change,
    Update,
}

/// Handle returned by [`ChangeNotifier::on`]; pass it to `off` to unsubscribe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&DocumentEvent)>;

#[derive(Default)]
pub(crate) struct ChangeNotifier {
    listeners: Vec<(ListenerId, EventKind, Listener)>,
    next_listener: u64,
    pending: VecDeque<ChangeEvent>,
    next_seq: u64,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listeners.len())
            .field("pending", &self.pending.len())
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

impl ChangeNotifier {
    pub(crate) fn on(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push((id, kind, listener));
        id
    }

    pub(crate) fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub(crate) fn enqueue(
        &mut self,
        source: ChangeSource,
        label: Option<String>,
        deltas: Vec<Delta>,
        ranges: Vec<SheetRange>,
    ) {
        self.next_seq += 1;
        self.pending.push_back(ChangeEvent {
            seq: self.next_seq,
            source,
            label,
            deltas,
            ranges,
        });
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Deliver queued changes, then one update. Returns the number of changes.
    pub(crate) fn flush(&mut self) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let changes: Vec<ChangeEvent> = self.pending.drain(..).collect();
        let update = DocumentEvent::Update(UpdateEvent::coalesce(&changes));
        let count = changes.len();

        for change in changes {
            let event = DocumentEvent::Change(change);
            self.deliver(&event);
        }
        self.deliver(&update);
        log::trace!("flushed {count} change event(s)");
        count
    }

    fn deliver(&mut self, event: &DocumentEvent) {
        let kind = event.kind();
        for (_, listener_kind, listener) in self.listeners.iter_mut() {
            if *listener_kind == kind {
                listener(event);
            }
        }
    }
}
