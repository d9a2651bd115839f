use std::cell::RefCell;
use std::rc::Rc;

use formula_document::{
    ChangeSource, DocumentController, DocumentEvent, EventKind, InsertPosition, MutationOptions,
    SheetRange,
};
use formula_model::{CellRef, Range};
use pretty_assertions::assert_eq;

fn record(doc: &mut DocumentController, kind: EventKind) -> Rc<RefCell<Vec<DocumentEvent>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    doc.on(kind, move |event| sink.borrow_mut().push(event.clone()));
    seen
}

#[test]
fn events_wait_for_flush() {
    let mut doc = DocumentController::new();
    let changes = record(&mut doc, EventKind::Change);

    let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 0), 1.0);
    let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 1), 2.0);
    assert!(changes.borrow().is_empty());
    assert_eq!(doc.pending_events(), 2);

    assert_eq!(doc.flush_events(), 2);
    assert_eq!(doc.pending_events(), 0);
    let seqs: Vec<u64> = changes
        .borrow()
        .iter()
        .filter_map(|event| match event {
            DocumentEvent::Change(change) => Some(change.seq),
            DocumentEvent::Update(_) => None,
        })
        .collect();
    assert_eq!(seqs, vec![1, 2]);
    assert_eq!(doc.flush_events(), 0);
}

#[test]
fn one_update_summarizes_a_flush() {
    let mut doc = DocumentController::new();
    let updates = record(&mut doc, EventKind::Update);

    let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 0), 1.0);
    assert!(doc.undo());
    doc.add_sheet("Two", InsertPosition::End).unwrap();
    doc.flush_events();

    let updates = updates.borrow();
    assert_eq!(updates.len(), 1);
    let DocumentEvent::Update(update) = &updates[0] else {
        panic!("expected an update event");
    };
    assert_eq!(update.change_count, 3);
    assert_eq!(update.sources, vec![ChangeSource::User, ChangeSource::Undo]);
    assert!(update.sheets_changed);
    assert_eq!(
        update.ranges,
        vec![SheetRange::new("Sheet1", Range::single(CellRef::new(0, 0)))]
    );
}

#[test]
fn undo_and_redo_events_carry_their_source_and_inverse() {
    let mut doc = DocumentController::new();
    let changes = record(&mut doc, EventKind::Change);
    let _ = doc.set_cell_value("Sheet1", CellRef::new(1, 1), 5.0);
    assert!(doc.undo());
    assert!(doc.redo());
    doc.flush_events();

    let changes = changes.borrow();
    let events: Vec<_> = changes
        .iter()
        .filter_map(|event| match event {
            DocumentEvent::Change(change) => Some(change),
            DocumentEvent::Update(_) => None,
        })
        .collect();
    assert_eq!(events.len(), 3);
    assert_eq!(events[1].source, ChangeSource::Undo);
    assert_eq!(events[1].deltas, vec![events[0].deltas[0].inverted()]);
    assert_eq!(events[2].source, ChangeSource::Redo);
    assert_eq!(events[2].deltas, events[0].deltas);
}

#[test]
fn batch_emits_one_change_with_its_label_and_source() {
    let mut doc = DocumentController::new();
    let changes = record(&mut doc, EventKind::Change);

    doc.batch(
        MutationOptions::labeled("Paste").with_source(ChangeSource::Macro),
        |doc| {
            let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 0), 1.0);
            let _ = doc.set_cell_value("Sheet1", CellRef::new(5, 5), 2.0);
        },
    );
    doc.flush_events();

    let changes = changes.borrow();
    assert_eq!(changes.len(), 1);
    let DocumentEvent::Change(change) = &changes[0] else {
        panic!("expected a change event");
    };
    assert_eq!(change.label.as_deref(), Some("Paste"));
    assert_eq!(change.source, ChangeSource::Macro);
    assert_eq!(change.deltas.len(), 2);
    assert_eq!(change.ranges.len(), 2);
}

#[test]
fn no_op_writes_emit_nothing() {
    let mut doc = DocumentController::new();
    let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 0), 1.0);
    doc.flush_events();
    let changes = record(&mut doc, EventKind::Change);

    let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 0), 1.0);
    assert_eq!(doc.flush_events(), 0);
    assert!(changes.borrow().is_empty());
}

#[test]
fn off_stops_delivery() {
    let mut doc = DocumentController::new();
    let hits = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&hits);
    let id = doc.on(EventKind::Change, move |_| *counter.borrow_mut() += 1);

    let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 0), 1.0);
    doc.flush_events();
    assert!(doc.off(id));
    assert!(!doc.off(id));
    let _ = doc.set_cell_value("Sheet1", CellRef::new(0, 0), 2.0);
    doc.flush_events();
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn change_events_serialize_with_tagged_deltas() {
    let mut doc = DocumentController::new();
    let changes = record(&mut doc, EventKind::Change);
    let _ = doc.set_row_height("Sheet1", 3, 30.0);
    doc.flush_events();

    let changes = changes.borrow();
    let DocumentEvent::Change(change) = &changes[0] else {
        panic!("expected a change event");
    };
    let json = serde_json::to_value(change).unwrap();
    assert_eq!(json["source"], "user");
    assert_eq!(json["deltas"][0]["kind"], "rowHeight");
    assert_eq!(json["deltas"][0]["after"], 30.0);
}
