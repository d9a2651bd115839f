use formula_document::{DocumentConfig, DocumentController, MutationOptions, StackDepths};
use formula_model::{CellRef, CellValue, Range, Style};
use pretty_assertions::assert_eq;

fn a1(s: &str) -> CellRef {
    CellRef::from_a1(s).unwrap()
}

#[test]
fn one_undo_unit_per_closed_batch() {
    let mut doc = DocumentController::new();
    doc.begin_batch(MutationOptions::labeled("Paste"));
    for row in 0..10 {
        let _ = doc.set_cell_value("Sheet1", CellRef::new(row, 0), f64::from(row));
    }
    let _ = doc.set_range_format("Sheet1", Range::from_a1("A1:A10").unwrap(), Some(&Style::bold()));
    doc.end_batch();

    assert_eq!(doc.stack_depths(), StackDepths { undo: 1, redo: 0 });
    assert_eq!(doc.undo_label(), Some("Paste"));

    assert!(doc.undo());
    for row in 0..10 {
        assert_eq!(doc.get_cell("Sheet1", CellRef::new(row, 0)).value, CellValue::Empty);
    }
    assert_eq!(doc.stack_depths(), StackDepths { undo: 0, redo: 1 });

    assert!(doc.redo());
    assert_eq!(doc.get_cell("Sheet1", a1("A4")).value, CellValue::Number(3.0));
    assert!(doc.resolve_cell_style("Sheet1", a1("A4")).bold);
}

#[test]
fn undo_restores_formula_text_and_style_ids_exactly() {
    let mut doc = DocumentController::new();
    let _ = doc.set_cell_formula("Sheet1", a1("B2"), "=SUM(A1:A3)");
    let _ = doc.set_range_format("Sheet1", Range::from_a1("B2").unwrap(), Some(&Style::bold()));
    let before = doc.get_cell("Sheet1", a1("B2"));

    let _ = doc.set_cell_value("Sheet1", a1("B2"), "plain");
    assert_eq!(doc.get_cell("Sheet1", a1("B2")).formula, None);
    assert_eq!(doc.get_cell("Sheet1", a1("B2")).style_id, before.style_id);

    assert!(doc.undo());
    assert_eq!(doc.get_cell("Sheet1", a1("B2")), before);
}

#[test]
fn empty_stacks_return_false() {
    let mut doc = DocumentController::new();
    assert!(!doc.undo());
    assert!(!doc.redo());
    assert!(!doc.can_undo());
}

#[test]
fn new_edit_clears_redo() {
    let mut doc = DocumentController::new();
    let _ = doc.set_cell_value("Sheet1", a1("A1"), 1.0);
    assert!(doc.undo());
    assert!(doc.can_redo());
    let _ = doc.set_cell_value("Sheet1", a1("A2"), 2.0);
    assert!(!doc.can_redo());
    assert!(!doc.redo());
}

#[test]
fn dirty_returns_to_false_at_the_save_point() {
    let mut doc = DocumentController::new();
    let _ = doc.set_cell_value("Sheet1", a1("A1"), 1.0);
    doc.mark_saved();
    assert!(!doc.is_dirty());

    let _ = doc.set_cell_value("Sheet1", a1("A1"), 2.0);
    assert!(doc.is_dirty());
    assert!(doc.undo());
    assert!(!doc.is_dirty());
    assert!(doc.undo());
    assert!(doc.is_dirty());
    assert!(doc.redo());
    assert!(!doc.is_dirty());
}

#[test]
fn mark_saved_commits_an_open_batch() {
    let mut doc = DocumentController::new();
    doc.begin_batch(MutationOptions::labeled("Typing"));
    let _ = doc.set_cell_value("Sheet1", a1("C3"), "draft");
    doc.mark_saved();

    assert!(!doc.is_batching());
    assert!(!doc.is_dirty());
    assert_eq!(doc.stack_depths().undo, 1);
}

#[test]
fn empty_batches_push_nothing() {
    let mut doc = DocumentController::new();
    doc.begin_batch(MutationOptions::labeled("Nothing"));
    doc.end_batch();

    let _ = doc.set_cell_value("Sheet1", a1("A1"), 1.0);
    doc.begin_batch(MutationOptions::labeled("Net zero"));
    let _ = doc.set_cell_value("Sheet1", a1("A1"), 5.0);
    let _ = doc.set_cell_value("Sheet1", a1("A1"), 1.0);
    doc.end_batch();

    assert_eq!(doc.stack_depths().undo, 1);
}

#[test]
fn max_undo_depth_drops_the_oldest_units() {
    let config = DocumentConfig {
        max_undo_depth: Some(3),
        ..DocumentConfig::default()
    };
    let mut doc = DocumentController::with_config(config);
    for i in 0..5 {
        let _ = doc.set_cell_value("Sheet1", a1("A1"), f64::from(i));
    }
    assert_eq!(doc.stack_depths().undo, 3);
    while doc.undo() {}
    assert_eq!(doc.get_cell("Sheet1", a1("A1")).value, CellValue::Number(1.0));
    // The save point (empty document) is no longer reachable by undo.
    assert!(doc.is_dirty());
}

#[test]
fn lazily_created_sheets_disappear_on_undo() {
    let mut doc = DocumentController::new();
    let _ = doc.set_cell_value("Budget", a1("A1"), 10.0);
    assert_eq!(doc.sheet_ids(), vec!["Sheet1", "Budget"]);
    assert_eq!(doc.sheet_meta("Budget").unwrap().name, "Budget");

    assert!(doc.undo());
    assert_eq!(doc.sheet_ids(), vec!["Sheet1"]);
    assert!(doc.sheet_store("Budget").is_none());

    assert!(doc.redo());
    assert_eq!(doc.sheet_ids(), vec!["Sheet1", "Budget"]);
    assert_eq!(doc.get_cell("Budget", a1("A1")).value, CellValue::Number(10.0));
}

#[test]
fn batch_helper_uses_the_given_label() {
    let mut doc = DocumentController::new();
    doc.batch(MutationOptions::labeled("Fill down"), |doc| {
        for row in 0..3 {
            let _ = doc.set_cell_value("Sheet1", CellRef::new(row, 0), 1.0);
        }
    });
    assert_eq!(doc.undo_label(), Some("Fill down"));
    assert!(doc.undo());
    assert_eq!(doc.redo_label(), Some("Fill down"));
}
