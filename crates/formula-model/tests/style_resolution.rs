use formula_model::{
    normalize_style_json, resolve_style, CellStyleLayers, Color, HorizontalAlignment,
    ResolvedStyle, Style, StyleTable,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn table_with(styles: &[serde_json::Value]) -> (StyleTable, Vec<u32>) {
    let mut table = StyleTable::new();
    let ids = styles
        .iter()
        .map(|s| table.intern(normalize_style_json(s)))
        .collect();
    (table, ids)
}

#[test]
fn cell_beats_row_beats_col_beats_sheet() {
    let (table, ids) = table_with(&[
        json!({ "fill": { "backgroundColor": "#111111" } }),
        json!({ "fill": { "backgroundColor": "#222222" } }),
        json!({ "fill": { "backgroundColor": "#333333" } }),
        json!({ "fill": { "backgroundColor": "#444444" } }),
    ]);
    let (sheet, col, row, cell) = (ids[0], ids[1], ids[2], ids[3]);

    let bg = |layers| resolve_style(&table, layers).background_color;
    assert_eq!(
        bg(CellStyleLayers::new(cell, row, col, sheet)),
        Some(Color::new_argb(0xFF444444))
    );
    assert_eq!(
        bg(CellStyleLayers::new(0, row, col, sheet)),
        Some(Color::new_argb(0xFF333333))
    );
    assert_eq!(
        bg(CellStyleLayers::new(0, 0, col, sheet)),
        Some(Color::new_argb(0xFF222222))
    );
    assert_eq!(
        bg(CellStyleLayers::new(0, 0, 0, sheet)),
        Some(Color::new_argb(0xFF111111))
    );
}

#[test]
fn layers_merge_property_by_property() {
    let (table, ids) = table_with(&[
        json!({ "bold": true }),
        json!({ "horizontal_align": "right" }),
        json!({ "font": { "italic": true } }),
    ]);
    let resolved = resolve_style(&table, CellStyleLayers::new(ids[2], ids[1], 0, ids[0]));
    assert_eq!(
        resolved,
        ResolvedStyle {
            bold: true,
            italic: true,
            horizontal_alignment: Some(HorizontalAlignment::Right),
            ..Default::default()
        }
    );
}

#[test]
fn explicit_clear_in_higher_layer_removes_lower_value() {
    let (table, ids) = table_with(&[
        json!({ "font": { "bold": true }, "numberFormat": "0.00" }),
        json!({ "font": { "bold": false }, "numberFormat": null }),
    ]);
    let resolved = resolve_style(&table, CellStyleLayers::new(ids[1], ids[0], 0, 0));
    assert!(!resolved.bold);
    assert_eq!(resolved.number_format, None);
}

#[test]
fn malformed_color_resolves_to_unset() {
    let (table, ids) = table_with(&[json!({ "backgroundColor": "#GGHHII", "bold": true })]);
    let resolved = resolve_style(&table, CellStyleLayers::new(ids[0], 0, 0, 0));
    assert_eq!(resolved.background_color, None);
    assert!(resolved.bold);
}

#[test]
fn legacy_clipboard_payload_deserializes_into_style() {
    let style: Style = serde_json::from_value(json!({
        "bold": true,
        "font_color": "#00FF00",
        "fontSize": "14pt",
    }))
    .unwrap();
    assert_eq!(style.font.bold, Some(true));
    assert_eq!(style.font.color, Some(Some(Color::new_argb(0xFF00FF00))));
    assert_eq!(style.font.size_100pt, Some(Some(1400)));
}
