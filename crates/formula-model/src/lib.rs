//! `formula-model` defines the in-memory data shapes of a spreadsheet document.
//!
//! The crate holds plain data and pure functions only: coordinates, cell state,
//! sheet metadata, the append-only style table, and layered style resolution.
//! Mutation, history and notification live in `formula-document`.

mod address;
mod cell;
mod formula_text;
mod sheet;
mod style;
mod style_normalize;
mod style_resolve;
mod value;

pub use address::{A1ParseError, CellRef, Range, RangeParseError};
pub use cell::{Cell, CellInput, CellKey, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};
pub use formula_text::{display_formula_text, normalize_formula_text};
pub use sheet::{
    sheet_name_eq_case_insensitive, validate_sheet_name, SheetMeta, SheetNameError,
    SheetVisibility, TabColor, EXCEL_MAX_SHEET_NAME_LEN,
};
pub use style::{
    Alignment, Border, BorderEdge, BorderStyle, Color, FillStyle, FontStyle,
    HorizontalAlignment, Protection, Style, StyleTable, VerticalAlignment,
};
pub use style_normalize::normalize_style_json;
pub use style_resolve::{
    compose_layers, resolve_style, CellStyleLayers, ResolvedStyle, StyleLayer,
};
pub use value::{CellValue, ImageValue};
