use serde::{Deserialize, Serialize};

use crate::style::{BorderEdge, Color, HorizontalAlignment, Style, StyleTable, VerticalAlignment};

/// Tuple of contributing style ids across formatting layers for one cell.
///
/// Precedence order: `sheet < col < row < cell`. A later layer overrides an
/// earlier one only for properties it specifies (explicit clears included).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellStyleLayers {
    pub sheet: u32,
    pub col: u32,
    pub row: u32,
    pub cell: u32,
}

/// Which single layer carries formatting, when exactly one does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleLayer {
    Sheet,
    Col,
    Row,
    Cell,
}

impl CellStyleLayers {
    pub const fn new(cell: u32, row: u32, col: u32, sheet: u32) -> Self {
        Self {
            sheet,
            col,
            row,
            cell,
        }
    }

    pub const fn in_precedence_order(self) -> [u32; 4] {
        [self.sheet, self.col, self.row, self.cell]
    }

    pub const fn is_default(self) -> bool {
        self.sheet == 0 && self.col == 0 && self.row == 0 && self.cell == 0
    }

    /// `Some((layer, id))` when exactly one layer is non-zero.
    pub fn single_layer(self) -> Option<(StyleLayer, u32)> {
        let layers = [
            (StyleLayer::Sheet, self.sheet),
            (StyleLayer::Col, self.col),
            (StyleLayer::Row, self.row),
            (StyleLayer::Cell, self.cell),
        ];
        let mut present = layers.into_iter().filter(|(_, id)| *id != 0);
        let first = present.next()?;
        present.next().is_none().then_some(first)
    }
}

/// Fully materialized formatting for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStyle {
    pub font_name: Option<String>,
    pub font_size_100pt: Option<u16>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub font_color: Option<Color>,
    pub background_color: Option<Color>,
    pub border_top: Option<BorderEdge>,
    pub border_right: Option<BorderEdge>,
    pub border_bottom: Option<BorderEdge>,
    pub border_left: Option<BorderEdge>,
    pub horizontal_alignment: Option<HorizontalAlignment>,
    pub vertical_alignment: Option<VerticalAlignment>,
    pub wrap_text: bool,
    pub indent: Option<u8>,
    pub number_format: Option<String>,
    /// Cells are locked unless a layer says otherwise.
    pub locked: bool,
}

impl Default for ResolvedStyle {
    fn default() -> Self {
        Self {
            font_name: None,
            font_size_100pt: None,
            bold: false,
            italic: false,
            underline: false,
            strike: false,
            font_color: None,
            background_color: None,
            border_top: None,
            border_right: None,
            border_bottom: None,
            border_left: None,
            horizontal_alignment: None,
            vertical_alignment: None,
            wrap_text: false,
            indent: None,
            number_format: None,
            locked: true,
        }
    }
}

impl ResolvedStyle {
    /// Materialize a single (already merged) record.
    pub fn from_style(style: &Style) -> Self {
        let defaults = ResolvedStyle::default();
        Self {
            font_name: style.font.name.clone().flatten(),
            font_size_100pt: style.font.size_100pt.flatten(),
            bold: style.font.bold.unwrap_or(defaults.bold),
            italic: style.font.italic.unwrap_or(defaults.italic),
            underline: style.font.underline.unwrap_or(defaults.underline),
            strike: style.font.strike.unwrap_or(defaults.strike),
            font_color: style.font.color.flatten(),
            background_color: style.fill.background_color.flatten(),
            border_top: style.border.top.flatten(),
            border_right: style.border.right.flatten(),
            border_bottom: style.border.bottom.flatten(),
            border_left: style.border.left.flatten(),
            horizontal_alignment: style.alignment.horizontal.flatten(),
            vertical_alignment: style.alignment.vertical.flatten(),
            wrap_text: style.alignment.wrap_text.unwrap_or(defaults.wrap_text),
            indent: style.alignment.indent.flatten(),
            number_format: style.number_format.clone().flatten(),
            locked: style.protection.locked.unwrap_or(defaults.locked),
        }
    }
}

/// Merge the four layers into one record, lowest precedence first.
///
/// Unknown ids contribute nothing (they resolve to the empty record).
pub fn compose_layers(table: &StyleTable, layers: CellStyleLayers) -> Style {
    layers
        .in_precedence_order()
        .into_iter()
        .filter(|id| *id != 0)
        .fold(Style::default(), |acc, id| {
            acc.merged_with(table.get_or_default(id))
        })
}

/// Resolve the effective style for a cell's layer tuple.
pub fn resolve_style(table: &StyleTable, layers: CellStyleLayers) -> ResolvedStyle {
    if layers.is_default() {
        return ResolvedStyle::default();
    }
    ResolvedStyle::from_style(&compose_layers(table, layers))
}
