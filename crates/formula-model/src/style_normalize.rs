//! Canonicalization of persisted / clipboard style payloads.
//!
//! Style objects reach the document in two shapes: the nested schema
//! (`{"font": {"bold": true}, "fill": {"backgroundColor": "#FF0"}}`) and older flat
//! aliases (`{"bold": true, "backgroundColor": "#FF0", "font_size": 12}`). Both are
//! folded into one [`Style`] here, so nothing downstream branches on input shape.
//!
//! Rules:
//! - a key mapped to `null` is an explicit clear
//! - a key with a malformed value is treated as absent
//! - unknown keys are ignored
//! - when a nested key and a flat alias both appear, the nested key wins

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::style::{
    BorderEdge, BorderStyle, Color, HorizontalAlignment, Style, VerticalAlignment,
};

impl<'de> Deserialize<'de> for Style {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(normalize_style_json(&value))
    }
}

/// Normalize a JSON style payload (nested or legacy flat keys) into a [`Style`].
///
/// Non-object input yields the empty style.
pub fn normalize_style_json(value: &Value) -> Style {
    let Some(obj) = value.as_object() else {
        return Style::default();
    };

    let mut style = Style::default();
    apply_flat_aliases(&mut style, obj);
    apply_nested(&mut style, obj);
    style
}

fn apply_flat_aliases(style: &mut Style, obj: &Map<String, Value>) {
    set_if_some(&mut style.font.bold, lookup(obj, &["bold"]).and_then(parse_flag));
    set_if_some(&mut style.font.italic, lookup(obj, &["italic"]).and_then(parse_flag));
    set_if_some(
        &mut style.font.underline,
        lookup(obj, &["underline"]).and_then(parse_underline),
    );
    set_if_some(
        &mut style.font.strike,
        lookup(obj, &["strike", "strikethrough", "strikeThrough"]).and_then(parse_flag),
    );
    set_if_some(
        &mut style.font.size_100pt,
        lookup(obj, &["font_size", "fontSize"]).and_then(|v| nullable(v, parse_font_size)),
    );
    set_if_some(
        &mut style.font.color,
        lookup(obj, &["font_color", "fontColor", "color"]).and_then(|v| nullable(v, parse_color)),
    );
    set_if_some(
        &mut style.font.name,
        lookup(obj, &["font_name", "fontName", "fontFamily"]).and_then(|v| nullable(v, parse_text)),
    );
    set_if_some(
        &mut style.fill.background_color,
        lookup(obj, &["backgroundColor", "background_color", "fill_color", "fillColor"])
            .and_then(|v| nullable(v, parse_color)),
    );
    set_if_some(
        &mut style.alignment.horizontal,
        lookup(obj, &["horizontal_align", "horizontalAlign", "textAlign"])
            .and_then(|v| nullable(v, parse_horizontal)),
    );
    set_if_some(
        &mut style.alignment.vertical,
        lookup(obj, &["vertical_align", "verticalAlign"]).and_then(|v| nullable(v, parse_vertical)),
    );
    set_if_some(
        &mut style.alignment.wrap_text,
        lookup(obj, &["wrap", "wrap_text", "wrapText"]).and_then(parse_flag),
    );
    set_if_some(
        &mut style.number_format,
        lookup(obj, &["numberFormat", "number_format", "numFmt"])
            .and_then(|v| nullable(v, parse_text)),
    );
    set_if_some(&mut style.protection.locked, lookup(obj, &["locked"]).and_then(parse_flag));
}

fn apply_nested(style: &mut Style, obj: &Map<String, Value>) {
    match obj.get("font") {
        Some(Value::Object(font)) => {
            set_if_some(&mut style.font.bold, font.get("bold").and_then(parse_flag));
            set_if_some(&mut style.font.italic, font.get("italic").and_then(parse_flag));
            set_if_some(
                &mut style.font.underline,
                font.get("underline").and_then(parse_underline),
            );
            set_if_some(
                &mut style.font.strike,
                lookup(font, &["strike", "strikethrough"]).and_then(parse_flag),
            );
            set_if_some(
                &mut style.font.size_100pt,
                font.get("size").and_then(|v| nullable(v, parse_font_size)),
            );
            set_if_some(
                &mut style.font.size_100pt,
                font.get("size100pt")
                    .and_then(|v| nullable(v, |v| v.as_u64().and_then(|n| u16::try_from(n).ok()))),
            );
            set_if_some(
                &mut style.font.color,
                font.get("color").and_then(|v| nullable(v, parse_color)),
            );
            set_if_some(
                &mut style.font.name,
                font.get("name").and_then(|v| nullable(v, parse_text)),
            );
        }
        Some(Value::Null) => style.font = clear_font(),
        _ => {}
    }

    match obj.get("fill") {
        Some(Value::Object(fill)) => set_if_some(
            &mut style.fill.background_color,
            lookup(fill, &["backgroundColor", "background_color", "fgColor", "color"])
                .and_then(|v| nullable(v, parse_color)),
        ),
        Some(Value::Null) => style.fill.background_color = Some(None),
        _ => {}
    }

    match obj.get("border") {
        Some(Value::Object(border)) => {
            let edges = [
                ("top", &mut style.border.top),
                ("right", &mut style.border.right),
                ("bottom", &mut style.border.bottom),
                ("left", &mut style.border.left),
            ];
            for (key, slot) in edges {
                set_if_some(slot, border.get(key).and_then(parse_border_edge));
            }
        }
        Some(Value::Null) => {
            style.border.top = Some(None);
            style.border.right = Some(None);
            style.border.bottom = Some(None);
            style.border.left = Some(None);
        }
        _ => {}
    }

    if let Some(Value::Object(alignment)) = obj.get("alignment") {
        set_if_some(
            &mut style.alignment.horizontal,
            alignment.get("horizontal").and_then(|v| nullable(v, parse_horizontal)),
        );
        set_if_some(
            &mut style.alignment.vertical,
            alignment.get("vertical").and_then(|v| nullable(v, parse_vertical)),
        );
        set_if_some(
            &mut style.alignment.wrap_text,
            lookup(alignment, &["wrapText", "wrap_text"]).and_then(parse_flag),
        );
        set_if_some(
            &mut style.alignment.indent,
            alignment
                .get("indent")
                .and_then(|v| nullable(v, |v| v.as_u64().and_then(|n| u8::try_from(n).ok()))),
        );
    }

    if let Some(Value::Object(protection)) = obj.get("protection") {
        set_if_some(
            &mut style.protection.locked,
            protection.get("locked").and_then(parse_flag),
        );
    }
}

fn clear_font() -> crate::style::FontStyle {
    crate::style::FontStyle {
        name: Some(None),
        size_100pt: Some(None),
        bold: Some(false),
        italic: Some(false),
        underline: Some(false),
        strike: Some(false),
        color: Some(None),
    }
}

fn set_if_some<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// First present key wins.
fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

/// `null` becomes `Some(None)`; a parsable value `Some(Some(v))`; anything else `None`.
fn nullable<T>(value: &Value, parse: impl Fn(&Value) -> Option<T>) -> Option<Option<T>> {
    if value.is_null() {
        return Some(None);
    }
    parse(value).map(Some)
}

fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Null => Some(false),
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn parse_underline(value: &Value) -> Option<bool> {
    match value {
        Value::String(s) => Some(!matches!(s.to_ascii_lowercase().as_str(), "none" | "false" | "")),
        other => parse_flag(other),
    }
}

fn parse_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_color(value: &Value) -> Option<Color> {
    match value {
        Value::String(s) => Color::parse(s),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Color::new_argb),
        Value::Object(obj) => obj
            .get("argb")
            .or_else(|| obj.get("rgb"))
            .and_then(parse_color),
        _ => None,
    }
}

/// Font size in points (number or `"12pt"` string) to 1/100 pt.
fn parse_font_size(value: &Value) -> Option<u16> {
    let points = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches("pt").trim().parse().ok()?,
        _ => return None,
    };
    if !points.is_finite() || points <= 0.0 {
        return None;
    }
    let hundredths = (points * 100.0).round();
    (hundredths <= u16::MAX as f64).then_some(hundredths as u16)
}

fn parse_horizontal(value: &Value) -> Option<HorizontalAlignment> {
    match value.as_str()?.trim().to_ascii_lowercase().as_str() {
        "general" => Some(HorizontalAlignment::General),
        "left" | "start" => Some(HorizontalAlignment::Left),
        "center" | "centre" => Some(HorizontalAlignment::Center),
        "right" | "end" => Some(HorizontalAlignment::Right),
        "fill" => Some(HorizontalAlignment::Fill),
        "justify" => Some(HorizontalAlignment::Justify),
        _ => None,
    }
}

fn parse_vertical(value: &Value) -> Option<VerticalAlignment> {
    match value.as_str()?.trim().to_ascii_lowercase().as_str() {
        "top" => Some(VerticalAlignment::Top),
        "center" | "middle" => Some(VerticalAlignment::Center),
        "bottom" => Some(VerticalAlignment::Bottom),
        _ => None,
    }
}

fn parse_border_style(s: &str) -> Option<BorderStyle> {
    match s.trim().to_ascii_lowercase().as_str() {
        "none" => Some(BorderStyle::None),
        "thin" | "hair" => Some(BorderStyle::Thin),
        "medium" => Some(BorderStyle::Medium),
        "thick" => Some(BorderStyle::Thick),
        "dashed" | "mediumdashed" => Some(BorderStyle::Dashed),
        "dotted" => Some(BorderStyle::Dotted),
        "double" => Some(BorderStyle::Double),
        _ => None,
    }
}

fn parse_border_edge(value: &Value) -> Option<Option<BorderEdge>> {
    let edge = match value {
        Value::Null => return Some(None),
        Value::String(s) => BorderEdge {
            style: parse_border_style(s)?,
            color: None,
        },
        Value::Object(obj) => BorderEdge {
            style: obj
                .get("style")
                .and_then(Value::as_str)
                .and_then(parse_border_style)
                .unwrap_or(BorderStyle::Thin),
            color: obj.get("color").and_then(parse_color),
        },
        _ => return None,
    };
    if edge.style == BorderStyle::None {
        return Some(None);
    }
    Some(Some(edge))
}
