use core::fmt;
use std::collections::HashMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An ARGB color.
///
/// Serialized as a `#AARRGGBB` hex string for IPC friendliness.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub argb: u32,
}

impl Color {
    pub const fn new_argb(argb: u32) -> Self {
        Self { argb }
    }

    pub const fn black() -> Self {
        Self { argb: 0xFF000000 }
    }

    pub const fn white() -> Self {
        Self { argb: 0xFFFFFFFF }
    }

    /// Parse a color permissively.
    ///
    /// Accepts `#RGB`, `#RRGGBB`, `#AARRGGBB` (the `#` is optional for the six and
    /// eight digit forms), `rgb(r, g, b)` and `rgba(r, g, b, a)` with `a` either in
    /// `0..=1` or `0..=255`. Anything else is `None`.
    pub fn parse(input: &str) -> Option<Color> {
        let s = input.trim();
        if let Some(args) = strip_fn(s, "rgba").or_else(|| strip_fn(s, "rgb")) {
            return parse_rgb_fn(args);
        }

        let (hex, had_hash) = match s.strip_prefix('#') {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            3 if had_hash => {
                let mut expanded = String::with_capacity(6);
                for ch in hex.chars() {
                    expanded.push(ch);
                    expanded.push(ch);
                }
                let rgb = u32::from_str_radix(&expanded, 16).ok()?;
                Some(Color::new_argb(0xFF00_0000 | rgb))
            }
            6 => {
                let rgb = u32::from_str_radix(hex, 16).ok()?;
                Some(Color::new_argb(0xFF00_0000 | rgb))
            }
            8 => u32::from_str_radix(hex, 16).ok().map(Color::new_argb),
            _ => None,
        }
    }

    fn to_hex(self) -> String {
        format!("#{:08X}", self.argb)
    }
}

fn strip_fn<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    let lower = s.get(..name.len())?;
    if !lower.eq_ignore_ascii_case(name) {
        return None;
    }
    s[name.len()..]
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn parse_rgb_fn(args: &str) -> Option<Color> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |p: &str| p.parse::<u8>().ok();
    let (r, g, b) = (channel(parts[0])?, channel(parts[1])?, channel(parts[2])?);
    let a = match parts.get(3) {
        None => 255,
        Some(p) => {
            let v: f64 = p.parse().ok()?;
            if !(0.0..=255.0).contains(&v) {
                return None;
            }
            if v <= 1.0 {
                (v * 255.0).round() as u8
            } else {
                v.round() as u8
            }
        }
    };
    Some(Color::new_argb(
        (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32,
    ))
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Color::parse(&s).ok_or_else(|| D::Error::custom(format!("invalid color `{s}`")))
    }
}

/// Border line style (subset).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BorderStyle {
    #[default]
    None,
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HorizontalAlignment {
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VerticalAlignment {
    Top,
    Center,
    Bottom,
}

/// One border edge.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BorderEdge {
    #[serde(default)]
    pub style: BorderStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

// Every property below is a patch slot with presence semantics:
// - `None`: not specified by this record (no override)
// - `Some(None)` / `Some(false)`: explicit clear
// - `Some(Some(v))` / `Some(true)`: set

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FontStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Option<String>>,
    /// Font size in 1/100 points (e.g. 1100 = 11pt).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_100pt: Option<Option<u16>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strike: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Option<Color>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Option<Color>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Border {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<Option<BorderEdge>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Option<BorderEdge>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<Option<BorderEdge>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<Option<BorderEdge>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alignment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<Option<HorizontalAlignment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical: Option<Option<VerticalAlignment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap_text: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indent: Option<Option<u8>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Protection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
}

/// A style record: an immutable formatting patch stored in the [`StyleTable`].
///
/// Serializes to the nested camelCase shape; deserialization accepts both the
/// nested shape and legacy flat keys (see `style_normalize`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    #[serde(skip_serializing_if = "FontStyle::is_unset")]
    pub font: FontStyle,
    #[serde(skip_serializing_if = "FillStyle::is_unset")]
    pub fill: FillStyle,
    #[serde(skip_serializing_if = "Border::is_unset")]
    pub border: Border,
    #[serde(skip_serializing_if = "Alignment::is_unset")]
    pub alignment: Alignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_format: Option<Option<String>>,
    #[serde(skip_serializing_if = "Protection::is_unset")]
    pub protection: Protection,
}

fn overlay<T: Clone>(base: &mut Option<T>, patch: &Option<T>) {
    if patch.is_some() {
        base.clone_from(patch);
    }
}

impl FontStyle {
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }

    fn overlay(&mut self, patch: &FontStyle) {
        overlay(&mut self.name, &patch.name);
        overlay(&mut self.size_100pt, &patch.size_100pt);
        overlay(&mut self.bold, &patch.bold);
        overlay(&mut self.italic, &patch.italic);
        overlay(&mut self.underline, &patch.underline);
        overlay(&mut self.strike, &patch.strike);
        overlay(&mut self.color, &patch.color);
    }
}

impl FillStyle {
    pub fn is_unset(&self) -> bool {
        self.background_color.is_none()
    }
}

impl Border {
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }

    fn overlay(&mut self, patch: &Border) {
        overlay(&mut self.top, &patch.top);
        overlay(&mut self.right, &patch.right);
        overlay(&mut self.bottom, &patch.bottom);
        overlay(&mut self.left, &patch.left);
    }
}

impl Alignment {
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }

    fn overlay(&mut self, patch: &Alignment) {
        overlay(&mut self.horizontal, &patch.horizontal);
        overlay(&mut self.vertical, &patch.vertical);
        overlay(&mut self.wrap_text, &patch.wrap_text);
        overlay(&mut self.indent, &patch.indent);
    }
}

impl Protection {
    pub fn is_unset(&self) -> bool {
        self.locked.is_none()
    }
}

impl Style {
    /// True when the record specifies nothing (equivalent to style id `0`).
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay `patch` on top of `self`: properties the patch specifies (including
    /// explicit clears) replace ours, everything else is kept.
    pub fn merged_with(&self, patch: &Style) -> Style {
        let mut out = self.clone();
        out.font.overlay(&patch.font);
        overlay(&mut out.fill.background_color, &patch.fill.background_color);
        out.border.overlay(&patch.border);
        out.alignment.overlay(&patch.alignment);
        overlay(&mut out.number_format, &patch.number_format);
        overlay(&mut out.protection.locked, &patch.protection.locked);
        out
    }

    pub fn bold() -> Style {
        let mut style = Style::default();
        style.font.bold = Some(true);
        style
    }

    pub fn with_background(color: Color) -> Style {
        let mut style = Style::default();
        style.fill.background_color = Some(Some(color));
        style
    }

    pub fn with_number_format(format: impl Into<String>) -> Style {
        Style {
            number_format: Some(Some(format.into())),
            ..Default::default()
        }
    }
}

/// Append-only, deduplicated table of style records.
///
/// Cells, rows, columns and sheets store a `style_id` referencing this table.
/// Id `0` is always the empty record; ids are never reused or mutated in place.
#[derive(Clone, Debug, Serialize)]
pub struct StyleTable {
    styles: Vec<Style>,
    #[serde(skip)]
    index: HashMap<Style, u32>,
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleTable {
    pub fn new() -> Self {
        let mut table = Self {
            styles: vec![Style::default()],
            index: HashMap::new(),
        };
        table.rebuild_index();
        table
    }

    /// Insert (or reuse) a style, returning its id. Empty records map to `0`.
    pub fn intern(&mut self, style: Style) -> u32 {
        if style.is_empty() {
            return 0;
        }
        if let Some(id) = self.index.get(&style) {
            return *id;
        }
        let id = self.styles.len() as u32;
        self.styles.push(style.clone());
        self.index.insert(style, id);
        id
    }

    /// Get a style by id, if it exists.
    pub fn get(&self, style_id: u32) -> Option<&Style> {
        self.styles.get(style_id as usize)
    }

    /// Get a style by id, failing closed to the empty record for unknown ids.
    pub fn get_or_default(&self, style_id: u32) -> &Style {
        match self.styles.get(style_id as usize) {
            Some(style) => style,
            None => {
                log::warn!("unknown style id {style_id}; using the default style");
                &self.styles[0]
            }
        }
    }

    pub fn contains(&self, style_id: u32) -> bool {
        (style_id as usize) < self.styles.len()
    }

    /// Overlay `patch` on the record `base_id` and intern the result.
    pub fn apply_patch(&mut self, base_id: u32, patch: &Style) -> u32 {
        let merged = self.get_or_default(base_id).merged_with(patch);
        self.intern(merged)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        // Id 0 always exists.
        false
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, style) in self.styles.iter().enumerate() {
            self.index.entry(style.clone()).or_insert(i as u32);
        }
    }
}

impl<'de> Deserialize<'de> for StyleTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            #[serde(default)]
            styles: Vec<Style>,
        }

        let mut helper = Helper::deserialize(deserializer)?;
        if helper.styles.first().map_or(true, |s| !s.is_empty()) {
            helper.styles.insert(0, Style::default());
        }

        let mut table = StyleTable {
            styles: helper.styles,
            index: HashMap::new(),
        };
        table.rebuild_index();
        Ok(table)
    }
}
