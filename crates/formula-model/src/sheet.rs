use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization as _;

use crate::Color;

/// Maximum sheet name length in UTF-16 code units.
pub const EXCEL_MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN_SHEET_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Sheet visibility.
///
/// `VeryHidden` sheets are hidden from every UI listing, including "Unhide".
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SheetVisibility {
    #[default]
    Visible,
    Hidden,
    VeryHidden,
}

/// Sheet tab color.
///
/// Mirrors the SpreadsheetML `tabColor` shape: a tab may carry an explicit RGB
/// value, a theme slot (with optional tint), an indexed palette entry, or `auto`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabColor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgb: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
}

impl TabColor {
    pub fn rgb(color: Color) -> Self {
        Self {
            rgb: Some(color),
            ..Default::default()
        }
    }
}

/// Sheet metadata: `{ id, name, visibility, tab_color, order }`.
///
/// `order` is the sheet's absolute position in the full (visible + hidden) sheet
/// list and is kept in sync by the registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetMeta {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub visibility: SheetVisibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_color: Option<TabColor>,
    #[serde(default)]
    pub order: usize,
}

impl SheetMeta {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            visibility: SheetVisibility::Visible,
            tab_color: None,
            order: 0,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == SheetVisibility::Visible
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SheetNameError {
    #[error("sheet name cannot be empty")]
    EmptyName,
    #[error("sheet name cannot exceed {EXCEL_MAX_SHEET_NAME_LEN} characters")]
    TooLong,
    #[error("sheet name contains invalid character `{0}`")]
    InvalidCharacter(char),
    #[error("sheet name cannot begin or end with an apostrophe")]
    LeadingOrTrailingApostrophe,
    #[error("sheet name already exists")]
    DuplicateName,
}

/// Validate a sheet name against spreadsheet naming rules.
pub fn validate_sheet_name(name: &str) -> Result<(), SheetNameError> {
    if name.trim().is_empty() {
        return Err(SheetNameError::EmptyName);
    }
    if name.encode_utf16().count() > EXCEL_MAX_SHEET_NAME_LEN {
        return Err(SheetNameError::TooLong);
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_SHEET_NAME_CHARS.contains(c)) {
        return Err(SheetNameError::InvalidCharacter(ch));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(SheetNameError::LeadingOrTrailingApostrophe);
    }
    Ok(())
}

/// Sheet names compare case-insensitively across Unicode (NFKC + uppercase).
pub fn sheet_name_eq_case_insensitive(a: &str, b: &str) -> bool {
    a.nfkc()
        .flat_map(char::to_uppercase)
        .eq(b.nfkc().flat_map(char::to_uppercase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_names() {
        assert_eq!(validate_sheet_name("Data"), Ok(()));
        assert_eq!(validate_sheet_name("  "), Err(SheetNameError::EmptyName));
        assert_eq!(
            validate_sheet_name("Q1/Q2"),
            Err(SheetNameError::InvalidCharacter('/'))
        );
        assert_eq!(
            validate_sheet_name("'quoted"),
            Err(SheetNameError::LeadingOrTrailingApostrophe)
        );
        assert_eq!(
            validate_sheet_name(&"x".repeat(32)),
            Err(SheetNameError::TooLong)
        );
    }

    #[test]
    fn compares_unicode_case_insensitively() {
        assert!(sheet_name_eq_case_insensitive("Sheet1", "sHeEt1"));
        assert!(sheet_name_eq_case_insensitive("straße", "STRASSE"));
        assert!(sheet_name_eq_case_insensitive("Ａ", "A"));
        assert!(!sheet_name_eq_case_insensitive("Sheet1", "Sheet2"));
    }

    #[test]
    fn visibility_serializes_camel_case() {
        assert_eq!(
            serde_json::to_value(SheetVisibility::VeryHidden).unwrap(),
            serde_json::json!("veryHidden")
        );
    }
}
