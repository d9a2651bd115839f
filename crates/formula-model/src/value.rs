use std::fmt;

use serde::{Deserialize, Serialize};

/// JSON-friendly representation of a cell value.
///
/// The enum uses an explicit `{type, value}` tagged layout for stable IPC.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    /// Empty / unset cell value.
    #[default]
    Empty,
    Number(f64),
    String(String),
    Boolean(bool),
    /// Error literal such as `#DIV/0!`, stored as its display text.
    Error(String),
    /// In-cell picture.
    Image(ImageValue),
}

impl CellValue {
    /// Returns true if the value is [`CellValue::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Blank for ordering purposes: empty, the empty string, or a payload with no
    /// extractable text (e.g. an image without alt text).
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.is_empty(),
            CellValue::Image(image) => image.text().is_none(),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::String(s) => f.write_str(s),
            CellValue::Boolean(true) => f.write_str("TRUE"),
            CellValue::Boolean(false) => f.write_str("FALSE"),
            CellValue::Error(e) => f.write_str(e),
            CellValue::Image(image) => f.write_str(image.text().unwrap_or_default()),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<ImageValue> for CellValue {
    fn from(value: ImageValue) -> Self {
        CellValue::Image(value)
    }
}

/// Reference to an image stored outside the cell grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageValue {
    pub image_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

impl ImageValue {
    pub fn new(image_id: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            alt_text: None,
        }
    }

    /// Alt text, when present and non-blank.
    pub fn text(&self) -> Option<&str> {
        self.alt_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_detection_covers_non_scalar_payloads() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::from("").is_blank());
        assert!(CellValue::from(ImageValue::new("img-1")).is_blank());

        let captioned = ImageValue {
            alt_text: Some("logo".to_string()),
            ..ImageValue::new("img-2")
        };
        assert!(!CellValue::from(captioned).is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
        assert!(!CellValue::Boolean(false).is_blank());
    }

    #[test]
    fn serde_layout_is_tagged() {
        let v = serde_json::to_value(CellValue::Number(1.5)).unwrap();
        assert_eq!(v, serde_json::json!({ "type": "number", "value": 1.5 }));

        let v = serde_json::to_value(CellValue::Empty).unwrap();
        assert_eq!(v, serde_json::json!({ "type": "empty" }));
    }
}
