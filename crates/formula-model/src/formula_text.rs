//! Formula text policy.
//!
//! The document stores formulas as opaque text; it never parses or evaluates
//! them. The canonical stored form is trimmed and has **no** leading `'='`;
//! editors display it with one.

/// Normalize formula text into the stored form.
pub fn normalize_formula_text(s: &str) -> String {
    let trimmed = s.trim();
    trimmed
        .strip_prefix('=')
        .map(str::trim)
        .unwrap_or(trimmed)
        .to_string()
}

/// Display form: empty, or starting with a single `'='`.
pub fn display_formula_text(s: &str) -> String {
    match normalize_formula_text(s) {
        normalized if normalized.is_empty() => normalized,
        normalized => format!("={normalized}"),
    }
}
