use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid document config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Engine limits.
///
/// Loadable from JSON with camelCase keys; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentConfig {
    /// Largest selection (in cells) a sort may reorder (default: 1,000,000).
    pub max_sort_cells: u64,
    /// Largest cell-level range a single format call may touch (default: 1,000,000).
    ///
    /// Full-row / full-column / full-sheet formatting goes to the layer styles and
    /// is not counted per cell.
    pub max_range_format_cells: u64,
    /// Oldest undo units are dropped past this depth (default: unbounded).
    pub max_undo_depth: Option<usize>,
    pub format_cache: FormatCacheConfig,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_sort_cells: 1_000_000,
            max_range_format_cells: 1_000_000,
            max_undo_depth: None,
            format_cache: FormatCacheConfig::default(),
        }
    }
}

impl DocumentConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: DocumentConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    pub(crate) fn sanitized(mut self) -> Self {
        if self.max_undo_depth == Some(0) {
            self.max_undo_depth = None;
        }
        self.format_cache = self.format_cache.sanitized();
        self
    }
}

/// Format resolution cache sizing and invalidation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormatCacheConfig {
    /// Regions smaller than this (in cells) evict their exact keys (default: 1,024).
    pub direct_evict_cutoff: u64,
    /// Per-sheet cache capacity; regions at or above it drop every cache (default: 50,000).
    pub sheet_cache_max_size: u64,
}

impl Default for FormatCacheConfig {
    fn default() -> Self {
        Self {
            direct_evict_cutoff: 1_024,
            sheet_cache_max_size: 50_000,
        }
    }
}

impl FormatCacheConfig {
    pub fn new(direct_evict_cutoff: u64, sheet_cache_max_size: u64) -> Self {
        Self {
            direct_evict_cutoff,
            sheet_cache_max_size,
        }
        .sanitized()
    }

    pub(crate) fn sanitized(mut self) -> Self {
        self.sheet_cache_max_size = self.sheet_cache_max_size.max(1);
        self.direct_evict_cutoff = self.direct_evict_cutoff.min(self.sheet_cache_max_size);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            DocumentConfig::from_json_str(r#"{ "maxSortCells": 10, "formatCache": { "sheetCacheMaxSize": 200000 } }"#)
                .unwrap();
        assert_eq!(config.max_sort_cells, 10);
        assert_eq!(config.max_range_format_cells, 1_000_000);
        assert_eq!(config.format_cache.sheet_cache_max_size, 200_000);
        assert_eq!(config.format_cache.direct_evict_cutoff, 1_024);
    }

    #[test]
    fn nonsensical_values_are_clamped() {
        let cache = FormatCacheConfig::new(500, 0);
        assert_eq!(cache.sheet_cache_max_size, 1);
        assert_eq!(cache.direct_evict_cutoff, 1);

        let config = DocumentConfig::from_json_str(r#"{ "maxUndoDepth": 0 }"#).unwrap();
        assert_eq!(config.max_undo_depth, None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            DocumentConfig::from_json_str("{ nope"),
            Err(ConfigError::Json(_))
        ));
    }
}
