//! Render-side cache of resolved cell formatting.
//!
//! Lookups go per-cell LRU first, then (on a miss) read the cell's layer tuple
//! from the [`StyleSource`]. Tuples with a single non-cell layer resolve through
//! a fast-path memo; everything else goes through the composite memo and lands
//! in the per-cell LRU. Both memos are keyed by style ids, which never change
//! meaning because the style table is append-only, so only the per-cell entries
//! need invalidating when the document changes.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use formula_model::{
    resolve_style, CellKey, CellRef, CellStyleLayers, Range, ResolvedStyle, StyleLayer, StyleTable,
};
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::config::FormatCacheConfig;
use crate::delta::Delta;
use crate::events::ChangeEvent;

/// Read access to a document's formatting state.
pub trait StyleSource {
    fn style_table(&self) -> &StyleTable;
    fn style_layers(&self, sheet_id: &str, cell: CellRef) -> CellStyleLayers;
}

/// Visible grid shape: `rows x cols` data cells preceded by header rows/cols.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridGeometry {
    pub rows: u32,
    pub cols: u32,
    #[serde(default)]
    pub header_rows: u32,
    #[serde(default)]
    pub header_cols: u32,
}

impl GridGeometry {
    pub const fn new(rows: u32, cols: u32, header_rows: u32, header_cols: u32) -> Self {
        Self {
            rows,
            cols,
            header_rows,
            header_cols,
        }
    }

    /// Document range shown by the grid, `None` for an empty grid.
    pub fn data_range(&self) -> Option<Range> {
        if self.rows == 0 || self.cols == 0 {
            return None;
        }
        Some(Range::from_bounds(0, 0, self.rows - 1, self.cols - 1))
    }

    /// Grid coordinates (header offset applied, end exclusive) of `range`,
    /// clipped to the visible data area.
    pub fn to_grid_range(&self, range: &Range) -> Option<GridRange> {
        let visible = self.data_range()?.intersection(range)?;
        Some(GridRange {
            start_row: visible.start.row + self.header_rows,
            end_row: visible.end.row + 1 + self.header_rows,
            start_col: visible.start.col + self.header_cols,
            end_col: visible.end.col + 1 + self.header_cols,
        })
    }
}

/// Half-open rectangle in grid coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    pub start_row: u32,
    pub end_row: u32,
    pub start_col: u32,
    pub end_col: u32,
}

/// What a renderer must repaint after an invalidation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CacheInvalidation {
    Cells { range: GridRange },
    InvalidateAll,
}

/// Invalidation strategy picked by region size.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InvalidationTier {
    /// Pop each covered key.
    DirectEvict,
    /// Walk the cached keys and pop those inside the region.
    ScanEvict,
    /// Drop every per-sheet cache.
    InvalidateAll,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FormatCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub fast_path_hits: u64,
    pub evictions: u64,
    pub full_invalidations: u64,
}

#[derive(Debug)]
pub struct FormatResolutionCache {
    config: FormatCacheConfig,
    sheets: HashMap<String, LruCache<CellKey, ResolvedStyle>>,
    composite: HashMap<CellStyleLayers, ResolvedStyle>,
    single_layer: HashMap<(StyleLayer, u32), ResolvedStyle>,
    stats: FormatCacheStats,
}

impl Default for FormatResolutionCache {
    fn default() -> Self {
        Self::new(FormatCacheConfig::default())
    }
}

impl FormatResolutionCache {
    pub fn new(config: FormatCacheConfig) -> Self {
        Self {
            config: config.sanitized(),
            sheets: HashMap::new(),
            composite: HashMap::new(),
            single_layer: HashMap::new(),
            stats: FormatCacheStats::default(),
        }
    }

    pub fn config(&self) -> FormatCacheConfig {
        self.config
    }

    pub fn stats(&self) -> FormatCacheStats {
        self.stats
    }

    fn capacity(&self) -> NonZeroUsize {
        let cap = usize::try_from(self.config.sheet_cache_max_size).unwrap_or(usize::MAX);
        NonZeroUsize::new(cap).unwrap_or(NonZeroUsize::MIN)
    }

    /// Effective formatting of `cell`.
    pub fn resolve<S: StyleSource + ?Sized>(
        &mut self,
        source: &S,
        sheet_id: &str,
        cell: CellRef,
    ) -> ResolvedStyle {
        let key = CellKey::from_ref(cell);
        if let Some(key) = key {
            if let Some(hit) = self.sheets.get_mut(sheet_id).and_then(|lru| lru.get(&key)) {
                self.stats.hits = self.stats.hits.saturating_add(1);
                return hit.clone();
            }
        }
        self.stats.misses = self.stats.misses.saturating_add(1);

        let layers = source.style_layers(sheet_id, cell);
        if layers.is_default() {
            return ResolvedStyle::default();
        }
        let table = source.style_table();

        if let Some((layer, id)) = layers.single_layer().filter(|(layer, _)| *layer != StyleLayer::Cell) {
            self.stats.fast_path_hits = self.stats.fast_path_hits.saturating_add(1);
            return self
                .single_layer
                .entry((layer, id))
                .or_insert_with(|| resolve_style(table, layers))
                .clone();
        }

        let resolved = self
            .composite
            .entry(layers)
            .or_insert_with(|| resolve_style(table, layers))
            .clone();
        if let Some(key) = key {
            let capacity = self.capacity();
            self.sheets
                .entry(sheet_id.to_string())
                .or_insert_with(|| LruCache::new(capacity))
                .put(key, resolved.clone());
        }
        resolved
    }

    pub fn tier_for(&self, region: &Range, grid: &GridGeometry) -> InvalidationTier {
        let cells = region.cell_count();
        let covers_grid = grid
            .data_range()
            .is_some_and(|visible| region.contains_range(&visible));
        if cells >= self.config.sheet_cache_max_size || covers_grid {
            InvalidationTier::InvalidateAll
        } else if cells < self.config.direct_evict_cutoff {
            InvalidationTier::DirectEvict
        } else {
            InvalidationTier::ScanEvict
        }
    }

    /// Evict cached entries for `region` and describe what must be repainted.
    ///
    /// Returns `None` when the region lies outside the visible grid.
    pub fn invalidate_region(
        &mut self,
        sheet_id: &str,
        region: &Range,
        grid: &GridGeometry,
    ) -> Option<CacheInvalidation> {
        match self.tier_for(region, grid) {
            InvalidationTier::InvalidateAll => {
                self.invalidate_all();
                return Some(CacheInvalidation::InvalidateAll);
            }
            InvalidationTier::DirectEvict => {
                if let Some(lru) = self.sheets.get_mut(sheet_id) {
                    let mut evicted = 0u64;
                    for cell in region.cells() {
                        if let Some(key) = CellKey::from_ref(cell) {
                            evicted += u64::from(lru.pop(&key).is_some());
                        }
                    }
                    self.stats.evictions = self.stats.evictions.saturating_add(evicted);
                }
            }
            InvalidationTier::ScanEvict => {
                if let Some(lru) = self.sheets.get_mut(sheet_id) {
                    let doomed: Vec<CellKey> = lru
                        .iter()
                        .map(|(key, _)| *key)
                        .filter(|key| region.contains(key.to_ref()))
                        .collect();
                    for key in &doomed {
                        lru.pop(key);
                    }
                    self.stats.evictions = self.stats.evictions.saturating_add(doomed.len() as u64);
                }
            }
        }
        grid.to_grid_range(region)
            .map(|range| CacheInvalidation::Cells { range })
    }

    /// Invalidate everything a committed change touched.
    ///
    /// `grid` is the geometry of the sheet being rendered; ranges on other sheets
    /// still evict but produce no repaint notification.
    pub fn apply_change(
        &mut self,
        event: &ChangeEvent,
        rendered_sheet: &str,
        grid: &GridGeometry,
    ) -> Vec<CacheInvalidation> {
        for delta in &event.deltas {
            if let Delta::Sheets { before, after } = delta {
                for gone in before
                    .sheets
                    .iter()
                    .filter(|sheet| !after.sheets.iter().any(|s| s.id == sheet.id))
                {
                    self.drop_sheet(&gone.id);
                }
            }
        }

        let mut out = Vec::new();
        for range in &event.ranges {
            match self.invalidate_region(&range.sheet_id, &range.range, grid) {
                Some(CacheInvalidation::InvalidateAll) => {
                    return vec![CacheInvalidation::InvalidateAll];
                }
                Some(cells) if range.sheet_id == rendered_sheet => {
                    if !out.contains(&cells) {
                        out.push(cells);
                    }
                }
                _ => {}
            }
        }
        out
    }

    /// Drop every per-sheet cache. Id-keyed memos stay valid.
    pub fn invalidate_all(&mut self) {
        self.sheets.clear();
        self.stats.full_invalidations = self.stats.full_invalidations.saturating_add(1);
        log::debug!("format cache: invalidate all");
    }

    pub fn drop_sheet(&mut self, sheet_id: &str) {
        self.sheets.remove(sheet_id);
    }

    /// Forget everything, memos included (e.g. when switching documents).
    pub fn reset(&mut self) {
        self.sheets.clear();
        self.composite.clear();
        self.single_layer.clear();
    }

    pub fn cached_cells(&self, sheet_id: &str) -> usize {
        self.sheets.get(sheet_id).map_or(0, LruCache::len)
    }

    pub fn is_cached(&self, sheet_id: &str, cell: CellRef) -> bool {
        match (self.sheets.get(sheet_id), CellKey::from_ref(cell)) {
            (Some(lru), Some(key)) => lru.contains(&key),
            _ => false,
        }
    }
}
