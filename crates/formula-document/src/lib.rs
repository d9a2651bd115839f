//! Transactional in-memory spreadsheet document.
//!
//! [`DocumentController`] owns the sheets of one workbook and routes every write
//! through a mutation batch. Batches become undo units and change events;
//! [`FormatResolutionCache`] turns those events into render invalidations.

pub mod config;
pub mod controller;
pub mod delta;
pub mod error;
pub mod events;
pub mod format_cache;
pub mod history;
pub mod registry;
pub mod sort;
pub mod store;

pub use config::{ConfigError, DocumentConfig, FormatCacheConfig};
pub use controller::{
    DocumentController, ExternalDelta, ExternalDeltaOptions, MutationOptions, OutboundChange,
};
pub use delta::{Delta, DeltaKey};
pub use error::{ApplyOutcome, RejectReason, SheetError};
pub use events::{
    ChangeEvent, ChangeSource, DocumentEvent, EventKind, ListenerId, SheetRange, UpdateEvent,
};
pub use format_cache::{
    CacheInvalidation, FormatCacheStats, FormatResolutionCache, GridGeometry, GridRange,
    InvalidationTier, StyleSource,
};
pub use history::{StackDepths, UndoUnit};
pub use registry::{InsertPosition, MoveTarget, RegistrySnapshot, SheetRegistry};
pub use sort::{ComputedValues, SortKey, SortSpec};
pub use store::{Axis, FrozenPanes, SheetStore, SheetView};
