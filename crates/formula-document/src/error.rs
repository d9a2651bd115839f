use formula_model::SheetNameError;
use serde::ser::SerializeStruct as _;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Errors raised by sheet registry operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SheetError {
    #[error("cannot delete the last remaining sheet")]
    CannotDeleteLastSheet,
    #[error("cannot delete the last visible sheet")]
    CannotDeleteLastVisibleSheet,
    #[error("cannot hide the last visible sheet")]
    CannotHideLastVisibleSheet,
    #[error("unknown sheet id: {0}")]
    UnknownSheet(String),
    #[error("sheet {0} has been deleted")]
    SheetDeleted(String),
    #[error("invalid sheet index {to_index} (sheet count {sheet_count})")]
    InvalidSheetIndex { to_index: usize, sheet_count: usize },
    #[error(transparent)]
    InvalidName(#[from] SheetNameError),
}

/// Why a bulk mutation was refused. A rejected operation touches neither the
/// document nor the undo/redo stacks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    #[error("operation covers {cells} cells (limit {limit})")]
    TooLarge { cells: u64, limit: u64 },
    #[error("sheet has been deleted")]
    SheetDeleted,
    #[error("target lies outside the sheet grid")]
    OutOfBounds,
}

impl RejectReason {
    fn tag(self) -> &'static str {
        match self {
            RejectReason::TooLarge { .. } => "tooLarge",
            RejectReason::SheetDeleted => "sheetDeleted",
            RejectReason::OutOfBounds => "outOfBounds",
        }
    }
}

/// Structured result of a size-limited or sheet-scoped mutation.
///
/// Serializes as `{ "applied": true }` or `{ "applied": false, "reason": "tooLarge" }`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum ApplyOutcome {
    Applied,
    Rejected(RejectReason),
}

impl ApplyOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }

    pub fn reason(self) -> Option<RejectReason> {
        match self {
            ApplyOutcome::Applied => None,
            ApplyOutcome::Rejected(reason) => Some(reason),
        }
    }

    pub(crate) fn too_large(cells: u64, limit: u64) -> Self {
        ApplyOutcome::Rejected(RejectReason::TooLarge { cells, limit })
    }
}

impl Serialize for ApplyOutcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ApplyOutcome::Applied => {
                let mut s = serializer.serialize_struct("ApplyOutcome", 1)?;
                s.serialize_field("applied", &true)?;
                s.end()
            }
            ApplyOutcome::Rejected(reason) => {
                let mut s = serializer.serialize_struct("ApplyOutcome", 2)?;
                s.serialize_field("applied", &false)?;
                s.serialize_field("reason", reason.tag())?;
                s.end()
            }
        }
    }
}
