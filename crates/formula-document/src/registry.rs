use std::collections::BTreeSet;

use formula_model::{
    sheet_name_eq_case_insensitive, validate_sheet_name, SheetMeta, SheetNameError,
    SheetVisibility, TabColor, EXCEL_MAX_SHEET_NAME_LEN,
};
use serde::{Deserialize, Serialize};

use crate::error::SheetError;

/// Where a new sheet lands in the tab order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum InsertPosition {
    #[default]
    End,
    /// Absolute index in the full sheet list (clamped to the end).
    Index(usize),
    /// Right after the given sheet; appends when the id is unknown.
    After(String),
}

/// Destination of a sheet move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveTarget {
    Before(String),
    After(String),
    /// After the last visible sheet, leaving trailing hidden sheets behind it.
    EndOfVisible,
    /// Final absolute index in the full (visible + hidden) order.
    Index(usize),
    /// Final position among visible sheets, as a tab strip would express it.
    VisibleIndex(usize),
}

/// The registry state captured by undo: sheet list and tombstones.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    pub sheets: Vec<SheetMeta>,
    #[serde(default)]
    pub deleted: BTreeSet<String>,
}

/// Ordered list of sheets plus the ids of sheets that have been deleted.
///
/// Deleted ids are never reused and never recreated lazily; operations on them
/// are no-ops reported as [`SheetError::SheetDeleted`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SheetRegistry {
    sheets: Vec<SheetMeta>,
    deleted: BTreeSet<String>,
}

impl SheetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            sheets: self.sheets.clone(),
            deleted: self.deleted.clone(),
        }
    }

    /// Replays one side of a recorded registry change. `target` wins for every
    /// sheet either side mentions; live sheets neither side knows about (created
    /// outside history since) keep their place after their current predecessor.
    pub(crate) fn replay(&mut self, target: &RegistrySnapshot, counterpart: &RegistrySnapshot) {
        let known = |id: &str| {
            target.sheets.iter().any(|sheet| sheet.id == id)
                || counterpart.sheets.iter().any(|sheet| sheet.id == id)
        };
        let mut sheets = target.sheets.clone();
        for (index, sheet) in self.sheets.iter().enumerate() {
            if known(&sheet.id) {
                continue;
            }
            let at = self.sheets[..index]
                .iter()
                .rev()
                .find_map(|prev| sheets.iter().position(|s| s.id == prev.id))
                .map_or(0, |pos| pos + 1);
            sheets.insert(at, sheet.clone());
        }
        let mut deleted = target.deleted.clone();
        deleted.extend(self.deleted.difference(&counterpart.deleted).cloned());
        self.sheets = sheets;
        self.deleted = deleted;
        self.renumber();
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn is_deleted(&self, id: &str) -> bool {
        self.deleted.contains(id)
    }

    pub fn sheet(&self, id: &str) -> Option<&SheetMeta> {
        self.sheets.iter().find(|sheet| sheet.id == id)
    }

    pub fn sheets(&self) -> &[SheetMeta] {
        &self.sheets
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.sheets.iter().position(|sheet| sheet.id == id)
    }

    pub fn sheet_ids(&self) -> Vec<String> {
        self.sheets.iter().map(|sheet| sheet.id.clone()).collect()
    }

    pub fn visible_sheet_ids(&self) -> Vec<String> {
        self.sheets
            .iter()
            .filter(|sheet| sheet.is_visible())
            .map(|sheet| sheet.id.clone())
            .collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&SheetMeta> {
        self.sheets
            .iter()
            .find(|sheet| sheet_name_eq_case_insensitive(&sheet.name, name))
    }

    fn ensure_live(&self, id: &str) -> Result<usize, SheetError> {
        if self.is_deleted(id) {
            return Err(SheetError::SheetDeleted(id.to_string()));
        }
        self.position(id)
            .ok_or_else(|| SheetError::UnknownSheet(id.to_string()))
    }

    fn id_taken(&self, candidate: &str) -> bool {
        self.sheets
            .iter()
            .any(|sheet| sheet.id.eq_ignore_ascii_case(candidate))
            || self
                .deleted
                .iter()
                .any(|id| id.eq_ignore_ascii_case(candidate))
    }

    /// `base`, or `base-2`, `base-3`, ... avoiding live and deleted ids.
    pub(crate) fn unique_id_for(&self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut counter = 1usize;
        while self.id_taken(&candidate) {
            counter += 1;
            candidate = format!("{base}-{counter}");
        }
        candidate
    }

    /// A valid name not used by any live sheet, derived from `base` when possible.
    pub(crate) fn unique_name_for(&self, base: &str) -> String {
        let base = base.trim();
        let base = if validate_sheet_name(base).is_ok() {
            base.to_string()
        } else {
            format!("Sheet{}", self.sheets.len() + 1)
        };
        if self.name_available(&base) {
            return base;
        }
        // At most `len` suffixes can collide with live names.
        for counter in 2..=self.sheets.len() + 2 {
            let suffix = format!(" ({counter})");
            let budget = EXCEL_MAX_SHEET_NAME_LEN.saturating_sub(suffix.encode_utf16().count());
            let candidate = format!("{}{suffix}", truncate_utf16(&base, budget).trim_end());
            if self.name_available(&candidate) {
                return candidate;
            }
        }
        let mut n = self.sheets.len() + 1;
        loop {
            let candidate = format!("Sheet{n}");
            if self.name_available(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn name_available(&self, name: &str) -> bool {
        validate_sheet_name(name).is_ok() && self.find_by_name(name).is_none()
    }

    fn check_new_name(&self, name: &str, except_id: Option<&str>) -> Result<(), SheetError> {
        validate_sheet_name(name)?;
        let clash = self.sheets.iter().any(|sheet| {
            Some(sheet.id.as_str()) != except_id && sheet_name_eq_case_insensitive(&sheet.name, name)
        });
        if clash {
            return Err(SheetNameError::DuplicateName.into());
        }
        Ok(())
    }

    /// Create a sheet; returns its generated id.
    pub fn add(&mut self, name: &str, position: &InsertPosition) -> Result<String, SheetError> {
        let name = name.trim();
        self.check_new_name(name, None)?;
        let id = self.unique_id_for(name);
        let index = match position {
            InsertPosition::End => self.sheets.len(),
            InsertPosition::Index(index) => (*index).min(self.sheets.len()),
            InsertPosition::After(after) => self
                .position(after)
                .map_or(self.sheets.len(), |idx| idx + 1),
        };
        self.sheets.insert(index, SheetMeta::new(id.clone(), name));
        self.renumber();
        Ok(id)
    }

    /// Append a sheet for a first-referenced id (name derived from the id).
    pub(crate) fn create_lazily(&mut self, id: &str) {
        let name = self.unique_name_for(id);
        self.sheets.push(SheetMeta::new(id, name));
        self.renumber();
    }

    /// Whether `remove(id)` would succeed, without touching the registry.
    pub fn check_removable(&self, id: &str) -> Result<usize, SheetError> {
        let index = self.ensure_live(id)?;
        if self.sheets.len() == 1 {
            return Err(SheetError::CannotDeleteLastSheet);
        }
        if self.sheets[index].is_visible() && self.visible_count() == 1 {
            return Err(SheetError::CannotDeleteLastVisibleSheet);
        }
        Ok(index)
    }

    pub fn remove(&mut self, id: &str) -> Result<SheetMeta, SheetError> {
        let index = self.check_removable(id)?;
        let removed = self.sheets.remove(index);
        self.deleted.insert(removed.id.clone());
        self.renumber();
        Ok(removed)
    }

    pub fn rename(&mut self, id: &str, name: &str) -> Result<(), SheetError> {
        let index = self.ensure_live(id)?;
        let name = name.trim();
        if self.sheets[index].name == name {
            return Ok(());
        }
        self.check_new_name(name, Some(id))?;
        self.sheets[index].name = name.to_string();
        Ok(())
    }

    pub fn set_visibility(&mut self, id: &str, visibility: SheetVisibility) -> Result<(), SheetError> {
        let index = self.ensure_live(id)?;
        let sheet = &self.sheets[index];
        if sheet.visibility == visibility {
            return Ok(());
        }
        if sheet.is_visible() && visibility != SheetVisibility::Visible && self.visible_count() == 1 {
            return Err(SheetError::CannotHideLastVisibleSheet);
        }
        self.sheets[index].visibility = visibility;
        Ok(())
    }

    pub fn set_tab_color(&mut self, id: &str, color: Option<TabColor>) -> Result<(), SheetError> {
        let index = self.ensure_live(id)?;
        self.sheets[index].tab_color = color;
        Ok(())
    }

    pub fn move_sheet(&mut self, id: &str, target: &MoveTarget) -> Result<(), SheetError> {
        let from = self.ensure_live(id)?;
        let sheet_count = self.sheets.len();
        let mut rest = self.sheets.clone();
        let moving = rest.remove(from);

        let to = match target {
            MoveTarget::Index(to_index) => {
                if *to_index >= sheet_count {
                    return Err(SheetError::InvalidSheetIndex {
                        to_index: *to_index,
                        sheet_count,
                    });
                }
                *to_index
            }
            MoveTarget::Before(anchor) | MoveTarget::After(anchor) => {
                if anchor == id {
                    return Ok(());
                }
                let anchor_index = rest
                    .iter()
                    .position(|sheet| &sheet.id == anchor)
                    .ok_or_else(|| SheetError::UnknownSheet(anchor.clone()))?;
                match target {
                    MoveTarget::After(_) => anchor_index + 1,
                    _ => anchor_index,
                }
            }
            MoveTarget::EndOfVisible => end_of_visible(&rest),
            MoveTarget::VisibleIndex(visible_index) => rest
                .iter()
                .enumerate()
                .filter(|(_, sheet)| sheet.is_visible())
                .nth(*visible_index)
                .map_or_else(|| end_of_visible(&rest), |(idx, _)| idx),
        };

        if to == from {
            return Ok(());
        }
        rest.insert(to, moving);
        self.sheets = rest;
        self.renumber();
        Ok(())
    }

    fn visible_count(&self) -> usize {
        self.sheets.iter().filter(|sheet| sheet.is_visible()).count()
    }

    fn renumber(&mut self) {
        for (order, sheet) in self.sheets.iter_mut().enumerate() {
            sheet.order = order;
        }
    }
}

/// Longest prefix of `text` that fits in `max_units` UTF-16 code units.
fn truncate_utf16(text: &str, max_units: usize) -> &str {
    let mut units = 0;
    for (idx, ch) in text.char_indices() {
        units += ch.len_utf16();
        if units > max_units {
            return &text[..idx];
        }
    }
    text
}

fn end_of_visible(sheets: &[SheetMeta]) -> usize {
    sheets
        .iter()
        .rposition(SheetMeta::is_visible)
        .map_or(0, |idx| idx + 1)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn registry(names: &[&str]) -> SheetRegistry {
        let mut registry = SheetRegistry::new();
        for name in names {
            registry.add(name, &InsertPosition::End).unwrap();
        }
        registry
    }

    #[test]
    fn ids_are_derived_from_names_and_never_reused() {
        let mut registry = registry(&["Data", "Other"]);
        registry.remove("Data").unwrap();
        let id = registry.add("data", &InsertPosition::End).unwrap();
        assert_eq!(id, "data-2");
        assert_eq!(registry.sheet(&id).unwrap().order, 1);
    }

    #[test]
    fn insert_after_unknown_id_appends() {
        let mut registry = registry(&["A", "B"]);
        registry
            .add("C", &InsertPosition::After("missing".into()))
            .unwrap();
        registry.add("D", &InsertPosition::After("A".into())).unwrap();
        assert_eq!(registry.sheet_ids(), vec!["A", "D", "B", "C"]);
    }

    #[test]
    fn duplicate_names_compare_case_insensitively() {
        let mut registry = registry(&["Budget"]);
        assert_eq!(
            registry.add("BUDGET", &InsertPosition::End),
            Err(SheetError::InvalidName(SheetNameError::DuplicateName))
        );
        registry.add("Other", &InsertPosition::End).unwrap();
        assert_eq!(
            registry.rename("Other", "budget"),
            Err(SheetError::InvalidName(SheetNameError::DuplicateName))
        );
        // Case-only rename of the same sheet is allowed.
        registry.rename("Budget", "BUDGET").unwrap();
        assert_eq!(registry.sheet("Budget").unwrap().name, "BUDGET");
    }

    #[test]
    fn end_of_visible_keeps_trailing_hidden_sheets_last() {
        let mut registry = registry(&["A", "B", "C", "H"]);
        registry.set_visibility("H", SheetVisibility::Hidden).unwrap();
        registry.move_sheet("A", &MoveTarget::EndOfVisible).unwrap();
        assert_eq!(registry.sheet_ids(), vec!["B", "C", "A", "H"]);
        assert_eq!(registry.visible_sheet_ids(), vec!["B", "C", "A"]);
    }

    #[test]
    fn visible_index_skips_hidden_sheets() {
        let mut registry = registry(&["A", "H", "B", "C"]);
        registry.set_visibility("H", SheetVisibility::Hidden).unwrap();
        registry.move_sheet("C", &MoveTarget::VisibleIndex(1)).unwrap();
        assert_eq!(registry.sheet_ids(), vec!["A", "H", "C", "B"]);
    }

    #[test]
    fn move_to_out_of_range_index_is_rejected() {
        let mut registry = registry(&["A", "B"]);
        assert_eq!(
            registry.move_sheet("A", &MoveTarget::Index(2)),
            Err(SheetError::InvalidSheetIndex {
                to_index: 2,
                sheet_count: 2
            })
        );
        registry.move_sheet("A", &MoveTarget::Index(1)).unwrap();
        assert_eq!(registry.sheet_ids(), vec!["B", "A"]);
    }

    #[test]
    fn last_visible_sheet_cannot_be_hidden_or_deleted() {
        let mut registry = registry(&["A", "B"]);
        registry.set_visibility("B", SheetVisibility::Hidden).unwrap();
        assert_eq!(
            registry.set_visibility("A", SheetVisibility::VeryHidden),
            Err(SheetError::CannotHideLastVisibleSheet)
        );
        assert_eq!(registry.remove("A"), Err(SheetError::CannotDeleteLastVisibleSheet));
        registry.remove("B").unwrap();
        assert_eq!(registry.remove("A"), Err(SheetError::CannotDeleteLastSheet));
    }

    #[test]
    fn deleted_ids_report_sheet_deleted() {
        let mut registry = registry(&["A", "B"]);
        registry.remove("B").unwrap();
        assert_eq!(
            registry.rename("B", "X"),
            Err(SheetError::SheetDeleted("B".into()))
        );
        assert_eq!(
            registry.rename("nope", "X"),
            Err(SheetError::UnknownSheet("nope".into()))
        );
    }

    #[test]
    fn lazy_names_are_deduplicated_and_sanitized() {
        let mut registry = registry(&["Sheet2"]);
        registry.create_lazily("sheet2");
        registry.create_lazily("a/b");
        let names: Vec<_> = registry.sheets().iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["Sheet2", "sheet2 (2)", "Sheet3"]);
    }

    #[test]
    fn lazy_names_truncate_by_utf16_units() {
        // 15 astral chars plus one letter is 31 UTF-16 units.
        let wide = format!("{}a", "\u{1F600}".repeat(15));
        let mut registry = registry(&[wide.as_str()]);
        registry.create_lazily(&format!("{}A", "\u{1F600}".repeat(15)));
        let name = registry.sheets()[1].name.clone();
        assert!(validate_sheet_name(&name).is_ok());
        assert_eq!(name, format!("{} (2)", "\u{1F600}".repeat(13)));
    }

    #[test]
    fn unique_name_skips_taken_suffixes() {
        let registry = registry(&["X", "X (2)", "X (3)", "X (4)"]);
        assert_eq!(registry.unique_name_for("x"), "x (5)");
    }

    #[test]
    fn check_removable_leaves_registry_untouched() {
        let registry = registry(&["A", "B"]);
        assert_eq!(registry.check_removable("B"), Ok(1));
        assert_eq!(registry.sheet_ids(), vec!["A", "B"]);
        assert!(registry.deleted.is_empty());
        assert_eq!(
            registry.check_removable("nope"),
            Err(SheetError::UnknownSheet("nope".into()))
        );
    }

    #[test]
    fn replay_keeps_sheets_created_outside_the_recorded_change() {
        let mut registry = registry(&["A", "B"]);
        let before = registry.snapshot();
        registry.rename("A", "Main").unwrap();
        let after = registry.snapshot();
        registry.create_lazily("Remote");

        registry.replay(&before, &after);
        assert_eq!(registry.sheet_ids(), vec!["A", "B", "Remote"]);
        assert_eq!(registry.sheet("A").unwrap().name, "A");
        assert_eq!(registry.sheet("Remote").unwrap().order, 2);

        registry.replay(&after, &before);
        assert_eq!(registry.sheet("A").unwrap().name, "Main");
        assert_eq!(registry.sheet_ids(), vec!["A", "B", "Remote"]);
    }
}
