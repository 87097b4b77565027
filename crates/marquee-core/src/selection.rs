#![forbid(unsafe_code)]

//! Multi-select toggle panel with side-effect diversion.
//!
//! Catalog items toggle in and out of the selection set, except items that
//! carry a side effect: activating one of those opens a modal showing its
//! payload and never touches the selection.
//!
//! # Invariants
//!
//! 1. A side-effect id is never a member of the selection.
//! 2. Toggling a normal id twice restores the previous selection.
//! 3. Toggling an id missing from the catalog changes nothing.
//! 4. [`ToggleSelectionModel::dismiss_side_effect`] is idempotent.
//! 5. Every selected id exists in the current catalog.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{ConfigError, Result};

/// Caption shown when nothing is selected.
pub const EMPTY_SUMMARY: &str = "Select a skill to explore.";

/// One selectable item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: String,
    pub label: String,
    pub has_side_effect: bool,
    /// Opaque reference handed to the host's viewer (a document URI, say).
    pub side_effect_payload: Option<String>,
}

impl CatalogEntry {
    /// A plain toggleable item.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            has_side_effect: false,
            side_effect_payload: None,
        }
    }

    /// An item that opens `payload` instead of being selected.
    pub fn with_side_effect(
        id: impl Into<String>,
        label: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            has_side_effect: true,
            side_effect_payload: Some(payload.into()),
        }
    }
}

/// Validated, ordered list of catalog entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Reject empty ids, duplicate ids, and side-effect entries without a
    /// payload.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if entry.id.is_empty() {
                return Err(ConfigError::EmptyId);
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(ConfigError::DuplicateId {
                    id: entry.id.clone(),
                });
            }
            if entry.has_side_effect && entry.side_effect_payload.is_none() {
                return Err(ConfigError::MissingPayload {
                    id: entry.id.clone(),
                });
            }
        }
        Ok(Self { entries })
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The skill grid of the portfolio page.
    #[must_use]
    pub fn skills() -> Self {
        Self {
            entries: vec![
                CatalogEntry::new("cpp", "C++"),
                CatalogEntry::with_side_effect("python", "Python", "/python-certificate.pdf"),
                CatalogEntry::new("react", "React"),
                CatalogEntry::new("node", "Node.js"),
                CatalogEntry::new("sql", "SQL"),
                CatalogEntry::new("git", "Git"),
                CatalogEntry::new("java", "Java"),
                CatalogEntry::new("design", "System"),
            ],
        }
    }
}

/// What a toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Selected,
    Deselected,
    SideEffectOpened,
    /// Id not in the catalog.
    Ignored,
}

/// Selection state for a toggle panel.
#[derive(Debug, Clone)]
pub struct ToggleSelectionModel {
    catalog: Catalog,
    /// Activation order, for captions. Membership is what matters.
    selected: Vec<String>,
    side_effect: Option<String>,
}

impl ToggleSelectionModel {
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            selected: Vec::new(),
            side_effect: None,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn toggle(&mut self, id: &str) -> ToggleOutcome {
        let Some(entry) = self.catalog.get(id) else {
            warn!(id, "toggle ignored: id not in catalog");
            return ToggleOutcome::Ignored;
        };

        if entry.has_side_effect {
            debug!(id, "side effect opened");
            self.side_effect = Some(entry.id.clone());
            return ToggleOutcome::SideEffectOpened;
        }

        if let Some(pos) = self.selected.iter().position(|s| s == id) {
            self.selected.remove(pos);
            debug!(id, "deselected");
            ToggleOutcome::Deselected
        } else {
            self.selected.push(entry.id.clone());
            debug!(id, "selected");
            ToggleOutcome::Selected
        }
    }

    #[must_use]
    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|s| s == id)
    }

    /// Selected ids in activation order.
    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    #[must_use]
    pub fn is_side_effect_visible(&self) -> bool {
        self.side_effect.is_some()
    }

    /// The entry whose payload the modal is showing.
    #[must_use]
    pub fn active_side_effect(&self) -> Option<&CatalogEntry> {
        self.side_effect
            .as_deref()
            .and_then(|id| self.catalog.get(id))
    }

    pub fn dismiss_side_effect(&mut self) {
        if self.side_effect.take().is_some() {
            debug!("side effect dismissed");
        }
    }

    /// Clear the selection and close the modal.
    pub fn reset(&mut self) {
        self.selected.clear();
        self.side_effect = None;
    }

    /// Swap in a new catalog, dropping selections (and an open modal) whose
    /// ids no longer exist.
    pub fn replace_catalog(&mut self, catalog: Catalog) {
        self.catalog = catalog;
        let before = self.selected.len();
        let catalog = &self.catalog;
        self.selected
            .retain(|id| catalog.get(id).is_some_and(|e| !e.has_side_effect));
        if self
            .side_effect
            .as_deref()
            .is_some_and(|id| catalog.get(id).is_none_or(|e| !e.has_side_effect))
        {
            self.side_effect = None;
        }
        let dropped = before - self.selected.len();
        if dropped > 0 {
            debug!(dropped, "selections dropped after catalog change");
        }
    }

    /// Caption under the grid: the empty prompt, or the selected labels.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.selected.is_empty() {
            return EMPTY_SUMMARY.to_string();
        }
        let labels: Vec<&str> = self
            .selected
            .iter()
            .filter_map(|id| self.catalog.get(id))
            .map(|e| e.label.as_str())
            .collect();
        format!("Selected: {}", labels.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ab() -> ToggleSelectionModel {
        let catalog = Catalog::new(vec![
            CatalogEntry::new("a", "Alpha"),
            CatalogEntry::with_side_effect("b", "Beta", "/beta.pdf"),
        ])
        .unwrap();
        ToggleSelectionModel::new(catalog)
    }

    #[test]
    fn toggle_scenario() {
        let mut model = ab();

        assert_eq!(model.toggle("a"), ToggleOutcome::Selected);
        assert_eq!(model.selected().collect::<Vec<_>>(), vec!["a"]);

        assert_eq!(model.toggle("b"), ToggleOutcome::SideEffectOpened);
        assert_eq!(model.selected().collect::<Vec<_>>(), vec!["a"]);
        assert!(model.is_side_effect_visible());
        assert!(!model.is_selected("b"));

        assert_eq!(model.toggle("a"), ToggleOutcome::Deselected);
        assert_eq!(model.selected_count(), 0);
    }

    #[test]
    fn side_effect_exposes_payload() {
        let mut model = ab();
        assert!(model.active_side_effect().is_none());
        model.toggle("b");
        let entry = model.active_side_effect().unwrap();
        assert_eq!(entry.side_effect_payload.as_deref(), Some("/beta.pdf"));
    }

    #[test]
    fn dismiss_is_idempotent() {
        let mut model = ab();
        model.toggle("b");
        model.dismiss_side_effect();
        assert!(!model.is_side_effect_visible());
        model.dismiss_side_effect();
        assert!(!model.is_side_effect_visible());
    }

    #[test]
    fn unknown_id_is_ignored() {
        let mut model = ab();
        model.toggle("a");
        assert_eq!(model.toggle("zzz"), ToggleOutcome::Ignored);
        assert_eq!(model.selected().collect::<Vec<_>>(), vec!["a"]);
        assert!(!model.is_side_effect_visible());
    }

    #[test]
    fn reset_clears_everything() {
        let mut model = ab();
        model.toggle("a");
        model.toggle("b");
        model.reset();
        assert_eq!(model.selected_count(), 0);
        assert!(!model.is_side_effect_visible());
    }

    #[test]
    fn summary_lists_labels_in_activation_order() {
        let mut model = ToggleSelectionModel::new(Catalog::skills());
        assert_eq!(model.summary(), EMPTY_SUMMARY);

        model.toggle("sql");
        model.toggle("cpp");
        model.toggle("python");
        assert_eq!(model.summary(), "Selected: SQL, C++");
    }

    #[test]
    fn replace_catalog_drops_vanished_ids() {
        let mut model = ab();
        model.toggle("a");
        model.toggle("b");

        let next = Catalog::new(vec![CatalogEntry::new("c", "Gamma")]).unwrap();
        model.replace_catalog(next);
        assert_eq!(model.selected_count(), 0);
        assert!(!model.is_side_effect_visible());
    }

    #[test]
    fn replace_catalog_keeps_surviving_ids() {
        let mut model = ab();
        model.toggle("a");
        let next = Catalog::new(vec![
            CatalogEntry::new("a", "Alpha v2"),
            CatalogEntry::new("c", "Gamma"),
        ])
        .unwrap();
        model.replace_catalog(next);
        assert!(model.is_selected("a"));
        assert_eq!(model.summary(), "Selected: Alpha v2");
    }

    #[test]
    fn catalog_validation() {
        assert_eq!(
            Catalog::new(vec![CatalogEntry::new("", "Empty")]).unwrap_err(),
            ConfigError::EmptyId
        );
        assert_eq!(
            Catalog::new(vec![CatalogEntry::new("x", "X"), CatalogEntry::new("x", "Y")])
                .unwrap_err(),
            ConfigError::DuplicateId { id: "x".into() }
        );
        let mut no_payload = CatalogEntry::new("p", "P");
        no_payload.has_side_effect = true;
        assert_eq!(
            Catalog::new(vec![no_payload]).unwrap_err(),
            ConfigError::MissingPayload { id: "p".into() }
        );
    }

    #[test]
    fn skills_catalog_is_valid() {
        let skills = Catalog::skills();
        assert!(Catalog::new(skills.entries().to_vec()).is_ok());
        assert_eq!(skills.len(), 8);
        assert!(skills.get("python").unwrap().has_side_effect);
    }
}
