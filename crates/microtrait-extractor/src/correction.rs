//! Name correction worklist
//!
//! Records whose metadata lists species or host names that the title and
//! abstract never mention are queued for a human. A reviewer either supplies
//! the corrected names or dismisses the flag; [`CorrectionWorklist::resolve`]
//! then merges the outcome back into the name list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use microtrait_core::{EntityName, TraitKind};

use crate::names::{names_missing_from_text, resolve_with_correction};

// ============================================================================
// Correction Status
// ============================================================================

/// Review state of a worklist item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStatus {
    /// Waiting for a reviewer
    Pending,
    /// Reviewer supplied corrected names
    Corrected,
    /// Reviewer confirmed the listed names as they are
    Dismissed,
}

impl std::fmt::Display for CorrectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Corrected => write!(f, "corrected"),
            Self::Dismissed => write!(f, "dismissed"),
        }
    }
}

// ============================================================================
// Correction Item
// ============================================================================

/// A record's name list with the names that could not be found in its text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionItem {
    pub id: Uuid,
    pub record_id: String,
    pub kind: TraitKind,
    pub all_names: Vec<String>,
    pub flagged_missing: Vec<String>,
    pub corrected: Vec<String>,
    pub status: CorrectionStatus,
    pub reviewer: Option<String>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl CorrectionItem {
    /// Create a pending item
    pub fn new(
        record_id: impl Into<String>,
        kind: TraitKind,
        all_names: Vec<String>,
        flagged_missing: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            record_id: record_id.into(),
            kind,
            all_names,
            flagged_missing,
            corrected: Vec::new(),
            status: CorrectionStatus::Pending,
            reviewer: None,
            review_note: None,
            created_at: Utc::now(),
            reviewed_at: None,
        }
    }

    /// Names after applying this item's review outcome
    pub fn resolved_names(&self) -> Option<Vec<String>> {
        match self.status {
            CorrectionStatus::Dismissed => resolve_with_correction(&self.all_names, &[], &[]),
            CorrectionStatus::Corrected => {
                resolve_with_correction(&self.all_names, &self.flagged_missing, &self.corrected)
            }
            CorrectionStatus::Pending => {
                resolve_with_correction(&self.all_names, &self.flagged_missing, &[])
            }
        }
    }
}

// ============================================================================
// Correction Worklist
// ============================================================================

/// In-memory worklist of records awaiting name review
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CorrectionWorklist {
    items: Vec<CorrectionItem>,
}

impl CorrectionWorklist {
    /// Create an empty worklist
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a record when some of its names are absent from `corpus`.
    ///
    /// Returns the new item's id, or `None` if every name was found.
    pub fn add_if_missing(
        &mut self,
        record_id: &str,
        kind: TraitKind,
        names: &[EntityName],
        corpus: &str,
    ) -> Option<Uuid> {
        let missing = names_missing_from_text(names, corpus)?;
        let all_names = names.iter().map(|n| n.canonical.clone()).collect();

        tracing::debug!(
            record_id,
            kind = %kind,
            missing = missing.len(),
            "Queued names for correction"
        );

        let item = CorrectionItem::new(record_id, kind, all_names, missing);
        let id = item.id;
        self.items.push(item);
        Some(id)
    }

    /// Record a reviewer's corrected names
    pub fn apply_correction(&mut self, id: Uuid, reviewer: &str, corrected: Vec<String>) -> bool {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.status = CorrectionStatus::Corrected;
            item.corrected = corrected;
            item.reviewer = Some(reviewer.to_string());
            item.reviewed_at = Some(Utc::now());
            true
        } else {
            false
        }
    }

    /// Mark a flag as a false alarm
    pub fn dismiss(&mut self, id: Uuid, reviewer: &str, note: Option<&str>) -> bool {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.status = CorrectionStatus::Dismissed;
            item.reviewer = Some(reviewer.to_string());
            item.review_note = note.map(String::from);
            item.reviewed_at = Some(Utc::now());
            true
        } else {
            false
        }
    }

    /// Get item by ID
    pub fn get(&self, id: Uuid) -> Option<&CorrectionItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Items still waiting for review
    pub fn pending_items(&self) -> Vec<&CorrectionItem> {
        self.items
            .iter()
            .filter(|i| i.status == CorrectionStatus::Pending)
            .collect()
    }

    pub fn items(&self) -> &[CorrectionItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Names after review of the item `queued` returned by
    /// [`add_if_missing`](Self::add_if_missing). A row that was never queued
    /// keeps `all_names` verbatim.
    pub fn resolve(&self, queued: Option<Uuid>, all_names: &[String]) -> Option<Vec<String>> {
        match queued.and_then(|id| self.get(id)) {
            Some(item) => item.resolved_names(),
            None => resolve_with_correction(all_names, &[], &[]),
        }
    }

    /// Get statistics
    pub fn stats(&self) -> WorklistStats {
        let count = |status: CorrectionStatus| {
            self.items.iter().filter(|i| i.status == status).count()
        };
        WorklistStats {
            pending: count(CorrectionStatus::Pending),
            corrected: count(CorrectionStatus::Corrected),
            dismissed: count(CorrectionStatus::Dismissed),
        }
    }
}

/// Worklist statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorklistStats {
    pub pending: usize,
    pub corrected: usize,
    pub dismissed: usize,
}

impl WorklistStats {
    /// Total items
    pub fn total(&self) -> usize {
        self.pending + self.corrected + self.dismissed
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::split_names;

    const CORPUS: &str = "Nosema bombycis infects Bombyx mori larvae.";

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_if_missing_only_flags_absent_names() {
        let mut worklist = CorrectionWorklist::new();

        let found = split_names("Nosema bombycis");
        assert!(worklist
            .add_if_missing("r1", TraitKind::Species, &found, CORPUS)
            .is_none());

        let hosts = split_names("Bombyx mori; Antheraea pernyi");
        let id = worklist
            .add_if_missing("r1", TraitKind::Hosts, &hosts, CORPUS)
            .unwrap();

        let item = worklist.get(id).unwrap();
        assert_eq!(item.flagged_missing, strings(&["Antheraea pernyi"]));
        assert_eq!(item.status, CorrectionStatus::Pending);
        assert_eq!(worklist.pending_items().len(), 1);
    }

    #[test]
    fn test_apply_correction() {
        let mut worklist = CorrectionWorklist::new();
        let hosts = split_names("Bombyx mori; Antheraea pernyi");
        let id = worklist
            .add_if_missing("r1", TraitKind::Hosts, &hosts, CORPUS)
            .unwrap();

        assert!(worklist.apply_correction(id, "curator", strings(&["Antheraea yamamai"])));
        let item = worklist.get(id).unwrap();
        assert_eq!(item.status, CorrectionStatus::Corrected);
        assert_eq!(item.reviewer.as_deref(), Some("curator"));
        assert!(item.reviewed_at.is_some());

        let all = strings(&["Bombyx mori", "Antheraea pernyi"]);
        assert_eq!(
            worklist.resolve(Some(id), &all),
            Some(strings(&["Bombyx mori", "Antheraea yamamai"]))
        );
        assert!(worklist.pending_items().is_empty());
    }

    #[test]
    fn test_pending_and_dismissed_resolution() {
        let mut worklist = CorrectionWorklist::new();
        let hosts = split_names("Antheraea pernyi");
        let id = worklist
            .add_if_missing("r2", TraitKind::Hosts, &hosts, CORPUS)
            .unwrap();

        let all = strings(&["Antheraea pernyi"]);
        // Pending: the only name is flagged, so nothing remains
        assert_eq!(worklist.resolve(Some(id), &all), None);

        assert!(worklist.dismiss(id, "curator", Some("named in full text")));
        assert_eq!(
            worklist.resolve(Some(id), &all),
            Some(all.clone())
        );
        assert_eq!(
            worklist.get(id).unwrap().review_note.as_deref(),
            Some("named in full text")
        );
    }

    #[test]
    fn test_unqueued_record_keeps_names() {
        let worklist = CorrectionWorklist::new();
        let all = strings(&["Bombyx mori"]);
        assert_eq!(worklist.resolve(None, &all), Some(all.clone()));
        assert_eq!(worklist.resolve(Some(Uuid::new_v4()), &all), Some(all.clone()));
    }

    #[test]
    fn test_shared_record_id_items_stay_separate() {
        let mut worklist = CorrectionWorklist::new();
        let first = worklist
            .add_if_missing("same", TraitKind::Hosts, &split_names("Culex pipiens"), CORPUS)
            .unwrap();
        let second = worklist
            .add_if_missing("same", TraitKind::Hosts, &split_names("Apis cerana"), CORPUS)
            .unwrap();

        assert_eq!(worklist.items().len(), 2);
        worklist.apply_correction(first, "curator", strings(&["Culex quinquefasciatus"]));

        assert_eq!(
            worklist.resolve(Some(first), &strings(&["Culex pipiens"])),
            Some(strings(&["Culex quinquefasciatus"]))
        );
        assert_eq!(worklist.resolve(Some(second), &strings(&["Apis cerana"])), None);
    }

    #[test]
    fn test_unknown_id() {
        let mut worklist = CorrectionWorklist::new();
        assert!(!worklist.apply_correction(Uuid::new_v4(), "curator", Vec::new()));
        assert!(!worklist.dismiss(Uuid::new_v4(), "curator", None));
    }

    #[test]
    fn test_stats() {
        let mut worklist = CorrectionWorklist::new();
        let a = worklist
            .add_if_missing("r1", TraitKind::Hosts, &split_names("Apis mellifera"), CORPUS)
            .unwrap();
        let b = worklist
            .add_if_missing("r2", TraitKind::Hosts, &split_names("Aedes aegypti"), CORPUS)
            .unwrap();
        worklist
            .add_if_missing("r3", TraitKind::Species, &split_names("Nosema apis"), CORPUS)
            .unwrap();

        worklist.apply_correction(a, "curator", strings(&["Apis cerana"]));
        worklist.dismiss(b, "curator", None);

        let stats = worklist.stats();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.corrected, 1);
        assert_eq!(stats.dismissed, 1);
        assert_eq!(stats.total(), 3);
    }
}
