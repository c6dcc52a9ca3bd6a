//! The versioned evidence manifest.
//!
//! The manifest is the durable, queryable collection of every evidence
//! item in the current case, plus a per-section index for O(1) section
//! lookups.
//!
//! # Invariants
//!
//! - `manifest_version` strictly increases on every mutation
//! - every id in the section index exists in the item collection
//! - items are keyed by their stable [`EvidenceId`]

use chrono::{DateTime, Utc};
use dossier_types::{CaseId, EvidenceId, SectionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::evidence::{Classification, EvidenceItem, EvidenceStatus};

/// Durable document schema version.
///
/// Bumped on any incompatible change to the serialized layout. A stored
/// manifest with a different version refuses to load.
pub const SCHEMA_VERSION: u32 = 1;

/// Versioned collection of evidence items with a per-section index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceManifest {
    /// Serialized layout version; checked on load.
    schema_version: u32,
    /// Monotonic document version; bumped on every mutation.
    manifest_version: u64,
    /// Timestamp of the last mutation.
    updated_at: DateTime<Utc>,
    /// Case this manifest belongs to.
    case_id: CaseId,
    /// Item count; must agree with `entries` (checked on load).
    evidence_count: usize,
    /// Items keyed by evidence id.
    entries: BTreeMap<EvidenceId, EvidenceItem>,
    /// section id → ordered evidence ids.
    section_index: BTreeMap<SectionId, Vec<EvidenceId>>,
}

impl EvidenceManifest {
    /// Creates an empty manifest for a case.
    #[must_use]
    pub fn new(case_id: CaseId) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            manifest_version: 0,
            updated_at: Utc::now(),
            case_id,
            evidence_count: 0,
            entries: BTreeMap::new(),
            section_index: BTreeMap::new(),
        }
    }

    /// Case this manifest belongs to.
    #[must_use]
    pub fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    /// Current document version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.manifest_version
    }

    /// Timestamp of the last mutation.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Number of items held.
    #[must_use]
    pub fn evidence_count(&self) -> usize {
        self.evidence_count
    }

    /// Schema version recorded in the document.
    #[must_use]
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Looks up an item by id.
    #[must_use]
    pub fn get(&self, id: &EvidenceId) -> Option<&EvidenceItem> {
        self.entries.get(id)
    }

    /// Finds an item by content hash (the dedup key).
    #[must_use]
    pub fn find_by_hash(&self, content_hash: &str) -> Option<&EvidenceItem> {
        self.entries
            .values()
            .find(|item| item.content_hash == content_hash)
    }

    /// Iterates all items in id order.
    pub fn items(&self) -> impl Iterator<Item = &EvidenceItem> {
        self.entries.values()
    }

    /// Ordered evidence ids for a section.
    #[must_use]
    pub fn section_items(&self, section: &SectionId) -> Vec<EvidenceId> {
        self.section_index.get(section).cloned().unwrap_or_default()
    }

    /// Inserts a new item and bumps the version.
    pub fn insert(&mut self, item: EvidenceItem) {
        self.entries.insert(item.evidence_id, item);
        self.evidence_count = self.entries.len();
        self.touch();
    }

    /// Writes a classification onto an item, re-indexes it, and bumps
    /// the version. A `None` classification removes the item from the
    /// index (manual-review path).
    ///
    /// Returns `false` if the id is unknown.
    pub fn set_classification(
        &mut self,
        id: &EvidenceId,
        classification: Option<Classification>,
    ) -> bool {
        let Some(item) = self.entries.get_mut(id) else {
            return false;
        };
        item.classification = classification;
        item.status = if item.classification.is_some() {
            EvidenceStatus::Indexed
        } else {
            EvidenceStatus::Ingested
        };

        let sections = item.indexed_sections();

        // Drop stale index positions, then append fresh ones.
        for ids in self.section_index.values_mut() {
            ids.retain(|existing| existing != id);
        }
        self.section_index.retain(|_, ids| !ids.is_empty());
        for section in sections {
            self.section_index.entry(section).or_default().push(*id);
        }

        self.touch();
        true
    }

    /// Marks items as delivered; bumps the version once if anything
    /// actually changed.
    pub fn mark_delivered(&mut self, ids: &[EvidenceId]) {
        let mut changed = false;
        for id in ids {
            if let Some(item) = self.entries.get_mut(id) {
                if item.status == EvidenceStatus::Indexed {
                    item.status = EvidenceStatus::Delivered;
                    changed = true;
                }
            }
        }
        if changed {
            self.touch();
        }
    }

    /// Checks structural invariants.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violation found: a section
    /// index referencing a missing item, or a wrong schema version.
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(format!(
                "schema version {} does not match expected {}",
                self.schema_version, SCHEMA_VERSION
            ));
        }
        if self.evidence_count != self.entries.len() {
            return Err(format!(
                "evidence_count {} disagrees with {} stored entries",
                self.evidence_count,
                self.entries.len()
            ));
        }
        for (section, ids) in &self.section_index {
            for id in ids {
                if !self.entries.contains_key(id) {
                    return Err(format!(
                        "section index for '{section}' references missing evidence {id}"
                    ));
                }
            }
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.manifest_version += 1;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{ClassificationMethod, EvidenceType};
    use std::path::PathBuf;

    fn case() -> CaseId {
        CaseId::new("C1").unwrap()
    }

    fn section(id: &str) -> SectionId {
        SectionId::new(id).unwrap()
    }

    fn item(hash: &str) -> EvidenceItem {
        EvidenceItem {
            evidence_id: EvidenceId::from_content(&case(), hash),
            file_ref: PathBuf::from(format!("{hash}.jpg")),
            content_hash: hash.into(),
            classification: None,
            status: EvidenceStatus::Ingested,
            created_at: Utc::now(),
            case_id: case(),
        }
    }

    fn photo_classification() -> Classification {
        Classification {
            assigned_section: section("section_8"),
            related_sections: vec![],
            evidence_type: EvidenceType::Photo,
            tags: vec!["photo".into()],
            confidence: 0.8,
            method: ClassificationMethod::Extension,
        }
    }

    #[test]
    fn version_strictly_increases_on_mutation() {
        let mut manifest = EvidenceManifest::new(case());
        let v0 = manifest.version();

        let it = item("h1");
        let id = it.evidence_id;
        manifest.insert(it);
        let v1 = manifest.version();
        assert!(v1 > v0);

        manifest.set_classification(&id, Some(photo_classification()));
        assert!(manifest.version() > v1);
    }

    #[test]
    fn find_by_hash() {
        let mut manifest = EvidenceManifest::new(case());
        manifest.insert(item("h1"));

        assert!(manifest.find_by_hash("h1").is_some());
        assert!(manifest.find_by_hash("h2").is_none());
    }

    #[test]
    fn classification_populates_section_index() {
        let mut manifest = EvidenceManifest::new(case());
        let it = item("h1");
        let id = it.evidence_id;
        manifest.insert(it);

        assert!(manifest.section_items(&section("section_8")).is_empty());

        manifest.set_classification(&id, Some(photo_classification()));
        assert_eq!(manifest.section_items(&section("section_8")), vec![id]);
        assert_eq!(manifest.get(&id).unwrap().status, EvidenceStatus::Indexed);
    }

    #[test]
    fn reclassification_moves_index_entry() {
        let mut manifest = EvidenceManifest::new(case());
        let it = item("h1");
        let id = it.evidence_id;
        manifest.insert(it);
        manifest.set_classification(&id, Some(photo_classification()));

        let mut moved = photo_classification();
        moved.assigned_section = section("section_3");
        manifest.set_classification(&id, Some(moved));

        assert!(manifest.section_items(&section("section_8")).is_empty());
        assert_eq!(manifest.section_items(&section("section_3")), vec![id]);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn clearing_classification_deindexes() {
        let mut manifest = EvidenceManifest::new(case());
        let it = item("h1");
        let id = it.evidence_id;
        manifest.insert(it);
        manifest.set_classification(&id, Some(photo_classification()));

        manifest.set_classification(&id, None);
        assert!(manifest.section_items(&section("section_8")).is_empty());
        assert_eq!(manifest.get(&id).unwrap().status, EvidenceStatus::Ingested);
    }

    #[test]
    fn mark_delivered_bumps_once() {
        let mut manifest = EvidenceManifest::new(case());
        let it = item("h1");
        let id = it.evidence_id;
        manifest.insert(it);
        manifest.set_classification(&id, Some(photo_classification()));
        let v = manifest.version();

        manifest.mark_delivered(&[id]);
        assert_eq!(manifest.version(), v + 1);
        assert_eq!(manifest.get(&id).unwrap().status, EvidenceStatus::Delivered);

        // Already delivered: no change, no version bump.
        manifest.mark_delivered(&[id]);
        assert_eq!(manifest.version(), v + 1);
    }

    #[test]
    fn validate_catches_dangling_index() {
        let mut manifest = EvidenceManifest::new(case());
        let it = item("h1");
        let id = it.evidence_id;
        manifest.insert(it);
        manifest.set_classification(&id, Some(photo_classification()));

        // Corrupt it directly for the test.
        manifest.entries.remove(&id);
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn serde_round_trip_preserves_version() {
        let mut manifest = EvidenceManifest::new(case());
        manifest.insert(item("h1"));

        let json = serde_json::to_string(&manifest).unwrap();
        let restored: EvidenceManifest = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.version(), manifest.version());
        assert_eq!(restored.evidence_count(), 1);
        assert!(restored.validate().is_ok());
    }
}
