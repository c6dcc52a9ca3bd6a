//! Evidence item and classification types.

use chrono::{DateTime, Utc};
use dossier_types::{CaseId, EvidenceId, SectionId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle status of an evidence item.
///
/// ```text
/// Ingested → Indexed → Delivered
///                          │
///                          ▼
///                      Archived (superseded / case closed)
/// ```
///
/// Items are never deleted within a case, only superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStatus {
    /// Stored raw; not yet classified.
    Ingested,
    /// Classified and present in the section index.
    Indexed,
    /// Handed to at least one section run.
    Delivered,
    /// Superseded or retired with the case.
    Archived,
}

impl std::fmt::Display for EvidenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ingested => write!(f, "ingested"),
            Self::Indexed => write!(f, "indexed"),
            Self::Delivered => write!(f, "delivered"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

/// Broad evidence category derived from the file kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    /// Still imagery.
    Photo,
    /// Audio or video recording.
    Recording,
    /// Prose document (PDF, word processor).
    Document,
    /// Tabular data (spreadsheets, CSV exports).
    Spreadsheet,
    /// Email or message export.
    Correspondence,
    /// Plain-text note.
    Note,
    /// Anything the rules could not type.
    Other,
}

/// How a classification was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    /// File-extension table only.
    Extension,
    /// Keyword heuristics only.
    Keyword,
    /// Extension table refined by keyword heuristics.
    Combined,
}

/// Section assignment written onto an evidence item.
///
/// Produced deterministically by the rule table: the same input and the
/// same rules always yield the same classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Primary section this item belongs to.
    pub assigned_section: SectionId,
    /// Other sections that should also see this item.
    pub related_sections: Vec<SectionId>,
    /// Broad category.
    pub evidence_type: EvidenceType,
    /// Free-form tags accumulated from matching rules.
    pub tags: Vec<String>,
    /// Rule-strength confidence in `0.0..=1.0`.
    pub confidence: f64,
    /// Which rule path produced this result.
    pub method: ClassificationMethod,
}

/// A single piece of case evidence.
///
/// Owned by the locker; mutated only through classification and delivery
/// operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Stable id, generated once at first ingest.
    pub evidence_id: EvidenceId,
    /// Where the raw file lives.
    pub file_ref: PathBuf,
    /// SHA-256 of the file content, hex-encoded; the dedup key.
    pub content_hash: String,
    /// Section assignment, absent until classified.
    pub classification: Option<Classification>,
    /// Lifecycle status.
    pub status: EvidenceStatus,
    /// When the item was first ingested.
    pub created_at: DateTime<Utc>,
    /// Case the item belongs to.
    pub case_id: CaseId,
}

impl EvidenceItem {
    /// Returns every section this item is indexed under: the assigned
    /// section first, then related sections.
    #[must_use]
    pub fn indexed_sections(&self) -> Vec<SectionId> {
        match &self.classification {
            Some(c) => {
                let mut sections = vec![c.assigned_section.clone()];
                for related in &c.related_sections {
                    if !sections.contains(related) {
                        sections.push(related.clone());
                    }
                }
                sections
            }
            None => Vec::new(),
        }
    }

    /// Returns `true` if the item carries a classification.
    #[must_use]
    pub fn is_classified(&self) -> bool {
        self.classification.is_some()
    }
}
