//! Signal catalog and envelope types.
//!
//! Every cross-component notification in dossier is one of the named
//! signals below. Payloads are tagged variants with explicit required
//! fields rather than free-form maps, so a malformed payload is
//! unrepresentable and the bus can validate the remaining field-level
//! rules before dispatch.
//!
//! # Signal Catalog
//!
//! | Signal | Emitted by | Meaning |
//! |--------|-----------|---------|
//! | `evidence.new` | Locker | New evidence ingested |
//! | `evidence.updated` | Locker | Classification written back |
//! | `evidence.manual_review` | Locker | Unclassifiable, needs a human |
//! | `section.needs` | Gateway | Section requests evidence |
//! | `evidence.deliver` | Locker | Evidence bundle for a section |
//! | `section.data.updated` | Gateway | Enriched section payload |
//! | `gateway.section.complete` | Gateway | Section finished a run |
//! | `section.revision.requested` | Reviewer | Rework one section |
//! | `section.escalated` | Controller | Revision limit exceeded |
//! | `section.stalled` | Gateway | Bottleneck alert (no state change) |

use chrono::{DateTime, Utc};
use dossier_types::{CaseId, ComponentId, EvidenceId, RequestId, SectionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::BusError;

/// The name of a signal, used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalName {
    /// `evidence.new`
    EvidenceNew,
    /// `evidence.updated`
    EvidenceUpdated,
    /// `evidence.manual_review`
    EvidenceManualReview,
    /// `section.needs`
    SectionNeeds,
    /// `evidence.deliver`
    EvidenceDeliver,
    /// `section.data.updated`
    SectionDataUpdated,
    /// `gateway.section.complete`
    GatewaySectionComplete,
    /// `section.revision.requested`
    SectionRevisionRequested,
    /// `section.escalated`
    SectionEscalated,
    /// `section.stalled`
    SectionStalled,
}

impl SignalName {
    /// Returns the dotted wire name of the signal.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EvidenceNew => "evidence.new",
            Self::EvidenceUpdated => "evidence.updated",
            Self::EvidenceManualReview => "evidence.manual_review",
            Self::SectionNeeds => "section.needs",
            Self::EvidenceDeliver => "evidence.deliver",
            Self::SectionDataUpdated => "section.data.updated",
            Self::GatewaySectionComplete => "gateway.section.complete",
            Self::SectionRevisionRequested => "section.revision.requested",
            Self::SectionEscalated => "section.escalated",
            Self::SectionStalled => "section.stalled",
        }
    }
}

impl std::fmt::Display for SignalName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed signal payload, one variant per catalog entry.
///
/// # Example
///
/// ```
/// use dossier_bus::{SignalName, SignalPayload};
/// use dossier_types::{CaseId, EvidenceId};
///
/// let case = CaseId::new("C1").unwrap();
/// let payload = SignalPayload::EvidenceNew {
///     evidence_id: EvidenceId::from_content(&case, "abc"),
///     case_id: case,
/// };
/// assert_eq!(payload.name(), SignalName::EvidenceNew);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum SignalPayload {
    /// New evidence was ingested.
    EvidenceNew {
        /// Id of the new item.
        evidence_id: EvidenceId,
        /// Case the item belongs to.
        case_id: CaseId,
    },

    /// An evidence item's classification was written back.
    EvidenceUpdated {
        /// Id of the updated item.
        evidence_id: EvidenceId,
    },

    /// An item could not be classified and needs manual review.
    EvidenceManualReview {
        /// Id of the unclassifiable item.
        evidence_id: EvidenceId,
        /// Case the item belongs to.
        case_id: CaseId,
        /// Why classification failed.
        reason: String,
    },

    /// A section is requesting evidence matching its filters.
    SectionNeeds {
        /// Requesting section.
        section_id: SectionId,
        /// Case scope.
        case_id: CaseId,
        /// Tag filters (empty means everything assigned to the section).
        filters: Vec<String>,
    },

    /// An evidence bundle is being delivered to a section.
    EvidenceDeliver {
        /// Receiving section.
        section_id: SectionId,
        /// Delivered item ids, in manifest index order.
        items: Vec<EvidenceId>,
    },

    /// A section produced an enriched result payload.
    SectionDataUpdated {
        /// Section that produced the data.
        section_id: SectionId,
        /// Enriched draft payload (opaque to the bus).
        payload: Value,
    },

    /// A section finished a run through the gateway.
    GatewaySectionComplete {
        /// Completed section.
        section_id: SectionId,
        /// Case scope.
        case_id: CaseId,
    },

    /// A reviewer requested rework of a single section.
    SectionRevisionRequested {
        /// Section to rerun.
        section_id: SectionId,
        /// Reviewer's reason.
        reason: String,
    },

    /// A section exhausted its rerun budget and was halted.
    SectionEscalated {
        /// Halted section.
        section_id: SectionId,
        /// Case scope.
        case_id: CaseId,
        /// Revision depth at the time of escalation.
        revision_depth: u32,
    },

    /// A section has been in flight past the stall threshold.
    ///
    /// Operational visibility only; carries no state change.
    SectionStalled {
        /// Stalled section.
        section_id: SectionId,
        /// Case scope.
        case_id: CaseId,
        /// Seconds the section has been in flight.
        in_flight_secs: u64,
    },
}

impl SignalPayload {
    /// Returns the catalog name of this payload.
    #[must_use]
    pub fn name(&self) -> SignalName {
        match self {
            Self::EvidenceNew { .. } => SignalName::EvidenceNew,
            Self::EvidenceUpdated { .. } => SignalName::EvidenceUpdated,
            Self::EvidenceManualReview { .. } => SignalName::EvidenceManualReview,
            Self::SectionNeeds { .. } => SignalName::SectionNeeds,
            Self::EvidenceDeliver { .. } => SignalName::EvidenceDeliver,
            Self::SectionDataUpdated { .. } => SignalName::SectionDataUpdated,
            Self::GatewaySectionComplete { .. } => SignalName::GatewaySectionComplete,
            Self::SectionRevisionRequested { .. } => SignalName::SectionRevisionRequested,
            Self::SectionEscalated { .. } => SignalName::SectionEscalated,
            Self::SectionStalled { .. } => SignalName::SectionStalled,
        }
    }

    /// Validates field-level rules that the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidPayload`] when a required free-text
    /// field is empty.
    pub fn validate(&self) -> Result<(), BusError> {
        match self {
            Self::EvidenceManualReview { reason, .. } if reason.trim().is_empty() => Err(
                BusError::InvalidPayload("manual review reason cannot be empty".into()),
            ),
            Self::SectionRevisionRequested { reason, .. } if reason.trim().is_empty() => Err(
                BusError::InvalidPayload("revision reason cannot be empty".into()),
            ),
            _ => Ok(()),
        }
    }
}

/// An immutable signal as it travels over the bus.
///
/// Envelopes carry the payload plus dispatch metadata. Once emitted they
/// are never mutated; handlers receive a shared reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEnvelope {
    /// The typed payload.
    pub payload: SignalPayload,
    /// Which component emitted the signal.
    pub source: ComponentId,
    /// When the signal was emitted.
    pub timestamp: DateTime<Utc>,
    /// Correlates the signal to a handoff, when one is in flight.
    pub request_id: Option<RequestId>,
}

impl SignalEnvelope {
    /// Creates an envelope stamped with the current time.
    #[must_use]
    pub fn new(payload: SignalPayload, source: ComponentId) -> Self {
        Self {
            payload,
            source,
            timestamp: Utc::now(),
            request_id: None,
        }
    }

    /// Attaches a handoff correlation id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Returns the catalog name of the enclosed payload.
    #[must_use]
    pub fn name(&self) -> SignalName {
        self.payload.name()
    }
}
