//! Section lifecycle state.

use chrono::{DateTime, Utc};
use dossier_types::{CaseId, SectionId};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a section within one case.
///
/// # State Categories
///
/// | Category | States | Permission granted |
/// |----------|--------|--------------------|
/// | Waiting | `Blocked` | No |
/// | Runnable | `Ready`, `RevisionRequested` | Yes |
/// | Active | `InProgress`, `AwaitingApproval` | No (already running) |
/// | Terminal | `Approved`, `Halted` | No |
///
/// `Approved` unlocks dependents; `Halted` blocks them permanently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    /// Predecessors not all approved yet.
    Blocked,
    /// Eligible to run.
    Ready,
    /// The orchestrator began work.
    InProgress,
    /// A draft was produced; waiting on review.
    AwaitingApproval,
    /// Reviewed and accepted. Terminal for normal flow; a revision
    /// request can still reopen it.
    Approved,
    /// A reviewer rejected the draft; eligible for rework.
    RevisionRequested,
    /// Fatal or administrative stop. Terminal; blocks all dependents.
    Halted,
}

impl SectionStatus {
    /// Returns `true` if the section can be granted an execution
    /// permission in this status.
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Ready | Self::RevisionRequested)
    }

    /// Returns `true` if work is currently in flight.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress | Self::AwaitingApproval)
    }

    /// Returns `true` for states no normal transition leaves.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Halted)
    }

    /// Returns `true` if a transition from `self` to `to` is legal.
    #[must_use]
    pub fn can_transition_to(&self, to: SectionStatus) -> bool {
        use SectionStatus::{
            Approved, AwaitingApproval, Blocked, Halted, InProgress, Ready, RevisionRequested,
        };
        matches!(
            (*self, to),
            (Blocked, Ready)
                | (Blocked, Halted)
                | (Ready, InProgress)
                | (Ready, Halted)
                | (InProgress, AwaitingApproval)
                | (InProgress, Ready)
                | (InProgress, Halted)
                | (AwaitingApproval, Approved)
                | (AwaitingApproval, RevisionRequested)
                | (AwaitingApproval, Halted)
                | (Approved, RevisionRequested)
                | (Approved, Halted)
                | (RevisionRequested, InProgress)
                | (RevisionRequested, Halted)
        )
    }
}

impl std::fmt::Display for SectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blocked => write!(f, "blocked"),
            Self::Ready => write!(f, "ready"),
            Self::InProgress => write!(f, "in_progress"),
            Self::AwaitingApproval => write!(f, "awaiting_approval"),
            Self::Approved => write!(f, "approved"),
            Self::RevisionRequested => write!(f, "revision_requested"),
            Self::Halted => write!(f, "halted"),
        }
    }
}

/// Per-(case, section) lifecycle record. The controller is the only
/// writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionState {
    /// Section this state describes.
    pub section_id: SectionId,
    /// Case scope.
    pub case_id: CaseId,
    /// Current lifecycle status.
    pub status: SectionStatus,
    /// How many revision rounds this section has been through.
    pub revision_depth: u32,
    /// When the status last changed.
    pub last_updated: DateTime<Utc>,
}

impl SectionState {
    /// Creates a fresh state in the given status.
    #[must_use]
    pub fn new(section_id: SectionId, case_id: CaseId, status: SectionStatus) -> Self {
        Self {
            section_id,
            case_id,
            status,
            revision_depth: 0,
            last_updated: Utc::now(),
        }
    }

    /// Applies a transition if legal.
    ///
    /// Returns the previous status on success, or `None` if the
    /// transition is not allowed by the state machine.
    pub fn transition(&mut self, to: SectionStatus) -> Option<SectionStatus> {
        if !self.status.can_transition_to(to) {
            return None;
        }
        let from = self.status;
        self.status = to;
        self.last_updated = Utc::now();
        Some(from)
    }
}
