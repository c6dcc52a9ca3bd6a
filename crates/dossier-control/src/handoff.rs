//! Handoff audit records.
//!
//! One [`HandoffRecord`] is created per granted permission and updated
//! as the four-step protocol advances. Records are kept for audit and
//! for detecting stuck handshakes: a record whose `confirmed_at` never
//! arrives is closed as [`HandoffOutcome::TimedOut`] by the confirm
//! path, releasing the grant.

use chrono::{DateTime, Utc};
use dossier_types::{ComponentId, RequestId};
use serde::{Deserialize, Serialize};

/// Terminal (or pending) outcome of a handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffOutcome {
    /// Protocol still in flight.
    Pending,
    /// Completed successfully.
    Success,
    /// Requester reported failure.
    Failed,
    /// Requester never confirmed within the timeout.
    TimedOut,
}

impl HandoffOutcome {
    /// Returns `true` once the handoff can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Audit record of one call-out/confirm/accept/complete handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffRecord {
    /// Operation name (e.g., `"run_section"`).
    pub operation: String,
    /// Component that requested the permission.
    pub requester: ComponentId,
    /// Correlation id for the whole handshake.
    pub request_id: RequestId,
    /// When the permission was granted.
    pub granted_at: DateTime<Utc>,
    /// When the requester reported it started, if it did.
    pub confirmed_at: Option<DateTime<Utc>>,
    /// When the requester reported its result, if it did.
    pub accepted_at: Option<DateTime<Utc>>,
    /// When the handshake was closed, if it was.
    pub completed_at: Option<DateTime<Utc>>,
    /// Current outcome.
    pub outcome: HandoffOutcome,
    /// Result payload reported by `accept`, if any.
    pub result: Option<serde_json::Value>,
}

impl HandoffRecord {
    /// Creates a freshly granted record.
    #[must_use]
    pub fn granted(operation: impl Into<String>, requester: ComponentId, request_id: RequestId) -> Self {
        Self {
            operation: operation.into(),
            requester,
            request_id,
            granted_at: Utc::now(),
            confirmed_at: None,
            accepted_at: None,
            completed_at: None,
            outcome: HandoffOutcome::Pending,
            result: None,
        }
    }

    /// Returns `true` while the handshake is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.outcome.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record_is_open() {
        let record = HandoffRecord::granted(
            "run_section",
            ComponentId::builtin("gateway"),
            RequestId::new(),
        );
        assert!(record.is_open());
        assert_eq!(record.outcome, HandoffOutcome::Pending);
        assert!(record.confirmed_at.is_none());
    }

    #[test]
    fn terminal_outcomes() {
        assert!(!HandoffOutcome::Pending.is_terminal());
        assert!(HandoffOutcome::Success.is_terminal());
        assert!(HandoffOutcome::Failed.is_terminal());
        assert!(HandoffOutcome::TimedOut.is_terminal());
    }
}
