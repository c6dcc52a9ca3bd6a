//! Controller layer errors.
//!
//! # Error Code Convention
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`PermissionDenied`](ControlError::PermissionDenied) | `CONTROL_PERMISSION_DENIED` | Yes |
//! | [`OrderViolation`](ControlError::OrderViolation) | `CONTROL_ORDER_VIOLATION` | No |
//! | [`HandoffTimeout`](ControlError::HandoffTimeout) | `CONTROL_HANDOFF_TIMEOUT` | Yes |
//! | [`RevisionLimitExceeded`](ControlError::RevisionLimitExceeded) | `CONTROL_REVISION_LIMIT_EXCEEDED` | No |
//! | [`UnknownSection`](ControlError::UnknownSection) | `CONTROL_UNKNOWN_SECTION` | No |
//! | [`UnknownCase`](ControlError::UnknownCase) | `CONTROL_UNKNOWN_CASE` | No |
//! | [`UnknownRequest`](ControlError::UnknownRequest) | `CONTROL_UNKNOWN_REQUEST` | No |
//!
//! Permission *denials* during `request_permission` are not errors at
//! all — they come back as a typed ticket with `granted = false` so the
//! caller can retry after a predecessor completes. The error variants
//! below cover protocol misuse and guardrails.

use dossier_types::{CaseId, ErrorCode, RequestId, SectionId};
use thiserror::Error;

use crate::SectionStatus;

/// Controller error.
#[derive(Debug, Clone, Error)]
pub enum ControlError {
    /// An operation required an active grant the caller does not hold.
    ///
    /// Typically the grant was released after a confirm timeout.
    ///
    /// **Recoverable** - request permission again.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// An illegal section state transition was attempted.
    ///
    /// This is a programming error in the caller; it is surfaced rather
    /// than silently corrected.
    ///
    /// **Not recoverable.**
    #[error("order violation: section {section} cannot move {from} → {to}")]
    OrderViolation {
        /// Section involved.
        section: SectionId,
        /// Status before the attempt.
        from: SectionStatus,
        /// Status the caller tried to reach.
        to: SectionStatus,
    },

    /// The requester never confirmed within the timeout.
    ///
    /// The handoff record is closed as timed out and the grant is
    /// released, so another attempt can be made.
    ///
    /// **Recoverable.**
    #[error("handoff timed out waiting for confirm: {0}")]
    HandoffTimeout(RequestId),

    /// A revision request pushed the section past its rerun budget.
    ///
    /// The section has been forced to `halted` and an escalation signal
    /// emitted; this error informs the caller.
    ///
    /// **Not recoverable.**
    #[error("revision limit exceeded for {section}: depth {depth} > max {max_reruns}")]
    RevisionLimitExceeded {
        /// Halted section.
        section: SectionId,
        /// Revision depth reached.
        depth: u32,
        /// Budget from the contract.
        max_reruns: u32,
    },

    /// No contract defines this section.
    ///
    /// **Not recoverable** - fix the caller or the contract file.
    #[error("unknown section: {0}")]
    UnknownSection(SectionId),

    /// The case was never registered with the controller.
    ///
    /// **Not recoverable** - register the case first.
    #[error("unknown case: {0}")]
    UnknownCase(CaseId),

    /// No handoff record exists for this request id.
    ///
    /// **Not recoverable** - the id is stale or fabricated.
    #[error("unknown request: {0}")]
    UnknownRequest(RequestId),
}

impl ErrorCode for ControlError {
    fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "CONTROL_PERMISSION_DENIED",
            Self::OrderViolation { .. } => "CONTROL_ORDER_VIOLATION",
            Self::HandoffTimeout(_) => "CONTROL_HANDOFF_TIMEOUT",
            Self::RevisionLimitExceeded { .. } => "CONTROL_REVISION_LIMIT_EXCEEDED",
            Self::UnknownSection(_) => "CONTROL_UNKNOWN_SECTION",
            Self::UnknownCase(_) => "CONTROL_UNKNOWN_CASE",
            Self::UnknownRequest(_) => "CONTROL_UNKNOWN_REQUEST",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::PermissionDenied(_) => true,
            Self::OrderViolation { .. } => false,
            Self::HandoffTimeout(_) => true,
            Self::RevisionLimitExceeded { .. } => false,
            Self::UnknownSection(_) => false,
            Self::UnknownCase(_) => false,
            Self::UnknownRequest(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_types::assert_error_codes;

    fn all_variants() -> Vec<ControlError> {
        let section = SectionId::new("section_1").unwrap();
        vec![
            ControlError::PermissionDenied("x".into()),
            ControlError::OrderViolation {
                section: section.clone(),
                from: SectionStatus::Blocked,
                to: SectionStatus::Approved,
            },
            ControlError::HandoffTimeout(RequestId::new()),
            ControlError::RevisionLimitExceeded {
                section: section.clone(),
                depth: 3,
                max_reruns: 2,
            },
            ControlError::UnknownSection(section),
            ControlError::UnknownCase(CaseId::new("C1").unwrap()),
            ControlError::UnknownRequest(RequestId::new()),
        ]
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&all_variants(), "CONTROL_");
    }

    #[test]
    fn recoverability_split() {
        assert!(ControlError::HandoffTimeout(RequestId::new()).is_recoverable());
        assert!(!ControlError::UnknownSection(SectionId::new("s").unwrap()).is_recoverable());
    }
}
