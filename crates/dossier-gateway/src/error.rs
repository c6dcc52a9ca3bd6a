//! Gateway layer errors.
//!
//! # Error Code Convention
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`Control`](GatewayError::Control) | `GATEWAY_CONTROL` | Follows inner |
//! | [`EvidenceUnavailable`](GatewayError::EvidenceUnavailable) | `GATEWAY_EVIDENCE_UNAVAILABLE` | Yes |
//! | [`InvalidBundle`](GatewayError::InvalidBundle) | `GATEWAY_INVALID_BUNDLE` | No |
//! | [`RenderFailed`](GatewayError::RenderFailed) | `GATEWAY_RENDER_FAILED` | Yes |

use dossier_control::ControlError;
use dossier_types::{ErrorCode, SectionId};
use thiserror::Error;

/// Gateway error.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A controller call failed.
    ///
    /// Recoverability follows the wrapped error.
    #[error("controller rejected the operation: {0}")]
    Control(#[from] ControlError),

    /// No locker answered the `section.needs` request.
    ///
    /// **Recoverable** - the locker may register later.
    #[error("no evidence source answered for section {section}: {reason}")]
    EvidenceUnavailable {
        /// Section whose request went unanswered.
        section: SectionId,
        /// Bus-level reason.
        reason: String,
    },

    /// The evidence bundle did not parse against the delivery contract.
    ///
    /// **Not recoverable** - fix the answering component.
    #[error("evidence bundle for section {section} is malformed: {reason}")]
    InvalidBundle {
        /// Section the bundle was for.
        section: SectionId,
        /// Parse failure description.
        reason: String,
    },

    /// The external renderer failed.
    ///
    /// The section has been released for retry.
    ///
    /// **Recoverable.**
    #[error("renderer failed for section {section}: {message}")]
    RenderFailed {
        /// Section being rendered.
        section: SectionId,
        /// Tool-provided failure message.
        message: String,
    },
}

impl ErrorCode for GatewayError {
    fn code(&self) -> &'static str {
        match self {
            Self::Control(_) => "GATEWAY_CONTROL",
            Self::EvidenceUnavailable { .. } => "GATEWAY_EVIDENCE_UNAVAILABLE",
            Self::InvalidBundle { .. } => "GATEWAY_INVALID_BUNDLE",
            Self::RenderFailed { .. } => "GATEWAY_RENDER_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Control(inner) => inner.is_recoverable(),
            Self::EvidenceUnavailable { .. } => true,
            Self::InvalidBundle { .. } => false,
            Self::RenderFailed { .. } => true,
        }
    }
}
