//! Bus layer errors.
//!
//! # Error Code Convention
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`BusError::InvalidPayload`] | `BUS_INVALID_PAYLOAD` | No |
//! | [`BusError::NoHandlers`] | `BUS_NO_HANDLERS` | Yes |
//! | [`BusError::HandlerFailed`] | `BUS_HANDLER_FAILED` | Yes |

use dossier_types::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::SignalName;

/// Bus layer error.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum BusError {
    /// Payload failed boundary validation.
    ///
    /// **Not recoverable** - fix the emitting component.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// `send` was called with no handler registered for the signal.
    ///
    /// **Recoverable** - a handler may register later; the caller can
    /// retry once the receiving component is up.
    #[error("no handlers registered for signal: {0}")]
    NoHandlers(SignalName),

    /// Every handler for a `send` failed.
    ///
    /// Fan-out isolates individual failures; this surfaces only when a
    /// `send` caller expected an answer and nobody produced one. The
    /// last failure's details are carried.
    ///
    /// **Recoverable** - the failure is component-local.
    #[error("handler {handler} failed: {message}")]
    HandlerFailed {
        /// FQN of the failing handler's component.
        handler: String,
        /// Component-provided failure message.
        message: String,
    },
}

impl ErrorCode for BusError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "BUS_INVALID_PAYLOAD",
            Self::NoHandlers(_) => "BUS_NO_HANDLERS",
            Self::HandlerFailed { .. } => "BUS_HANDLER_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::InvalidPayload(_) => false,
            Self::NoHandlers(_) => true,
            Self::HandlerFailed { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_types::assert_error_codes;

    fn all_variants() -> Vec<BusError> {
        vec![
            BusError::InvalidPayload("x".into()),
            BusError::NoHandlers(SignalName::EvidenceNew),
            BusError::HandlerFailed {
                handler: "builtin::gateway".into(),
                message: "x".into(),
            },
        ]
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&all_variants(), "BUS_");
    }

    #[test]
    fn recoverability() {
        assert!(!BusError::InvalidPayload("x".into()).is_recoverable());
        assert!(BusError::NoHandlers(SignalName::EvidenceNew).is_recoverable());
    }

    #[test]
    fn display_includes_signal_name() {
        let err = BusError::NoHandlers(SignalName::SectionNeeds);
        assert!(err.to_string().contains("section.needs"));
    }
}
