//! Locker layer errors.
//!
//! # Error Code Convention
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`Io`](LockerError::Io) | `LOCKER_IO` | Yes |
//! | [`EmptyFile`](LockerError::EmptyFile) | `LOCKER_EMPTY_FILE` | No |
//! | [`UnknownEvidence`](LockerError::UnknownEvidence) | `LOCKER_UNKNOWN_EVIDENCE` | No |
//! | [`CaseMismatch`](LockerError::CaseMismatch) | `LOCKER_CASE_MISMATCH` | No |
//! | [`ClassificationFailure`](LockerError::ClassificationFailure) | `LOCKER_CLASSIFICATION_FAILURE` | Yes |
//! | [`ManifestCorruption`](LockerError::ManifestCorruption) | `LOCKER_MANIFEST_CORRUPTION` | No |
//!
//! `ClassificationFailure` is recoverable in the operational sense: the
//! item is flagged for manual review and the pipeline continues.
//! `ManifestCorruption` is the loud stop — the system refuses to operate
//! on a case whose durable state fails validation.

use dossier_types::{CaseId, ErrorCode, EvidenceId};
use thiserror::Error;

/// Evidence locker error.
#[derive(Debug, Error)]
pub enum LockerError {
    /// Filesystem operation failed.
    ///
    /// **Recoverable** - transient disk conditions may clear.
    #[error("io error on {path}: {source}")]
    Io {
        /// Path involved in the failed operation.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The ingested file was empty.
    ///
    /// **Not recoverable** - an empty file carries no evidence.
    #[error("file is empty: {0}")]
    EmptyFile(String),

    /// No evidence item with the given id exists in the current case.
    ///
    /// **Not recoverable** - fix the caller.
    #[error("unknown evidence id: {0}")]
    UnknownEvidence(EvidenceId),

    /// An operation referenced a case other than the current one.
    ///
    /// **Not recoverable** - start the new case explicitly first.
    #[error("case mismatch: locker holds '{current}', operation referenced '{requested}'")]
    CaseMismatch {
        /// Case the locker currently holds.
        current: CaseId,
        /// Case the operation referenced.
        requested: CaseId,
    },

    /// The item could not be classified.
    ///
    /// The item keeps status `ingested` with no classification, and an
    /// `evidence.manual_review` signal is emitted so the orchestrator
    /// routes it to a human instead of dropping it.
    ///
    /// **Recoverable** - manual review resolves it.
    #[error("classification failed for {evidence_id}: {reason}")]
    ClassificationFailure {
        /// Item that failed to classify.
        evidence_id: EvidenceId,
        /// Why the rules could not classify it.
        reason: String,
    },

    /// The on-disk manifest failed schema validation.
    ///
    /// **Not recoverable** - the system refuses to start with this case
    /// until the file is manually resolved. Evidence is never silently
    /// reset to empty.
    #[error("manifest corruption at {path}: {reason}")]
    ManifestCorruption {
        /// Path of the corrupt manifest.
        path: String,
        /// What failed to validate.
        reason: String,
    },
}

impl ErrorCode for LockerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "LOCKER_IO",
            Self::EmptyFile(_) => "LOCKER_EMPTY_FILE",
            Self::UnknownEvidence(_) => "LOCKER_UNKNOWN_EVIDENCE",
            Self::CaseMismatch { .. } => "LOCKER_CASE_MISMATCH",
            Self::ClassificationFailure { .. } => "LOCKER_CLASSIFICATION_FAILURE",
            Self::ManifestCorruption { .. } => "LOCKER_MANIFEST_CORRUPTION",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { .. } => true,
            Self::EmptyFile(_) => false,
            Self::UnknownEvidence(_) => false,
            Self::CaseMismatch { .. } => false,
            Self::ClassificationFailure { .. } => true,
            Self::ManifestCorruption { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_types::assert_error_codes;

    fn all_variants() -> Vec<LockerError> {
        let case = CaseId::new("C1").unwrap();
        let eid = EvidenceId::from_content(&case, "h");
        vec![
            LockerError::Io {
                path: "x".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "x"),
            },
            LockerError::EmptyFile("x".into()),
            LockerError::UnknownEvidence(eid),
            LockerError::CaseMismatch {
                current: case.clone(),
                requested: CaseId::new("C2").unwrap(),
            },
            LockerError::ClassificationFailure {
                evidence_id: eid,
                reason: "x".into(),
            },
            LockerError::ManifestCorruption {
                path: "x".into(),
                reason: "x".into(),
            },
        ]
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&all_variants(), "LOCKER_");
    }

    #[test]
    fn corruption_is_terminal() {
        let err = LockerError::ManifestCorruption {
            path: "manifest.json".into(),
            reason: "schema version 7, expected 1".into(),
        };
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("manifest.json"));
    }

    #[test]
    fn classification_failure_is_operationally_recoverable() {
        let case = CaseId::new("C1").unwrap();
        let err = LockerError::ClassificationFailure {
            evidence_id: EvidenceId::from_content(&case, "h"),
            reason: "no rule matched".into(),
        };
        assert!(err.is_recoverable());
    }
}
