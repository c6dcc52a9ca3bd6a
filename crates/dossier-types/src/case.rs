//! Case lifecycle status.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a case.
///
/// A closed case rejects every future permission request immediately;
/// this is how case-level cancellation is modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Case is open and accepting work.
    #[default]
    Active,
    /// Case is closed; all section operations are rejected.
    Closed,
}

impl CaseStatus {
    /// Returns `true` if the case accepts new work.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_accepts_work() {
        assert!(CaseStatus::Active.is_active());
        assert!(!CaseStatus::Closed.is_active());
    }

    #[test]
    fn default_is_active() {
        assert_eq!(CaseStatus::default(), CaseStatus::Active);
    }

    #[test]
    fn serde_snake_case() {
        assert_eq!(serde_json::to_string(&CaseStatus::Active).unwrap(), "\"active\"");
        assert_eq!(serde_json::to_string(&CaseStatus::Closed).unwrap(), "\"closed\"");
    }
}
