//! Identifier types for dossier.
//!
//! Evidence and request identifiers are UUID-based; case and section
//! identifiers are validated string newtypes because they come from the
//! outside world (case numbers, contract files) and must stay readable.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::{uuid, Uuid};

/// Dossier namespace UUID for deterministic UUID v5 generation.
///
/// Used for builtin component ids and for content-derived evidence ids.
const DOSSIER_NAMESPACE: Uuid = uuid!("6f7db1c5-52ef-4f0e-9c2a-8e1d3a0b44a7");

/// Identifier for a case.
///
/// Evidence and section state are always scoped by case; starting a new
/// case must never leak state from a previous one. The id itself is
/// caller-supplied (a case number like `"2026-0142"`), validated to be
/// non-empty.
///
/// # Example
///
/// ```
/// use dossier_types::CaseId;
///
/// let case = CaseId::new("2026-0142").unwrap();
/// assert_eq!(case.as_str(), "2026-0142");
/// assert!(CaseId::new("   ").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    /// Creates a case id, rejecting empty or whitespace-only input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for a report section.
///
/// Sections are static configuration: each one has a defined position in
/// the processing order, declared in its contract. Ids look like
/// `"section_1"`, `"section_8"`.
///
/// # Example
///
/// ```
/// use dossier_types::SectionId;
///
/// let section = SectionId::new("section_3").unwrap();
/// assert_eq!(section.to_string(), "section_3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(String);

impl SectionId {
    /// Creates a section id, rejecting empty or whitespace-only input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for an evidence item.
///
/// Generated once at first ingest and stable for the life of the case.
///
/// # UUID Strategy
///
/// [`from_content`](Self::from_content) derives a UUID v5 from the
/// dossier namespace, the case id, and the content hash. Identical bytes
/// ingested into the same case therefore always produce the same id,
/// which is the foundation of idempotent ingestion. The same bytes in a
/// *different* case produce a different id, so ids never collide across
/// case boundaries.
///
/// # Example
///
/// ```
/// use dossier_types::{CaseId, EvidenceId};
///
/// let case = CaseId::new("C1").unwrap();
/// let a = EvidenceId::from_content(&case, "deadbeef");
/// let b = EvidenceId::from_content(&case, "deadbeef");
/// assert_eq!(a, b);
///
/// let other = CaseId::new("C2").unwrap();
/// assert_ne!(a, EvidenceId::from_content(&other, "deadbeef"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceId(Uuid);

impl EvidenceId {
    /// Derives a deterministic id from a case and a content hash.
    #[must_use]
    pub fn from_content(case: &CaseId, content_hash: &str) -> Self {
        let input = format!("{}:{}", case.as_str(), content_hash);
        Self(Uuid::new_v5(&DOSSIER_NAMESPACE, input.as_bytes()))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a handoff request.
///
/// Random per permission request; correlates the four handshake steps
/// (request, confirm, accept, complete) and appears on bus envelopes
/// emitted on behalf of that operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new random request id.
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a component participating on the signal bus.
///
/// A component is a functional domain boundary: the evidence locker, the
/// controller, the gateway, or a plugin adapter.
///
/// # UUID Strategy
///
/// - **Builtin components**: UUID v5 (deterministic from name)
/// - **Custom components**: UUID v4 (random per instance)
///
/// Builtin components therefore have consistent ids across processes,
/// which keeps event-log entries comparable between runs.
///
/// # Example
///
/// ```
/// use dossier_types::ComponentId;
///
/// let locker1 = ComponentId::builtin("locker");
/// let locker2 = ComponentId::builtin("locker");
/// assert_eq!(locker1, locker2);
///
/// let plugin1 = ComponentId::new("plugin", "ocr");
/// let plugin2 = ComponentId::new("plugin", "ocr");
/// assert_ne!(plugin1, plugin2);
/// assert!(plugin1.fqn_eq(&plugin2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentId {
    /// Globally unique identifier.
    pub uuid: Uuid,
    /// Namespace (e.g., "builtin", "plugin").
    pub namespace: String,
    /// Component name within the namespace.
    pub name: String,
}

impl ComponentId {
    /// Creates a new [`ComponentId`] with a random UUID v4.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Creates a builtin component id with a deterministic UUID v5.
    #[must_use]
    pub fn builtin(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            uuid: Uuid::new_v5(&DOSSIER_NAMESPACE, name.as_bytes()),
            namespace: "builtin".to_string(),
            name,
        }
    }

    /// Returns the fully qualified name in `namespace::name` format.
    #[must_use]
    pub fn fqn(&self) -> String {
        format!("{}::{}", self.namespace, self.name)
    }

    /// Compares two ids by FQN only, ignoring UUID.
    #[must_use]
    pub fn fqn_eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }

    /// Returns `true` if this is a builtin component.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.namespace == "builtin"
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fqn())
    }
}
