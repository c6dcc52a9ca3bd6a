//! Evidence Locker for dossier.
//!
//! The locker owns the only durable store of evidence in the system. It
//! ingests raw files, classifies them into section assignments, serves
//! them back on section request, and keeps the versioned manifest safe
//! across crashes.
//!
//! # Data Flow
//!
//! ```text
//! file on disk
//!     │ ingest (hash, dedup)
//!     ▼
//! EvidenceItem { status: Ingested }
//!     │ classify (rule table, deterministic)
//!     ▼
//! EvidenceItem { status: Indexed, classification }
//!     │ evidence_for_section
//!     ▼
//! EvidenceItem { status: Delivered }  → section run
//! ```
//!
//! # Durability
//!
//! The manifest is persisted as a single JSON document with an embedded
//! schema version. Writes go to a temp file first and are renamed into
//! place, so a crash mid-write cannot corrupt the on-disk copy. An
//! absent file is a fresh case; a schema mismatch refuses to load —
//! evidence is never silently reset to empty.
//!
//! # Case Isolation
//!
//! All state is scoped to exactly one case at a time.
//! [`EvidenceLocker::start_new_case`] clears both the in-memory and the
//! durable state of the previous case before accepting new ingests.

mod error;
mod evidence;
mod locker;
mod manifest;
mod rules;
mod store;

pub use error::LockerError;
pub use evidence::{
    Classification, ClassificationMethod, EvidenceItem, EvidenceStatus, EvidenceType,
};
pub use locker::EvidenceLocker;
pub use manifest::{EvidenceManifest, SCHEMA_VERSION};
pub use rules::{ExtensionRule, KeywordRule, RuleTable};
pub use store::ManifestStore;
