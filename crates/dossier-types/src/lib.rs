//! Core types for the dossier report-coordination system.
//!
//! This crate is the bottom of the dependency stack: identifier types,
//! case status, and the unified [`ErrorCode`] interface that every
//! dossier error type implements.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  dossier-cli      : binary wiring                           │
//! │  dossier-gateway  : section orchestrator                    │
//! │  dossier-control  : permission + section state authority    │
//! │  dossier-locker   : evidence classification + manifest      │
//! │  dossier-bus      : signal dispatch + event log             │
//! │  dossier-types    : IDs, CaseStatus, ErrorCode  ◄── HERE    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Identifier Strategy
//!
//! | Type | Backing | Generation |
//! |------|---------|------------|
//! | [`CaseId`] | String | Caller-supplied (case number) |
//! | [`SectionId`] | String | Static contract configuration |
//! | [`EvidenceId`] | UUID | v5, deterministic from case + content hash |
//! | [`RequestId`] | UUID | v4, random per handoff |
//! | [`ComponentId`] | UUID + FQN | v5 for builtins, v4 for plugins |
//!
//! Deterministic evidence ids are what make ingestion idempotent: the
//! same bytes in the same case always map to the same [`EvidenceId`],
//! so a re-ingest can be answered with the existing item.

mod case;
mod error;
mod id;

pub use case::CaseStatus;
pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{CaseId, ComponentId, EvidenceId, RequestId, SectionId};
