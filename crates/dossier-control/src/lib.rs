//! Ecosystem controller for dossier.
//!
//! The controller is the single source of truth for two questions:
//!
//! 1. **May this operation proceed?** — permission requests are checked
//!    against the dependency graph, the case status, and the
//!    at-most-one-concurrent-execution rule.
//! 2. **Where is each section in its lifecycle?** — the controller is
//!    the only writer of section state.
//!
//! # Section State Machine
//!
//! ```text
//! Blocked → Ready → InProgress → AwaitingApproval → Approved
//!             ▲         │               │               │
//!             │         │ (run failed)  │ revision      │ revision
//!             │         ▼               ▼               ▼
//!             └──── (released)   RevisionRequested ──────┘
//!                                       │
//!                                       │ depth > max_reruns
//!                                       ▼
//!                                    Halted (terminal)
//! ```
//!
//! # Handoff Protocol
//!
//! Every cross-component operation follows four steps, recorded per
//! request in a [`HandoffRecord`]:
//!
//! | Step | Caller | Effect |
//! |------|--------|--------|
//! | `request_permission` | requester | grant or typed denial |
//! | `mark_started` / `confirm` | requester / supervisor | section → in progress |
//! | `accept` | requester | outcome recorded, section → awaiting approval |
//! | `complete_handoff` | requester | record closed, grant released |
//!
//! `confirm` is the supervision side: it blocks (up to a timeout) until
//! the requester's `mark_started` arrives, so callers that requested
//! permission but never proceeded are detected and their grant released.

mod contract;
mod controller;
mod error;
mod handoff;
mod state;

pub use contract::{ContractSet, SectionContract};
pub use controller::{Controller, PermissionTicket};
pub use error::ControlError;
pub use handoff::{HandoffOutcome, HandoffRecord};
pub use state::{SectionState, SectionStatus};
