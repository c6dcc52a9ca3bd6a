//! Signal bus for dossier.
//!
//! This crate provides the synchronous publish/subscribe hub that all
//! dossier components communicate through: the typed signal catalog, the
//! handler registry, and the append-only event log.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         SignalBus                            │
//! │   - handler registry (name → ordered handlers)               │
//! │   - emit: fire-and-forget fan-out                            │
//! │   - send: fan-out, collect returns                           │
//! │   - event log (one entry per emit, always)                   │
//! └──────────────────────────────────────────────────────────────┘
//!        ▲               ▲               ▲
//!        │               │               │
//!   ┌─────────┐    ┌───────────┐    ┌─────────┐
//!   │ Locker  │    │ Controller│    │ Gateway │
//!   └─────────┘    └───────────┘    └─────────┘
//! ```
//!
//! # Dispatch Semantics
//!
//! | Call | Return | Failure of one handler |
//! |------|--------|------------------------|
//! | [`SignalBus::emit`] | [`EmitOutcome`] | Logged, siblings still run |
//! | [`SignalBus::send`] | `Vec<Value>` of successes | Logged, siblings still run |
//!
//! Handlers run synchronously on the calling thread in registration
//! order. Handlers that do meaningful work should hand it off to their
//! own worker threads rather than blocking the bus.
//!
//! # No Replay
//!
//! Signals themselves are not persisted; only the event-log entry
//! survives an emit, and the log is an in-memory rolling buffer. Replay
//! across restarts is a non-goal.

mod bus;
mod error;
mod log;
mod signal;

pub use bus::{HandlerResult, SignalBus, SignalHandler};
pub use error::BusError;
pub use log::{EmitOutcome, EventLog, EventLogEntry, DEFAULT_LOG_CAPACITY};
pub use signal::{SignalEnvelope, SignalName, SignalPayload};

// Re-export for downstream convenience.
pub use dossier_types::ComponentId;
