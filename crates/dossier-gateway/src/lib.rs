//! Section orchestrator for dossier.
//!
//! The gateway drives the report pipeline end to end: it asks the
//! controller for permission, pulls evidence over the bus, hands the
//! bundle to an external renderer behind the [`SectionRenderer`] seam,
//! reports the outcome back through the handoff protocol, and publishes
//! the enriched result for downstream listeners.
//!
//! # Run Sequence
//!
//! ```text
//! prepare_section ──► Controller.request_permission
//!       │ granted
//!       ▼
//! bus.send(section.needs) ──► Locker answers with the bundle
//!       │
//!       ▼
//! Controller.mark_started + confirm      (section → in_progress)
//!       │
//!       ▼
//! SectionRenderer.render(job)            (external tooling)
//!       │
//!       ▼
//! Controller.accept + complete_handoff   (section → awaiting_approval)
//!       │
//!       ▼
//! publish_result: section.data.updated, gateway.section.complete
//! ```
//!
//! The gateway never holds a direct reference to the locker — evidence
//! travels over the bus — and never writes section state itself; every
//! state change goes through the controller.

mod config;
mod error;
mod gateway;
mod monitor;
mod renderer;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use gateway::{Gateway, PrepareOutcome, RunOutcome};
pub use monitor::BottleneckMonitor;
pub use renderer::{EchoRenderer, RenderJob, RenderedDraft, RendererCapabilities, SectionRenderer};
