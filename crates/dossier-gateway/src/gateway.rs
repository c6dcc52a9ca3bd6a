//! The gateway orchestrator.

use dossier_bus::{SignalBus, SignalEnvelope, SignalName, SignalPayload};
use dossier_control::Controller;
use dossier_types::{CaseId, ComponentId, RequestId, SectionId};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::{BottleneckMonitor, GatewayConfig, GatewayError, RenderJob, SectionRenderer};

/// Result of a permission check.
///
/// A denial is a value, not an error: callers retry later, typically
/// after a predecessor completes.
#[derive(Debug, Clone)]
pub enum PrepareOutcome {
    /// Permission granted; run with this request id.
    Ready {
        /// Handshake correlation id.
        request_id: RequestId,
    },
    /// Not runnable yet.
    NotReady {
        /// Controller's denial reason.
        reason: String,
    },
}

/// Result of one section run attempt.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The section produced and published a draft.
    Completed {
        /// Section that ran.
        section_id: SectionId,
        /// Degraded-mode and tool warnings.
        warnings: Vec<String>,
    },
    /// The section was not runnable.
    NotReady {
        /// Section that was attempted.
        section_id: SectionId,
        /// Controller's denial reason.
        reason: String,
    },
}

/// Drives sections through the permission/evidence/render/publish
/// sequence.
///
/// The gateway reaches the locker only over the bus and mutates section
/// state only through the controller; its own state is limited to the
/// renderer registry, the bottleneck monitor, and the revision queue.
pub struct Gateway {
    id: ComponentId,
    bus: Arc<SignalBus>,
    controller: Arc<Controller>,
    default_renderer: Arc<dyn SectionRenderer>,
    section_renderers: HashMap<SectionId, Arc<dyn SectionRenderer>>,
    config: GatewayConfig,
    monitor: BottleneckMonitor,
    revision_tx: mpsc::UnboundedSender<(SectionId, String)>,
    revision_rx: Mutex<mpsc::UnboundedReceiver<(SectionId, String)>>,
}

impl Gateway {
    /// Creates a gateway with one default renderer for every section.
    #[must_use]
    pub fn new(
        bus: Arc<SignalBus>,
        controller: Arc<Controller>,
        default_renderer: Arc<dyn SectionRenderer>,
        config: GatewayConfig,
    ) -> Self {
        let (revision_tx, revision_rx) = mpsc::unbounded_channel();
        let monitor = BottleneckMonitor::new(config.stall_threshold());
        Self {
            id: ComponentId::builtin("gateway"),
            bus,
            controller,
            default_renderer,
            section_renderers: HashMap::new(),
            config,
            monitor,
            revision_tx,
            revision_rx: Mutex::new(revision_rx),
        }
    }

    /// The gateway's component id on the bus.
    #[must_use]
    pub fn component_id(&self) -> &ComponentId {
        &self.id
    }

    /// Installs a section-specific renderer. Call before sharing the
    /// gateway; later runs of that section use this adapter instead of
    /// the default.
    pub fn register_renderer(&mut self, section_id: SectionId, renderer: Arc<dyn SectionRenderer>) {
        self.section_renderers.insert(section_id, renderer);
    }

    /// Registers the gateway's bus handlers.
    ///
    /// `section.revision.requested` signals are enqueued here and
    /// drained by [`process_revisions`](Self::process_revisions) — the
    /// bus handler itself stays cheap.
    pub fn register_handlers(self: &Arc<Self>) {
        let gateway = Arc::clone(self);
        self.bus.register(
            SignalName::SectionRevisionRequested,
            self.id.clone(),
            Arc::new(move |envelope| {
                let SignalPayload::SectionRevisionRequested { section_id, reason } =
                    &envelope.payload
                else {
                    return Err("unexpected payload for section.revision.requested".into());
                };
                gateway
                    .revision_tx
                    .send((section_id.clone(), reason.clone()))
                    .map_err(|e| e.to_string())?;
                Ok(Value::Null)
            }),
        );
    }

    /// Checks whether a section may run.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Control`] for unknown case/section — a
    /// plain denial comes back as [`PrepareOutcome::NotReady`].
    pub fn prepare_section(
        &self,
        section_id: &SectionId,
        case_id: &CaseId,
    ) -> Result<PrepareOutcome, GatewayError> {
        let ticket = self.controller.request_permission(
            "run_section",
            self.id.clone(),
            section_id,
            case_id,
        )?;
        Ok(match ticket.request_id {
            Some(request_id) if ticket.granted => PrepareOutcome::Ready { request_id },
            _ => PrepareOutcome::NotReady {
                reason: ticket
                    .reason
                    .unwrap_or_else(|| "permission denied".to_string()),
            },
        })
    }

    /// Runs one section end to end.
    ///
    /// Fetches evidence over the bus, walks the handoff protocol,
    /// renders through the adapter seam, and publishes the result. When
    /// `auto_approve` is configured the draft is approved immediately
    /// after publishing.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::EvidenceUnavailable`] / [`GatewayError::InvalidBundle`]
    ///   when the bus request for evidence fails (the grant is released)
    /// - [`GatewayError::RenderFailed`] when the adapter fails (the
    ///   section returns to `ready` for retry)
    /// - [`GatewayError::Control`] for protocol violations
    pub async fn run_section(
        &self,
        section_id: &SectionId,
        case_id: &CaseId,
    ) -> Result<RunOutcome, GatewayError> {
        let request_id = match self.prepare_section(section_id, case_id)? {
            PrepareOutcome::Ready { request_id } => request_id,
            PrepareOutcome::NotReady { reason } => {
                return Ok(RunOutcome::NotReady {
                    section_id: section_id.clone(),
                    reason,
                });
            }
        };

        let evidence = match self.fetch_evidence(section_id, case_id, request_id) {
            Ok(evidence) => evidence,
            Err(e) => {
                // Release the grant so the section stays retryable.
                let _ = self.controller.complete_handoff(request_id, false);
                return Err(e);
            }
        };

        self.controller.mark_started(request_id)?;
        self.monitor.track(section_id.clone(), case_id.clone());
        self.controller
            .confirm(request_id, self.config.confirm_timeout())
            .await?;

        let contract = self.controller.contracts().get(section_id).ok_or_else(|| {
            GatewayError::Control(dossier_control::ControlError::UnknownSection(
                section_id.clone(),
            ))
        })?;
        let job = RenderJob {
            section_id: section_id.clone(),
            case_id: case_id.clone(),
            title: contract.title.clone(),
            evidence,
            metadata: json!({
                "case_id": case_id,
                "requested_tags": contract.required_evidence_tags,
            }),
        };

        let renderer = self
            .section_renderers
            .get(section_id)
            .unwrap_or(&self.default_renderer);

        let draft = match renderer.render(&job) {
            Ok(draft) => draft,
            Err(message) => {
                self.monitor.clear(section_id, case_id);
                self.controller.complete_handoff(request_id, false)?;
                return Err(GatewayError::RenderFailed {
                    section: section_id.clone(),
                    message,
                });
            }
        };
        let warnings = self.degraded_warnings(renderer.capabilities(), &job, draft.warnings.clone());

        self.controller.accept(request_id, draft.payload.clone())?;
        self.controller.complete_handoff(request_id, true)?;

        self.publish_result(
            section_id,
            case_id,
            json!({
                "draft": draft.payload,
                "warnings": warnings,
            }),
            Some(request_id),
        );

        if self.config.auto_approve {
            self.approve_section(section_id, case_id)?;
        }

        Ok(RunOutcome::Completed {
            section_id: section_id.clone(),
            warnings,
        })
    }

    /// Approves a published draft and stops stall tracking for it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Control`] when the section is not
    /// awaiting approval.
    pub fn approve_section(
        &self,
        section_id: &SectionId,
        case_id: &CaseId,
    ) -> Result<(), GatewayError> {
        self.controller.approve_section(section_id, case_id)?;
        self.monitor.clear(section_id, case_id);
        Ok(())
    }

    /// Publishes an enriched section result.
    ///
    /// Emits `section.data.updated` with the payload and
    /// `gateway.section.complete` so downstream listeners react without
    /// polling.
    pub fn publish_result(
        &self,
        section_id: &SectionId,
        case_id: &CaseId,
        payload: Value,
        request_id: Option<RequestId>,
    ) {
        let mut data = SignalEnvelope::new(
            SignalPayload::SectionDataUpdated {
                section_id: section_id.clone(),
                payload,
            },
            self.id.clone(),
        );
        if let Some(request_id) = request_id {
            data = data.with_request_id(request_id);
        }
        self.emit(data);

        self.emit(SignalEnvelope::new(
            SignalPayload::GatewaySectionComplete {
                section_id: section_id.clone(),
                case_id: case_id.clone(),
            },
            self.id.clone(),
        ));
    }

    /// Runs every currently runnable section once; with `auto_approve`
    /// the pass repeats as completions unlock dependents, driving the
    /// whole pipeline.
    ///
    /// # Errors
    ///
    /// Propagates the first [`run_section`](Self::run_section) failure.
    pub async fn run_ready_sections(
        &self,
        case_id: &CaseId,
    ) -> Result<Vec<RunOutcome>, GatewayError> {
        let mut outcomes = Vec::new();
        loop {
            let runnable = self.controller.runnable_sections(case_id);
            let mut progressed = false;

            for section_id in runnable {
                let outcome = self.run_section(&section_id, case_id).await?;
                if matches!(outcome, RunOutcome::Completed { .. }) {
                    progressed = true;
                }
                outcomes.push(outcome);
            }

            if !progressed || !self.config.auto_approve {
                return Ok(outcomes);
            }
        }
    }

    /// Drains the revision queue and reruns only the affected sections.
    ///
    /// Each queued revision is recorded with the controller (which
    /// enforces the rerun budget) and the section is rerun against its
    /// *current* evidence, which may have changed since the first pass.
    /// Sections past their budget are escalated by the controller and
    /// skipped here.
    pub async fn process_revisions(&self, case_id: &CaseId) -> Vec<RunOutcome> {
        let mut queued = Vec::new();
        {
            let mut rx = self.revision_rx.lock();
            while let Ok(entry) = rx.try_recv() {
                queued.push(entry);
            }
        }

        let mut outcomes = Vec::new();
        for (section_id, reason) in queued {
            tracing::info!(section = %section_id, %reason, "processing revision request");
            match self.controller.request_revision(&section_id, case_id) {
                Ok(_) => match self.run_section(&section_id, case_id).await {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => {
                        tracing::warn!(section = %section_id, error = %e, "revision rerun failed");
                    }
                },
                Err(e) => {
                    // Escalation (or protocol misuse) — the controller
                    // already surfaced it; the pipeline moves on.
                    tracing::warn!(section = %section_id, error = %e, "revision rejected");
                    self.monitor.clear(&section_id, case_id);
                }
            }
        }
        outcomes
    }

    /// Emits `section.stalled` for every tracked section past the
    /// threshold. Alert only; no state changes. Returns the number of
    /// alerts emitted.
    pub fn check_stalls(&self) -> usize {
        let stalled = self.monitor.stalled();
        for (case_id, section_id, elapsed) in &stalled {
            self.emit(SignalEnvelope::new(
                SignalPayload::SectionStalled {
                    section_id: section_id.clone(),
                    case_id: case_id.clone(),
                    in_flight_secs: elapsed.as_secs(),
                },
                self.id.clone(),
            ));
        }
        stalled.len()
    }

    /// Sections currently tracked by the bottleneck monitor.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.monitor.tracked()
    }

    /// Requests the section's evidence over the bus and parses the
    /// delivery bundle.
    fn fetch_evidence(
        &self,
        section_id: &SectionId,
        case_id: &CaseId,
        request_id: RequestId,
    ) -> Result<Vec<Value>, GatewayError> {
        let filters = self
            .controller
            .contracts()
            .get(section_id)
            .map(|c| c.required_evidence_tags.clone())
            .unwrap_or_default();

        let envelope = SignalEnvelope::new(
            SignalPayload::SectionNeeds {
                section_id: section_id.clone(),
                case_id: case_id.clone(),
                filters,
            },
            self.id.clone(),
        )
        .with_request_id(request_id);

        let answers = self
            .bus
            .send(&envelope)
            .map_err(|e| GatewayError::EvidenceUnavailable {
                section: section_id.clone(),
                reason: e.to_string(),
            })?;

        let bundle = answers
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::EvidenceUnavailable {
                section: section_id.clone(),
                reason: "all evidence handlers failed".into(),
            })?;

        serde_json::from_value(bundle).map_err(|e| GatewayError::InvalidBundle {
            section: section_id.clone(),
            reason: e.to_string(),
        })
    }

    /// Appends degraded-mode warnings for capabilities the adapter
    /// lacks. Missing tooling degrades output; it never fails the
    /// section.
    fn degraded_warnings(
        &self,
        caps: crate::RendererCapabilities,
        job: &RenderJob,
        mut warnings: Vec<String>,
    ) -> Vec<String> {
        let has_media = job.evidence.iter().any(|item| {
            item.get("classification")
                .and_then(|c| c.get("tags"))
                .and_then(Value::as_array)
                .is_some_and(|tags| {
                    tags.iter()
                        .any(|t| t.as_str() == Some("photo") || t.as_str() == Some("media"))
                })
        });

        if has_media && !caps.ocr {
            warnings.push(
                "text extraction unavailable; media exhibits attached without transcription"
                    .to_string(),
            );
        }
        if !caps.ai_narrative {
            warnings.push("narrative synthesis unavailable; structured summary only".to_string());
        }
        warnings
    }

    fn emit(&self, envelope: SignalEnvelope) {
        if let Err(e) = self.bus.emit(&envelope) {
            tracing::warn!(signal = envelope.name().as_str(), error = %e, "emit failed");
        }
    }
}
