//! The external tool adapter seam.
//!
//! Section tooling (OCR, AI narrative, billing calculators, PDF/DOCX
//! rendering) lives outside the coordination core. The gateway talks to
//! all of it through [`SectionRenderer`]: given a job, an adapter
//! returns a draft payload plus warnings. Adapters are swappable
//! without gateway changes, and the gateway never inspects tool-internal
//! formats beyond this contract.

use dossier_types::{CaseId, SectionId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// What an adapter can do.
///
/// Missing capabilities degrade output instead of failing the section:
/// the gateway attaches a warning and proceeds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RendererCapabilities {
    /// Text extraction from images/scans is available.
    pub ocr: bool,
    /// Narrative synthesis is available.
    pub ai_narrative: bool,
}

/// One rendering request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    /// Section being rendered.
    pub section_id: SectionId,
    /// Case scope.
    pub case_id: CaseId,
    /// Section title from the contract.
    pub title: String,
    /// Evidence bundle as delivered by the locker (opaque to the
    /// gateway beyond the delivery contract fields).
    pub evidence: Vec<Value>,
    /// Case metadata for the adapter.
    pub metadata: Value,
}

/// What an adapter returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedDraft {
    /// Draft payload for the section.
    pub payload: Value,
    /// Tool warnings to surface alongside the draft.
    pub warnings: Vec<String>,
}

/// External section tooling, behind one narrow contract.
///
/// Implementations must be `Send + Sync`; the gateway shares them
/// across runs.
pub trait SectionRenderer: Send + Sync {
    /// Capability flags used for degraded-mode warnings.
    fn capabilities(&self) -> RendererCapabilities {
        RendererCapabilities::default()
    }

    /// Produces a draft for the job.
    ///
    /// # Errors
    ///
    /// Returns a message describing the tool failure; the gateway
    /// releases the section for retry.
    fn render(&self, job: &RenderJob) -> Result<RenderedDraft, String>;
}

/// Structural renderer used in tests and unattended runs.
///
/// Produces a summary of the bundle with no external tooling, and
/// advertises no optional capabilities — which exercises the degraded
/// output path.
#[derive(Debug, Default)]
pub struct EchoRenderer;

impl EchoRenderer {
    /// Creates the renderer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SectionRenderer for EchoRenderer {
    fn render(&self, job: &RenderJob) -> Result<RenderedDraft, String> {
        let evidence_ids: Vec<Value> = job
            .evidence
            .iter()
            .filter_map(|item| item.get("evidence_id").cloned())
            .collect();

        Ok(RenderedDraft {
            payload: json!({
                "section_id": job.section_id,
                "title": job.title,
                "evidence_count": job.evidence.len(),
                "evidence_ids": evidence_ids,
            }),
            warnings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(evidence: Vec<Value>) -> RenderJob {
        RenderJob {
            section_id: SectionId::new("section_8").unwrap(),
            case_id: CaseId::new("C1").unwrap(),
            title: "Photo & Media Exhibits".into(),
            evidence,
            metadata: json!({}),
        }
    }

    #[test]
    fn echo_renderer_summarizes_bundle() {
        let renderer = EchoRenderer::new();
        let draft = renderer
            .render(&job(vec![
                json!({"evidence_id": "a", "content_hash": "h1"}),
                json!({"evidence_id": "b", "content_hash": "h2"}),
            ]))
            .unwrap();

        assert_eq!(draft.payload["evidence_count"], 2);
        assert_eq!(draft.payload["evidence_ids"], json!(["a", "b"]));
        assert!(draft.warnings.is_empty());
    }

    #[test]
    fn echo_renderer_has_no_optional_capabilities() {
        let caps = EchoRenderer::new().capabilities();
        assert!(!caps.ocr);
        assert!(!caps.ai_narrative);
    }

    #[test]
    fn empty_bundle_renders() {
        let draft = EchoRenderer::new().render(&job(vec![])).unwrap();
        assert_eq!(draft.payload["evidence_count"], 0);
    }
}
