//! End-to-end pipeline tests: locker, controller, and gateway wired
//! over one bus, driven the way the CLI drives them.

use dossier_bus::{ComponentId, SignalBus, SignalEnvelope, SignalName, SignalPayload};
use dossier_control::{ContractSet, Controller, SectionStatus};
use dossier_gateway::{EchoRenderer, Gateway, GatewayConfig, RunOutcome};
use dossier_locker::{EvidenceLocker, EvidenceStatus, ManifestStore, RuleTable};
use dossier_types::{CaseId, SectionId};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    bus: Arc<SignalBus>,
    locker: Arc<EvidenceLocker>,
    controller: Arc<Controller>,
    gateway: Arc<Gateway>,
    _store_dir: TempDir,
    files: TempDir,
}

fn case(id: &str) -> CaseId {
    CaseId::new(id).unwrap()
}

fn section(id: &str) -> SectionId {
    SectionId::new(id).unwrap()
}

fn harness(case_id: &str) -> Harness {
    let bus = Arc::new(SignalBus::new());
    let store_dir = TempDir::new().unwrap();
    let files = TempDir::new().unwrap();

    let locker = Arc::new(
        EvidenceLocker::open(
            Arc::clone(&bus),
            ManifestStore::new(store_dir.path()).unwrap(),
            RuleTable::builtin(),
            case(case_id),
        )
        .unwrap(),
    );
    locker.register_handlers();

    let controller = Arc::new(Controller::new(Arc::clone(&bus), ContractSet::standard()));
    controller.register_case(case(case_id));

    let gateway = Arc::new(Gateway::new(
        Arc::clone(&bus),
        Arc::clone(&controller),
        Arc::new(EchoRenderer::new()),
        GatewayConfig {
            auto_approve: true,
            ..GatewayConfig::default()
        },
    ));
    gateway.register_handlers();

    Harness {
        bus,
        locker,
        controller,
        gateway,
        _store_dir: store_dir,
        files,
    }
}

fn write_file(h: &Harness, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = h.files.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn ingest_and_classify(h: &Harness, name: &str, content: &[u8]) {
    let path = write_file(h, name, content);
    let item = h.locker.ingest(&path).unwrap();
    h.locker.classify(&item.evidence_id).unwrap();
}

#[tokio::test]
async fn full_pipeline_completes_every_section() {
    let h = harness("C1");

    ingest_and_classify(&h, "retainer_agreement.pdf", b"retainer agreement for case C1");
    ingest_and_classify(&h, "photo1.jpg", b"\x00jpeg-bytes");
    ingest_and_classify(&h, "surveillance_0800.txt", b"surveillance began at 0800");
    ingest_and_classify(&h, "invoice_march.xlsx", b"\x00spreadsheet-bytes");

    let outcomes = h.gateway.run_ready_sections(&case("C1")).await.unwrap();
    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, RunOutcome::Completed { .. }))
        .count();
    assert_eq!(completed, 8, "every section should complete");

    for contract in h.controller.contracts().iter() {
        assert_eq!(
            h.controller
                .section_status(&contract.section_id, &case("C1"))
                .unwrap(),
            SectionStatus::Approved,
            "section {} should be approved",
            contract.section_id
        );
    }

    let completes = h
        .bus
        .log_recent(200)
        .into_iter()
        .filter(|e| e.signal == SignalName::GatewaySectionComplete)
        .count();
    assert_eq!(completes, 8);
}

#[tokio::test]
async fn delivered_evidence_is_marked_on_the_manifest() {
    let h = harness("C1");
    ingest_and_classify(&h, "photo1.jpg", b"\x00jpeg-bytes");

    h.gateway.run_ready_sections(&case("C1")).await.unwrap();

    let snapshot = h.locker.snapshot();
    let delivered = snapshot
        .items()
        .filter(|i| i.status == EvidenceStatus::Delivered)
        .count();
    assert_eq!(delivered, 1, "the photo should have been delivered to section_8");
}

#[tokio::test]
async fn revision_reruns_against_current_evidence() {
    let h = harness("C1");
    ingest_and_classify(&h, "photo1.jpg", b"\x00jpeg-bytes");
    h.gateway.run_ready_sections(&case("C1")).await.unwrap();

    // New evidence lands after the first pass.
    ingest_and_classify(&h, "photo2.jpg", b"\x00other-jpeg-bytes");

    let envelope = SignalEnvelope::new(
        SignalPayload::SectionRevisionRequested {
            section_id: section("section_8"),
            reason: "second photo arrived".into(),
        },
        ComponentId::builtin("reviewer"),
    );
    h.bus.emit(&envelope).unwrap();

    let outcomes = h.gateway.process_revisions(&case("C1")).await;
    assert_eq!(outcomes.len(), 1);

    // The rerun saw both photos.
    let record_result = h
        .bus
        .log_recent(300)
        .into_iter()
        .filter(|e| e.signal == SignalName::EvidenceDeliver)
        .count();
    assert!(record_result >= 2, "section_8 evidence was re-fetched");

    let state = h
        .controller
        .section_state(&section("section_8"), &case("C1"))
        .unwrap();
    assert_eq!(state.revision_depth, 1);
    assert_eq!(state.status, SectionStatus::Approved);
}

#[tokio::test]
async fn new_case_starts_from_nothing() {
    let h = harness("C1");
    ingest_and_classify(&h, "photo1.jpg", b"\x00jpeg-bytes");
    h.gateway.run_ready_sections(&case("C1")).await.unwrap();
    assert_eq!(h.locker.evidence_count(), 1);

    h.locker.start_new_case(case("C2")).unwrap();
    h.controller.register_case(case("C2"));

    assert_eq!(h.locker.evidence_count(), 0);
    assert!(h
        .locker
        .evidence_for_section(&section("section_8"), &case("C2"))
        .unwrap()
        .is_empty());

    // The fresh case runs on its own (empty) evidence.
    let outcomes = h.gateway.run_ready_sections(&case("C2")).await.unwrap();
    assert!(outcomes
        .iter()
        .any(|o| matches!(o, RunOutcome::Completed { .. })));
}

#[tokio::test]
async fn closed_case_stops_the_pipeline() {
    let h = harness("C1");
    h.controller.close_case(&case("C1")).unwrap();

    let outcome = h
        .gateway
        .run_section(&section("section_1"), &case("C1"))
        .await
        .unwrap();
    match outcome {
        RunOutcome::NotReady { reason, .. } => assert!(reason.contains("closed")),
        other => panic!("expected NotReady, got {other:?}"),
    }
}
