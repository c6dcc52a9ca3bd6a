//! The evidence locker component.

use dossier_bus::{SignalBus, SignalEnvelope, SignalName, SignalPayload};
use dossier_types::{CaseId, ComponentId, EvidenceId, SectionId};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::{
    Classification, EvidenceItem, EvidenceManifest, EvidenceStatus, LockerError, ManifestStore,
    RuleTable,
};

/// Bytes of file content sampled for keyword heuristics.
const CONTENT_SAMPLE_BYTES: usize = 4096;

/// The evidence locker: ingestion, classification, and the manifest.
///
/// All reads and writes of the manifest go through one mutex scoped to
/// this instance; durable writes are applied read-modify-write with the
/// lock held, through the store's atomic temp-then-rename path.
///
/// Signals are emitted after the lock is released, so a handler that
/// calls back into the locker cannot deadlock.
///
/// # Example
///
/// ```no_run
/// use dossier_bus::SignalBus;
/// use dossier_locker::{EvidenceLocker, ManifestStore, RuleTable};
/// use dossier_types::CaseId;
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = Arc::new(SignalBus::new());
/// let store = ManifestStore::new("/var/lib/dossier/C1")?;
/// let case = CaseId::new("C1").unwrap();
/// let locker = EvidenceLocker::open(bus, store, RuleTable::builtin(), case)?;
///
/// let item = locker.ingest("photo1.jpg".as_ref())?;
/// let classification = locker.classify(&item.evidence_id)?;
/// println!("assigned to {}", classification.assigned_section);
/// # Ok(())
/// # }
/// ```
pub struct EvidenceLocker {
    id: ComponentId,
    bus: Arc<SignalBus>,
    store: ManifestStore,
    rules: RuleTable,
    manifest: Mutex<EvidenceManifest>,
}

impl EvidenceLocker {
    /// Opens the locker for a case, adopting a previously persisted
    /// manifest when one exists.
    ///
    /// # Errors
    ///
    /// - [`LockerError::ManifestCorruption`] if the stored document
    ///   fails validation (the locker refuses to start)
    /// - [`LockerError::CaseMismatch`] if the stored manifest belongs to
    ///   a different case; call [`start_new_case`](Self::start_new_case)
    ///   to clear it explicitly
    pub fn open(
        bus: Arc<SignalBus>,
        store: ManifestStore,
        rules: RuleTable,
        case_id: CaseId,
    ) -> Result<Self, LockerError> {
        let manifest = match store.load()? {
            Some(existing) if existing.case_id() == &case_id => existing,
            Some(existing) => {
                return Err(LockerError::CaseMismatch {
                    current: existing.case_id().clone(),
                    requested: case_id,
                });
            }
            None => EvidenceManifest::new(case_id),
        };

        Ok(Self {
            id: ComponentId::builtin("locker"),
            bus,
            store,
            rules,
            manifest: Mutex::new(manifest),
        })
    }

    /// The locker's component id on the bus.
    #[must_use]
    pub fn component_id(&self) -> &ComponentId {
        &self.id
    }

    /// Case currently held.
    #[must_use]
    pub fn case_id(&self) -> CaseId {
        self.manifest.lock().case_id().clone()
    }

    /// Current manifest version.
    #[must_use]
    pub fn manifest_version(&self) -> u64 {
        self.manifest.lock().version()
    }

    /// Number of evidence items in the current case.
    #[must_use]
    pub fn evidence_count(&self) -> usize {
        self.manifest.lock().evidence_count()
    }

    /// Returns a point-in-time copy of the manifest (CLI inspection).
    #[must_use]
    pub fn snapshot(&self) -> EvidenceManifest {
        self.manifest.lock().clone()
    }

    /// Ingests a file into the current case.
    ///
    /// Content is hashed for dedup: re-ingesting identical bytes returns
    /// the existing item without creating a duplicate or bumping the
    /// manifest version. A first ingest persists the manifest and emits
    /// `evidence.new`.
    ///
    /// # Errors
    ///
    /// - [`LockerError::Io`] if the file cannot be read
    /// - [`LockerError::EmptyFile`] for zero-byte input
    pub fn ingest(&self, file_ref: &Path) -> Result<EvidenceItem, LockerError> {
        let bytes = fs::read(file_ref).map_err(|source| LockerError::Io {
            path: file_ref.display().to_string(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(LockerError::EmptyFile(file_ref.display().to_string()));
        }

        let content_hash = hex::encode(Sha256::digest(&bytes));

        let item = {
            let mut manifest = self.manifest.lock();

            if let Some(existing) = manifest.find_by_hash(&content_hash) {
                tracing::debug!(
                    evidence_id = %existing.evidence_id,
                    path = %file_ref.display(),
                    "duplicate content; returning existing item"
                );
                return Ok(existing.clone());
            }

            let case_id = manifest.case_id().clone();
            let item = EvidenceItem {
                evidence_id: EvidenceId::from_content(&case_id, &content_hash),
                file_ref: file_ref.to_path_buf(),
                content_hash,
                classification: None,
                status: EvidenceStatus::Ingested,
                created_at: chrono::Utc::now(),
                case_id,
            };
            manifest.insert(item.clone());
            self.store.save(&manifest)?;
            item
        };

        self.emit(SignalPayload::EvidenceNew {
            evidence_id: item.evidence_id,
            case_id: item.case_id.clone(),
        });
        Ok(item)
    }

    /// Classifies an ingested item with the rule table.
    ///
    /// On success the classification is written back onto the item, the
    /// item moves to `indexed`, and `evidence.updated` is emitted. When
    /// no rule matches (or the file is unreadable), the item keeps
    /// status `ingested` with no classification, `evidence.manual_review`
    /// is emitted, and [`LockerError::ClassificationFailure`] is
    /// returned — the pipeline continues, a human resolves the item.
    ///
    /// # Errors
    ///
    /// - [`LockerError::UnknownEvidence`] for an id not in this case
    /// - [`LockerError::ClassificationFailure`] as described above
    pub fn classify(&self, evidence_id: &EvidenceId) -> Result<Classification, LockerError> {
        let (file_ref, case_id) = {
            let manifest = self.manifest.lock();
            let item = manifest
                .get(evidence_id)
                .ok_or(LockerError::UnknownEvidence(*evidence_id))?;
            (item.file_ref.clone(), item.case_id.clone())
        };

        let file_name = file_ref
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sample = read_content_sample(&file_ref);

        let classification = self.rules.classify(&file_name, sample.as_deref());

        let mut manifest = self.manifest.lock();
        match classification {
            Some(classification) => {
                manifest.set_classification(evidence_id, Some(classification.clone()));
                self.store.save(&manifest)?;
                drop(manifest);

                self.emit(SignalPayload::EvidenceUpdated {
                    evidence_id: *evidence_id,
                });
                Ok(classification)
            }
            None => {
                let reason = format!("no classification rule matched '{file_name}'");
                manifest.set_classification(evidence_id, None);
                self.store.save(&manifest)?;
                drop(manifest);

                self.emit(SignalPayload::EvidenceManualReview {
                    evidence_id: *evidence_id,
                    case_id,
                    reason: reason.clone(),
                });
                Err(LockerError::ClassificationFailure {
                    evidence_id: *evidence_id,
                    reason,
                })
            }
        }
    }

    /// Returns the evidence indexed for a section, in index order,
    /// marking the returned items as delivered.
    ///
    /// The result reflects the manifest's current version: a completed
    /// write is always visible to the next read because both go through
    /// the same mutex.
    ///
    /// # Errors
    ///
    /// Returns [`LockerError::CaseMismatch`] if `case_id` is not the
    /// case the locker currently holds.
    pub fn evidence_for_section(
        &self,
        section_id: &SectionId,
        case_id: &CaseId,
    ) -> Result<Vec<EvidenceItem>, LockerError> {
        let items = {
            let mut manifest = self.manifest.lock();
            if manifest.case_id() != case_id {
                return Err(LockerError::CaseMismatch {
                    current: manifest.case_id().clone(),
                    requested: case_id.clone(),
                });
            }

            let ids = manifest.section_items(section_id);
            manifest.mark_delivered(&ids);
            self.store.save(&manifest)?;

            ids.iter()
                .filter_map(|id| manifest.get(id).cloned())
                .collect::<Vec<_>>()
        };

        self.emit(SignalPayload::EvidenceDeliver {
            section_id: section_id.clone(),
            items: items.iter().map(|i| i.evidence_id).collect(),
        });
        Ok(items)
    }

    /// Clears all state of the previous case and begins a new one.
    ///
    /// Both the in-memory manifest and the durable copy are replaced
    /// before any new ingest is accepted; nothing from the previous case
    /// remains retrievable.
    ///
    /// # Errors
    ///
    /// Returns [`LockerError::Io`] if the durable state cannot be
    /// replaced.
    pub fn start_new_case(&self, case_id: CaseId) -> Result<(), LockerError> {
        let mut manifest = self.manifest.lock();
        tracing::info!(
            previous = %manifest.case_id(),
            next = %case_id,
            "starting new case; clearing previous evidence state"
        );
        self.store.clear()?;
        *manifest = EvidenceManifest::new(case_id);
        self.store.save(&manifest)?;
        Ok(())
    }

    /// Registers the locker's `section.needs` answering handler.
    ///
    /// The gateway never holds a direct reference to the locker: it
    /// sends `section.needs` on the bus and this handler answers with
    /// the serialized evidence bundle (optionally filtered by tags).
    pub fn register_handlers(self: &Arc<Self>) {
        let locker = Arc::clone(self);
        self.bus.register(
            SignalName::SectionNeeds,
            self.id.clone(),
            Arc::new(move |envelope| {
                let SignalPayload::SectionNeeds {
                    section_id,
                    case_id,
                    filters,
                } = &envelope.payload
                else {
                    return Err("unexpected payload for section.needs".into());
                };

                let items = locker
                    .evidence_for_section(section_id, case_id)
                    .map_err(|e| e.to_string())?;

                let filtered: Vec<&EvidenceItem> = items
                    .iter()
                    .filter(|item| matches_filters(item, filters))
                    .collect();

                serde_json::to_value(&filtered).map_err(|e| e.to_string())
            }),
        );
    }

    fn emit(&self, payload: SignalPayload) {
        let envelope = SignalEnvelope::new(payload, self.id.clone());
        if let Err(e) = self.bus.emit(&envelope) {
            tracing::warn!(signal = envelope.name().as_str(), error = %e, "emit failed");
        }
    }
}

/// Keeps an item when no filters are given, or when any of its tags
/// matches a filter.
fn matches_filters(item: &EvidenceItem, filters: &[String]) -> bool {
    if filters.is_empty() {
        return true;
    }
    item.classification
        .as_ref()
        .is_some_and(|c| c.tags.iter().any(|tag| filters.contains(tag)))
}

/// Reads a UTF-8 sample of the file head for keyword heuristics.
///
/// Binary content (anything with a NUL in the sampled window) yields no
/// sample, so image bytes never accidentally match a keyword.
fn read_content_sample(path: &Path) -> Option<String> {
    let bytes = fs::read(path).ok()?;
    let window = &bytes[..bytes.len().min(CONTENT_SAMPLE_BYTES)];
    if window.contains(&0) {
        return None;
    }
    Some(String::from_utf8_lossy(window).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(case: &str) -> (Arc<SignalBus>, Arc<EvidenceLocker>, TempDir, TempDir) {
        let bus = Arc::new(SignalBus::new());
        let store_dir = TempDir::new().unwrap();
        let file_dir = TempDir::new().unwrap();
        let store = ManifestStore::new(store_dir.path()).unwrap();
        let locker = Arc::new(
            EvidenceLocker::open(
                Arc::clone(&bus),
                store,
                RuleTable::builtin(),
                CaseId::new(case).unwrap(),
            )
            .unwrap(),
        );
        (bus, locker, store_dir, file_dir)
    }

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn ingest_is_idempotent_per_content() {
        let (_bus, locker, _store, files) = setup("C1");
        let path = write_file(&files, "photo1.jpg", b"jpeg bytes");

        let first = locker.ingest(&path).unwrap();
        let count = locker.evidence_count();
        let version = locker.manifest_version();

        // Same bytes under a different name: same id, nothing new.
        let copy = write_file(&files, "photo1_copy.jpg", b"jpeg bytes");
        let second = locker.ingest(&copy).unwrap();

        assert_eq!(first.evidence_id, second.evidence_id);
        assert_eq!(locker.evidence_count(), count);
        assert_eq!(locker.manifest_version(), version);
    }

    #[test]
    fn ingest_emits_evidence_new_once() {
        let (bus, locker, _store, files) = setup("C1");
        let path = write_file(&files, "photo1.jpg", b"jpeg bytes");

        locker.ingest(&path).unwrap();
        locker.ingest(&path).unwrap();

        let emits: Vec<_> = bus
            .log_recent(10)
            .into_iter()
            .filter(|e| e.signal == SignalName::EvidenceNew)
            .collect();
        assert_eq!(emits.len(), 1);
    }

    #[test]
    fn empty_file_rejected() {
        let (_bus, locker, _store, files) = setup("C1");
        let path = write_file(&files, "empty.jpg", b"");

        assert!(matches!(
            locker.ingest(&path),
            Err(LockerError::EmptyFile(_))
        ));
    }

    #[test]
    fn classify_photo_lands_in_section_8() {
        let (_bus, locker, _store, files) = setup("C1");
        let path = write_file(&files, "photo1.jpg", b"jpeg bytes");
        let item = locker.ingest(&path).unwrap();

        let classification = locker.classify(&item.evidence_id).unwrap();
        assert_eq!(classification.assigned_section.as_str(), "section_8");

        let section = SectionId::new("section_8").unwrap();
        let case = CaseId::new("C1").unwrap();
        let delivered = locker.evidence_for_section(&section, &case).unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].status, EvidenceStatus::Delivered);
    }

    #[test]
    fn unclassifiable_goes_to_manual_review() {
        let (bus, locker, _store, files) = setup("C1");
        let path = write_file(&files, "mystery.zzz", b"\x00\x01\x02");
        let item = locker.ingest(&path).unwrap();

        let err = locker.classify(&item.evidence_id).unwrap_err();
        assert!(matches!(err, LockerError::ClassificationFailure { .. }));

        // Item retained, unclassified, and the review signal went out.
        let snapshot = locker.snapshot();
        let stored = snapshot.get(&item.evidence_id).unwrap();
        assert_eq!(stored.status, EvidenceStatus::Ingested);
        assert!(stored.classification.is_none());

        assert!(bus
            .log_recent(10)
            .iter()
            .any(|e| e.signal == SignalName::EvidenceManualReview));
    }

    #[test]
    fn manifest_version_monotonic_across_operations() {
        let (_bus, locker, _store, files) = setup("C1");
        let path = write_file(&files, "photo1.jpg", b"jpeg bytes");

        let v0 = locker.manifest_version();
        let item = locker.ingest(&path).unwrap();
        let v1 = locker.manifest_version();
        locker.classify(&item.evidence_id).unwrap();
        let v2 = locker.manifest_version();

        assert!(v0 < v1 && v1 < v2);
    }

    #[test]
    fn new_case_clears_previous_evidence() {
        let (_bus, locker, _store, files) = setup("C1");
        let path = write_file(&files, "photo1.jpg", b"jpeg bytes");
        let item = locker.ingest(&path).unwrap();
        locker.classify(&item.evidence_id).unwrap();

        locker.start_new_case(CaseId::new("C2").unwrap()).unwrap();

        assert_eq!(locker.evidence_count(), 0);
        let section = SectionId::new("section_8").unwrap();
        let c2 = CaseId::new("C2").unwrap();
        assert!(locker.evidence_for_section(&section, &c2).unwrap().is_empty());
        assert!(locker.snapshot().get(&item.evidence_id).is_none());
    }

    #[test]
    fn wrong_case_lookup_is_rejected() {
        let (_bus, locker, _store, _files) = setup("C1");
        let section = SectionId::new("section_8").unwrap();
        let other = CaseId::new("C9").unwrap();

        assert!(matches!(
            locker.evidence_for_section(&section, &other),
            Err(LockerError::CaseMismatch { .. })
        ));
    }

    #[test]
    fn section_needs_handler_answers_with_bundle() {
        let (bus, locker, _store, files) = setup("C1");
        locker.register_handlers();

        let path = write_file(&files, "photo1.jpg", b"jpeg bytes");
        let item = locker.ingest(&path).unwrap();
        locker.classify(&item.evidence_id).unwrap();

        let envelope = SignalEnvelope::new(
            SignalPayload::SectionNeeds {
                section_id: SectionId::new("section_8").unwrap(),
                case_id: CaseId::new("C1").unwrap(),
                filters: vec![],
            },
            ComponentId::builtin("gateway"),
        );
        let answers = bus.send(&envelope).unwrap();

        assert_eq!(answers.len(), 1);
        let bundle: Vec<EvidenceItem> = serde_json::from_value(answers[0].clone()).unwrap();
        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle[0].evidence_id, item.evidence_id);
    }

    #[test]
    fn filters_restrict_bundle_by_tag() {
        let (bus, locker, _store, files) = setup("C1");
        locker.register_handlers();

        let photo = write_file(&files, "photo1.jpg", b"jpeg bytes");
        let item = locker.ingest(&photo).unwrap();
        locker.classify(&item.evidence_id).unwrap();

        let envelope = SignalEnvelope::new(
            SignalPayload::SectionNeeds {
                section_id: SectionId::new("section_8").unwrap(),
                case_id: CaseId::new("C1").unwrap(),
                filters: vec!["billing".into()],
            },
            ComponentId::builtin("gateway"),
        );
        let answers = bus.send(&envelope).unwrap();
        let bundle: Vec<EvidenceItem> = serde_json::from_value(answers[0].clone()).unwrap();
        assert!(bundle.is_empty());
    }

    #[test]
    fn reopen_adopts_persisted_manifest() {
        let bus = Arc::new(SignalBus::new());
        let store_dir = TempDir::new().unwrap();
        let files = TempDir::new().unwrap();
        let case = CaseId::new("C1").unwrap();

        let version = {
            let store = ManifestStore::new(store_dir.path()).unwrap();
            let locker = EvidenceLocker::open(
                Arc::clone(&bus),
                store,
                RuleTable::builtin(),
                case.clone(),
            )
            .unwrap();
            let path = files.path().join("photo1.jpg");
            fs::write(&path, b"jpeg bytes").unwrap();
            locker.ingest(&path).unwrap();
            locker.manifest_version()
        };

        let store = ManifestStore::new(store_dir.path()).unwrap();
        let reopened =
            EvidenceLocker::open(bus, store, RuleTable::builtin(), case).unwrap();
        assert_eq!(reopened.manifest_version(), version);
        assert_eq!(reopened.evidence_count(), 1);
    }

    #[test]
    fn reopen_with_other_case_requires_explicit_new_case() {
        let bus = Arc::new(SignalBus::new());
        let store_dir = TempDir::new().unwrap();
        let case1 = CaseId::new("C1").unwrap();

        {
            let store = ManifestStore::new(store_dir.path()).unwrap();
            let locker = EvidenceLocker::open(
                Arc::clone(&bus),
                store,
                RuleTable::builtin(),
                case1,
            )
            .unwrap();
            // Persist the empty manifest for C1.
            locker.start_new_case(CaseId::new("C1").unwrap()).unwrap();
        }

        let store = ManifestStore::new(store_dir.path()).unwrap();
        let result = EvidenceLocker::open(
            bus,
            store,
            RuleTable::builtin(),
            CaseId::new("C2").unwrap(),
        );
        assert!(matches!(result, Err(LockerError::CaseMismatch { .. })));
    }
}
