//! The controller: permission arbitration and section state.

use dossier_bus::{SignalBus, SignalEnvelope, SignalPayload};
use dossier_types::{CaseId, CaseStatus, ComponentId, RequestId, SectionId};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::{
    ContractSet, ControlError, HandoffOutcome, HandoffRecord, SectionState, SectionStatus,
};

/// Answer to a permission request.
///
/// A denial is data, not an error: the caller is expected to retry
/// later, typically after a predecessor section completes.
#[derive(Debug, Clone)]
pub struct PermissionTicket {
    /// Whether the operation may proceed.
    pub granted: bool,
    /// Handshake correlation id, present when granted.
    pub request_id: Option<RequestId>,
    /// Why the request was denied, present when not granted.
    pub reason: Option<String>,
}

impl PermissionTicket {
    fn granted(request_id: RequestId) -> Self {
        Self {
            granted: true,
            request_id: Some(request_id),
            reason: None,
        }
    }

    fn denied(reason: impl Into<String>) -> Self {
        Self {
            granted: false,
            request_id: None,
            reason: Some(reason.into()),
        }
    }

    /// Returns `true` if the permission was granted.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        self.granted
    }
}

struct HandoffEntry {
    record: HandoffRecord,
    case_id: CaseId,
    section_id: SectionId,
    started_tx: Option<oneshot::Sender<()>>,
    started_rx: Option<oneshot::Receiver<()>>,
}

#[derive(Default)]
struct Registry {
    cases: HashMap<CaseId, CaseStatus>,
    sections: HashMap<(CaseId, SectionId), SectionState>,
    active_grants: HashMap<(CaseId, SectionId), RequestId>,
    handoffs: HashMap<RequestId, HandoffEntry>,
}

/// Permission and section-state authority.
///
/// One instance per process, constructed before every other component
/// and shared by [`Arc`]. All registry access goes through one mutex;
/// the critical sections contain no I/O, and the mutex also delivers
/// the required serialization of permission decisions per
/// `(case, section)` — two grants for the same section can never
/// overlap because both pass through the same lock and check the same
/// active-grant map.
///
/// # Example
///
/// ```
/// use dossier_bus::SignalBus;
/// use dossier_control::{ContractSet, Controller};
/// use dossier_types::{CaseId, ComponentId};
/// use std::sync::Arc;
///
/// let bus = Arc::new(SignalBus::new());
/// let controller = Controller::new(bus, ContractSet::standard());
///
/// let case = CaseId::new("C1").unwrap();
/// controller.register_case(case.clone());
///
/// // section_1 has no predecessors: immediately runnable.
/// let ticket = controller
///     .request_permission(
///         "run_section",
///         ComponentId::builtin("gateway"),
///         &dossier_types::SectionId::new("section_1").unwrap(),
///         &case,
///     )
///     .unwrap();
/// assert!(ticket.is_granted());
///
/// // section_3 waits on section_2.
/// let ticket = controller
///     .request_permission(
///         "run_section",
///         ComponentId::builtin("gateway"),
///         &dossier_types::SectionId::new("section_3").unwrap(),
///         &case,
///     )
///     .unwrap();
/// assert!(!ticket.is_granted());
/// ```
pub struct Controller {
    id: ComponentId,
    bus: Arc<SignalBus>,
    contracts: ContractSet,
    registry: Mutex<Registry>,
}

impl Controller {
    /// Creates a controller over a validated contract set.
    #[must_use]
    pub fn new(bus: Arc<SignalBus>, contracts: ContractSet) -> Self {
        Self {
            id: ComponentId::builtin("controller"),
            bus,
            contracts,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// The controller's component id on the bus.
    #[must_use]
    pub fn component_id(&self) -> &ComponentId {
        &self.id
    }

    /// The contract set the controller enforces.
    #[must_use]
    pub fn contracts(&self) -> &ContractSet {
        &self.contracts
    }

    /// Registers a case, creating section states for every contract.
    ///
    /// Sections without predecessors start `ready`; the rest start
    /// `blocked`. Re-registering an existing case is a no-op so state
    /// is never wiped by accident.
    pub fn register_case(&self, case_id: CaseId) {
        let mut registry = self.registry.lock();
        if registry.cases.contains_key(&case_id) {
            return;
        }
        registry.cases.insert(case_id.clone(), CaseStatus::Active);
        for contract in self.contracts.iter() {
            let status = if contract.predecessors.is_empty() {
                SectionStatus::Ready
            } else {
                SectionStatus::Blocked
            };
            registry.sections.insert(
                (case_id.clone(), contract.section_id.clone()),
                SectionState::new(contract.section_id.clone(), case_id.clone(), status),
            );
        }
        tracing::info!(case = %case_id, sections = self.contracts.len(), "case registered");
    }

    /// Closes a case; every future permission request for it is denied.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownCase`] if the case was never
    /// registered.
    pub fn close_case(&self, case_id: &CaseId) -> Result<(), ControlError> {
        let mut registry = self.registry.lock();
        match registry.cases.get_mut(case_id) {
            Some(status) => {
                *status = CaseStatus::Closed;
                Ok(())
            }
            None => Err(ControlError::UnknownCase(case_id.clone())),
        }
    }

    /// Validates whether a section may run and, if so, grants it.
    ///
    /// Denial reasons (returned as a ticket, not an error):
    ///
    /// - the case is closed
    /// - a predecessor section is not yet `approved`
    /// - the section already holds an active grant (at most one
    ///   concurrent execution per section per case)
    /// - the section is not in a runnable status
    ///
    /// # Errors
    ///
    /// - [`ControlError::UnknownCase`] for an unregistered case
    /// - [`ControlError::UnknownSection`] for a section no contract
    ///   defines
    pub fn request_permission(
        &self,
        operation: &str,
        requester: ComponentId,
        section_id: &SectionId,
        case_id: &CaseId,
    ) -> Result<PermissionTicket, ControlError> {
        let mut registry = self.registry.lock();

        let case_status = registry
            .cases
            .get(case_id)
            .copied()
            .ok_or_else(|| ControlError::UnknownCase(case_id.clone()))?;
        if !case_status.is_active() {
            return Ok(PermissionTicket::denied(format!("case {case_id} is closed")));
        }

        let contract = self
            .contracts
            .get(section_id)
            .ok_or_else(|| ControlError::UnknownSection(section_id.clone()))?;

        // Dependency ordering: every predecessor must be approved.
        for pred in &contract.predecessors {
            let pred_status = registry
                .sections
                .get(&(case_id.clone(), pred.clone()))
                .map(|s| s.status)
                .ok_or_else(|| ControlError::UnknownSection(pred.clone()))?;
            if pred_status != SectionStatus::Approved {
                return Ok(PermissionTicket::denied(format!(
                    "predecessor {pred} is {pred_status}, not approved"
                )));
            }
        }

        // At most one concurrent execution per (case, section).
        if let Some(holder) = registry.active_grants.get(&(case_id.clone(), section_id.clone())) {
            return Ok(PermissionTicket::denied(format!(
                "section already granted to request {holder}"
            )));
        }

        let key = (case_id.clone(), section_id.clone());
        let state = registry
            .sections
            .get_mut(&key)
            .ok_or_else(|| ControlError::UnknownSection(section_id.clone()))?;

        // Predecessors just approved may leave the section still marked
        // blocked; promote it before the runnable check.
        if state.status == SectionStatus::Blocked {
            let _ = state.transition(SectionStatus::Ready);
        }
        if !state.status.is_runnable() {
            return Ok(PermissionTicket::denied(format!(
                "section is {}, not runnable",
                state.status
            )));
        }

        let request_id = RequestId::new();
        let (started_tx, started_rx) = oneshot::channel();
        registry.handoffs.insert(
            request_id,
            HandoffEntry {
                record: HandoffRecord::granted(operation, requester, request_id),
                case_id: case_id.clone(),
                section_id: section_id.clone(),
                started_tx: Some(started_tx),
                started_rx: Some(started_rx),
            },
        );
        registry.active_grants.insert(key, request_id);

        tracing::debug!(
            %request_id,
            section = %section_id,
            case = %case_id,
            operation,
            "permission granted"
        );
        Ok(PermissionTicket::granted(request_id))
    }

    /// Requester side of confirm: reports that execution began.
    ///
    /// Moves the section to `in_progress` and releases any supervisor
    /// blocked in [`confirm`](Self::confirm).
    ///
    /// # Errors
    ///
    /// - [`ControlError::UnknownRequest`] for a stale id
    /// - [`ControlError::PermissionDenied`] if the grant was released
    ///   (e.g., after a confirm timeout)
    /// - [`ControlError::OrderViolation`] if the section cannot move to
    ///   `in_progress`
    pub fn mark_started(&self, request_id: RequestId) -> Result<(), ControlError> {
        let mut registry = self.registry.lock();

        let (case_id, section_id) = {
            let entry = registry
                .handoffs
                .get(&request_id)
                .ok_or(ControlError::UnknownRequest(request_id))?;
            (entry.case_id.clone(), entry.section_id.clone())
        };

        let key = (case_id, section_id.clone());
        if registry.active_grants.get(&key) != Some(&request_id) {
            return Err(ControlError::PermissionDenied(format!(
                "request {request_id} no longer holds the grant for {section_id}"
            )));
        }

        let state = registry
            .sections
            .get_mut(&key)
            .ok_or_else(|| ControlError::UnknownSection(section_id.clone()))?;
        let from = state.status;
        if state.transition(SectionStatus::InProgress).is_none() {
            return Err(ControlError::OrderViolation {
                section: section_id,
                from,
                to: SectionStatus::InProgress,
            });
        }

        let entry = registry
            .handoffs
            .get_mut(&request_id)
            .ok_or(ControlError::UnknownRequest(request_id))?;
        entry.record.confirmed_at = Some(chrono::Utc::now());
        if let Some(tx) = entry.started_tx.take() {
            let _ = tx.send(());
        }
        Ok(())
    }

    /// Supervision side of confirm: waits up to `timeout` for the
    /// requester's [`mark_started`](Self::mark_started).
    ///
    /// Returns `true` when the requester started (possibly before this
    /// call).
    ///
    /// # Errors
    ///
    /// - [`ControlError::UnknownRequest`] for a stale id
    /// - [`ControlError::HandoffTimeout`] when the requester never
    ///   started; the record is closed as timed out and the grant is
    ///   released so another attempt can be made
    pub async fn confirm(
        &self,
        request_id: RequestId,
        timeout: Duration,
    ) -> Result<bool, ControlError> {
        let rx = {
            let mut registry = self.registry.lock();
            let entry = registry
                .handoffs
                .get_mut(&request_id)
                .ok_or(ControlError::UnknownRequest(request_id))?;
            if entry.record.confirmed_at.is_some() {
                return Ok(true);
            }
            entry
                .started_rx
                .take()
                .ok_or(ControlError::UnknownRequest(request_id))?
        };

        let started = tokio::time::timeout(timeout, rx).await;

        let mut registry = self.registry.lock();
        let entry = registry
            .handoffs
            .get_mut(&request_id)
            .ok_or(ControlError::UnknownRequest(request_id))?;

        match started {
            Ok(Ok(())) => Ok(true),
            // Elapsed, or the sender was dropped; either way check for
            // a late mark_started before declaring the handoff dead.
            _ if entry.record.confirmed_at.is_some() => Ok(true),
            _ => {
                entry.record.outcome = HandoffOutcome::TimedOut;
                entry.record.completed_at = Some(chrono::Utc::now());
                let key = (entry.case_id.clone(), entry.section_id.clone());
                if registry.active_grants.get(&key) == Some(&request_id) {
                    registry.active_grants.remove(&key);
                }
                tracing::warn!(%request_id, "confirm timed out; grant released");
                Err(ControlError::HandoffTimeout(request_id))
            }
        }
    }

    /// Requester reports the operation's result.
    ///
    /// Moves the section to `awaiting_approval` and records the payload
    /// on the handoff record.
    ///
    /// # Errors
    ///
    /// - [`ControlError::UnknownRequest`] for a stale id
    /// - [`ControlError::PermissionDenied`] if the grant was released
    /// - [`ControlError::OrderViolation`] if the section is not
    ///   `in_progress`
    pub fn accept(&self, request_id: RequestId, result: Value) -> Result<(), ControlError> {
        let mut registry = self.registry.lock();

        let (case_id, section_id) = {
            let entry = registry
                .handoffs
                .get(&request_id)
                .ok_or(ControlError::UnknownRequest(request_id))?;
            (entry.case_id.clone(), entry.section_id.clone())
        };

        let key = (case_id, section_id.clone());
        if registry.active_grants.get(&key) != Some(&request_id) {
            return Err(ControlError::PermissionDenied(format!(
                "request {request_id} no longer holds the grant for {section_id}"
            )));
        }

        let state = registry
            .sections
            .get_mut(&key)
            .ok_or_else(|| ControlError::UnknownSection(section_id.clone()))?;
        let from = state.status;
        if state.transition(SectionStatus::AwaitingApproval).is_none() {
            return Err(ControlError::OrderViolation {
                section: section_id,
                from,
                to: SectionStatus::AwaitingApproval,
            });
        }

        let entry = registry
            .handoffs
            .get_mut(&request_id)
            .ok_or(ControlError::UnknownRequest(request_id))?;
        entry.record.accepted_at = Some(chrono::Utc::now());
        entry.record.result = Some(result);
        Ok(())
    }

    /// Closes the handoff. Terminal.
    ///
    /// Releases the grant. On failure the section returns to `ready`
    /// (when it was still `in_progress`) so the run can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownRequest`] for a stale id.
    pub fn complete_handoff(
        &self,
        request_id: RequestId,
        success: bool,
    ) -> Result<(), ControlError> {
        let mut registry = self.registry.lock();

        let (case_id, section_id) = {
            let entry = registry
                .handoffs
                .get(&request_id)
                .ok_or(ControlError::UnknownRequest(request_id))?;
            (entry.case_id.clone(), entry.section_id.clone())
        };

        let key = (case_id, section_id);
        if registry.active_grants.get(&key) == Some(&request_id) {
            registry.active_grants.remove(&key);
        }

        if !success {
            if let Some(state) = registry.sections.get_mut(&key) {
                if state.status == SectionStatus::InProgress {
                    let _ = state.transition(SectionStatus::Ready);
                }
            }
        }

        let entry = registry
            .handoffs
            .get_mut(&request_id)
            .ok_or(ControlError::UnknownRequest(request_id))?;
        entry.record.completed_at = Some(chrono::Utc::now());
        entry.record.outcome = if success {
            HandoffOutcome::Success
        } else {
            HandoffOutcome::Failed
        };
        entry.started_tx = None;
        entry.started_rx = None;
        Ok(())
    }

    /// Approves a section's draft; unlocks dependents whose
    /// predecessors are now all approved.
    ///
    /// # Errors
    ///
    /// - [`ControlError::UnknownCase`] / [`ControlError::UnknownSection`]
    /// - [`ControlError::OrderViolation`] if the section is not
    ///   `awaiting_approval`
    pub fn approve_section(
        &self,
        section_id: &SectionId,
        case_id: &CaseId,
    ) -> Result<(), ControlError> {
        let mut registry = self.registry.lock();
        self.ensure_case(&registry, case_id)?;

        let key = (case_id.clone(), section_id.clone());
        let state = registry
            .sections
            .get_mut(&key)
            .ok_or_else(|| ControlError::UnknownSection(section_id.clone()))?;
        let from = state.status;
        if state.transition(SectionStatus::Approved).is_none() {
            return Err(ControlError::OrderViolation {
                section: section_id.clone(),
                from,
                to: SectionStatus::Approved,
            });
        }

        // Promote dependents whose predecessors are now all approved.
        for contract in self.contracts.iter() {
            if !contract.predecessors.contains(section_id) {
                continue;
            }
            let all_approved = contract.predecessors.iter().all(|pred| {
                registry
                    .sections
                    .get(&(case_id.clone(), pred.clone()))
                    .is_some_and(|s| s.status == SectionStatus::Approved)
            });
            if all_approved {
                if let Some(dependent) = registry
                    .sections
                    .get_mut(&(case_id.clone(), contract.section_id.clone()))
                {
                    if dependent.status == SectionStatus::Blocked {
                        let _ = dependent.transition(SectionStatus::Ready);
                    }
                }
            }
        }
        Ok(())
    }

    /// Records a reviewer's revision request against a section.
    ///
    /// Increments the revision depth and moves the section to
    /// `revision_requested`, making it runnable again. Past the
    /// contract's `max_reruns` the section is forced to `halted` and a
    /// `section.escalated` signal is emitted instead of looping.
    ///
    /// # Errors
    ///
    /// - [`ControlError::OrderViolation`] if the section is neither
    ///   `awaiting_approval` nor `approved`
    /// - [`ControlError::RevisionLimitExceeded`] when the budget is
    ///   exhausted (the halt has already been applied)
    pub fn request_revision(
        &self,
        section_id: &SectionId,
        case_id: &CaseId,
    ) -> Result<SectionStatus, ControlError> {
        let escalation = {
            let mut registry = self.registry.lock();
            self.ensure_case(&registry, case_id)?;

            let contract = self
                .contracts
                .get(section_id)
                .ok_or_else(|| ControlError::UnknownSection(section_id.clone()))?;
            let max_reruns = contract.max_reruns;

            let key = (case_id.clone(), section_id.clone());
            let state = registry
                .sections
                .get_mut(&key)
                .ok_or_else(|| ControlError::UnknownSection(section_id.clone()))?;

            let from = state.status;
            if state.transition(SectionStatus::RevisionRequested).is_none() {
                return Err(ControlError::OrderViolation {
                    section: section_id.clone(),
                    from,
                    to: SectionStatus::RevisionRequested,
                });
            }
            state.revision_depth += 1;
            let depth = state.revision_depth;

            if depth > max_reruns {
                let _ = state.transition(SectionStatus::Halted);
                // A halted section cannot keep its grant.
                registry.active_grants.remove(&key);
                Some((depth, max_reruns))
            } else {
                None
            }
        };

        match escalation {
            Some((depth, max_reruns)) => {
                self.emit(SignalPayload::SectionEscalated {
                    section_id: section_id.clone(),
                    case_id: case_id.clone(),
                    revision_depth: depth,
                });
                tracing::warn!(
                    section = %section_id,
                    case = %case_id,
                    depth,
                    max_reruns,
                    "revision limit exceeded; section halted"
                );
                Err(ControlError::RevisionLimitExceeded {
                    section: section_id.clone(),
                    depth,
                    max_reruns,
                })
            }
            None => Ok(SectionStatus::RevisionRequested),
        }
    }

    /// Administrative stop. Terminal; blocks all dependents.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownSection`] /
    /// [`ControlError::UnknownCase`] for unknown scope, or
    /// [`ControlError::OrderViolation`] if the section is already
    /// halted.
    pub fn halt_section(
        &self,
        section_id: &SectionId,
        case_id: &CaseId,
    ) -> Result<(), ControlError> {
        let mut registry = self.registry.lock();
        self.ensure_case(&registry, case_id)?;

        let key = (case_id.clone(), section_id.clone());
        let state = registry
            .sections
            .get_mut(&key)
            .ok_or_else(|| ControlError::UnknownSection(section_id.clone()))?;
        let from = state.status;
        if state.transition(SectionStatus::Halted).is_none() {
            return Err(ControlError::OrderViolation {
                section: section_id.clone(),
                from,
                to: SectionStatus::Halted,
            });
        }
        registry.active_grants.remove(&key);
        Ok(())
    }

    /// Current status of a section.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownCase`] /
    /// [`ControlError::UnknownSection`] for unknown scope.
    pub fn section_status(
        &self,
        section_id: &SectionId,
        case_id: &CaseId,
    ) -> Result<SectionStatus, ControlError> {
        self.section_state(section_id, case_id).map(|s| s.status)
    }

    /// Full state record of a section.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownCase`] /
    /// [`ControlError::UnknownSection`] for unknown scope.
    pub fn section_state(
        &self,
        section_id: &SectionId,
        case_id: &CaseId,
    ) -> Result<SectionState, ControlError> {
        let registry = self.registry.lock();
        self.ensure_case(&registry, case_id)?;
        registry
            .sections
            .get(&(case_id.clone(), section_id.clone()))
            .cloned()
            .ok_or_else(|| ControlError::UnknownSection(section_id.clone()))
    }

    /// Sections currently runnable for a case, in id order.
    #[must_use]
    pub fn runnable_sections(&self, case_id: &CaseId) -> Vec<SectionId> {
        let registry = self.registry.lock();
        let mut runnable: Vec<SectionId> = registry
            .sections
            .iter()
            .filter(|((case, _), state)| case == case_id && state.status.is_runnable())
            .map(|((_, section), _)| section.clone())
            .collect();
        runnable.sort();
        runnable
    }

    /// Audit access to one handoff record.
    #[must_use]
    pub fn handoff_record(&self, request_id: RequestId) -> Option<HandoffRecord> {
        self.registry
            .lock()
            .handoffs
            .get(&request_id)
            .map(|e| e.record.clone())
    }

    /// All handoffs still in flight.
    #[must_use]
    pub fn open_handoffs(&self) -> Vec<HandoffRecord> {
        self.registry
            .lock()
            .handoffs
            .values()
            .filter(|e| e.record.is_open())
            .map(|e| e.record.clone())
            .collect()
    }

    fn ensure_case(&self, registry: &Registry, case_id: &CaseId) -> Result<(), ControlError> {
        if registry.cases.contains_key(case_id) {
            Ok(())
        } else {
            Err(ControlError::UnknownCase(case_id.clone()))
        }
    }

    fn emit(&self, payload: SignalPayload) {
        let envelope = SignalEnvelope::new(payload, self.id.clone());
        if let Err(e) = self.bus.emit(&envelope) {
            tracing::warn!(signal = envelope.name().as_str(), error = %e, "emit failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_bus::SignalName;

    fn section(id: &str) -> SectionId {
        SectionId::new(id).unwrap()
    }

    fn case() -> CaseId {
        CaseId::new("C1").unwrap()
    }

    fn gateway() -> ComponentId {
        ComponentId::builtin("gateway")
    }

    fn setup() -> (Arc<SignalBus>, Controller) {
        let bus = Arc::new(SignalBus::new());
        let controller = Controller::new(Arc::clone(&bus), ContractSet::standard());
        controller.register_case(case());
        (bus, controller)
    }

    fn grant(controller: &Controller, id: &str) -> RequestId {
        let ticket = controller
            .request_permission("run_section", gateway(), &section(id), &case())
            .unwrap();
        assert!(ticket.is_granted(), "expected grant: {:?}", ticket.reason);
        ticket.request_id.unwrap()
    }

    /// Drives a section through one successful run and approval.
    fn run_to_approved(controller: &Controller, id: &str) {
        let rid = grant(controller, id);
        controller.mark_started(rid).unwrap();
        controller.accept(rid, serde_json::json!({"draft": id})).unwrap();
        controller.complete_handoff(rid, true).unwrap();
        controller.approve_section(&section(id), &case()).unwrap();
    }

    #[test]
    fn permission_denied_until_predecessor_approved() {
        let (_bus, controller) = setup();

        let ticket = controller
            .request_permission("run_section", gateway(), &section("section_2"), &case())
            .unwrap();
        assert!(!ticket.is_granted());
        assert!(ticket.reason.unwrap().contains("section_1"));

        run_to_approved(&controller, "section_1");

        let ticket = controller
            .request_permission("run_section", gateway(), &section("section_2"), &case())
            .unwrap();
        assert!(ticket.is_granted());
    }

    #[test]
    fn at_most_one_concurrent_grant() {
        let (_bus, controller) = setup();
        let _rid = grant(&controller, "section_1");

        let second = controller
            .request_permission("run_section", gateway(), &section("section_1"), &case())
            .unwrap();
        assert!(!second.is_granted());
        assert!(second.reason.unwrap().contains("already granted"));
    }

    #[test]
    fn grant_released_after_completion() {
        let (_bus, controller) = setup();
        run_to_approved(&controller, "section_1");

        // Approved sections are not runnable, so the denial now cites
        // status, not an active grant.
        let ticket = controller
            .request_permission("run_section", gateway(), &section("section_1"), &case())
            .unwrap();
        assert!(!ticket.is_granted());
        assert!(ticket.reason.unwrap().contains("approved"));
    }

    #[test]
    fn closed_case_rejects_everything() {
        let (_bus, controller) = setup();
        controller.close_case(&case()).unwrap();

        let ticket = controller
            .request_permission("run_section", gateway(), &section("section_1"), &case())
            .unwrap();
        assert!(!ticket.is_granted());
        assert!(ticket.reason.unwrap().contains("closed"));
    }

    #[test]
    fn unknown_case_is_an_error() {
        let (_bus, controller) = setup();
        let result = controller.request_permission(
            "run_section",
            gateway(),
            &section("section_1"),
            &CaseId::new("C9").unwrap(),
        );
        assert!(matches!(result, Err(ControlError::UnknownCase(_))));
    }

    #[test]
    fn unknown_section_is_an_error() {
        let (_bus, controller) = setup();
        let result = controller.request_permission(
            "run_section",
            gateway(),
            &section("section_99"),
            &case(),
        );
        assert!(matches!(result, Err(ControlError::UnknownSection(_))));
    }

    #[test]
    fn failed_run_returns_section_to_ready() {
        let (_bus, controller) = setup();
        let rid = grant(&controller, "section_1");
        controller.mark_started(rid).unwrap();

        controller.complete_handoff(rid, false).unwrap();

        assert_eq!(
            controller.section_status(&section("section_1"), &case()).unwrap(),
            SectionStatus::Ready
        );
        // And the section is grantable again.
        grant(&controller, "section_1");
    }

    #[test]
    fn approval_unlocks_dependents() {
        let (_bus, controller) = setup();
        assert_eq!(
            controller.section_status(&section("section_2"), &case()).unwrap(),
            SectionStatus::Blocked
        );

        run_to_approved(&controller, "section_1");

        assert_eq!(
            controller.section_status(&section("section_2"), &case()).unwrap(),
            SectionStatus::Ready
        );
        // section_3 needs section_2; still blocked.
        assert_eq!(
            controller.section_status(&section("section_3"), &case()).unwrap(),
            SectionStatus::Blocked
        );
    }

    #[test]
    fn revision_returns_section_to_runnable() {
        let (_bus, controller) = setup();
        run_to_approved(&controller, "section_1");

        let status = controller
            .request_revision(&section("section_1"), &case())
            .unwrap();
        assert_eq!(status, SectionStatus::RevisionRequested);
        assert_eq!(
            controller
                .section_state(&section("section_1"), &case())
                .unwrap()
                .revision_depth,
            1
        );

        // Runnable again.
        grant(&controller, "section_1");
    }

    #[test]
    fn revision_limit_forces_halt_and_escalates() {
        let (bus, controller) = setup();
        run_to_approved(&controller, "section_1");

        // max_reruns = 2: two revisions pass, the third halts.
        for round in 1..=2 {
            controller.request_revision(&section("section_1"), &case()).unwrap();
            let rid = grant(&controller, "section_1");
            controller.mark_started(rid).unwrap();
            controller.accept(rid, serde_json::json!({"round": round})).unwrap();
            controller.complete_handoff(rid, true).unwrap();
            controller.approve_section(&section("section_1"), &case()).unwrap();
        }

        let err = controller
            .request_revision(&section("section_1"), &case())
            .unwrap_err();
        assert!(matches!(err, ControlError::RevisionLimitExceeded { depth: 3, .. }));

        assert_eq!(
            controller.section_status(&section("section_1"), &case()).unwrap(),
            SectionStatus::Halted
        );
        assert!(bus
            .log_recent(20)
            .iter()
            .any(|e| e.signal == SignalName::SectionEscalated));

        // Halted is terminal: no more grants.
        let ticket = controller
            .request_permission("run_section", gateway(), &section("section_1"), &case())
            .unwrap();
        assert!(!ticket.is_granted());
    }

    #[test]
    fn mark_started_without_grant_is_denied() {
        let (_bus, controller) = setup();
        let result = controller.mark_started(RequestId::new());
        assert!(matches!(result, Err(ControlError::UnknownRequest(_))));
    }

    #[test]
    fn accept_before_start_is_order_violation() {
        let (_bus, controller) = setup();
        let rid = grant(&controller, "section_1");

        let result = controller.accept(rid, Value::Null);
        assert!(matches!(result, Err(ControlError::OrderViolation { .. })));
    }

    #[test]
    fn handoff_record_tracks_protocol_steps() {
        let (_bus, controller) = setup();
        let rid = grant(&controller, "section_1");

        let record = controller.handoff_record(rid).unwrap();
        assert!(record.is_open());
        assert!(record.confirmed_at.is_none());

        controller.mark_started(rid).unwrap();
        controller.accept(rid, serde_json::json!({"ok": true})).unwrap();
        controller.complete_handoff(rid, true).unwrap();

        let record = controller.handoff_record(rid).unwrap();
        assert_eq!(record.outcome, HandoffOutcome::Success);
        assert!(record.confirmed_at.is_some());
        assert!(record.accepted_at.is_some());
        assert!(record.completed_at.is_some());
        assert_eq!(record.result, Some(serde_json::json!({"ok": true})));
        assert!(controller.open_handoffs().is_empty());
    }

    #[test]
    fn runnable_sections_reflect_graph() {
        let (_bus, controller) = setup();
        // Only section_1 starts without predecessors.
        assert_eq!(controller.runnable_sections(&case()), vec![section("section_1")]);

        run_to_approved(&controller, "section_1");
        let runnable = controller.runnable_sections(&case());
        assert!(runnable.contains(&section("section_2")));
        assert!(runnable.contains(&section("section_4")));
        assert!(runnable.contains(&section("section_5")));
        assert!(runnable.contains(&section("section_8")));
        assert!(!runnable.contains(&section("section_3")));
    }

    #[tokio::test]
    async fn confirm_returns_true_after_mark_started() {
        let (_bus, controller) = setup();
        let rid = grant(&controller, "section_1");

        controller.mark_started(rid).unwrap();
        let confirmed = controller
            .confirm(rid, Duration::from_millis(50))
            .await
            .unwrap();
        assert!(confirmed);
    }

    #[tokio::test]
    async fn confirm_timeout_releases_grant() {
        let (_bus, controller) = setup();
        let rid = grant(&controller, "section_1");

        let err = controller
            .confirm(rid, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::HandoffTimeout(_)));

        let record = controller.handoff_record(rid).unwrap();
        assert_eq!(record.outcome, HandoffOutcome::TimedOut);

        // Grant released: section grantable again, stale rid rejected.
        let new_rid = grant(&controller, "section_1");
        assert_ne!(new_rid, rid);
        assert!(matches!(
            controller.mark_started(rid),
            Err(ControlError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn confirm_waits_for_concurrent_start() {
        let (_bus, controller) = setup();
        let controller = Arc::new(controller);
        let rid = grant(&controller, "section_1");

        let waiter = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.confirm(rid, Duration::from_secs(1)).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.mark_started(rid).unwrap();

        let confirmed = waiter.await.unwrap().unwrap();
        assert!(confirmed);
    }
}
