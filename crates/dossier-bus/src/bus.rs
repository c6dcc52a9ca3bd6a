//! The signal bus: registry, dispatch, error isolation.

use dossier_types::ComponentId;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{BusError, EmitOutcome, EventLog, EventLogEntry, SignalEnvelope, SignalName};

/// What a handler returns: a value for `send` callers, or a failure
/// message that the bus logs without aborting sibling handlers.
pub type HandlerResult = Result<Value, String>;

/// A registered signal handler.
///
/// Handlers run synchronously on the emitting thread; hand long work off
/// to a worker pool inside the handler.
pub type SignalHandler = Arc<dyn Fn(&SignalEnvelope) -> HandlerResult + Send + Sync>;

struct Registration {
    owner: ComponentId,
    handler: SignalHandler,
}

/// Synchronous publish/subscribe hub.
///
/// One instance is constructed at startup and passed by [`Arc`] to every
/// component; there are no process-wide singletons.
///
/// # Example
///
/// ```
/// use dossier_bus::{SignalBus, SignalEnvelope, SignalName, SignalPayload};
/// use dossier_types::{CaseId, ComponentId, EvidenceId};
/// use std::sync::Arc;
///
/// let bus = SignalBus::new();
/// bus.register(
///     SignalName::EvidenceNew,
///     ComponentId::builtin("gateway"),
///     Arc::new(|env| {
///         Ok(serde_json::json!({ "seen": env.name().as_str() }))
///     }),
/// );
///
/// let case = CaseId::new("C1").unwrap();
/// let env = SignalEnvelope::new(
///     SignalPayload::EvidenceNew {
///         evidence_id: EvidenceId::from_content(&case, "h"),
///         case_id: case,
///     },
///     ComponentId::builtin("locker"),
/// );
///
/// let outcome = bus.emit(&env).unwrap();
/// assert_eq!(outcome.delivered, 1);
/// assert_eq!(bus.log_len(), 1);
/// ```
pub struct SignalBus {
    registry: Mutex<HashMap<SignalName, Vec<Registration>>>,
    log: Mutex<EventLog>,
}

impl SignalBus {
    /// Creates a bus with the default event-log capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            log: Mutex::new(EventLog::new()),
        }
    }

    /// Creates a bus with a specific event-log capacity.
    #[must_use]
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            log: Mutex::new(EventLog::with_capacity(capacity)),
        }
    }

    /// Registers a handler for a signal.
    ///
    /// Registration is additive and idempotent per `(signal, owner)`:
    /// re-registering the same owner for the same signal keeps the
    /// original handler and its position in the dispatch order.
    ///
    /// Returns `true` if the handler was newly registered.
    pub fn register(
        &self,
        name: SignalName,
        owner: ComponentId,
        handler: SignalHandler,
    ) -> bool {
        let mut registry = self.registry.lock();
        let handlers = registry.entry(name).or_default();

        if handlers.iter().any(|r| r.owner.fqn_eq(&owner)) {
            return false;
        }
        handlers.push(Registration { owner, handler });
        true
    }

    /// Removes every registration owned by a component.
    pub fn unregister(&self, owner: &ComponentId) {
        let mut registry = self.registry.lock();
        for handlers in registry.values_mut() {
            handlers.retain(|r| !r.owner.fqn_eq(owner));
        }
    }

    /// Number of handlers registered for a signal.
    #[must_use]
    pub fn handler_count(&self, name: SignalName) -> usize {
        self.registry.lock().get(&name).map_or(0, Vec::len)
    }

    /// Fire-and-forget fan-out to every registered handler.
    ///
    /// Handlers are invoked in registration order. A handler failure is
    /// logged and counted in the outcome; sibling handlers still run.
    /// Exactly one event-log entry is written per call, even when every
    /// handler fails or none is registered.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidPayload`] if boundary validation
    /// rejects the payload; nothing is dispatched or logged in that case.
    pub fn emit(&self, envelope: &SignalEnvelope) -> Result<EmitOutcome, BusError> {
        envelope.payload.validate()?;
        let (outcome, _, _) = self.dispatch(envelope);
        Ok(outcome)
    }

    /// Fan-out that collects every successful handler return value.
    ///
    /// Values are returned in registration order. Failing handlers are
    /// isolated exactly as in [`emit`](Self::emit) and contribute no
    /// value.
    ///
    /// # Errors
    ///
    /// - [`BusError::InvalidPayload`] on boundary validation failure
    /// - [`BusError::NoHandlers`] when nothing is registered for the
    ///   signal (a `send` caller expects an answer)
    /// - [`BusError::HandlerFailed`] when handlers exist but every one
    ///   of them failed
    pub fn send(&self, envelope: &SignalEnvelope) -> Result<Vec<Value>, BusError> {
        envelope.payload.validate()?;

        if self.handler_count(envelope.name()) == 0 {
            // Log the attempt: the emit happened even if nobody answered.
            self.log
                .lock()
                .append(envelope.name(), envelope.source.clone(), EmitOutcome::default());
            return Err(BusError::NoHandlers(envelope.name()));
        }

        let (_, values, last_failure) = self.dispatch(envelope);
        if values.is_empty() {
            if let Some((owner, message)) = last_failure {
                return Err(BusError::HandlerFailed {
                    handler: owner.fqn(),
                    message,
                });
            }
        }
        Ok(values)
    }

    /// Returns up to `n` most recent log entries, oldest first.
    #[must_use]
    pub fn log_recent(&self, n: usize) -> Vec<EventLogEntry> {
        self.log.lock().recent(n).into_iter().cloned().collect()
    }

    /// Number of log entries currently retained.
    #[must_use]
    pub fn log_len(&self) -> usize {
        self.log.lock().len()
    }

    /// Total emits ever recorded, including evicted entries.
    #[must_use]
    pub fn log_total(&self) -> u64 {
        self.log.lock().total_recorded()
    }

    /// Invokes handlers in order, isolating failures, and writes the
    /// single log entry for this dispatch.
    fn dispatch(
        &self,
        envelope: &SignalEnvelope,
    ) -> (EmitOutcome, Vec<Value>, Option<(ComponentId, String)>) {
        // Snapshot the handler list so emits from inside a handler do
        // not deadlock on the registry lock.
        let handlers: Vec<(ComponentId, SignalHandler)> = {
            let registry = self.registry.lock();
            registry
                .get(&envelope.name())
                .map(|list| {
                    list.iter()
                        .map(|r| (r.owner.clone(), Arc::clone(&r.handler)))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut outcome = EmitOutcome::default();
        let mut values = Vec::new();
        let mut last_failure = None;

        for (owner, handler) in handlers {
            match handler(envelope) {
                Ok(value) => {
                    outcome.delivered += 1;
                    values.push(value);
                }
                Err(message) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        signal = envelope.name().as_str(),
                        handler = %owner,
                        %message,
                        "signal handler failed; continuing fan-out"
                    );
                    last_failure = Some((owner, message));
                }
            }
        }

        self.log
            .lock()
            .append(envelope.name(), envelope.source.clone(), outcome);

        (outcome, values, last_failure)
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}
