//! Append-only event log.
//!
//! The log is a rolling buffer of [`EventLogEntry`] records, one per
//! emit, with a monotonically increasing sequence number. When full, the
//! oldest entry is evicted on each append; the sequence number keeps
//! counting so gaps are detectable.

use chrono::{DateTime, Utc};
use dossier_types::ComponentId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::SignalName;

/// Default maximum entries retained in the log.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Summary of a single emit: how many handlers succeeded and failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmitOutcome {
    /// Handlers that returned a value.
    pub delivered: usize,
    /// Handlers that returned an error.
    pub failed: usize,
}

impl EmitOutcome {
    /// Returns `true` if every invoked handler succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// Total handlers invoked.
    #[must_use]
    pub fn participants(&self) -> usize {
        self.delivered + self.failed
    }
}

/// A single record of one emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Monotonic sequence number, never reused.
    pub seq: u64,
    /// Which signal was emitted.
    pub signal: SignalName,
    /// Which component emitted it.
    pub source: ComponentId,
    /// Delivery summary.
    pub outcome: EmitOutcome,
    /// When the emit happened.
    pub timestamp: DateTime<Utc>,
}

/// Rolling buffer of emit records with monotonic sequencing.
pub struct EventLog {
    entries: VecDeque<EventLogEntry>,
    max_entries: usize,
    next_seq: u64,
}

impl EventLog {
    /// Creates a log with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// Creates a log with a specific capacity.
    ///
    /// A capacity of 0 is treated as 1.
    #[must_use]
    pub fn with_capacity(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: VecDeque::with_capacity(max_entries),
            max_entries,
            next_seq: 0,
        }
    }

    /// Appends a record, evicting the oldest if at capacity.
    ///
    /// Returns the sequence number assigned to the record.
    pub fn append(
        &mut self,
        signal: SignalName,
        source: ComponentId,
        outcome: EmitOutcome,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        if self.entries.len() == self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(EventLogEntry {
            seq,
            signal,
            source,
            outcome,
            timestamp: Utc::now(),
        });
        seq
    }

    /// Returns up to `n` most recent entries, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<&EventLogEntry> {
        let start = self.entries.len().saturating_sub(n);
        self.entries.range(start..).collect()
    }

    /// Number of entries currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total emits ever recorded (including evicted entries).
    #[must_use]
    pub fn total_recorded(&self) -> u64 {
        self.next_seq
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
