//! Bottleneck detection.
//!
//! The monitor records when each section entered its in-flight window
//! (`in_progress` / `awaiting_approval`). Sections past the threshold
//! are reported so the gateway can emit `section.stalled` alerts. This
//! is operational visibility only — no state changes.

use dossier_types::{CaseId, SectionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks in-flight durations per (case, section).
pub struct BottleneckMonitor {
    threshold: Duration,
    in_flight: Mutex<HashMap<(CaseId, SectionId), Instant>>,
}

impl BottleneckMonitor {
    /// Creates a monitor with the given stall threshold.
    #[must_use]
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Records that a section entered its in-flight window. Re-tracking
    /// an already tracked section keeps the original start time.
    pub fn track(&self, section_id: SectionId, case_id: CaseId) {
        self.in_flight
            .lock()
            .entry((case_id, section_id))
            .or_insert_with(Instant::now);
    }

    /// Removes a section from tracking (run finished or was released).
    pub fn clear(&self, section_id: &SectionId, case_id: &CaseId) {
        self.in_flight
            .lock()
            .remove(&(case_id.clone(), section_id.clone()));
    }

    /// Sections past the threshold, with their in-flight duration.
    #[must_use]
    pub fn stalled(&self) -> Vec<(CaseId, SectionId, Duration)> {
        let now = Instant::now();
        self.in_flight
            .lock()
            .iter()
            .filter_map(|((case, section), started)| {
                let elapsed = now.duration_since(*started);
                (elapsed >= self.threshold).then(|| (case.clone(), section.clone(), elapsed))
            })
            .collect()
    }

    /// Number of sections currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.in_flight.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str) -> SectionId {
        SectionId::new(id).unwrap()
    }

    fn case() -> CaseId {
        CaseId::new("C1").unwrap()
    }

    #[test]
    fn nothing_stalls_under_threshold() {
        let monitor = BottleneckMonitor::new(Duration::from_secs(60));
        monitor.track(section("section_1"), case());

        assert_eq!(monitor.tracked(), 1);
        assert!(monitor.stalled().is_empty());
    }

    #[test]
    fn zero_threshold_reports_immediately() {
        let monitor = BottleneckMonitor::new(Duration::ZERO);
        monitor.track(section("section_1"), case());

        let stalled = monitor.stalled();
        assert_eq!(stalled.len(), 1);
        assert_eq!(stalled[0].1, section("section_1"));
    }

    #[test]
    fn clear_removes_tracking() {
        let monitor = BottleneckMonitor::new(Duration::ZERO);
        monitor.track(section("section_1"), case());
        monitor.clear(&section("section_1"), &case());

        assert_eq!(monitor.tracked(), 0);
        assert!(monitor.stalled().is_empty());
    }

    #[test]
    fn retrack_keeps_original_start() {
        let monitor = BottleneckMonitor::new(Duration::ZERO);
        monitor.track(section("section_1"), case());
        let first = monitor.stalled()[0].2;
        monitor.track(section("section_1"), case());
        let second = monitor.stalled()[0].2;

        assert!(second >= first);
    }
}
