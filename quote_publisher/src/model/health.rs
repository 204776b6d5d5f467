//! Per-destination delivery health for the quote broadcaster.
//!
//! This module provides a lightweight, in-memory tracker of consecutive
//! delivery failures, keyed by `SessionId`. It exposes four core operations:
//!
//! - `HealthTracker::reset(id)`: force a destination's count to 0, creating the
//!   entry on first sight.
//! - `HealthTracker::record_failure(id)`: add one failed delivery.
//! - `HealthTracker::should_skip(id)`: whether the count reached the threshold.
//! - `HealthTracker::destinations()`: every destination ever seen.
//!
//! Design notes:
//! - The tracker is not synchronized; it is owned by the broadcaster thread. If
//!   more than one producer ever broadcasts, wrap it in a `Mutex`.
//! - Entries are never removed. With a changing session population the map
//!   grows for the lifetime of the process; an LRU bound would fix that, but
//!   stale entries are exactly the ones the skip threshold applies to, so
//!   evicting them changes broadcast behavior.
//! - The broadcaster resets every reachable destination at the top of each
//!   cycle, so only destinations that dropped out of the reachable set can
//!   ever reach the threshold.

use quote_common::SessionId;
use std::collections::HashMap;

/// Consecutive delivery failures per destination.
pub struct HealthTracker {
    /// Known destinations and their consecutive failure counts.
    failures: HashMap<SessionId, u32>,
    /// Count at which a destination is skipped.
    threshold: u32,
}

impl HealthTracker {
    /// Create a new instance of HealthTracker
    pub fn new(threshold: u32) -> Self {
        Self {
            failures: HashMap::new(),
            threshold,
        }
    }

    /// Force the count of `session_id` to 0.
    pub fn reset(&mut self, session_id: &SessionId) {
        self.failures.insert(session_id.clone(), 0);
    }

    /// Record one failed delivery and return the new count.
    pub fn record_failure(&mut self, session_id: &SessionId) -> u32 {
        let count = self.failures.entry(session_id.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Current count, if the destination was ever seen.
    pub fn failure_count(&self, session_id: &SessionId) -> Option<u32> {
        self.failures.get(session_id).copied()
    }

    /// Check whether the destination has failed too often to be tried
    pub fn should_skip(&self, session_id: &SessionId) -> bool {
        self.failure_count(session_id)
            .map(|count| count >= self.threshold)
            .unwrap_or(false)
    }

    /// Every destination ever seen, sorted for a stable send order.
    pub fn destinations(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.failures.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(target: &str) -> SessionId {
        SessionId::new("FIX.4.4", "ACCEPTOR", target)
    }

    #[test]
    fn skips_at_threshold_until_reset() {
        let mut health = HealthTracker::new(3);
        let a = id("INIT1");
        assert!(!health.should_skip(&a));
        assert_eq!(health.record_failure(&a), 1);
        assert_eq!(health.record_failure(&a), 2);
        assert!(!health.should_skip(&a));
        assert_eq!(health.record_failure(&a), 3);
        assert!(health.should_skip(&a));

        health.reset(&a);
        assert_eq!(health.failure_count(&a), Some(0));
        assert!(!health.should_skip(&a));
    }

    #[test]
    fn entries_are_kept_once_seen() {
        let mut health = HealthTracker::new(3);
        health.reset(&id("INIT2"));
        health.reset(&id("INIT1"));
        assert_eq!(health.destinations(), vec![id("INIT1"), id("INIT2")]);
    }
}
