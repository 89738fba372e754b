//! Aggregate counters derived from registry state.

use std::sync::Arc;

use serde::Serialize;

use crate::admission::AdmissionController;

/// A point-in-time view of the admission state.
///
/// May be stale by the time it is returned; readers tolerate that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Number of client identifiers currently tracked, including clients
    /// whose window has fully pruned to empty
    pub tracked_clients: usize,
    /// Configured window in seconds
    pub window_secs: u64,
    /// Configured per-client limit
    pub limit: u64,
}

/// Read-only reporter over the controller's registry.
#[derive(Clone)]
pub struct MetricsReporter {
    controller: Arc<AdmissionController>,
}

impl MetricsReporter {
    /// Create a reporter over the given controller.
    pub fn new(controller: Arc<AdmissionController>) -> Self {
        Self { controller }
    }

    /// Take a snapshot of the current state. Never mutates the registry.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tracked_clients: self.controller.registry().tracked_clients(),
            window_secs: self.controller.window().as_secs(),
            limit: self.controller.limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_snapshot_counts_tracked_clients() {
        let controller = Arc::new(AdmissionController::new(Duration::from_secs(10), 3));
        let reporter = MetricsReporter::new(Arc::clone(&controller));

        assert_eq!(
            reporter.snapshot(),
            MetricsSnapshot {
                tracked_clients: 0,
                window_secs: 10,
                limit: 3,
            }
        );

        controller.admit("a", Duration::from_secs(1));
        controller.admit("b", Duration::from_secs(2));
        assert_eq!(reporter.snapshot().tracked_clients, 2);
    }

    #[test]
    fn test_snapshot_includes_fully_pruned_clients() {
        let controller = Arc::new(AdmissionController::new(Duration::from_secs(10), 3));
        let reporter = MetricsReporter::new(Arc::clone(&controller));

        controller.admit("a", Duration::from_secs(1));
        // far in the future: "a"'s window prunes to empty but stays tracked
        controller.admit("b", Duration::from_secs(1_000));
        assert_eq!(
            controller.registry().prune_and_count(
                "a",
                Duration::from_secs(1_000),
                Duration::from_secs(10)
            ),
            0
        );
        assert_eq!(reporter.snapshot().tracked_clients, 2);
    }

    #[test]
    fn test_snapshot_does_not_mutate_counts() {
        let controller = Arc::new(AdmissionController::new(Duration::from_secs(10), 1));
        let reporter = MetricsReporter::new(Arc::clone(&controller));

        controller.admit("a", Duration::from_secs(1));
        reporter.snapshot();
        // "a" is still at its limit
        assert!(!controller.admit("a", Duration::from_secs(2)).admitted);
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let snapshot = MetricsSnapshot {
            tracked_clients: 4,
            window_secs: 10,
            limit: 50,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"tracked_clients": 4, "window_secs": 10, "limit": 50})
        );
    }
}
