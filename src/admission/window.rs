//! Per-client sliding window of request timestamps.

use std::collections::VecDeque;
use std::time::Duration;

/// The recent request history of a single client.
///
/// Timestamps are offsets from the Unix epoch and are kept in
/// non-decreasing order, so stale entries always form a contiguous
/// prefix and pruning never rescans the whole sequence.
#[derive(Debug, Default)]
pub struct ClientWindow {
    /// Request timestamps in chronological order
    hits: VecDeque<Duration>,
}

impl ClientWindow {
    /// Create an empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every timestamp strictly older than `now - window` and
    /// return the number of remaining entries.
    ///
    /// A timestamp exactly `window` old is retained.
    pub fn prune_and_count(&mut self, now: Duration, window: Duration) -> u64 {
        let cutoff = now.saturating_sub(window);
        while self.hits.front().is_some_and(|&ts| ts < cutoff) {
            self.hits.pop_front();
        }
        self.hits.len() as u64
    }

    /// Append `now` to the sequence.
    ///
    /// If the clock went backwards relative to the newest entry, the
    /// timestamp is inserted at its sorted position instead, keeping
    /// prefix pruning valid under clock skew.
    pub fn record(&mut self, now: Duration) {
        match self.hits.back() {
            Some(&last) if now < last => {
                let idx = self.hits.partition_point(|&ts| ts <= now);
                self.hits.insert(idx, now);
            }
            _ => self.hits.push_back(now),
        }
    }

    /// Number of timestamps currently stored, without pruning.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether the window holds no timestamps.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_empty_window_counts_zero() {
        let mut window = ClientWindow::new();
        assert_eq!(window.prune_and_count(secs(100), secs(10)), 0);
        assert!(window.is_empty());
    }

    #[test]
    fn test_prune_removes_only_stale_prefix() {
        let mut window = ClientWindow::new();
        for t in [0, 1, 2, 8, 9] {
            window.record(secs(t));
        }
        // cutoff = 12 - 10 = 2; 0 and 1 are stale, 2 is exactly on the boundary
        assert_eq!(window.prune_and_count(secs(12), secs(10)), 3);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_boundary_timestamp_retained_then_pruned() {
        let mut window = ClientWindow::new();
        window.record(secs(0));

        // exactly window-old: still counted
        assert_eq!(window.prune_and_count(secs(10), secs(10)), 1);

        // one instant later: pruned
        let just_after = secs(10) + Duration::from_nanos(1);
        assert_eq!(window.prune_and_count(just_after, secs(10)), 0);
    }

    #[test]
    fn test_zero_window_keeps_only_now() {
        let mut window = ClientWindow::new();
        window.record(secs(5));
        window.record(secs(6));
        // cutoff = now - 0 = now; everything older than now goes
        assert_eq!(window.prune_and_count(secs(7), Duration::ZERO), 0);
    }

    #[test]
    fn test_cutoff_saturates_near_epoch() {
        let mut window = ClientWindow::new();
        window.record(secs(1));
        // now < window: cutoff saturates to zero, nothing is pruned
        assert_eq!(window.prune_and_count(secs(3), secs(10)), 1);
    }

    #[test]
    fn test_out_of_order_record_stays_sorted() {
        let mut window = ClientWindow::new();
        window.record(secs(5));
        window.record(secs(9));
        // clock went backwards
        window.record(secs(7));

        // prefix pruning still removes exactly the stale entries
        assert_eq!(window.prune_and_count(secs(16), secs(10)), 3);
        assert_eq!(window.prune_and_count(secs(16), secs(8)), 1);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_duplicate_timestamps_all_counted() {
        let mut window = ClientWindow::new();
        window.record(secs(4));
        window.record(secs(4));
        window.record(secs(4));
        assert_eq!(window.prune_and_count(secs(4), secs(10)), 3);
    }
}
