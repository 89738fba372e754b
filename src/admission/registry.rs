//! Shared registry of per-client windows.

use std::time::Duration;

use dashmap::DashMap;

use super::window::ClientWindow;

/// The shared collection of all client windows, keyed by client identifier.
///
/// Access is synchronized per key: holding a map entry gives exclusive
/// access to that client's window without serializing unrelated clients.
pub struct WindowRegistry {
    /// Client windows indexed by client identifier
    windows: DashMap<String, ClientWindow>,
}

impl WindowRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Run `f` with exclusive access to the identified client's window,
    /// creating an empty window for a previously-unseen client.
    ///
    /// The whole closure executes under the entry lock, so a
    /// prune+count+record sequence for one client is linearizable.
    pub fn with_window<T>(&self, client_id: &str, f: impl FnOnce(&mut ClientWindow) -> T) -> T {
        let mut entry = self.windows.entry(client_id.to_string()).or_default();
        f(entry.value_mut())
    }

    /// Prune the identified client's window against `now` and return the
    /// number of timestamps remaining.
    pub fn prune_and_count(&self, client_id: &str, now: Duration, window: Duration) -> u64 {
        self.with_window(client_id, |w| w.prune_and_count(now, window))
    }

    /// Append `now` to the identified client's window.
    pub fn record(&self, client_id: &str, now: Duration) {
        self.with_window(client_id, |w| w.record(now));
    }

    /// Number of tracked client identifiers, including clients whose
    /// window has fully pruned to empty.
    ///
    /// Entries are never evicted for the process lifetime.
    /// TODO: evict entries whose window has been empty for longer than
    /// a retention horizon, once one is agreed on.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new()
    }
}
