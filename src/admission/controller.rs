//! Admission decisions against the window registry.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, trace};

use super::registry::WindowRegistry;

/// The outcome of evaluating one request.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Whether the request was admitted
    pub admitted: bool,
    /// Requests counted in the client's window, including this one when admitted
    pub current_count: u64,
    /// The client the decision applies to
    pub client_id: String,
    /// When the request was evaluated (offset from the Unix epoch)
    pub timestamp: Duration,
}

/// Evaluates requests against the registry and a fixed window/limit pair.
///
/// This struct is thread-safe and can be shared across request handlers.
pub struct AdmissionController {
    /// Per-client window state, owned by the controller
    registry: WindowRegistry,
    /// Trailing window over which requests are counted
    window: Duration,
    /// Maximum admitted requests per client per window
    limit: u64,
}

impl AdmissionController {
    /// Create a controller with the given window and limit.
    pub fn new(window: Duration, limit: u64) -> Self {
        Self {
            registry: WindowRegistry::new(),
            window,
            limit,
        }
    }

    /// Evaluate one request from `client_id` at time `now`.
    ///
    /// The client's window is pruned and counted first; at or above the
    /// limit the request is rejected without recording its timestamp, so
    /// rejected requests never count toward future windows. Otherwise the
    /// timestamp is recorded and the request admitted.
    pub fn admit(&self, client_id: &str, now: Duration) -> Decision {
        let (admitted, current_count) = self.registry.with_window(client_id, |window| {
            let count = window.prune_and_count(now, self.window);
            if count >= self.limit {
                (false, count)
            } else {
                window.record(now);
                (true, count + 1)
            }
        });

        if admitted {
            trace!(client_id, current_count, "request admitted");
        } else {
            debug!(client_id, current_count, "rate limit exceeded");
        }

        Decision {
            admitted,
            current_count,
            client_id: client_id.to_string(),
            timestamp: now,
        }
    }

    /// Evaluate one request from `client_id` against the system clock.
    pub fn admit_now(&self, client_id: &str) -> Decision {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        self.admit(client_id, now)
    }

    /// The registry backing this controller.
    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    /// The configured window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// The configured limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_admission_threshold() {
        let controller = AdmissionController::new(secs(10), 3);

        // window=10, limit=3: requests at t=0,1,2,3
        let first = controller.admit("X", secs(0));
        assert!(first.admitted);
        assert_eq!(first.current_count, 1);

        let second = controller.admit("X", secs(1));
        assert!(second.admitted);
        assert_eq!(second.current_count, 2);

        let third = controller.admit("X", secs(2));
        assert!(third.admitted);
        assert_eq!(third.current_count, 3);

        let fourth = controller.admit("X", secs(3));
        assert!(!fourth.admitted);
        assert_eq!(fourth.current_count, 3);
    }

    #[test]
    fn test_rejection_does_not_mutate_window() {
        let controller = AdmissionController::new(secs(10), 2);
        controller.admit("X", secs(0));
        controller.admit("X", secs(1));

        for t in 2..6 {
            assert!(!controller.admit("X", secs(t)).admitted);
        }

        // only the two admitted timestamps are stored
        assert_eq!(
            controller.registry().prune_and_count("X", secs(5), secs(10)),
            2
        );
    }

    #[test]
    fn test_window_frees_up_after_aging() {
        let controller = AdmissionController::new(secs(10), 3);
        for t in 0..3 {
            assert!(controller.admit("X", secs(t)).admitted);
        }
        assert!(!controller.admit("X", secs(3)).admitted);

        // at t=11 the entry from t=0 has aged out; t=1 sits exactly on the
        // boundary and is still counted
        let decision = controller.admit("X", secs(11));
        assert!(decision.admitted);
        assert_eq!(decision.current_count, 3);

        // once all three originals have aged out, the count restarts
        let decision = controller.admit("X", secs(22));
        assert!(decision.admitted);
        assert_eq!(decision.current_count, 1);
    }

    #[test]
    fn test_zero_limit_rejects_everything() {
        let controller = AdmissionController::new(secs(10), 0);
        let decision = controller.admit("X", secs(0));
        assert!(!decision.admitted);
        assert_eq!(decision.current_count, 0);
    }

    #[test]
    fn test_zero_window_disables_limiting() {
        let controller = AdmissionController::new(Duration::ZERO, 1);
        // each prune clears everything older than now, so advancing time
        // always admits
        for t in 0..5 {
            let decision = controller.admit("X", secs(t));
            assert!(decision.admitted);
            assert_eq!(decision.current_count, 1);
        }
    }

    #[test]
    fn test_no_cross_client_interference() {
        let controller = AdmissionController::new(secs(10), 1);
        assert!(controller.admit("A", secs(0)).admitted);
        assert!(!controller.admit("A", secs(1)).admitted);

        // B is unaffected by A's rejection
        let decision = controller.admit("B", secs(1));
        assert!(decision.admitted);
        assert_eq!(decision.current_count, 1);
    }

    #[test]
    fn test_concurrent_same_client_admits_exactly_limit() {
        const LIMIT: u64 = 50;
        const WORKERS: usize = 8;
        const REQUESTS_PER_WORKER: usize = 10;

        let controller = Arc::new(AdmissionController::new(secs(10), LIMIT));
        let admitted = Arc::new(AtomicU64::new(0));
        let rejected = Arc::new(AtomicU64::new(0));

        std::thread::scope(|s| {
            for _ in 0..WORKERS {
                let controller = Arc::clone(&controller);
                let admitted = Arc::clone(&admitted);
                let rejected = Arc::clone(&rejected);
                s.spawn(move || {
                    for _ in 0..REQUESTS_PER_WORKER {
                        let decision = controller.admit("X", secs(1_000));
                        if decision.admitted {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        } else {
                            rejected.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        // 80 simultaneous requests, never more or fewer than 50 admitted
        assert_eq!(admitted.load(Ordering::SeqCst), LIMIT);
        assert_eq!(
            rejected.load(Ordering::SeqCst),
            (WORKERS * REQUESTS_PER_WORKER) as u64 - LIMIT
        );
    }

    #[test]
    fn test_admit_now_uses_wall_clock() {
        let controller = AdmissionController::new(secs(60), 2);
        assert!(controller.admit_now("X").admitted);
        assert!(controller.admit_now("X").admitted);
        assert!(!controller.admit_now("X").admitted);
    }
}
