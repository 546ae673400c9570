//! Per-object-key dispatcher state layered on top of `kube::runtime::Controller`
//! (spec.md §4.8).
//!
//! `kube::runtime::Controller` already serializes reconciles per key and
//! merges watch/resync triggers; what it does not give us is a *shared*
//! backoff schedule per key that survives across the `Action::requeue`
//! boundary, and a count of in-flight reconciles for graceful-shutdown
//! draining. [`ReconcileQueue`] tracks both.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use parking_lot::Mutex;

use crate::backoff::Backoff;

/// Shared, per-key backoff state plus an in-flight counter for graceful
/// shutdown draining (spec.md §4.8 "Graceful shutdown drains the queue up
/// to a bounded deadline").
pub struct ReconcileQueue {
    min: Duration,
    max: Duration,
    backoffs: Mutex<HashMap<String, Backoff>>,
    in_flight: Arc<Mutex<usize>>,
}

/// RAII guard decrementing the in-flight counter on drop (including on
/// panic-unwind, matching cancellation-aware reconcile semantics).
pub struct InFlightGuard {
    in_flight: Arc<Mutex<usize>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.in_flight.lock();
        *count = count.saturating_sub(1);
    }
}

impl ReconcileQueue {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            backoffs: Mutex::new(HashMap::new()),
            in_flight: Arc::new(Mutex::new(0)),
        }
    }

    pub fn enter(&self, key: &str) -> InFlightGuard {
        *self.in_flight.lock() += 1;
        self.backoffs.lock().entry(key.to_string()).or_insert_with(|| Backoff::new(self.min, self.max));
        InFlightGuard {
            in_flight: self.in_flight.clone(),
        }
    }

    pub fn in_flight_count(&self) -> usize {
        *self.in_flight.lock()
    }

    /// Compute an `Action::requeue` after a failed reconcile, advancing that
    /// key's backoff.
    pub fn action_after_error(&self, key: &str) -> Action {
        let mut backoffs = self.backoffs.lock();
        let backoff = backoffs.entry(key.to_string()).or_insert_with(|| Backoff::new(self.min, self.max));
        Action::requeue(backoff.next_delay())
    }

    /// Reset a key's backoff after a successful reconcile (spec.md §4.8).
    pub fn reset(&self, key: &str) {
        if let Some(backoff) = self.backoffs.lock().get_mut(key) {
            backoff.reset();
        }
    }

    /// Forget a key entirely, e.g. after the owning CR is deleted.
    pub fn forget(&self, key: &str) {
        self.backoffs.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_guard_decrements_on_drop() {
        let queue = ReconcileQueue::new(Duration::from_millis(1), Duration::from_secs(1));
        {
            let _guard = queue.enter("ns/name");
            assert_eq!(queue.in_flight_count(), 1);
        }
        assert_eq!(queue.in_flight_count(), 0);
    }

    #[test]
    fn reset_allows_backoff_to_restart_from_minimum() {
        let queue = ReconcileQueue::new(Duration::from_millis(10), Duration::from_secs(1));
        queue.action_after_error("k");
        queue.action_after_error("k");
        queue.reset("k");
        // No panic, no way to directly inspect Action's duration; this just
        // exercises reset doesn't panic on a key with no prior backoff too.
        queue.reset("unseen-key");
    }

    #[test]
    fn forget_removes_backoff_state() {
        let queue = ReconcileQueue::new(Duration::from_millis(10), Duration::from_secs(1));
        queue.action_after_error("k");
        queue.forget("k");
        assert!(!queue.backoffs.lock().contains_key("k"));
    }
}
