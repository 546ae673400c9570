//! Exponential backoff with jitter, bounded min/max (spec.md §4.8).
use std::time::Duration;

use rand::Rng;

/// Per-key retry schedule. `next()` both returns the delay to wait and
/// advances internal state; `reset()` is called after a successful
/// reconcile (spec.md §4.8 "At most one in-flight reconcile per key").
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            multiplier: 2.0,
            current: min,
        }
    }

    /// Returns the delay for the next retry and advances the schedule.
    /// Jitter is applied as a uniform random factor in `[0.5, 1.0]` of the
    /// computed exponential delay, so concurrent keys failing together
    /// don't retry in lockstep.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        let next = Duration::from_secs_f64((self.current.as_secs_f64() * self.multiplier).min(self.max.as_secs_f64()));
        self.current = next.max(self.min);

        let jitter_factor = rand::rng().random_range(0.5..=1.0);
        Duration::from_secs_f64(base.as_secs_f64() * jitter_factor).max(self.min)
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_toward_but_never_past_max() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(8));
        for _ in 0..10 {
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_secs(1) / 2 || delay >= Duration::from_secs(1));
            assert!(delay <= Duration::from_secs(8));
        }
    }

    #[test]
    fn reset_returns_to_minimum() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        let delay = backoff.next_delay();
        assert!(delay <= Duration::from_millis(100));
    }

    #[test]
    fn never_exceeds_configured_max() {
        let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_millis(50));
        let mut last = Duration::ZERO;
        for _ in 0..20 {
            last = backoff.next_delay();
        }
        assert!(last <= Duration::from_millis(50));
    }
}
