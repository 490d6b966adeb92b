//! Rate limiting for per-tick work that is too expensive to run every frame.

use std::time::{Duration, Instant};

/// Throttles a callback to at most one invocation per fixed interval.
///
/// The first call always fires. Later calls fire only once `interval` has
/// elapsed since the last fire; everything in between is silently skipped.
/// Designed to be invoked every tick of the frame loop.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use arstage::RateLimiter;
///
/// let mut limiter = RateLimiter::new(Duration::from_millis(500));
/// let mut runs = 0;
/// limiter.execute(|| runs += 1); // fires
/// limiter.execute(|| runs += 1); // skipped, interval not yet elapsed
/// assert_eq!(runs, 1);
/// ```
pub struct RateLimiter {
    interval: Duration,
    last_fire: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fire: None,
        }
    }

    /// Run `callback` if the interval has elapsed since the last fire.
    pub fn execute(&mut self, callback: impl FnOnce()) {
        if self.fire_at(Instant::now()) {
            callback();
        }
    }

    /// Report whether a call arriving at `now` should fire, updating the
    /// limiter state when it does.
    ///
    /// Split out from [`execute`](Self::execute) so callers that need to
    /// borrow themselves inside the guarded block can use a plain `if`.
    pub fn fire_at(&mut self, now: Instant) -> bool {
        let due = match self.last_fire {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };
        if due {
            self.last_fire = Some(now);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_fires_immediately() {
        let mut limiter = RateLimiter::new(Duration::from_millis(500));
        assert!(limiter.fire_at(Instant::now()));
    }

    #[test]
    fn fires_only_after_interval_elapses() {
        let mut limiter = RateLimiter::new(Duration::from_millis(500));
        let t0 = Instant::now();

        assert!(limiter.fire_at(t0));
        assert!(!limiter.fire_at(t0 + Duration::from_millis(100)));
        assert!(!limiter.fire_at(t0 + Duration::from_millis(400)));
        assert!(limiter.fire_at(t0 + Duration::from_millis(600)));
    }

    #[test]
    fn interval_counts_from_last_fire_not_last_attempt() {
        let mut limiter = RateLimiter::new(Duration::from_millis(500));
        let t0 = Instant::now();

        assert!(limiter.fire_at(t0));
        // Skipped attempts must not push the window forward.
        assert!(!limiter.fire_at(t0 + Duration::from_millis(499)));
        assert!(limiter.fire_at(t0 + Duration::from_millis(500)));
    }

    #[test]
    fn tolerates_every_tick_invocation() {
        let mut limiter = RateLimiter::new(Duration::from_millis(500));
        let t0 = Instant::now();
        let mut fires = 0;
        for ms in (0..2000).step_by(16) {
            if limiter.fire_at(t0 + Duration::from_millis(ms)) {
                fires += 1;
            }
        }
        // t=0 plus one fire per full 500 ms window.
        assert_eq!(fires, 4);
    }
}
