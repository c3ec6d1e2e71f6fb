//! Fixed-window fetch rate limiting.
//!
//! Each fetch worker owns its own [`RateLimiter`]; it is not shared between
//! threads. The window restarts at the time of the first admission after it
//! has elapsed, not at `window_start + window`.

use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

/// Admits at most `max_fetch_count` fetches per window.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_fetch_count: u32,
    window: Duration,
    window_start: Option<Instant>,
    count_in_window: u32,
}

impl RateLimiter {
    /// Create a limiter. A zero count or zero window disables limiting.
    pub fn new(max_fetch_count: u32, window: Duration) -> Self {
        Self {
            max_fetch_count,
            window,
            window_start: None,
            count_in_window: 0,
        }
    }

    /// A limiter that admits everything.
    pub fn unlimited() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.max_fetch_count > 0 && !self.window.is_zero()
    }

    /// Fetches admitted in the current window.
    pub fn count_in_window(&self) -> u32 {
        self.count_in_window
    }

    /// Try to admit one fetch at `now`.
    ///
    /// Returns `Duration::ZERO` when the fetch is admitted and counted.
    /// Otherwise returns how long to wait until the window ends; the caller
    /// must sleep and ask again.
    ///
    /// The count is strict: the fetch after the `max_fetch_count`th in a
    /// window waits, rather than being let through before the limit trips.
    pub fn admit(&mut self, now: Instant) -> Duration {
        if !self.is_enabled() {
            return Duration::ZERO;
        }

        let start = *self.window_start.get_or_insert(now);
        let mut elapsed = now.saturating_duration_since(start);
        if elapsed >= self.window {
            self.window_start = Some(now);
            self.count_in_window = 0;
            elapsed = Duration::ZERO;
        }

        if self.count_in_window >= self.max_fetch_count {
            return self.window - elapsed;
        }

        self.count_in_window += 1;
        Duration::ZERO
    }

    /// Block until a fetch is admitted.
    pub fn acquire(&mut self) {
        loop {
            let wait = self.admit(Instant::now());
            if wait.is_zero() {
                return;
            }
            debug!(
                "Rate limit of {} per {:?} reached, sleeping {:?}",
                self.max_fetch_count, self.window, wait
            );
            thread::sleep(wait);
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}
