//! Fixed-window counter state.

use std::time::{Duration, Instant};

/// Units consumed by one identifier in its current window.
///
/// The counter does no locking of its own; the store wraps each one in an
/// exclusive lock so that the reset, check and increment below run as one
/// critical section.
#[derive(Debug, Clone)]
pub struct WindowCounter {
    /// When the current window started
    window_start: Instant,
    /// Units consumed since `window_start`
    count: u64,
}

impl WindowCounter {
    /// Create an empty counter whose window opens at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
        }
    }

    /// Try to consume one unit at `now`.
    ///
    /// Starts a fresh window first if `window` has fully elapsed since the
    /// current one opened. Returns `true` and counts the unit if fewer than
    /// `max_requests` units were consumed in the window, otherwise returns
    /// `false` and leaves the count untouched.
    pub fn try_consume(&mut self, now: Instant, max_requests: u64, window: Duration) -> bool {
        self.maybe_reset_window(now, window);

        if self.count >= max_requests {
            return false;
        }

        self.count += 1;
        true
    }

    /// Get the count recorded for the current window.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Get when the current window started.
    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Reset the window if it has expired.
    fn maybe_reset_window(&mut self, now: Instant, window: Duration) {
        // Saturates if another caller opened the window with a later reading.
        if now.saturating_duration_since(self.window_start) >= window {
            self.window_start = now;
            self.count = 0;
        }
    }
}
