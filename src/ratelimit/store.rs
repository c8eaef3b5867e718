//! Concurrent per-identifier counter store.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::counter::WindowCounter;

/// Trait for stores that can admit one unit of work for an identifier.
///
/// Implementations must make the window check, limit check and increment for
/// a single identifier atomic with respect to every other call for that same
/// identifier.
pub trait CounterStore: Send + Sync {
    /// Try to consume one unit for `identifier` under the given limit and
    /// window length.
    ///
    /// Returns `true` if the unit was admitted and counted, `false` if the
    /// identifier has already used `max_requests` units in its current window.
    fn try_consume(&self, identifier: &str, max_requests: u64, window: Duration) -> bool;
}

/// In-memory fixed-window store.
///
/// Counters live in a sharded map and each one sits behind its own mutex.
/// The shard guard is dropped before the counter lock is taken, so checks
/// for different identifiers never wait on each other. Counters are created
/// on first use and kept for the lifetime of the store.
pub struct FixedWindowStore<C: Clock = SystemClock> {
    /// Counters indexed by identifier
    counters: DashMap<String, Arc<Mutex<WindowCounter>>>,
    /// Time source for opening and expiring windows
    clock: C,
}

impl FixedWindowStore<SystemClock> {
    /// Create an empty store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock::new())
    }
}

impl Default for FixedWindowStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> FixedWindowStore<C> {
    /// Create an empty store driven by the given clock.
    pub fn with_clock(clock: C) -> Self {
        Self {
            counters: DashMap::new(),
            clock,
        }
    }

    /// Get the number of identifiers seen so far.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Check whether no identifier has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Get the count recorded in the identifier's current window.
    ///
    /// Returns `None` if the identifier has never been checked. The value is
    /// what the last call left behind; an expired window is only reset by the
    /// next `try_consume`.
    pub fn current_count(&self, identifier: &str) -> Option<u64> {
        let counter = self.counters.get(identifier).map(|c| Arc::clone(c.value()))?;
        let count = counter.lock().count();
        Some(count)
    }

    /// Get the counter for an identifier, installing a fresh one if needed.
    fn counter(&self, identifier: &str) -> Arc<Mutex<WindowCounter>> {
        if let Some(existing) = self.counters.get(identifier) {
            return Arc::clone(existing.value());
        }

        // Racing first touches resolve inside the shard lock; one counter wins.
        let entry = self
            .counters
            .entry(identifier.to_owned())
            .or_insert_with(|| {
                debug!(identifier = %identifier, "Creating new window counter");
                Arc::new(Mutex::new(WindowCounter::new(self.clock.now())))
            });
        Arc::clone(entry.value())
    }
}

impl<C: Clock> CounterStore for FixedWindowStore<C> {
    fn try_consume(&self, identifier: &str, max_requests: u64, window: Duration) -> bool {
        let counter = self.counter(identifier);

        let mut counter = counter.lock();
        let previous_start = counter.window_start();
        let allowed = counter.try_consume(self.clock.now(), max_requests, window);

        if counter.window_start() != previous_start {
            debug!(identifier = %identifier, "Window expired, counter reset");
        }

        trace!(
            identifier = %identifier,
            count = counter.count(),
            max_requests = max_requests,
            allowed = allowed,
            "Consumed from window counter"
        );

        if !allowed {
            debug!(identifier = %identifier, max_requests = max_requests, "Window limit reached");
        }

        allowed
    }
}
