//! Admission policy and its shared, swappable handle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::info;

/// Default number of units admitted per window.
pub const DEFAULT_PERMIT_LIMIT: u64 = 10;
/// Default window length.
pub const DEFAULT_TIME_WINDOW: Duration = Duration::from_secs(60);

/// The limit and window length applied to every identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Maximum units admitted per identifier per window
    pub permit_limit: u64,
    /// Length of each counting window
    pub time_window: Duration,
}

impl Policy {
    /// Create a policy from a limit and a window length.
    pub fn new(permit_limit: u64, time_window: Duration) -> Self {
        Self {
            permit_limit,
            time_window,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            permit_limit: DEFAULT_PERMIT_LIMIT,
            time_window: DEFAULT_TIME_WINDOW,
        }
    }
}

/// Shared handle to the live policy.
///
/// Clones observe the same policy. Readers copy a whole snapshot, so one
/// admission check never mixes the limit of one policy with the window of
/// another.
#[derive(Debug, Clone, Default)]
pub struct PolicyHandle {
    inner: Arc<RwLock<Policy>>,
}

impl PolicyHandle {
    /// Create a handle holding `policy`.
    pub fn new(policy: Policy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(policy)),
        }
    }

    /// Get a snapshot of the current policy.
    pub fn current(&self) -> Policy {
        *self.inner.read()
    }

    /// Replace the policy.
    ///
    /// Returns `true` if the new policy differs from the old one.
    pub fn update(&self, policy: Policy) -> bool {
        let mut current = self.inner.write();
        if *current == policy {
            return false;
        }

        info!(
            permit_limit = policy.permit_limit,
            time_window_secs = policy.time_window.as_secs(),
            previous_permit_limit = current.permit_limit,
            previous_time_window_secs = current.time_window.as_secs(),
            "Admission policy updated"
        );
        *current = policy;
        true
    }
}
