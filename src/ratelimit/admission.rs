//! Admission service: applies the live policy to the counter store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use super::policy::PolicyHandle;
use super::store::{CounterStore, FixedWindowStore};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The unit was admitted and counted.
    Allowed,
    /// The identifier's quota for the current window is used up.
    Denied {
        /// Suggested wait before retrying, equal to the window length
        retry_after: Duration,
    },
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    /// The retry hint carried by a denial.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Allowed => None,
            Decision::Denied { retry_after } => Some(*retry_after),
        }
    }
}

/// Trait for admission checks exposed to transports.
///
/// This lets the HTTP layer work against any implementation, including test
/// doubles.
#[async_trait]
pub trait AdmissionBackend: Send + Sync {
    /// Check whether `id` may proceed, consuming one unit if so.
    async fn check(&self, id: &str) -> Decision;

    /// Check whether `id` may proceed, without the retry hint.
    async fn check_access(&self, id: &str) -> bool {
        self.check(id).await.is_allowed()
    }
}

/// Resolves the current policy on every call and delegates to a
/// [`CounterStore`].
///
/// The work done per call is synchronous and never blocks on I/O. Dropping
/// the returned future before it is polled leaves the store untouched; once
/// polled it completes in one step.
pub struct AdmissionService<S: CounterStore = FixedWindowStore> {
    /// The counter store holding per-identifier state
    store: Arc<S>,
    /// The live policy
    policy: PolicyHandle,
}

impl<S: CounterStore> AdmissionService<S> {
    /// Create a new service over a store and a policy handle.
    pub fn new(store: Arc<S>, policy: PolicyHandle) -> Self {
        Self { store, policy }
    }

    /// Get the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get the policy handle this service reads from.
    pub fn policy(&self) -> &PolicyHandle {
        &self.policy
    }

    fn decide(&self, id: &str) -> Decision {
        let policy = self.policy.current();
        let allowed = self
            .store
            .try_consume(id, policy.permit_limit, policy.time_window);

        trace!(
            id = %id,
            permit_limit = policy.permit_limit,
            time_window_secs = policy.time_window.as_secs(),
            allowed = allowed,
            "Admission checked"
        );

        if allowed {
            Decision::Allowed
        } else {
            Decision::Denied {
                retry_after: policy.time_window,
            }
        }
    }
}

#[async_trait]
impl<S: CounterStore + 'static> AdmissionBackend for AdmissionService<S> {
    async fn check(&self, id: &str) -> Decision {
        self.decide(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{ManualClock, Policy};
    use parking_lot::Mutex;
    use std::time::Instant;

    /// Store double that records the arguments it was called with.
    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<(String, u64, Duration)>>,
        answer: bool,
    }

    impl CounterStore for RecordingStore {
        fn try_consume(&self, identifier: &str, max_requests: u64, window: Duration) -> bool {
            self.calls
                .lock()
                .push((identifier.to_string(), max_requests, window));
            self.answer
        }
    }

    fn manual_service(policy: Policy) -> (AdmissionService<FixedWindowStore<ManualClock>>, ManualClock) {
        let clock = ManualClock::new(Instant::now());
        let store = Arc::new(FixedWindowStore::with_clock(clock.clone()));
        (AdmissionService::new(store, PolicyHandle::new(policy)), clock)
    }

    #[test]
    fn test_decision_accessors() {
        assert!(Decision::Allowed.is_allowed());
        assert_eq!(Decision::Allowed.retry_after(), None);

        let denied = Decision::Denied {
            retry_after: Duration::from_secs(60),
        };
        assert!(!denied.is_allowed());
        assert_eq!(denied.retry_after(), Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_passes_current_policy_to_store() {
        let store = Arc::new(RecordingStore {
            answer: true,
            ..Default::default()
        });
        let policy = PolicyHandle::new(Policy::new(3, Duration::from_secs(60)));
        let service = AdmissionService::new(Arc::clone(&store), policy.clone());

        assert!(service.check_access("client-1").await);

        policy.update(Policy::new(7, Duration::from_secs(5)));
        assert!(service.check_access("client-1").await);

        let calls = store.calls.lock();
        assert_eq!(calls[0], ("client-1".to_string(), 3, Duration::from_secs(60)));
        assert_eq!(calls[1], ("client-1".to_string(), 7, Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_store_denial_becomes_retry_hint() {
        let store = Arc::new(RecordingStore::default());
        let policy = PolicyHandle::new(Policy::new(1, Duration::from_secs(42)));
        let service = AdmissionService::new(store, policy);

        let decision = service.check("client-1").await;
        assert_eq!(
            decision,
            Decision::Denied {
                retry_after: Duration::from_secs(42)
            }
        );
        assert!(!service.check_access("client-1").await);
    }

    #[tokio::test]
    async fn test_end_to_end_window_cycle() {
        let (service, clock) = manual_service(Policy::new(3, Duration::from_secs(60)));

        for _ in 0..3 {
            assert_eq!(service.check("client-1").await, Decision::Allowed);
        }

        let denied = service.check("client-1").await;
        assert_eq!(denied.retry_after(), Some(Duration::from_secs(60)));

        clock.advance(Duration::from_secs(60));
        assert_eq!(service.check("client-1").await, Decision::Allowed);
    }

    #[tokio::test]
    async fn test_raised_limit_takes_effect_without_restart() {
        let (service, _clock) = manual_service(Policy::new(1, Duration::from_secs(60)));

        assert!(service.check_access("client-1").await);
        assert!(!service.check_access("client-1").await);

        service.policy().update(Policy::new(2, Duration::from_secs(60)));
        assert!(service.check_access("client-1").await);
        assert!(!service.check_access("client-1").await);
        assert_eq!(service.store().current_count("client-1"), Some(2));
    }

    #[test]
    fn test_check_from_sync_context() {
        let (service, _clock) = manual_service(Policy::default());
        let decision = tokio_test::block_on(service.check("client-1"));
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_unpolled_check_leaves_store_untouched() {
        let (service, _clock) = manual_service(Policy::default());

        let pending = service.check("client-1");
        drop(pending);

        assert_eq!(service.store().current_count("client-1"), None);
    }
}
