//! Event fan-out to independent subscribers.
//!
//! Subscribers are registered explicitly at startup through a
//! [`SubscriberRegistry`]. Each delivery runs in its own Tokio task so that a
//! failing or panicking subscriber cannot affect the others, and no failure
//! ever reaches the caller that produced the event.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::domain::AchievementEvent;
use crate::domain::ports::AchievementSubscriber;

/// Explicitly constructed list of subscribers.
#[derive(Default, Clone)]
pub struct SubscriberRegistry {
    subscribers: Vec<Arc<dyn AchievementSubscriber>>,
}

impl SubscriberRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber.
    #[must_use]
    pub fn register(mut self, subscriber: Arc<dyn AchievementSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether no subscriber is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

/// Per-event delivery summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Names of subscribers that handled the event.
    pub delivered: Vec<&'static str>,
    /// Names of subscribers that failed or panicked.
    pub failed: Vec<&'static str>,
}

/// Dispatches committed events to every registered subscriber.
#[derive(Clone)]
pub struct EventFanOut {
    subscribers: Arc<[Arc<dyn AchievementSubscriber>]>,
}

impl EventFanOut {
    /// Build the fan-out from a registry.
    #[must_use]
    pub fn new(registry: SubscriberRegistry) -> Self {
        Self {
            subscribers: registry.subscribers.into(),
        }
    }

    /// Deliver `event` to all subscribers concurrently and wait for them.
    ///
    /// Failures are logged and reported, never returned as errors.
    pub async fn dispatch(&self, event: &AchievementEvent) -> FanOutReport {
        let deliveries = self.subscribers.iter().map(|subscriber| {
            let subscriber = Arc::clone(subscriber);
            let event = event.clone();
            let name = subscriber.name();
            let handle = tokio::spawn(async move { subscriber.handle(&event).await });
            async move { (name, handle.await) }
        });

        let mut report = FanOutReport::default();
        for (name, outcome) in join_all(deliveries).await {
            match outcome {
                Ok(Ok(())) => report.delivered.push(name),
                Ok(Err(error)) => {
                    warn!(
                        subscriber = name,
                        event_id = %event.id,
                        user_id = %event.user_id,
                        error = %error,
                        "subscriber failed"
                    );
                    report.failed.push(name);
                }
                Err(join_error) => {
                    warn!(
                        subscriber = name,
                        event_id = %event.id,
                        error = %join_error,
                        "subscriber panicked"
                    );
                    report.failed.push(name);
                }
            }
        }
        debug!(
            event_id = %event.id,
            kind = %event.kind,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "event fanned out"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MockAchievementSubscriber, SubscriberError};
    use crate::domain::{AchievementKind, UserId};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn event() -> AchievementEvent {
        AchievementEvent {
            id: Uuid::new_v4(),
            user_id: UserId::random(),
            kind: AchievementKind::XpGained,
            payload: json!({ "xp_amount": 5 }),
            occurred_at: Utc::now(),
        }
    }

    fn ok_subscriber(name: &'static str) -> MockAchievementSubscriber {
        let mut subscriber = MockAchievementSubscriber::new();
        subscriber.expect_name().return_const(name);
        subscriber.expect_handle().times(1).returning(|_| Ok(()));
        subscriber
    }

    struct Panicking(AtomicUsize);

    #[async_trait]
    impl AchievementSubscriber for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        #[allow(clippy::panic_in_result_fn, reason = "exercises panic isolation")]
        async fn handle(&self, _event: &AchievementEvent) -> Result<(), SubscriberError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            panic!("subscriber exploded");
        }
    }

    #[tokio::test]
    async fn failing_subscriber_does_not_stop_others() {
        let mut failing = MockAchievementSubscriber::new();
        failing.expect_name().return_const("failing");
        failing
            .expect_handle()
            .times(1)
            .returning(|_| Err(SubscriberError::subscriber_failure("failing", "boom")));

        let fan_out = EventFanOut::new(
            SubscriberRegistry::new()
                .register(Arc::new(ok_subscriber("first")))
                .register(Arc::new(failing))
                .register(Arc::new(ok_subscriber("second"))),
        );

        let report = fan_out.dispatch(&event()).await;

        assert_eq!(report.failed, vec!["failing"]);
        assert_eq!(report.delivered.len(), 2);
        assert!(report.delivered.contains(&"first"));
        assert!(report.delivered.contains(&"second"));
    }

    #[tokio::test]
    async fn panicking_subscriber_is_isolated() {
        let panicking = Arc::new(Panicking(AtomicUsize::new(0)));
        let fan_out = EventFanOut::new(
            SubscriberRegistry::new()
                .register(panicking.clone())
                .register(Arc::new(ok_subscriber("steady"))),
        );

        let report = fan_out.dispatch(&event()).await;

        assert_eq!(panicking.0.load(Ordering::SeqCst), 1);
        assert_eq!(report.failed, vec!["panicking"]);
        assert_eq!(report.delivered, vec!["steady"]);
    }

    #[tokio::test]
    async fn empty_registry_delivers_nothing() {
        let registry = SubscriberRegistry::new();
        assert!(registry.is_empty());

        let report = EventFanOut::new(registry).dispatch(&event()).await;
        assert_eq!(report, FanOutReport::default());
    }
}
