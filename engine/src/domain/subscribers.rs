//! The engine's fan-out subscribers.
//!
//! - [`RealtimeNotifier`] pushes events to connected clients, best effort.
//! - [`AuditLogger`] persists every event, retrying transient failures.
//! - [`QueuedEffects`] schedules chained work such as reward grants.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error};

use crate::domain::ports::{
    AchievementSubscriber, EffectQueue, EventAuditRepository, RealtimeTransport, SubscriberError,
};
use crate::domain::{
    AchievementEvent, BackoffJitter, NoJitter, RetryPolicy, Sleeper, TokioSleeper,
    chained_effect_for,
};

/// Best-effort real-time notification.
pub struct RealtimeNotifier {
    transport: Arc<dyn RealtimeTransport>,
}

impl RealtimeNotifier {
    /// Notify through `transport`.
    pub fn new(transport: Arc<dyn RealtimeTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl AchievementSubscriber for RealtimeNotifier {
    fn name(&self) -> &'static str {
        "realtime_notifier"
    }

    async fn handle(&self, event: &AchievementEvent) -> Result<(), SubscriberError> {
        let message = json!({
            "id": event.id,
            "type": event.kind.as_str(),
            "payload": event.payload,
            "occurredAt": event.occurred_at,
        });
        self.transport
            .deliver(&event.user_id, &message)
            .await
            .map_err(|err| SubscriberError::subscriber_failure(self.name(), err.to_string()))
    }
}

/// Persistent audit trail with bounded retries.
pub struct AuditLogger {
    repository: Arc<dyn EventAuditRepository>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    jitter: Arc<dyn BackoffJitter>,
}

impl AuditLogger {
    /// Record through `repository`, retrying per `policy`.
    pub fn new(repository: Arc<dyn EventAuditRepository>, policy: RetryPolicy) -> Self {
        Self {
            repository,
            policy,
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(NoJitter),
        }
    }

    /// Replace the sleeping and jitter strategies.
    #[must_use]
    pub fn with_runtime(mut self, sleeper: Arc<dyn Sleeper>, jitter: Arc<dyn BackoffJitter>) -> Self {
        self.sleeper = sleeper;
        self.jitter = jitter;
        self
    }
}

#[async_trait]
impl AchievementSubscriber for AuditLogger {
    fn name(&self) -> &'static str {
        "audit_logger"
    }

    async fn handle(&self, event: &AchievementEvent) -> Result<(), SubscriberError> {
        let mut attempt = 1;
        loop {
            match self.repository.record(event).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() && self.policy.allows_retry_after(attempt) => {
                    let delay = self.jitter.jittered_delay(self.policy.base_delay(attempt));
                    debug!(
                        event_id = %event.id,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "audit write failed; retrying"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        event_id = %event.id,
                        user_id = %event.user_id,
                        attempts = attempt,
                        error = %err,
                        "audit write abandoned"
                    );
                    return Err(SubscriberError::subscriber_failure(
                        self.name(),
                        err.to_string(),
                    ));
                }
            }
        }
    }
}

/// Schedules chained effects on the work queue.
pub struct QueuedEffects {
    queue: Arc<dyn EffectQueue>,
    answer_verified_xp: i64,
}

impl QueuedEffects {
    /// Enqueue onto `queue`; verified answers pay `answer_verified_xp`.
    pub fn new(queue: Arc<dyn EffectQueue>, answer_verified_xp: i64) -> Self {
        Self {
            queue,
            answer_verified_xp,
        }
    }
}

#[async_trait]
impl AchievementSubscriber for QueuedEffects {
    fn name(&self) -> &'static str {
        "queued_effects"
    }

    async fn handle(&self, event: &AchievementEvent) -> Result<(), SubscriberError> {
        let Some(effect) = chained_effect_for(event, self.answer_verified_xp) else {
            return Ok(());
        };
        debug!(event_id = %event.id, kind = %event.kind, "scheduling chained effect");
        self.queue
            .enqueue(effect)
            .await
            .map_err(|err| SubscriberError::subscriber_failure(self.name(), err.to_string()))
    }
}
