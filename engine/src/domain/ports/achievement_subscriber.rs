//! Port implemented by every fan-out subscriber.

use async_trait::async_trait;

use crate::domain::AchievementEvent;

use super::define_port_error;

define_port_error! {
    /// Failure reported by a subscriber. Logged and isolated by the fan-out.
    pub enum SubscriberError {
        /// The subscriber could not process the event.
        SubscriberFailure { subscriber: String, message: String } =>
            "subscriber {subscriber} failed: {message}",
    }
}

/// Independent consumer of committed achievement events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AchievementSubscriber: Send + Sync {
    /// Stable name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Process one event.
    async fn handle(&self, event: &AchievementEvent) -> Result<(), SubscriberError>;
}
