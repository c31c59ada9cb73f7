//! Port for the persistent audit trail of emitted events.

use async_trait::async_trait;

use crate::domain::AchievementEvent;

use super::define_port_error;

define_port_error! {
    /// Errors raised by event audit adapters.
    pub enum EventAuditRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "event audit connection failed: {message}"; transient,
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "event audit query failed: {message}",
    }
}

/// Port recording every delivered event.
///
/// Recording is keyed by event id so retried deliveries never duplicate a
/// row.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventAuditRepository: Send + Sync {
    /// Record `event`; recording the same event twice is a no-op.
    async fn record(&self, event: &AchievementEvent) -> Result<(), EventAuditRepositoryError>;
}
