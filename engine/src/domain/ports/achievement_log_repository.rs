//! Port for standalone achievement log access.

use async_trait::async_trait;

use crate::domain::{AchievementLogEntry, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by achievement log adapters.
    pub enum AchievementLogRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "achievement log connection failed: {message}"; transient,
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "achievement log query failed: {message}",
    }
}

/// Port for facts that carry no other state change, and for history reads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AchievementLogRepository: Send + Sync {
    /// Append one entry.
    async fn append(&self, entry: &AchievementLogEntry)
    -> Result<(), AchievementLogRepositoryError>;

    /// The newest `limit` entries for a user, newest first.
    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<AchievementLogEntry>, AchievementLogRepositoryError>;
}
