//! Port for the badge catalogue and per-user awards.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{AchievementLogEntry, AwardedBadge, Badge, UserBadge, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by badge repository adapters.
    pub enum BadgeRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "badge repository connection failed: {message}"; transient,
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "badge repository query failed: {message}",
    }
}

/// Award row and its achievement entry, written together.
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeAwardCommit {
    pub award: UserBadge,
    pub achievement: AchievementLogEntry,
}

/// Outcome of an award commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwardOutcome {
    /// The award row and the achievement entry were written.
    Awarded,
    /// The user already held the badge; nothing was written.
    AlreadyHeld(UserBadge),
}

/// Port for badge storage.
///
/// `commit_award` relies on the store's uniqueness of `(user_id, badge_id)`:
/// when two awards race, exactly one reports [`AwardOutcome::Awarded`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BadgeRepository: Send + Sync {
    /// Look a badge up by id, active or not.
    async fn find_badge(&self, badge_id: &Uuid) -> Result<Option<Badge>, BadgeRepositoryError>;

    /// Active badges ordered by name.
    async fn list_active_badges(&self) -> Result<Vec<Badge>, BadgeRepositoryError>;

    /// Badges held by a user, most recently awarded first.
    async fn list_user_badges(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AwardedBadge>, BadgeRepositoryError>;

    /// Existing award of `badge_id` to `user_id`, if any.
    async fn find_user_badge(
        &self,
        user_id: &UserId,
        badge_id: &Uuid,
    ) -> Result<Option<UserBadge>, BadgeRepositoryError>;

    /// Write the award and its achievement entry atomically.
    async fn commit_award(
        &self,
        commit: &BadgeAwardCommit,
    ) -> Result<AwardOutcome, BadgeRepositoryError>;

    /// Insert a badge or replace the one with the same id.
    async fn upsert_badge(&self, badge: &Badge) -> Result<(), BadgeRepositoryError>;
}
