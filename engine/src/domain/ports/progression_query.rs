//! Driving port for progression read models.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AchievementLogEntry, AwardedBadge, Badge, Error, Level, Task, TaskFrequency, UserId, UserTask,
};

/// A user's standing on the level ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub user_id: UserId,
    pub total_xp: i64,
    pub streak_days: u32,
    pub last_active_at: Option<DateTime<Utc>>,
    pub current_level: Option<Level>,
    pub next_level: Option<Level>,
    pub xp_to_next: i64,
}

/// One task with the assignment that represents it for the current period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub task: Task,
    pub assignment: UserTask,
}

/// Driving port for read-only progression queries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressionQuery: Send + Sync {
    /// Total XP, level position and streak of a user.
    async fn level_progress(&self, user_id: &UserId) -> Result<ProgressSnapshot, Error>;

    /// Badges held by a user, most recent first.
    async fn user_badges(&self, user_id: &UserId) -> Result<Vec<AwardedBadge>, Error>;

    /// The active badge catalogue.
    async fn active_badges(&self) -> Result<Vec<Badge>, Error>;

    /// One row per task for the current period.
    async fn tasks_for_user(
        &self,
        user_id: &UserId,
        frequency: Option<TaskFrequency>,
    ) -> Result<Vec<TaskView>, Error>;

    /// The newest `limit` achievement log entries of a user.
    async fn achievement_history(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<AchievementLogEntry>, Error>;
}
