//! Internal Diesel row structs and their domain conversions.
//!
//! These types never leave the persistence layer. Conversions from rows
//! report malformed stored values as plain messages; each repository wraps
//! them in its own query error.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::ports::JobLease;
use crate::domain::{
    AchievementEvent, AchievementKind, AchievementLogEntry, Badge, BadgeKind, Level, Task,
    TaskStatus, UserId, UserProgress, UserTask, XpLogEntry,
};

use super::schema::{
    achievement_event_audit, achievement_log, badges, job_leases, levels, tasks, user_badges,
    user_progress, user_tasks, xp_log_entries,
};

// ---------------------------------------------------------------------------
// Catalogue rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = levels)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct LevelRow {
    pub id: Uuid,
    pub name: String,
    pub xp_required: i64,
    pub tier: i32,
}

impl From<LevelRow> for Level {
    fn from(row: LevelRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            xp_required: row.xp_required,
            tier: row.tier,
        }
    }
}

impl From<&Level> for LevelRow {
    fn from(level: &Level) -> Self {
        Self {
            id: level.id,
            name: level.name.clone(),
            xp_required: level.xp_required,
            tier: level.tier,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = badges)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub(crate) struct BadgeRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub badge_type: String,
    pub icon_path: Option<String>,
    pub xp_reward: i64,
    pub is_active: bool,
}

impl From<BadgeRow> for Badge {
    fn from(row: BadgeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            kind: BadgeKind::from(row.badge_type),
            icon_path: row.icon_path,
            xp_reward: row.xp_reward,
            is_active: row.is_active,
        }
    }
}

impl From<&Badge> for BadgeRow {
    fn from(badge: &Badge) -> Self {
        Self {
            id: badge.id,
            name: badge.name.clone(),
            slug: badge.slug.clone(),
            description: badge.description.clone(),
            badge_type: badge.kind.as_str().to_owned(),
            icon_path: badge.icon_path.clone(),
            xp_reward: badge.xp_reward,
            is_active: badge.is_active,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct TaskRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub frequency: String,
    pub xp_reward: i64,
    pub is_active: bool,
}

impl TryFrom<TaskRow> for Task {
    type Error = String;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            frequency: row.frequency.parse().map_err(|err| format!("{err}"))?,
            xp_reward: row.xp_reward,
            is_active: row.is_active,
        })
    }
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            description: task.description.clone(),
            frequency: task.frequency.as_str().to_owned(),
            xp_reward: task.xp_reward,
            is_active: task.is_active,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress and ledger rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_progress)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserProgressRow {
    pub user_id: Uuid,
    pub total_xp: i64,
    pub streak_days: i32,
    pub last_active_at: Option<DateTime<Utc>>,
    pub revision: i32,
}

impl TryFrom<UserProgressRow> for UserProgress {
    type Error = String;

    fn try_from(row: UserProgressRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId::from_uuid(row.user_id),
            total_xp: row.total_xp,
            streak_days: u32::try_from(row.streak_days)
                .map_err(|_| format!("negative streak for user {}", row.user_id))?,
            last_active_at: row.last_active_at,
            revision: revision_from_db(row.revision)?,
        })
    }
}

impl TryFrom<&UserProgress> for UserProgressRow {
    type Error = String;

    fn try_from(progress: &UserProgress) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: *progress.user_id.as_uuid(),
            total_xp: progress.total_xp,
            streak_days: i32::try_from(progress.streak_days)
                .map_err(|_| "streak exceeds storage range".to_owned())?,
            last_active_at: progress.last_active_at,
            revision: revision_for_db(progress.revision)?,
        })
    }
}

/// Stored revisions are never negative.
pub(crate) fn revision_from_db(revision: i32) -> Result<u32, String> {
    u32::try_from(revision).map_err(|_| format!("negative revision {revision}"))
}

/// Domain revisions fit the signed column for any realistic history.
pub(crate) fn revision_for_db(revision: u32) -> Result<i32, String> {
    i32::try_from(revision).map_err(|_| format!("revision {revision} exceeds storage range"))
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = xp_log_entries)]
pub(crate) struct XpLogEntryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_type: String,
    pub xp_amount: i64,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl From<&XpLogEntry> for XpLogEntryRow {
    fn from(entry: &XpLogEntry) -> Self {
        Self {
            id: entry.id,
            user_id: *entry.user_id.as_uuid(),
            event_type: entry.event_type.as_str().to_owned(),
            xp_amount: entry.xp_amount.get(),
            metadata: Value::Object(entry.metadata.clone()),
            created_at: entry.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Award and assignment rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_badges)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserBadgeRow {
    pub user_id: Uuid,
    pub badge_id: Uuid,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserTaskRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub status: String,
    pub period_key: Option<String>,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserTaskRow> for UserTask {
    type Error = String;

    fn try_from(row: UserTaskRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: UserId::from_uuid(row.user_id),
            task_id: row.task_id,
            status: row.status.parse().map_err(|err| format!("{err}"))?,
            period_key: row.period_key,
            assigned_at: row.assigned_at,
            completed_at: row.completed_at,
        })
    }
}

impl From<&UserTask> for UserTaskRow {
    fn from(task: &UserTask) -> Self {
        Self {
            id: task.id,
            user_id: *task.user_id.as_uuid(),
            task_id: task.task_id,
            status: task.status.as_str().to_owned(),
            period_key: task.period_key.clone(),
            assigned_at: task.assigned_at,
            completed_at: task.completed_at,
        }
    }
}

/// Status label written by a completion.
pub(crate) const COMPLETED: &str = TaskStatus::Completed.as_str();
/// Status label of an open assignment.
pub(crate) const PENDING: &str = TaskStatus::Pending.as_str();

// ---------------------------------------------------------------------------
// Achievement rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = achievement_log)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AchievementLogRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub achievement_type: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = achievement_log)]
pub(crate) struct NewAchievementLogRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub achievement_type: &'static str,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl From<&AchievementLogEntry> for NewAchievementLogRow {
    fn from(entry: &AchievementLogEntry) -> Self {
        Self {
            id: entry.id,
            user_id: *entry.user_id.as_uuid(),
            achievement_type: entry.kind.as_str(),
            metadata: entry.metadata.clone(),
            created_at: entry.created_at,
        }
    }
}

impl TryFrom<AchievementLogRow> for AchievementLogEntry {
    type Error = String;

    fn try_from(row: AchievementLogRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: UserId::from_uuid(row.user_id),
            kind: row
                .achievement_type
                .parse::<AchievementKind>()
                .map_err(|err| err.to_string())?,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = achievement_event_audit)]
pub(crate) struct NewEventAuditRow {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub event_type: &'static str,
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
}

impl From<&AchievementEvent> for NewEventAuditRow {
    fn from(event: &AchievementEvent) -> Self {
        Self {
            event_id: event.id,
            user_id: *event.user_id.as_uuid(),
            event_type: event.kind.as_str(),
            payload: event.payload.clone(),
            occurred_at: event.occurred_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = job_leases)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct JobLeaseRow {
    pub job: String,
    pub holder: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl From<JobLeaseRow> for JobLease {
    fn from(row: JobLeaseRow) -> Self {
        Self {
            job: row.job,
            holder: row.holder,
            expires_at: row.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("daily", true)]
    #[case("one-off", true)]
    #[case("hourly", false)]
    fn task_rows_validate_frequency(#[case] frequency: &str, #[case] valid: bool) {
        let row = TaskRow {
            id: Uuid::new_v4(),
            title: "Check in".to_owned(),
            description: String::new(),
            frequency: frequency.to_owned(),
            xp_reward: 5,
            is_active: true,
        };
        assert_eq!(Task::try_from(row).is_ok(), valid);
    }

    #[rstest]
    fn negative_revision_is_rejected() {
        assert!(revision_from_db(-1).is_err());
        assert_eq!(revision_from_db(3), Ok(3));
    }

    #[rstest]
    fn badge_type_is_normalised_on_read() {
        let row = BadgeRow {
            id: Uuid::new_v4(),
            name: "Helper".to_owned(),
            slug: "helper".to_owned(),
            description: String::new(),
            badge_type: " Milestone ".to_owned(),
            icon_path: None,
            xp_reward: 0,
            is_active: true,
        };
        assert_eq!(Badge::from(row).kind, BadgeKind::Milestone);
    }
}
