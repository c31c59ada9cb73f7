//! Task templates and per-user assignments.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PeriodWindow, UserId};

/// How often a task recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskFrequency {
    Daily,
    Weekly,
    #[serde(alias = "one_off", alias = "oneoff")]
    OneOff,
}

impl TaskFrequency {
    /// Canonical label stored and exposed by the engine.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::OneOff => "one-off",
        }
    }
}

/// Error returned when parsing an unknown frequency label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task frequency: {0}")]
pub struct ParseTaskFrequencyError(pub String);

impl FromStr for TaskFrequency {
    type Err = ParseTaskFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "one-off" | "one_off" | "oneoff" => Ok(Self::OneOff),
            other => Err(ParseTaskFrequencyError(other.to_owned())),
        }
    }
}

impl fmt::Display for TaskFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assignment lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    /// Canonical label stored by the engine.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

/// Error returned when parsing an unknown status label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(ParseTaskStatusError(other.to_owned())),
        }
    }
}

/// Task template shared by all users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub frequency: TaskFrequency,
    pub xp_reward: i64,
    pub is_active: bool,
}

/// A task assigned to one user for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTask {
    pub id: Uuid,
    pub user_id: UserId,
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub period_key: Option<String>,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UserTask {
    /// Fresh pending assignment stamped at `now` for `window`.
    #[must_use]
    pub fn pending(user_id: UserId, task_id: Uuid, window: &PeriodWindow, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            task_id,
            status: TaskStatus::Pending,
            period_key: window.key().map(str::to_owned),
            assigned_at: now,
            completed_at: None,
        }
    }

    /// Whether the assignment reached its terminal state.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Assignments that fall inside `window`, newest first.
pub fn in_window<'a>(
    assignments: &'a [UserTask],
    window: &'a PeriodWindow,
) -> impl Iterator<Item = &'a UserTask> + 'a {
    let mut current: Vec<&UserTask> = assignments
        .iter()
        .filter(|assignment| window.contains(assignment.assigned_at))
        .collect();
    current.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));
    current.into_iter()
}

/// Pick the single assignment that represents a task for the period.
///
/// Only assignments inside `window` are considered. A completed assignment
/// wins over a pending one, and a pending one over anything else; ties go to
/// the most recent.
#[must_use]
pub fn select_relevant<'a>(
    assignments: &'a [UserTask],
    window: &'a PeriodWindow,
) -> Option<&'a UserTask> {
    let current: Vec<&UserTask> = in_window(assignments, window).collect();
    current
        .iter()
        .find(|assignment| assignment.status == TaskStatus::Completed)
        .or_else(|| {
            current
                .iter()
                .find(|assignment| assignment.status == TaskStatus::Pending)
        })
        .or_else(|| current.first())
        .copied()
}
