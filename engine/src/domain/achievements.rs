//! Achievement facts, their log entries and the events fanned out after
//! commit.
//!
//! A fact is recorded as exactly one [`AchievementLogEntry`]; the entry is
//! written together with the state change that produced it, and once that
//! write commits the entry becomes one [`AchievementEvent`] sharing its id.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{Badge, Level, LevelChange, Task, UserId};

/// Kind of achievement fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    XpGained,
    LevelUp,
    BadgeUnlocked,
    TaskCompleted,
    AnswerVerified,
}

impl AchievementKind {
    /// Canonical label used in logs, events and outcomes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::XpGained => "xp_gained",
            Self::LevelUp => "level_up",
            Self::BadgeUnlocked => "badge_unlocked",
            Self::TaskCompleted => "task_completed",
            Self::AnswerVerified => "answer_verified",
        }
    }
}

impl fmt::Display for AchievementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown achievement label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown achievement type: {0}")]
pub struct ParseAchievementKindError(pub String);

impl FromStr for AchievementKind {
    type Err = ParseAchievementKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xp_gained" => Ok(Self::XpGained),
            "level_up" => Ok(Self::LevelUp),
            "badge_unlocked" => Ok(Self::BadgeUnlocked),
            "task_completed" => Ok(Self::TaskCompleted),
            "answer_verified" => Ok(Self::AnswerVerified),
            other => Err(ParseAchievementKindError(other.to_owned())),
        }
    }
}

/// A progression fact awaiting persistence.
#[derive(Debug, Clone, PartialEq)]
pub enum AchievementFact {
    XpGained {
        xp_amount: i64,
        event_type: String,
        total_xp: i64,
    },
    LevelUp(LevelChange),
    BadgeUnlocked(Badge),
    TaskCompleted(Task),
    AnswerVerified {
        answer_id: Uuid,
        question_id: Uuid,
        score: i64,
    },
}

impl AchievementFact {
    /// Kind of the fact.
    #[must_use]
    pub const fn kind(&self) -> AchievementKind {
        match self {
            Self::XpGained { .. } => AchievementKind::XpGained,
            Self::LevelUp(_) => AchievementKind::LevelUp,
            Self::BadgeUnlocked(_) => AchievementKind::BadgeUnlocked,
            Self::TaskCompleted(_) => AchievementKind::TaskCompleted,
            Self::AnswerVerified { .. } => AchievementKind::AnswerVerified,
        }
    }

    /// Flat JSON payload carried by both the log entry and the event.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::XpGained {
                xp_amount,
                event_type,
                total_xp,
            } => json!({
                "xp_amount": xp_amount,
                "event_type": event_type,
                "total_xp": total_xp,
            }),
            Self::LevelUp(change) => level_up_payload(change),
            Self::BadgeUnlocked(badge) => json!({
                "badge_id": badge.id,
                "badge_name": badge.name,
                "badge_slug": badge.slug,
                "badge_type": badge.kind.as_str(),
                "xp_reward": badge.xp_reward,
            }),
            Self::TaskCompleted(task) => json!({
                "task_id": task.id,
                "task_title": task.title,
                "frequency": task.frequency.as_str(),
                "xp_reward": task.xp_reward,
            }),
            Self::AnswerVerified {
                answer_id,
                question_id,
                score,
            } => json!({
                "answer_id": answer_id,
                "question_id": question_id,
                "score": score,
            }),
        }
    }
}

fn level_up_payload(change: &LevelChange) -> Value {
    let Level {
        id,
        name,
        xp_required,
        tier,
    } = &change.current;
    let mut payload = json!({
        "level_id": id,
        "level_name": name,
        "tier": tier,
        "xp_required": xp_required,
    });
    if let (Some(previous), Some(object)) = (&change.previous, payload.as_object_mut()) {
        object.insert("previous_level_id".to_owned(), json!(previous.id));
        object.insert("previous_level_name".to_owned(), json!(previous.name));
    }
    payload
}

/// Append-only record of one fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementLogEntry {
    pub id: Uuid,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: AchievementKind,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl AchievementLogEntry {
    /// Record `fact` for `user_id` at `now`.
    #[must_use]
    pub fn record(user_id: UserId, fact: &AchievementFact, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind: fact.kind(),
            metadata: fact.payload(),
            created_at: now,
        }
    }

    /// Event emitted once this entry has been committed.
    #[must_use]
    pub fn to_event(&self) -> AchievementEvent {
        AchievementEvent {
            id: self.id,
            user_id: self.user_id,
            kind: self.kind,
            payload: self.metadata.clone(),
            occurred_at: self.created_at,
        }
    }
}

/// Domain event delivered to fan-out subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementEvent {
    pub id: Uuid,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: AchievementKind,
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
}

impl AchievementEvent {
    /// Read an integer field from the payload.
    #[must_use]
    pub fn payload_i64(&self, field: &str) -> Option<i64> {
        self.payload.get(field).and_then(Value::as_i64)
    }
}
