//! Badge catalogue entries and per-user awards.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// Badge category normalised from the raw stored label.
///
/// Known labels map to dedicated variants; anything else is preserved in
/// [`BadgeKind::Other`] so unknown categories survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BadgeKind {
    Achievement,
    Participation,
    Milestone,
    Special,
    Other(String),
}

impl BadgeKind {
    /// Canonical lower-case label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Achievement => "achievement",
            Self::Participation => "participation",
            Self::Milestone => "milestone",
            Self::Special => "special",
            Self::Other(raw) => raw,
        }
    }
}

impl From<&str> for BadgeKind {
    fn from(raw: &str) -> Self {
        let normalised = raw.trim().to_ascii_lowercase();
        match normalised.as_str() {
            "achievement" => Self::Achievement,
            "participation" => Self::Participation,
            "milestone" => Self::Milestone,
            "special" => Self::Special,
            _ => Self::Other(normalised),
        }
    }
}

impl From<String> for BadgeKind {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<BadgeKind> for String {
    fn from(kind: BadgeKind) -> Self {
        kind.as_str().to_owned()
    }
}

impl FromStr for BadgeKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for BadgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Awardable badge definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: BadgeKind,
    pub icon_path: Option<String>,
    pub xp_reward: i64,
    pub is_active: bool,
}

/// Award record; at most one exists per `(user_id, badge_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBadge {
    pub user_id: UserId,
    pub badge_id: Uuid,
    pub awarded_at: DateTime<Utc>,
}

/// A badge together with the moment it was awarded to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardedBadge {
    pub badge: Badge,
    pub awarded_at: DateTime<Utc>,
}
