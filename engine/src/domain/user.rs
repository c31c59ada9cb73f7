//! User identity and per-user progression state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::Error;

/// Validation errors returned when parsing a [`UserId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    EmptyId,
    InvalidId,
}

impl fmt::Display for UserValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "user id must not be empty"),
            Self::InvalidId => write!(f, "user id must be a valid UUID"),
        }
    }
}

impl std::error::Error for UserValidationError {}

/// Stable identifier of a platform user.
///
/// Users live outside the engine; the engine only references them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(Uuid);

impl UserId {
    /// Validate and construct a [`UserId`] from textual input.
    pub fn new(id: impl AsRef<str>) -> Result<Self, UserValidationError> {
        let raw = id.as_ref();
        if raw.is_empty() {
            return Err(UserValidationError::EmptyId);
        }
        if raw.trim() != raw {
            return Err(UserValidationError::InvalidId);
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| UserValidationError::InvalidId)
    }

    /// Wrap an already-parsed UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a new random [`UserId`].
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0.to_string()
    }
}

impl TryFrom<String> for UserId {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Cumulative progression state of one user.
///
/// Created lazily on the first XP grant. `revision` starts at 1 and increases
/// with every committed grant; writers must present the revision they read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_id: UserId,
    pub total_xp: i64,
    pub streak_days: u32,
    pub last_active_at: Option<DateTime<Utc>>,
    pub revision: u32,
}

impl UserProgress {
    /// Progress of a user the engine has never seen.
    #[must_use]
    pub const fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            total_xp: 0,
            streak_days: 0,
            last_active_at: None,
            revision: 0,
        }
    }

    /// Apply a grant of `amount` XP at `now`, returning the successor state.
    ///
    /// The streak follows UTC calendar days: activity on the same day keeps
    /// it, activity on the following day extends it, anything later restarts
    /// it at one.
    ///
    /// # Errors
    ///
    /// Returns `invalid_amount` when the total would overflow, so the
    /// counter never departs from the ledger sum.
    ///
    /// # Examples
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use engine::domain::{UserId, UserProgress};
    ///
    /// let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().expect("valid time");
    /// let next = UserProgress::empty(UserId::random())
    ///     .with_grant(40, now)
    ///     .expect("total fits");
    /// assert_eq!(next.total_xp, 40);
    /// assert_eq!(next.streak_days, 1);
    /// assert_eq!(next.revision, 1);
    /// ```
    pub fn with_grant(&self, amount: i64, now: DateTime<Utc>) -> Result<Self, Error> {
        let total_xp = self.total_xp.checked_add(amount).ok_or_else(|| {
            Error::invalid_amount("grant would overflow the XP total").with_details(json!({
                "userId": self.user_id,
                "totalXp": self.total_xp,
                "amount": amount,
            }))
        })?;
        Ok(Self {
            user_id: self.user_id,
            total_xp,
            streak_days: self.next_streak(now),
            last_active_at: Some(now),
            revision: self.revision.saturating_add(1),
        })
    }

    fn next_streak(&self, now: DateTime<Utc>) -> u32 {
        let Some(last) = self.last_active_at else {
            return 1;
        };
        let days = now
            .date_naive()
            .signed_duration_since(last.date_naive())
            .num_days();
        match days {
            0 => self.streak_days.max(1),
            1 => self.streak_days.saturating_add(1),
            _ => 1,
        }
    }
}
