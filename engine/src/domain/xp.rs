//! XP ledger entries and their validated inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Error, UserId};

/// Opaque key/value metadata attached to ledger entries.
pub type Metadata = Map<String, Value>;

/// Non-negative amount of XP.
///
/// # Examples
/// ```
/// use engine::domain::XpAmount;
///
/// assert_eq!(XpAmount::new(25).expect("valid").get(), 25);
/// assert!(XpAmount::new(-1).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct XpAmount(i64);

impl XpAmount {
    /// Validate an amount; negative values yield `invalid_amount`.
    pub fn new(amount: i64) -> Result<Self, Error> {
        if amount < 0 {
            return Err(Error::invalid_amount("xp amount must not be negative")
                .with_details(serde_json::json!({ "amount": amount })));
        }
        Ok(Self(amount))
    }

    /// Raw value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for XpAmount {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<XpAmount> for i64 {
    fn from(value: XpAmount) -> Self {
        value.0
    }
}

/// Label describing why XP was granted, e.g. `question_answered`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct XpEventType(String);

impl XpEventType {
    /// Validate an event type label; blank labels yield `invalid_request`.
    pub fn new(label: impl Into<String>) -> Result<Self, Error> {
        let label = label.into();
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_request("xp event type must not be empty"));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for XpEventType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<XpEventType> for String {
    fn from(value: XpEventType) -> Self {
        value.0
    }
}

/// Immutable ledger row; a user's total XP is the sum of their entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpLogEntry {
    pub id: Uuid,
    pub user_id: UserId,
    pub event_type: XpEventType,
    pub xp_amount: XpAmount,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}
