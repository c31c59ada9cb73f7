//! Driving port for progression-changing caller actions.
//!
//! Every action answers with an [`ActionOutcome`] envelope
//! `{success, type, payload}` or a typed domain [`Error`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{Error, Metadata, UserId};

/// Request to grant XP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantXpRequest {
    pub user_id: UserId,
    pub event_type: String,
    pub amount: i64,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Request to record a verified answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerVerifiedRequest {
    pub user_id: UserId,
    pub answer_id: Uuid,
    pub question_id: Uuid,
    pub score: i64,
}

/// What an action ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    XpGained,
    TaskAssigned,
    TaskCompleted,
    TaskAlreadyCompleted,
    BadgeUnlocked,
    BadgeAlreadyAwarded,
    AnswerVerified,
}

/// Result envelope returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(rename = "type")]
    pub kind: OutcomeKind,
    pub payload: Value,
}

impl ActionOutcome {
    /// Successful outcome of `kind` carrying `payload`.
    #[must_use]
    pub const fn success(kind: OutcomeKind, payload: Value) -> Self {
        Self {
            success: true,
            kind,
            payload,
        }
    }
}

/// Driving port for the five caller actions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressionCommand: Send + Sync {
    /// Append an XP grant and update the user's total and level.
    async fn grant_xp(&self, request: GrantXpRequest) -> Result<ActionOutcome, Error>;

    /// Assign a task for the current period, reusing an existing assignment.
    async fn assign_task(&self, user_id: UserId, task_id: Uuid) -> Result<ActionOutcome, Error>;

    /// Complete the current period's assignment of a task.
    async fn complete_task(&self, user_id: UserId, task_id: Uuid)
    -> Result<ActionOutcome, Error>;

    /// Award a badge at most once.
    async fn award_badge(&self, user_id: UserId, badge_id: Uuid) -> Result<ActionOutcome, Error>;

    /// Record that an answer was verified.
    async fn verify_answer(&self, request: AnswerVerifiedRequest) -> Result<ActionOutcome, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn outcome_serialises_with_type_tag() {
        let outcome = ActionOutcome::success(OutcomeKind::TaskAlreadyCompleted, json!({}));
        let value = serde_json::to_value(outcome).expect("serialise outcome");

        assert_eq!(value["success"], true);
        assert_eq!(value["type"], "task_already_completed");
    }

    #[rstest]
    fn grant_request_defaults_metadata() {
        let request: GrantXpRequest = serde_json::from_value(json!({
            "userId": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            "eventType": "answer_accepted",
            "amount": 15,
        }))
        .expect("deserialise request");

        assert!(request.metadata.is_empty());
        assert_eq!(request.amount, 15);
    }
}
