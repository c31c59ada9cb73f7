//! OpenAPI schema definitions for domain types.
//!
//! Domain types do not derive `ToSchema`; the wrappers here mirror their
//! serialised shape and register under the domain type's name.

use utoipa::ToSchema;

/// OpenAPI schema for [`crate::domain::ErrorCode`].
#[derive(ToSchema)]
#[schema(as = crate::domain::ErrorCode)]
pub enum ErrorCodeSchema {
    /// The request is malformed or fails validation.
    #[schema(rename = "invalid_request")]
    InvalidRequest,
    /// A negative XP amount was requested.
    #[schema(rename = "invalid_amount")]
    InvalidAmount,
    /// A referenced task, badge or level does not exist.
    #[schema(rename = "not_found")]
    NotFound,
    /// Completion requested without an assignment for the current period.
    #[schema(rename = "no_pending_assignment")]
    NoPendingAssignment,
    /// Concurrent writers exhausted the retry budget.
    #[schema(rename = "conflict")]
    Conflict,
    /// The store is unavailable; retry later.
    #[schema(rename = "transient_store_failure")]
    TransientStoreFailure,
    /// An unexpected error occurred inside the engine.
    #[schema(rename = "internal_error")]
    InternalError,
}

/// OpenAPI schema for [`crate::domain::Error`].
#[derive(ToSchema)]
#[schema(as = crate::domain::Error)]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct ErrorSchema {
    /// Stable machine-readable error code.
    #[schema(example = "invalid_request")]
    code: ErrorCodeSchema,
    /// Human-readable message.
    #[schema(example = "userId must be a valid UUID")]
    message: String,
    /// Field-level context such as `{field, value, code}`.
    details: Option<serde_json::Value>,
}

/// OpenAPI schema for [`crate::domain::ports::OutcomeKind`].
#[derive(ToSchema)]
#[schema(as = crate::domain::ports::OutcomeKind)]
pub enum OutcomeKindSchema {
    /// XP was granted.
    #[schema(rename = "xp_gained")]
    XpGained,
    /// A task was assigned or its existing assignment returned.
    #[schema(rename = "task_assigned")]
    TaskAssigned,
    /// A pending assignment was completed.
    #[schema(rename = "task_completed")]
    TaskCompleted,
    /// The period's assignment was already completed.
    #[schema(rename = "task_already_completed")]
    TaskAlreadyCompleted,
    /// The badge was awarded now.
    #[schema(rename = "badge_unlocked")]
    BadgeUnlocked,
    /// The user already held the badge.
    #[schema(rename = "badge_already_awarded")]
    BadgeAlreadyAwarded,
    /// The verification was recorded.
    #[schema(rename = "answer_verified")]
    AnswerVerified,
}

/// OpenAPI schema for [`crate::domain::ports::ActionOutcome`].
///
/// Envelope returned by every progression action.
#[derive(ToSchema)]
#[schema(as = crate::domain::ports::ActionOutcome)]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct ActionOutcomeSchema {
    /// Always `true`; failures use the error envelope.
    success: bool,
    /// What the action did.
    r#type: OutcomeKindSchema,
    /// Action-specific data such as totals, levels or the assignment.
    payload: serde_json::Value,
}
