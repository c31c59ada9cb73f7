//! Domain-level error types.
//!
//! These errors are transport agnostic. Inbound adapters map them to HTTP
//! responses or any other protocol-specific envelope; the scheduler and the
//! effect worker only log them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// A negative XP amount was requested.
    InvalidAmount,
    /// A referenced task, badge or level does not exist.
    NotFound,
    /// Completion requested without a pending or completed-this-period
    /// assignment.
    NoPendingAssignment,
    /// Concurrent writers exhausted the optimistic retry budget.
    Conflict,
    /// The persistence layer is unavailable; the caller may retry.
    TransientStoreFailure,
    /// An unexpected error occurred inside the engine.
    InternalError,
}

impl ErrorCode {
    /// Whether the failure was caused by the caller's input.
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        matches!(
            self,
            Self::InvalidRequest | Self::InvalidAmount | Self::NotFound | Self::NoPendingAssignment
        )
    }
}

/// Error type returned by every domain operation.
pub type Error = DomainError;

/// Domain error payload.
///
/// # Examples
/// ```
/// use engine::domain::{Error, ErrorCode};
///
/// let err = Error::not_found("badge missing");
/// assert_eq!(err.code(), ErrorCode::NotFound);
/// assert_eq!(err.message(), "badge missing");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainError {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl DomainError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message returned to adapters.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Supplementary error details for adapters.
    #[must_use]
    pub const fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach structured details to the error.
    ///
    /// # Examples
    /// ```
    /// use engine::domain::Error;
    /// use serde_json::json;
    ///
    /// let err = Error::invalid_amount("negative").with_details(json!({ "amount": -5 }));
    /// assert!(err.details().is_some());
    /// ```
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Convenience constructor for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Convenience constructor for [`ErrorCode::InvalidAmount`].
    pub fn invalid_amount(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAmount, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::NoPendingAssignment`].
    pub fn no_pending_assignment(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NoPendingAssignment, message)
    }

    /// Convenience constructor for [`ErrorCode::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Convenience constructor for [`ErrorCode::TransientStoreFailure`].
    pub fn transient_store_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransientStoreFailure, message)
    }

    /// Convenience constructor for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DomainError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(Error::invalid_request("bad"), ErrorCode::InvalidRequest)]
    #[case(Error::invalid_amount("neg"), ErrorCode::InvalidAmount)]
    #[case(Error::not_found("gone"), ErrorCode::NotFound)]
    #[case(Error::no_pending_assignment("none"), ErrorCode::NoPendingAssignment)]
    #[case(Error::conflict("race"), ErrorCode::Conflict)]
    #[case(Error::transient_store_failure("down"), ErrorCode::TransientStoreFailure)]
    #[case(Error::internal("boom"), ErrorCode::InternalError)]
    fn constructors_set_code(#[case] error: Error, #[case] expected: ErrorCode) {
        assert_eq!(error.code(), expected);
    }

    #[rstest]
    fn serialises_code_in_snake_case() {
        let error = Error::no_pending_assignment("nothing to complete")
            .with_details(json!({ "taskId": "abc" }));
        let value = serde_json::to_value(&error).expect("serialise error");

        assert_eq!(value["code"], "no_pending_assignment");
        assert_eq!(value["message"], "nothing to complete");
        assert_eq!(value["details"]["taskId"], "abc");
    }

    #[rstest]
    fn omits_absent_details() {
        let value = serde_json::to_value(Error::not_found("missing")).expect("serialise error");
        assert!(value.get("details").is_none());
    }

    #[rstest]
    fn client_errors_are_classified() {
        assert!(ErrorCode::InvalidAmount.is_client_error());
        assert!(ErrorCode::NoPendingAssignment.is_client_error());
        assert!(!ErrorCode::TransientStoreFailure.is_client_error());
        assert!(!ErrorCode::InternalError.is_client_error());
    }
}
