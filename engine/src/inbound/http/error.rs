//! HTTP mapping for domain errors.
//!
//! The domain error stays transport agnostic; this module picks the status
//! code and strips messages that could leak store internals.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use tracing::error;

use crate::domain::{Error, ErrorCode};

/// Result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, Error>;

pub(crate) fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest | ErrorCode::InvalidAmount => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::NoPendingAssignment | ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::TransientStoreFailure => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn redact(error: &Error) -> Error {
    match error.code() {
        ErrorCode::InternalError => Error::internal("Internal server error"),
        ErrorCode::TransientStoreFailure => {
            Error::transient_store_failure("Service temporarily unavailable; retry later")
        }
        _ => error.clone(),
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code())
    }

    fn error_response(&self) -> HttpResponse {
        if !self.code().is_client_error() {
            error!(code = ?self.code(), error = %self, "request failed");
        }
        HttpResponse::build(self.status_code()).json(redact(self))
    }
}

impl From<actix_web::Error> for Error {
    fn from(err: actix_web::Error) -> Self {
        error!(error = %err, "actix error promoted to domain error");
        Self::internal("Internal server error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(Error::invalid_request("bad"), StatusCode::BAD_REQUEST)]
    #[case(Error::invalid_amount("negative"), StatusCode::BAD_REQUEST)]
    #[case(Error::not_found("missing"), StatusCode::NOT_FOUND)]
    #[case(Error::no_pending_assignment("none"), StatusCode::CONFLICT)]
    #[case(Error::conflict("busy"), StatusCode::CONFLICT)]
    #[case(Error::transient_store_failure("down"), StatusCode::SERVICE_UNAVAILABLE)]
    #[case(Error::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR)]
    fn status_code_matches_error_code(#[case] error: Error, #[case] status: StatusCode) {
        assert_eq!(ResponseError::status_code(&error), status);
    }

    async fn response_payload(error: &Error) -> Error {
        let response = ResponseError::error_response(error);
        let bytes = to_bytes(response.into_body())
            .await
            .expect("reading response body succeeds");
        serde_json::from_slice(&bytes).expect("error JSON deserialises")
    }

    #[actix_web::test]
    async fn internal_errors_are_redacted() {
        let error = Error::internal("pool exhausted at db-3").with_details(json!({"host": "db-3"}));

        let payload = response_payload(&error).await;
        assert_eq!(payload.code(), ErrorCode::InternalError);
        assert_eq!(payload.message(), "Internal server error");
        assert!(payload.details().is_none());
    }

    #[actix_web::test]
    async fn transient_errors_keep_their_code_but_not_their_message() {
        let payload =
            response_payload(&Error::transient_store_failure("connection refused")).await;
        assert_eq!(payload.code(), ErrorCode::TransientStoreFailure);
        assert!(!payload.message().contains("refused"));
    }

    #[actix_web::test]
    async fn client_errors_pass_through() {
        let error = Error::no_pending_assignment("nothing to complete")
            .with_details(json!({"taskId": "t"}));

        let payload = response_payload(&error).await;
        assert_eq!(payload, error);
    }

    #[rstest]
    fn actix_errors_become_internal_errors() {
        let err: Error = actix_web::error::ErrorBadRequest("boom").into();
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert!(err.details().is_none());
    }
}
