//! Request validation helpers producing `invalid_request` errors with field
//! context in `details`.

use std::str::FromStr;

use serde_json::json;
use uuid::Uuid;

use crate::domain::{Error, TaskFrequency, UserId};

/// Largest history page served when the caller names none.
pub(crate) const DEFAULT_HISTORY_LIMIT: usize = 50;

fn field_error(field: &str, message: String, code: &str, value: &str) -> Error {
    Error::invalid_request(message).with_details(json!({
        "field": field,
        "value": value,
        "code": code,
    }))
}

pub(crate) fn parse_user_id(value: &str) -> Result<UserId, Error> {
    UserId::new(value)
        .map_err(|_| field_error("userId", "userId must be a valid UUID".to_owned(), "invalid_uuid", value))
}

pub(crate) fn parse_uuid(value: &str, field: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(value.trim()).map_err(|_| {
        field_error(field, format!("{field} must be a valid UUID"), "invalid_uuid", value)
    })
}

pub(crate) fn parse_frequency(value: Option<&str>) -> Result<Option<TaskFrequency>, Error> {
    value
        .map(|raw| {
            TaskFrequency::from_str(raw).map_err(|_| {
                field_error(
                    "frequency",
                    "frequency must be daily, weekly or one-off".to_owned(),
                    "invalid_frequency",
                    raw,
                )
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;

    #[rstest]
    fn invalid_user_ids_name_the_field() {
        let error = parse_user_id("not-a-uuid").expect_err("rejected");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
        let details = error.details().expect("details");
        assert_eq!(details["field"], "userId");
        assert_eq!(details["code"], "invalid_uuid");
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some("daily"), Some(TaskFrequency::Daily))]
    #[case(Some("one_off"), Some(TaskFrequency::OneOff))]
    fn frequencies_parse(#[case] raw: Option<&str>, #[case] expected: Option<TaskFrequency>) {
        assert_eq!(parse_frequency(raw).expect("parsed"), expected);
    }

    #[rstest]
    fn unknown_frequency_is_rejected() {
        let error = parse_frequency(Some("hourly")).expect_err("rejected");
        assert_eq!(error.details().expect("details")["value"], "hourly");
    }
}
