//! Error mapping and shared writes for the Diesel repositories.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::AchievementLogEntry;
use crate::domain::ports::{
    AchievementLogRepositoryError, BadgeRepositoryError, EventAuditRepositoryError,
    JobLeaseRepositoryError, LevelRepositoryError, TaskRepositoryError,
    UserProgressRepositoryError,
};

use super::models::NewAchievementLogRow;
use super::pool::PoolError;
use super::schema::achievement_log;

/// Port errors that distinguish connectivity from query failures.
pub(crate) trait StoreFailure {
    fn connection_failure(message: String) -> Self;
    fn query_failure(message: String) -> Self;
}

macro_rules! impl_store_failure {
    ($($error:ty),* $(,)?) => {
        $(
            impl StoreFailure for $error {
                fn connection_failure(message: String) -> Self {
                    Self::connection(message)
                }

                fn query_failure(message: String) -> Self {
                    Self::query(message)
                }
            }
        )*
    };
}

impl_store_failure!(
    AchievementLogRepositoryError,
    BadgeRepositoryError,
    EventAuditRepositoryError,
    JobLeaseRepositoryError,
    LevelRepositoryError,
    TaskRepositoryError,
    UserProgressRepositoryError,
);

/// Map a pool failure; every pool failure is a connectivity problem.
pub(crate) fn map_pool_error<E: StoreFailure>(error: PoolError) -> E {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            E::connection_failure(message)
        }
    }
}

/// Map a Diesel failure without leaking SQL details into the message.
pub(crate) fn map_diesel_error<E: StoreFailure>(error: DieselError) -> E {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(error = %error, "diesel operation failed"),
    }

    match error {
        DieselError::NotFound => E::query_failure("record not found".to_owned()),
        DieselError::QueryBuilderError(_) => E::query_failure("database query error".to_owned()),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            E::connection_failure("database connection error".to_owned())
        }
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            E::query_failure("unique constraint violated".to_owned())
        }
        _ => E::query_failure("database error".to_owned()),
    }
}

/// Failure inside a transaction: either Diesel's or a domain outcome that
/// must roll the transaction back.
#[derive(Debug)]
pub(crate) enum TxError<E> {
    Diesel(DieselError),
    Domain(E),
}

impl<E> From<DieselError> for TxError<E> {
    fn from(error: DieselError) -> Self {
        Self::Diesel(error)
    }
}

impl<E: StoreFailure> TxError<E> {
    pub(crate) fn into_port_error(self) -> E {
        match self {
            Self::Diesel(error) => map_diesel_error(error),
            Self::Domain(error) => error,
        }
    }
}

/// Append achievement entries on the caller's connection, usually inside
/// the transaction that produced them.
pub(crate) async fn insert_achievements(
    conn: &mut AsyncPgConnection,
    entries: &[AchievementLogEntry],
) -> Result<(), DieselError> {
    if entries.is_empty() {
        return Ok(());
    }
    let rows: Vec<NewAchievementLogRow> = entries.iter().map(NewAchievementLogRow::from).collect();
    diesel::insert_into(achievement_log::table)
        .values(&rows)
        .execute(conn)
        .await?;
    Ok(())
}

/// Convert a row limit to the SQL parameter type.
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Convert an affected-row count for reporting.
pub(crate) fn affected(rows: usize) -> u64 {
    u64::try_from(rows).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn pool_errors_are_connection_failures() {
        let error: TaskRepositoryError = map_pool_error(PoolError::checkout("timed out"));
        assert!(error.is_transient());
    }

    #[rstest]
    fn not_found_maps_to_query_failure() {
        let error: BadgeRepositoryError = map_diesel_error(DieselError::NotFound);
        assert!(!error.is_transient());
        assert!(error.to_string().contains("record not found"));
    }

    #[rstest]
    fn domain_outcomes_pass_through_transactions() {
        let tx: TxError<UserProgressRepositoryError> =
            TxError::Domain(UserProgressRepositoryError::revision_mismatch(1_u32, 2_u32));
        assert_eq!(
            tx.into_port_error(),
            UserProgressRepositoryError::revision_mismatch(1_u32, 2_u32)
        );
    }

    #[rstest]
    #[case(0, 0)]
    #[case(200, 200)]
    fn limits_convert(#[case] limit: usize, #[case] expected: i64) {
        assert_eq!(sql_limit(limit), expected);
    }
}
