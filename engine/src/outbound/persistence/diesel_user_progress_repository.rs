//! PostgreSQL-backed `UserProgressRepository`.
//!
//! An XP grant commits the progress row, its ledger entry and the
//! achievement entries it produced in one transaction. The progress row is
//! guarded by its revision: a first grant inserts it, later grants update it
//! only while the stored revision still matches the one the caller read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};
use tracing::info;
use uuid::Uuid;

use crate::domain::ports::{
    TotalReconciliation, UserProgressRepository, UserProgressRepositoryError, XpGrantCommit,
};
use crate::domain::{UserId, UserProgress};

use super::diesel_helpers::{
    TxError, affected, insert_achievements, map_diesel_error, map_pool_error,
};
use super::models::{UserProgressRow, XpLogEntryRow, revision_for_db, revision_from_db};
use super::pool::DbPool;
use super::schema::{user_progress, xp_log_entries};

type ProgressTxError = TxError<UserProgressRepositoryError>;

/// Diesel implementation of the progress and ledger store.
#[derive(Clone)]
pub struct DieselUserProgressRepository {
    pool: DbPool,
}

impl DieselUserProgressRepository {
    /// Create a repository over `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn conversion_error(message: String) -> ProgressTxError {
    TxError::Domain(UserProgressRepositoryError::query(message))
}

async fn stored_revision(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
) -> Result<u32, ProgressTxError> {
    let revision: Option<i32> = user_progress::table
        .find(user_id)
        .select(user_progress::revision)
        .first(conn)
        .await
        .optional()?;
    match revision {
        Some(revision) => revision_from_db(revision).map_err(conversion_error),
        None => Ok(0),
    }
}

async fn write_progress(
    conn: &mut AsyncPgConnection,
    row: &UserProgressRow,
    expected_revision: Option<u32>,
) -> Result<(), ProgressTxError> {
    let written = match expected_revision {
        None => {
            diesel::insert_into(user_progress::table)
                .values(row)
                .on_conflict(user_progress::user_id)
                .do_nothing()
                .execute(conn)
                .await?
        }
        Some(expected) => {
            let expected_db = revision_for_db(expected).map_err(conversion_error)?;
            diesel::update(
                user_progress::table
                    .filter(user_progress::user_id.eq(row.user_id))
                    .filter(user_progress::revision.eq(expected_db)),
            )
            .set((
                user_progress::total_xp.eq(row.total_xp),
                user_progress::streak_days.eq(row.streak_days),
                user_progress::last_active_at.eq(row.last_active_at),
                user_progress::revision.eq(row.revision),
            ))
            .execute(conn)
            .await?
        }
    };

    if written == 0 {
        let actual = stored_revision(conn, row.user_id).await?;
        return Err(TxError::Domain(UserProgressRepositoryError::revision_mismatch(
            expected_revision.unwrap_or(0),
            actual,
        )));
    }
    Ok(())
}

#[async_trait]
impl UserProgressRepository for DieselUserProgressRepository {
    async fn find_progress(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserProgress>, UserProgressRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserProgressRow> = user_progress::table
            .find(user_id.as_uuid())
            .select(UserProgressRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(UserProgress::try_from)
            .transpose()
            .map_err(UserProgressRepositoryError::query)
    }

    async fn commit_xp_grant(
        &self,
        commit: &XpGrantCommit,
    ) -> Result<(), UserProgressRepositoryError> {
        let progress_row =
            UserProgressRow::try_from(&commit.progress).map_err(UserProgressRepositoryError::query)?;
        let entry_row = XpLogEntryRow::from(&commit.entry);
        let expected_revision = commit.expected_revision;
        let achievements = commit.achievements.as_slice();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.transaction::<_, ProgressTxError, _>(|conn| {
            async move {
                write_progress(conn, &progress_row, expected_revision).await?;
                diesel::insert_into(xp_log_entries::table)
                    .values(&entry_row)
                    .execute(conn)
                    .await?;
                insert_achievements(conn, achievements).await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(TxError::into_port_error)
    }

    async fn reconcile_total(
        &self,
        user_id: &UserId,
    ) -> Result<TotalReconciliation, UserProgressRepositoryError> {
        let user = *user_id.as_uuid();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let outcome = conn
            .transaction::<_, ProgressTxError, _>(|conn| {
                async move {
                    let recorded: Option<i64> = user_progress::table
                        .find(user)
                        .select(user_progress::total_xp)
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?;
                    let amounts: Vec<i64> = xp_log_entries::table
                        .filter(xp_log_entries::user_id.eq(user))
                        .select(xp_log_entries::xp_amount)
                        .load(conn)
                        .await?;
                    let ledger_total = amounts.iter().fold(0_i64, |acc, amount| acc.saturating_add(*amount));

                    let Some(recorded_total) = recorded else {
                        return Ok(TotalReconciliation {
                            recorded_total: 0,
                            ledger_total,
                        });
                    };
                    if recorded_total != ledger_total {
                        diesel::update(user_progress::table.find(user))
                            .set((
                                user_progress::total_xp.eq(ledger_total),
                                user_progress::revision.eq(user_progress::revision + 1),
                            ))
                            .execute(conn)
                            .await?;
                    }
                    Ok(TotalReconciliation {
                        recorded_total,
                        ledger_total,
                    })
                }
                .scope_boxed()
            })
            .await
            .map_err(TxError::into_port_error)?;

        if outcome.drifted() {
            info!(
                user_id = %user_id,
                recorded_total = outcome.recorded_total,
                ledger_total = outcome.ledger_total,
                "cached XP total corrected from ledger"
            );
        }
        Ok(outcome)
    }

    async fn list_active_users(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<UserId>, UserProgressRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let ids: Vec<Uuid> = user_progress::table
            .filter(user_progress::last_active_at.ge(since))
            .order(user_progress::user_id.asc())
            .select(user_progress::user_id)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(UserId::from_uuid).collect())
    }

    async fn reset_lapsed_streaks(
        &self,
        active_since: DateTime<Utc>,
    ) -> Result<u64, UserProgressRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows = diesel::update(
            user_progress::table
                .filter(user_progress::streak_days.gt(0))
                .filter(
                    user_progress::last_active_at
                        .is_null()
                        .or(user_progress::last_active_at.lt(active_since)),
                ),
        )
        .set((
            user_progress::streak_days.eq(0),
            user_progress::revision.eq(user_progress::revision + 1),
        ))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(affected(rows))
    }
}
