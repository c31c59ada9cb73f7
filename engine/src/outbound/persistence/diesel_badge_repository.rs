//! PostgreSQL-backed `BadgeRepository`.
//!
//! Awards rely on the `(user_id, badge_id)` primary key: a conflicting
//! insert means another writer awarded the badge first, and the existing
//! award is returned instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{AwardOutcome, BadgeAwardCommit, BadgeRepository, BadgeRepositoryError};
use crate::domain::{AwardedBadge, Badge, UserBadge, UserId};

use super::diesel_helpers::{TxError, insert_achievements, map_diesel_error, map_pool_error};
use super::models::{BadgeRow, UserBadgeRow};
use super::pool::DbPool;
use super::schema::{badges, user_badges};

/// Diesel implementation of the badge catalogue and award store.
#[derive(Clone)]
pub struct DieselBadgeRepository {
    pool: DbPool,
}

impl DieselBadgeRepository {
    /// Create a repository over `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn award_from_row(row: UserBadgeRow) -> UserBadge {
    UserBadge {
        user_id: UserId::from_uuid(row.user_id),
        badge_id: row.badge_id,
        awarded_at: row.awarded_at,
    }
}

#[async_trait]
impl BadgeRepository for DieselBadgeRepository {
    async fn find_badge(&self, badge_id: &Uuid) -> Result<Option<Badge>, BadgeRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<BadgeRow> = badges::table
            .find(*badge_id)
            .select(BadgeRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(Badge::from))
    }

    async fn list_active_badges(&self) -> Result<Vec<Badge>, BadgeRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<BadgeRow> = badges::table
            .filter(badges::is_active.eq(true))
            .order(badges::name.asc())
            .select(BadgeRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(Badge::from).collect())
    }

    async fn list_user_badges(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AwardedBadge>, BadgeRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<(BadgeRow, DateTime<Utc>)> = user_badges::table
            .inner_join(badges::table)
            .filter(user_badges::user_id.eq(user_id.as_uuid()))
            .order(user_badges::awarded_at.desc())
            .select((BadgeRow::as_select(), user_badges::awarded_at))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows
            .into_iter()
            .map(|(badge, awarded_at)| AwardedBadge {
                badge: Badge::from(badge),
                awarded_at,
            })
            .collect())
    }

    async fn find_user_badge(
        &self,
        user_id: &UserId,
        badge_id: &Uuid,
    ) -> Result<Option<UserBadge>, BadgeRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserBadgeRow> = user_badges::table
            .find((*user_id.as_uuid(), *badge_id))
            .select(UserBadgeRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(award_from_row))
    }

    async fn commit_award(
        &self,
        commit: &BadgeAwardCommit,
    ) -> Result<AwardOutcome, BadgeRepositoryError> {
        let row = UserBadgeRow {
            user_id: *commit.award.user_id.as_uuid(),
            badge_id: commit.award.badge_id,
            awarded_at: commit.award.awarded_at,
        };
        let achievement = std::slice::from_ref(&commit.achievement);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.transaction::<_, TxError<BadgeRepositoryError>, _>(|conn| {
            async move {
                let inserted = diesel::insert_into(user_badges::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(conn)
                    .await?;
                if inserted == 0 {
                    let existing: UserBadgeRow = user_badges::table
                        .find((row.user_id, row.badge_id))
                        .select(UserBadgeRow::as_select())
                        .first(conn)
                        .await?;
                    return Ok(AwardOutcome::AlreadyHeld(award_from_row(existing)));
                }
                insert_achievements(conn, achievement).await?;
                Ok(AwardOutcome::Awarded)
            }
            .scope_boxed()
        })
        .await
        .map_err(TxError::into_port_error)
    }

    async fn upsert_badge(&self, badge: &Badge) -> Result<(), BadgeRepositoryError> {
        let row = BadgeRow::from(badge);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(badges::table)
            .values(&row)
            .on_conflict(badges::id)
            .do_update()
            .set((
                badges::name.eq(excluded(badges::name)),
                badges::slug.eq(excluded(badges::slug)),
                badges::description.eq(excluded(badges::description)),
                badges::badge_type.eq(excluded(badges::badge_type)),
                badges::icon_path.eq(excluded(badges::icon_path)),
                badges::xp_reward.eq(excluded(badges::xp_reward)),
                badges::is_active.eq(excluded(badges::is_active)),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }
}
