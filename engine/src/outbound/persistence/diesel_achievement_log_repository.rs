//! PostgreSQL-backed `AchievementLogRepository`.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{AchievementLogRepository, AchievementLogRepositoryError};
use crate::domain::{AchievementLogEntry, UserId};

use super::diesel_helpers::{insert_achievements, map_diesel_error, map_pool_error, sql_limit};
use super::models::AchievementLogRow;
use super::pool::DbPool;
use super::schema::achievement_log;

/// Diesel implementation of the append-only achievement log.
///
/// Entries written by one commit share a timestamp; the `seq` column keeps
/// their insertion order so history reads stay stable.
#[derive(Clone)]
pub struct DieselAchievementLogRepository {
    pool: DbPool,
}

impl DieselAchievementLogRepository {
    /// Create a repository over `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AchievementLogRepository for DieselAchievementLogRepository {
    async fn append(&self, entry: &AchievementLogEntry) -> Result<(), AchievementLogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        insert_achievements(&mut conn, std::slice::from_ref(entry))
            .await
            .map_err(map_diesel_error)
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<AchievementLogEntry>, AchievementLogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<AchievementLogRow> = achievement_log::table
            .filter(achievement_log::user_id.eq(*user_id.as_uuid()))
            .order((achievement_log::created_at.desc(), achievement_log::seq.desc()))
            .limit(sql_limit(limit))
            .select(AchievementLogRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter()
            .map(AchievementLogEntry::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(AchievementLogRepositoryError::query)
    }
}
