//! PostgreSQL-backed `LevelRepository`.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use crate::domain::Level;
use crate::domain::ports::{LevelRepository, LevelRepositoryError};

use super::diesel_helpers::{map_diesel_error, map_pool_error};
use super::models::LevelRow;
use super::pool::DbPool;
use super::schema::levels;

/// Diesel implementation of the level ladder store.
#[derive(Clone)]
pub struct DieselLevelRepository {
    pool: DbPool,
}

impl DieselLevelRepository {
    /// Create a repository over `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LevelRepository for DieselLevelRepository {
    async fn list_levels(&self) -> Result<Vec<Level>, LevelRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<LevelRow> = levels::table
            .order(levels::xp_required.asc())
            .select(LevelRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(Level::from).collect())
    }

    async fn upsert_level(&self, level: &Level) -> Result<(), LevelRepositoryError> {
        let row = LevelRow::from(level);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(levels::table)
            .values(&row)
            .on_conflict(levels::id)
            .do_update()
            .set((
                levels::name.eq(excluded(levels::name)),
                levels::xp_required.eq(excluded(levels::xp_required)),
                levels::tier.eq(excluded(levels::tier)),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }
}
