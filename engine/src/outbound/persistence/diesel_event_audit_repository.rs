//! PostgreSQL-backed `EventAuditRepository`.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::AchievementEvent;
use crate::domain::ports::{EventAuditRepository, EventAuditRepositoryError};

use super::diesel_helpers::{map_diesel_error, map_pool_error};
use super::models::NewEventAuditRow;
use super::pool::DbPool;
use super::schema::achievement_event_audit;

/// Audit trail keyed by event id; re-recording a delivered event is a no-op.
#[derive(Clone)]
pub struct DieselEventAuditRepository {
    pool: DbPool,
}

impl DieselEventAuditRepository {
    /// Create a repository over `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventAuditRepository for DieselEventAuditRepository {
    async fn record(&self, event: &AchievementEvent) -> Result<(), EventAuditRepositoryError> {
        let row = NewEventAuditRow::from(event);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let inserted = diesel::insert_into(achievement_event_audit::table)
            .values(&row)
            .on_conflict(achievement_event_audit::event_id)
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        if inserted == 0 {
            debug!(event_id = %event.id, "event already audited");
        }
        Ok(())
    }
}
