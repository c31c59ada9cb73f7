//! PostgreSQL-backed `JobLeaseRepository`.
//!
//! One row per job in `job_leases`. Acquiring clears an expired row and
//! inserts a fresh one in a single transaction; the primary key makes every
//! concurrent acquirer but one insert nothing.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{JobLease, JobLeaseRepository, JobLeaseRepositoryError};

use super::diesel_helpers::{TxError, map_diesel_error, map_pool_error};
use super::models::JobLeaseRow;
use super::pool::DbPool;
use super::schema::job_leases;

/// Diesel implementation of cross-process job leases.
#[derive(Clone)]
pub struct DieselJobLeaseRepository {
    pool: DbPool,
}

impl DieselJobLeaseRepository {
    /// Create a repository over `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobLeaseRepository for DieselJobLeaseRepository {
    async fn try_acquire(
        &self,
        job: &str,
        holder: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Option<JobLease>, JobLeaseRepositoryError> {
        let row = JobLeaseRow {
            job: job.to_owned(),
            holder,
            expires_at: now + ttl,
        };
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let inserted = conn
            .transaction::<_, TxError<JobLeaseRepositoryError>, _>(|conn| {
                let row = &row;
                async move {
                    diesel::delete(
                        job_leases::table
                            .filter(job_leases::job.eq(&row.job))
                            .filter(job_leases::expires_at.le(now)),
                    )
                    .execute(conn)
                    .await?;
                    let inserted = diesel::insert_into(job_leases::table)
                        .values(row)
                        .on_conflict_do_nothing()
                        .execute(conn)
                        .await?;
                    Ok(inserted)
                }
                .scope_boxed()
            })
            .await
            .map_err(TxError::into_port_error)?;
        drop(conn);

        if inserted == 0 {
            debug!(job, "job lease held elsewhere");
            return Ok(None);
        }
        Ok(Some(JobLease::from(row)))
    }

    async fn release(&self, lease: &JobLease) -> Result<(), JobLeaseRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let removed = diesel::delete(
            job_leases::table
                .filter(job_leases::job.eq(&lease.job))
                .filter(job_leases::holder.eq(lease.holder)),
        )
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        if removed == 0 {
            debug!(job = %lease.job, "job lease already taken over");
        }
        Ok(())
    }
}
