//! Port for store-level leases that keep background jobs single-instance.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::define_port_error;

define_port_error! {
    /// Errors raised by job lease adapters.
    pub enum JobLeaseRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "job lease connection failed: {message}"; transient,
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "job lease query failed: {message}",
    }
}

/// A lease held on a named job until it is released or expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLease {
    pub job: String,
    pub holder: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Port guarding a job against concurrent runs across processes.
///
/// A lease whose `expires_at` has passed is free again, so an interrupted
/// run never blocks the job for longer than the lease lifetime.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobLeaseRepository: Send + Sync {
    /// Take the lease on `job` for `ttl`, or `None` while another holder's
    /// lease is live.
    async fn try_acquire(
        &self,
        job: &str,
        holder: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Option<JobLease>, JobLeaseRepositoryError>;

    /// Give `lease` back; a no-op once another holder has taken it over.
    async fn release(&self, lease: &JobLease) -> Result<(), JobLeaseRepositoryError>;
}
