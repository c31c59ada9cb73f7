//! PostgreSQL adapters built on Diesel, `diesel-async` and `bb8`.
//!
//! Repositories only translate between row structs and domain types. Row
//! structs (`models.rs`) and table definitions (`schema.rs`) stay private to
//! this module. Writes that must land together (a progress update and its
//! ledger entry, an award and its achievement entry) share one transaction.
//!
//! ```ignore
//! use engine::outbound::persistence::{DbPool, DieselUserProgressRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/engine")).await?;
//! let progress = DieselUserProgressRepository::new(pool);
//! ```

mod diesel_achievement_log_repository;
mod diesel_badge_repository;
mod diesel_event_audit_repository;
pub(crate) mod diesel_helpers;
mod diesel_job_lease_repository;
mod diesel_level_repository;
mod diesel_task_repository;
mod diesel_user_progress_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_achievement_log_repository::DieselAchievementLogRepository;
pub use diesel_badge_repository::DieselBadgeRepository;
pub use diesel_event_audit_repository::DieselEventAuditRepository;
pub use diesel_job_lease_repository::DieselJobLeaseRepository;
pub use diesel_level_repository::DieselLevelRepository;
pub use diesel_task_repository::DieselTaskRepository;
pub use diesel_user_progress_repository::DieselUserProgressRepository;
pub use migrations::{MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
