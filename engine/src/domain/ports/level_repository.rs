//! Port for the level catalogue.

use async_trait::async_trait;

use crate::domain::Level;

use super::define_port_error;

define_port_error! {
    /// Errors raised by level repository adapters.
    pub enum LevelRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "level repository connection failed: {message}"; transient,
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "level repository query failed: {message}",
    }
}

/// Port for reading and seeding levels.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LevelRepository: Send + Sync {
    /// Every configured level, in no particular order.
    async fn list_levels(&self) -> Result<Vec<Level>, LevelRepositoryError>;

    /// Insert a level or replace the one with the same id.
    async fn upsert_level(&self, level: &Level) -> Result<(), LevelRepositoryError>;
}
