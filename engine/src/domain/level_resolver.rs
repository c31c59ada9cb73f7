//! Holds the current level catalogue snapshot.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;
use uuid::Uuid;

use crate::domain::ports::LevelRepository;
use crate::domain::{Error, Level, LevelCatalog, LevelProgress};

/// Resolves XP totals against an immutable catalogue snapshot.
///
/// Readers clone the `Arc` of the current snapshot, so a concurrent
/// [`LevelResolver::refresh`] never changes the catalogue under a grant in
/// flight.
pub struct LevelResolver {
    repository: Arc<dyn LevelRepository>,
    catalog: RwLock<Arc<LevelCatalog>>,
}

impl LevelResolver {
    /// Start with `catalog`; call [`Self::refresh`] to load from the store.
    pub fn new(repository: Arc<dyn LevelRepository>, catalog: LevelCatalog) -> Self {
        Self {
            repository,
            catalog: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Load the catalogue from the store and build a resolver around it.
    pub async fn load(repository: Arc<dyn LevelRepository>) -> Result<Self, Error> {
        let resolver = Self::new(repository, LevelCatalog::default());
        resolver.refresh().await?;
        Ok(resolver)
    }

    /// Replace the snapshot with the store's current levels.
    ///
    /// An invalid catalogue is rejected and the previous snapshot kept.
    pub async fn refresh(&self) -> Result<(), Error> {
        let levels = self.repository.list_levels().await?;
        let catalog = LevelCatalog::new(levels)?;
        info!(levels = catalog.levels().len(), "level catalogue loaded");
        *self
            .catalog
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(catalog);
        Ok(())
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<LevelCatalog> {
        Arc::clone(&self.catalog.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Level reached with `xp_total`, if any.
    #[must_use]
    pub fn resolve_level(&self, xp_total: i64) -> Option<Level> {
        self.snapshot().resolve_level(xp_total).cloned()
    }

    /// Level following `level_id`; unknown ids yield `not_found`.
    pub fn next_level(&self, level_id: Uuid) -> Result<Option<Level>, Error> {
        Ok(self.snapshot().next_level(level_id)?.cloned())
    }

    /// Current level, next level and XP still needed.
    #[must_use]
    pub fn compute_progress(&self, xp_total: i64) -> LevelProgress {
        self.snapshot().compute_progress(xp_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::{LevelRepositoryError, MockLevelRepository};

    fn level(xp_required: i64, tier: i32) -> Level {
        Level {
            id: Uuid::new_v4(),
            name: format!("Tier {tier}"),
            xp_required,
            tier,
        }
    }

    #[tokio::test]
    async fn load_builds_catalogue_from_store() {
        let mut repo = MockLevelRepository::new();
        repo.expect_list_levels()
            .times(1)
            .returning(|| Ok(vec![level(100, 2), level(0, 1)]));

        let resolver = LevelResolver::load(Arc::new(repo)).await.expect("loaded");

        assert_eq!(resolver.resolve_level(150).map(|l| l.tier), Some(2));
        assert_eq!(resolver.compute_progress(50).xp_to_next, 50);
    }

    #[tokio::test]
    async fn invalid_refresh_keeps_previous_snapshot() {
        let mut repo = MockLevelRepository::new();
        repo.expect_list_levels()
            .times(1)
            .returning(|| Ok(vec![level(0, 1), level(0, 2)]));
        let initial = LevelCatalog::new(vec![level(0, 1)]).expect("valid");
        let resolver = LevelResolver::new(Arc::new(repo), initial);

        let error = resolver.refresh().await.expect_err("duplicate thresholds");

        assert_eq!(error.code(), ErrorCode::InvalidRequest);
        assert_eq!(resolver.snapshot().levels().len(), 1);
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_transient() {
        let mut repo = MockLevelRepository::new();
        repo.expect_list_levels()
            .times(1)
            .returning(|| Err(LevelRepositoryError::connection("refused")));

        let error = LevelResolver::load(Arc::new(repo))
            .await
            .err()
            .expect("load fails");
        assert_eq!(error.code(), ErrorCode::TransientStoreFailure);
    }

    #[tokio::test]
    async fn next_level_rejects_unknown_ids() {
        let resolver =
            LevelResolver::new(Arc::new(MockLevelRepository::new()), LevelCatalog::default());
        let error = resolver.next_level(Uuid::new_v4()).expect_err("unknown");
        assert_eq!(error.code(), ErrorCode::NotFound);
    }
}
