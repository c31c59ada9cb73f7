//! Catalogue seeding at startup.
//!
//! A catalogue file is a JSON object with optional `levels`, `badges` and
//! `tasks` arrays using the same field names as the HTTP API. Every entry is
//! upserted by id, so re-running the seed is harmless.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cap_std::{ambient_authority, fs::Dir};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::domain::ports::{BadgeRepository, LevelRepository, TaskRepository};
use crate::domain::{Badge, Error, Level, LevelCatalog, LevelCatalogError, Task};

/// Errors returned while loading or applying a catalogue.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The catalogue file could not be read.
    #[error("failed to read catalogue at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The catalogue is not valid JSON of the expected shape.
    #[error("catalogue parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// The level ladder is inconsistent.
    #[error("invalid level ladder: {0}")]
    Levels(#[from] LevelCatalogError),
    /// Writing to the store failed.
    #[error("catalogue upsert failed: {0}")]
    Store(#[from] Error),
}

/// Levels, badges and tasks to upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Catalogue {
    #[serde(default)]
    pub levels: Vec<Level>,
    #[serde(default)]
    pub badges: Vec<Badge>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Catalogue {
    /// Parse and validate a catalogue document.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::Parse`] for malformed JSON and
    /// [`SeedError::Levels`] for duplicate or negative thresholds.
    pub fn from_json(contents: &str) -> Result<Self, SeedError> {
        let catalogue: Self = serde_json::from_str(contents)?;
        LevelCatalog::new(catalogue.levels.clone())?;
        Ok(catalogue)
    }

    /// Read and validate the catalogue at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::Read`] when the file is unreadable, otherwise as
    /// [`Catalogue::from_json`].
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let read_error = |source| SeedError::Read {
            path: path.to_path_buf(),
            source,
        };
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file_name = path.file_name().ok_or_else(|| {
            read_error(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "catalogue path must name a file",
            ))
        })?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_error)?;
        let contents = dir.read_to_string(Path::new(file_name)).map_err(read_error)?;
        Self::from_json(&contents)
    }
}

/// Counts of upserted catalogue entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub levels: usize,
    pub badges: usize,
    pub tasks: usize,
}

/// Writes a [`Catalogue`] through the catalogue ports.
pub struct CatalogueSeeder {
    levels: Arc<dyn LevelRepository>,
    badges: Arc<dyn BadgeRepository>,
    tasks: Arc<dyn TaskRepository>,
}

impl CatalogueSeeder {
    /// Create a seeder over the catalogue repositories.
    pub fn new(
        levels: Arc<dyn LevelRepository>,
        badges: Arc<dyn BadgeRepository>,
        tasks: Arc<dyn TaskRepository>,
    ) -> Self {
        Self {
            levels,
            badges,
            tasks,
        }
    }

    /// Upsert every entry of `catalogue`.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::Store`] on the first failed write; earlier
    /// entries stay written and a re-run completes the seed.
    pub async fn apply(&self, catalogue: &Catalogue) -> Result<SeedReport, SeedError> {
        for level in &catalogue.levels {
            self.levels.upsert_level(level).await.map_err(Error::from)?;
        }
        for badge in &catalogue.badges {
            self.badges.upsert_badge(badge).await.map_err(Error::from)?;
        }
        for task in &catalogue.tasks {
            self.tasks.upsert_task(task).await.map_err(Error::from)?;
        }
        let report = SeedReport {
            levels: catalogue.levels.len(),
            badges: catalogue.badges.len(),
            tasks: catalogue.tasks.len(),
        };
        info!(
            levels = report.levels,
            badges = report.badges,
            tasks = report.tasks,
            "catalogue seeded"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{LevelRepositoryError, MockLevelRepository};
    use crate::domain::{BadgeKind, TaskFrequency};
    use crate::outbound::memory::InMemoryProgressionStore;
    use rstest::rstest;

    const CATALOGUE: &str = r#"{
        "levels": [
            { "id": "00000000-0000-0000-0000-000000000001", "name": "Newcomer", "xpRequired": 0, "tier": 1 },
            { "id": "00000000-0000-0000-0000-000000000002", "name": "Regular", "xpRequired": 100, "tier": 2 }
        ],
        "badges": [
            {
                "id": "00000000-0000-0000-0000-0000000000b1",
                "name": "First Answer",
                "slug": "first-answer",
                "description": "Posted a first answer",
                "type": "Milestone",
                "iconPath": null,
                "xpReward": 25,
                "isActive": true
            }
        ],
        "tasks": [
            {
                "id": "00000000-0000-0000-0000-0000000000c1",
                "title": "Daily check-in",
                "description": "Visit the community",
                "frequency": "daily",
                "xpReward": 5,
                "isActive": true
            }
        ]
    }"#;

    #[rstest]
    fn parses_catalogue_documents() {
        let catalogue = Catalogue::from_json(CATALOGUE).expect("catalogue");

        assert_eq!(catalogue.levels.len(), 2);
        let badge = catalogue.badges.first().expect("badge");
        assert_eq!(badge.kind, BadgeKind::Milestone);
        let task = catalogue.tasks.first().expect("task");
        assert_eq!(task.frequency, TaskFrequency::Daily);
    }

    #[rstest]
    fn rejects_duplicate_thresholds() {
        let json = r#"{ "levels": [
            { "id": "00000000-0000-0000-0000-000000000001", "name": "A", "xpRequired": 0, "tier": 1 },
            { "id": "00000000-0000-0000-0000-000000000002", "name": "B", "xpRequired": 0, "tier": 2 }
        ] }"#;

        let error = Catalogue::from_json(json).expect_err("duplicate threshold");
        assert!(matches!(error, SeedError::Levels(_)));
    }

    #[rstest]
    fn rejects_unknown_sections() {
        let error = Catalogue::from_json(r#"{ "quests": [] }"#).expect_err("unknown field");
        assert!(matches!(error, SeedError::Parse(_)));
    }

    #[rstest]
    fn missing_file_is_a_read_error() {
        let error = Catalogue::load(Path::new("/nonexistent/catalogue.json")).expect_err("missing");
        assert!(matches!(error, SeedError::Read { .. }));
    }

    #[tokio::test]
    async fn seeding_is_repeatable() {
        let store = Arc::new(InMemoryProgressionStore::new());
        let seeder = CatalogueSeeder::new(store.clone(), store.clone(), store.clone());
        let catalogue = Catalogue::from_json(CATALOGUE).expect("catalogue");

        seeder.apply(&catalogue).await.expect("first seed");
        let report = seeder.apply(&catalogue).await.expect("second seed");

        assert_eq!(report.levels, 2);
        assert_eq!(store.list_levels().await.expect("levels").len(), 2);
        assert_eq!(store.list_active_badges().await.expect("badges").len(), 1);
    }

    #[tokio::test]
    async fn store_failures_surface_as_store_errors() {
        let mut levels = MockLevelRepository::new();
        levels
            .expect_upsert_level()
            .returning(|_| Err(LevelRepositoryError::connection("down")));
        let store = Arc::new(InMemoryProgressionStore::new());
        let seeder = CatalogueSeeder::new(Arc::new(levels), store.clone(), store);
        let catalogue = Catalogue::from_json(CATALOGUE).expect("catalogue");

        let error = seeder.apply(&catalogue).await.expect_err("store down");
        assert!(matches!(error, SeedError::Store(_)));
    }
}
