//! Level catalogue and XP-to-level resolution.
//!
//! A [`LevelCatalog`] is an immutable, validated snapshot of the configured
//! levels ordered by threshold. All resolution is pure; the service that keeps
//! the current snapshot lives in [`crate::domain::LevelResolver`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Error;

/// One rung of the level ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub id: Uuid,
    pub name: String,
    pub xp_required: i64,
    pub tier: i32,
}

/// Catalogue validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LevelCatalogError {
    #[error("level {name} has a negative threshold {xp_required}")]
    NegativeThreshold { name: String, xp_required: i64 },
    #[error("xp threshold {xp_required} is used by more than one level")]
    DuplicateThreshold { xp_required: i64 },
    #[error("level id {id} is used by more than one level")]
    DuplicateId { id: Uuid },
}

impl From<LevelCatalogError> for Error {
    fn from(error: LevelCatalogError) -> Self {
        Self::invalid_request(error.to_string())
    }
}

/// Where a user stands on the ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub current_level: Option<Level>,
    pub next_level: Option<Level>,
    pub xp_to_next: i64,
}

/// A transition between two levels caused by a grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelChange {
    pub previous: Option<Level>,
    pub current: Level,
}

/// Validated levels sorted by ascending threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelCatalog {
    levels: Vec<Level>,
}

impl LevelCatalog {
    /// Build a catalogue, rejecting negative or duplicate thresholds.
    ///
    /// # Examples
    /// ```
    /// use engine::domain::{Level, LevelCatalog};
    /// use uuid::Uuid;
    ///
    /// let level = |xp: i64, tier: i32| Level {
    ///     id: Uuid::new_v4(),
    ///     name: format!("Level {tier}"),
    ///     xp_required: xp,
    ///     tier,
    /// };
    /// let catalog = LevelCatalog::new(vec![level(100, 2), level(0, 1)]).expect("valid");
    /// assert_eq!(catalog.resolve_level(150).map(|l| l.xp_required), Some(100));
    /// ```
    pub fn new(mut levels: Vec<Level>) -> Result<Self, LevelCatalogError> {
        let mut thresholds = HashSet::with_capacity(levels.len());
        let mut ids = HashSet::with_capacity(levels.len());
        for level in &levels {
            if level.xp_required < 0 {
                return Err(LevelCatalogError::NegativeThreshold {
                    name: level.name.clone(),
                    xp_required: level.xp_required,
                });
            }
            if !thresholds.insert(level.xp_required) {
                return Err(LevelCatalogError::DuplicateThreshold {
                    xp_required: level.xp_required,
                });
            }
            if !ids.insert(level.id) {
                return Err(LevelCatalogError::DuplicateId { id: level.id });
            }
        }
        levels.sort_by_key(|level| level.xp_required);
        Ok(Self { levels })
    }

    /// Levels in ascending threshold order.
    #[must_use]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Highest level whose threshold does not exceed `xp_total`.
    #[must_use]
    pub fn resolve_level(&self, xp_total: i64) -> Option<&Level> {
        self.levels
            .iter()
            .rev()
            .find(|level| level.xp_required <= xp_total)
    }

    /// Level following `level_id`, or `None` at the top of the ladder.
    ///
    /// Unknown ids yield `not_found`.
    pub fn next_level(&self, level_id: Uuid) -> Result<Option<&Level>, Error> {
        let position = self
            .levels
            .iter()
            .position(|level| level.id == level_id)
            .ok_or_else(|| Error::not_found(format!("level {level_id} does not exist")))?;
        Ok(self.levels.get(position + 1))
    }

    /// Current level, next level and XP still needed to reach it.
    ///
    /// Below the lowest threshold the next level is the lowest one.
    #[must_use]
    pub fn compute_progress(&self, xp_total: i64) -> LevelProgress {
        let current = self.resolve_level(xp_total);
        let next = match current {
            Some(level) => self
                .levels
                .iter()
                .find(|candidate| candidate.xp_required > level.xp_required),
            None => self.levels.first(),
        };
        LevelProgress {
            current_level: current.cloned(),
            next_level: next.cloned(),
            xp_to_next: next.map_or(0, |level| level.xp_required - xp_total),
        }
    }

    /// Compare the levels resolved before and after a grant.
    #[must_use]
    pub fn detect_change(&self, before: i64, after: i64) -> Option<LevelChange> {
        let previous = self.resolve_level(before);
        let current = self.resolve_level(after)?;
        if previous.is_some_and(|level| level.id == current.id) {
            return None;
        }
        Some(LevelChange {
            previous: previous.cloned(),
            current: current.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::{fixture, rstest};

    fn level(xp_required: i64, tier: i32) -> Level {
        Level {
            id: Uuid::new_v4(),
            name: format!("Tier {tier}"),
            xp_required,
            tier,
        }
    }

    #[fixture]
    fn catalog() -> LevelCatalog {
        LevelCatalog::new(vec![level(500, 3), level(0, 1), level(2000, 4), level(100, 2)])
            .expect("valid catalog")
    }

    #[rstest]
    fn sorts_levels_by_threshold(catalog: LevelCatalog) {
        let thresholds: Vec<i64> = catalog.levels().iter().map(|l| l.xp_required).collect();
        assert_eq!(thresholds, vec![0, 100, 500, 2000]);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(99, 0)]
    #[case(100, 100)]
    #[case(450, 100)]
    #[case(2000, 2000)]
    #[case(1_000_000, 2000)]
    fn resolves_highest_reached_threshold(
        catalog: LevelCatalog,
        #[case] xp: i64,
        #[case] expected: i64,
    ) {
        let resolved = catalog.resolve_level(xp).expect("level resolved");
        assert_eq!(resolved.xp_required, expected);
    }

    #[rstest]
    fn computes_progress_towards_next_level(catalog: LevelCatalog) {
        let progress = catalog.compute_progress(450);

        assert_eq!(progress.current_level.map(|l| l.xp_required), Some(100));
        assert_eq!(progress.next_level.map(|l| l.xp_required), Some(500));
        assert_eq!(progress.xp_to_next, 50);
    }

    #[rstest]
    fn top_level_has_no_next(catalog: LevelCatalog) {
        let progress = catalog.compute_progress(5000);
        assert!(progress.next_level.is_none());
        assert_eq!(progress.xp_to_next, 0);
    }

    #[rstest]
    fn below_lowest_threshold_points_at_first_level() {
        let catalog = LevelCatalog::new(vec![level(10, 1), level(50, 2)]).expect("valid");
        let progress = catalog.compute_progress(4);

        assert!(progress.current_level.is_none());
        assert_eq!(progress.next_level.map(|l| l.xp_required), Some(10));
        assert_eq!(progress.xp_to_next, 6);
    }

    #[rstest]
    fn next_level_rejects_unknown_ids(catalog: LevelCatalog) {
        let err = catalog.next_level(Uuid::new_v4()).expect_err("unknown id");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[rstest]
    fn next_level_walks_the_ladder(catalog: LevelCatalog) {
        let first = catalog.levels().first().expect("first level").id;
        let top = catalog.levels().last().expect("top level").id;

        let next = catalog.next_level(first).expect("known id");
        assert_eq!(next.map(|l| l.xp_required), Some(100));
        assert!(catalog.next_level(top).expect("known id").is_none());
    }

    #[rstest]
    fn detects_level_up_with_previous(catalog: LevelCatalog) {
        let change = catalog.detect_change(90, 120).expect("level changed");
        assert_eq!(change.previous.map(|l| l.xp_required), Some(0));
        assert_eq!(change.current.xp_required, 100);
    }

    #[rstest]
    fn no_change_within_a_level(catalog: LevelCatalog) {
        assert!(catalog.detect_change(120, 499).is_none());
    }

    #[rstest]
    fn first_level_reached_has_no_previous() {
        let catalog = LevelCatalog::new(vec![level(10, 1)]).expect("valid");
        let change = catalog.detect_change(0, 10).expect("level reached");
        assert!(change.previous.is_none());
    }

    #[rstest]
    fn rejects_duplicate_thresholds() {
        let err = LevelCatalog::new(vec![level(0, 1), level(0, 2)]).expect_err("duplicate");
        assert_eq!(err, LevelCatalogError::DuplicateThreshold { xp_required: 0 });
    }

    #[rstest]
    fn rejects_negative_thresholds() {
        let err = LevelCatalog::new(vec![level(-1, 1)]).expect_err("negative");
        assert!(matches!(err, LevelCatalogError::NegativeThreshold { .. }));
    }
}
