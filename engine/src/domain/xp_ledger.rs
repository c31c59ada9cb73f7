//! XP ledger service.
//!
//! A grant appends a ledger entry, moves the user's total, streak and level,
//! and records the resulting achievement entries, all in one repository
//! commit guarded by the user's progress revision. Concurrent grants for the
//! same user therefore serialise: the loser re-reads and tries again, up to
//! the configured attempt budget.

use std::sync::Arc;

use mockable::Clock;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::ports::{
    TotalReconciliation, UserProgressRepository, UserProgressRepositoryError, XpGrantCommit,
};
use crate::domain::{
    AchievementEvent, AchievementFact, AchievementPipeline, Error, LevelChange, LevelResolver,
    Metadata, UserId, UserProgress, XpAmount, XpEventType, XpLogEntry,
};

/// Default number of optimistic attempts per grant.
pub const DEFAULT_GRANT_MAX_ATTEMPTS: u32 = 5;

/// Result of a committed grant.
#[derive(Debug, Clone, PartialEq)]
pub struct XpGrant {
    pub entry: XpLogEntry,
    pub progress: UserProgress,
    pub level_change: Option<LevelChange>,
    pub events: Vec<AchievementEvent>,
}

/// Append-only XP ledger.
pub struct XpLedger {
    progress: Arc<dyn UserProgressRepository>,
    levels: Arc<LevelResolver>,
    pipeline: Arc<AchievementPipeline>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
}

impl XpLedger {
    /// Create a ledger with the default attempt budget.
    pub fn new(
        progress: Arc<dyn UserProgressRepository>,
        levels: Arc<LevelResolver>,
        pipeline: Arc<AchievementPipeline>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            progress,
            levels,
            pipeline,
            clock,
            max_attempts: DEFAULT_GRANT_MAX_ATTEMPTS,
        }
    }

    /// Override the optimistic attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Grant `amount` XP to `user_id`.
    ///
    /// Validation happens before any read or write: negative amounts yield
    /// `invalid_amount`, blank event types `invalid_request`. A zero amount
    /// still produces a ledger entry.
    pub async fn grant_xp(
        &self,
        user_id: UserId,
        event_type: &str,
        amount: i64,
        metadata: Metadata,
    ) -> Result<XpGrant, Error> {
        let amount = XpAmount::new(amount)?;
        let event_type = XpEventType::new(event_type)?;

        for attempt in 1..=self.max_attempts {
            let current = self.progress.find_progress(&user_id).await?;
            let expected_revision = current.as_ref().map(|progress| progress.revision);
            let current = current.unwrap_or_else(|| UserProgress::empty(user_id));

            let now = self.clock.utc();
            let next = current.with_grant(amount.get(), now)?;
            let level_change = self
                .levels
                .snapshot()
                .detect_change(current.total_xp, next.total_xp);

            let mut facts = vec![AchievementFact::XpGained {
                xp_amount: amount.get(),
                event_type: event_type.as_str().to_owned(),
                total_xp: next.total_xp,
            }];
            if let Some(change) = &level_change {
                facts.push(AchievementFact::LevelUp(change.clone()));
            }

            let commit = XpGrantCommit {
                entry: XpLogEntry {
                    id: Uuid::new_v4(),
                    user_id,
                    event_type: event_type.clone(),
                    xp_amount: amount,
                    metadata: metadata.clone(),
                    created_at: now,
                },
                progress: next,
                expected_revision,
                achievements: self.pipeline.record(user_id, &facts, now),
            };

            match self.progress.commit_xp_grant(&commit).await {
                Ok(()) => {
                    if let Some(change) = &level_change {
                        info!(
                            user_id = %user_id,
                            level = %change.current.name,
                            tier = change.current.tier,
                            "user levelled up"
                        );
                    }
                    let events = self.pipeline.publish(&commit.achievements).await;
                    return Ok(XpGrant {
                        entry: commit.entry,
                        progress: commit.progress,
                        level_change,
                        events,
                    });
                }
                Err(UserProgressRepositoryError::RevisionMismatch { expected, actual }) => {
                    debug!(
                        user_id = %user_id,
                        attempt,
                        expected,
                        actual,
                        "progress revision moved; retrying grant"
                    );
                }
                Err(error) => return Err(error.into()),
            }
        }

        Err(
            Error::conflict("concurrent updates exhausted the grant retry budget").with_details(
                json!({ "userId": user_id, "attempts": self.max_attempts }),
            ),
        )
    }

    /// Maintained total; 0 for users without grants.
    pub async fn total_xp(&self, user_id: &UserId) -> Result<i64, Error> {
        Ok(self.progress(user_id).await?.total_xp)
    }

    /// Stored progress, or the empty state for unknown users.
    pub async fn progress(&self, user_id: &UserId) -> Result<UserProgress, Error> {
        Ok(self
            .progress
            .find_progress(user_id)
            .await?
            .unwrap_or_else(|| UserProgress::empty(*user_id)))
    }

    /// Recompute the total from the ledger and repair the counter.
    pub async fn reconcile_total(&self, user_id: &UserId) -> Result<TotalReconciliation, Error> {
        let outcome = self.progress.reconcile_total(user_id).await?;
        if outcome.drifted() {
            warn!(
                user_id = %user_id,
                recorded = outcome.recorded_total,
                ledger = outcome.ledger_total,
                "xp counter drifted from ledger; repaired"
            );
        }
        Ok(outcome)
    }
}
