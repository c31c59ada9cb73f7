//! Turns progression facts into log entries and, after commit, events.
//!
//! Callers record the entries for their facts, hand them to the repository
//! together with the state change, and publish them once the transaction has
//! committed. Publication never fails: subscriber problems stay inside the
//! fan-out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;

use crate::domain::ports::AchievementLogRepository;
use crate::domain::{
    AchievementEvent, AchievementFact, AchievementLogEntry, Error, EventFanOut, UserId,
};

/// Orchestrates fact recording and event emission.
pub struct AchievementPipeline {
    log: Arc<dyn AchievementLogRepository>,
    fan_out: EventFanOut,
    clock: Arc<dyn Clock>,
}

impl AchievementPipeline {
    /// Create a pipeline writing standalone facts to `log`.
    pub fn new(
        log: Arc<dyn AchievementLogRepository>,
        fan_out: EventFanOut,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            log,
            fan_out,
            clock,
        }
    }

    /// One log entry per fact, in order, stamped at `now`.
    #[must_use]
    pub fn record(
        &self,
        user_id: UserId,
        facts: &[AchievementFact],
        now: DateTime<Utc>,
    ) -> Vec<AchievementLogEntry> {
        facts
            .iter()
            .map(|fact| AchievementLogEntry::record(user_id, fact, now))
            .collect()
    }

    /// Emit one event per committed entry.
    pub async fn publish(&self, entries: &[AchievementLogEntry]) -> Vec<AchievementEvent> {
        let mut events = Vec::with_capacity(entries.len());
        for entry in entries {
            let event = entry.to_event();
            self.fan_out.dispatch(&event).await;
            events.push(event);
        }
        events
    }

    /// Persist a fact that has no accompanying state change, then publish it.
    pub async fn record_standalone(
        &self,
        user_id: UserId,
        fact: &AchievementFact,
    ) -> Result<AchievementEvent, Error> {
        let entry = AchievementLogEntry::record(user_id, fact, self.clock.utc());
        self.log.append(&entry).await?;
        let event = entry.to_event();
        self.fan_out.dispatch(&event).await;
        Ok(event)
    }

    /// Newest entries first.
    pub async fn history(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<AchievementLogEntry>, Error> {
        Ok(self.log.list_for_user(user_id, limit).await?)
    }
}
