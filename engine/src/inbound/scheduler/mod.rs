//! Clock-driven trigger for the daily and weekly reset jobs.
//!
//! The scheduler sleeps until the next configured fire time, starts the due
//! jobs on their own tasks and goes back to sleep. Jobs guard against
//! overlapping runs themselves, so a slow run never blocks the next tick.
//! Runs are pinned to the scheduled instant rather than the wall clock at
//! wake-up, which may trail it slightly.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use mockable::Clock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::domain::{ResetJobs, ResetRun, next_daily_run, next_weekly_run};
use crate::settings::{EngineSettings, SettingsError};

/// When the reset jobs fire, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSchedule {
    pub daily_at: NaiveTime,
    pub weekly_day: Weekday,
    pub weekly_at: NaiveTime,
}

impl Default for ResetSchedule {
    fn default() -> Self {
        Self {
            daily_at: NaiveTime::MIN,
            weekly_day: Weekday::Mon,
            weekly_at: NaiveTime::MIN,
        }
    }
}

/// The next scheduler wake-up and the jobs due at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextFire {
    pub at: DateTime<Utc>,
    pub daily: bool,
    pub weekly: bool,
}

impl ResetSchedule {
    /// Read the fire times from settings.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when a configured time or weekday does not
    /// parse.
    pub fn from_settings(settings: &EngineSettings) -> Result<Self, SettingsError> {
        Ok(Self {
            daily_at: settings.daily_reset_at()?,
            weekly_day: settings.weekly_reset_day()?,
            weekly_at: settings.weekly_reset_at()?,
        })
    }

    /// Earliest fire time strictly after `now`; both jobs are due when their
    /// times coincide.
    #[must_use]
    pub fn next_fire(&self, now: DateTime<Utc>) -> NextFire {
        let daily = next_daily_run(now, self.daily_at);
        let weekly = next_weekly_run(now, self.weekly_day, self.weekly_at);
        let at = daily.min(weekly);
        NextFire {
            at,
            daily: daily == at,
            weekly: weekly == at,
        }
    }

    /// Like [`Self::next_fire`], but never at or before `last_fired`, so a
    /// wake-up that reads the clock just short of the fire time cannot
    /// schedule the same instant twice.
    #[must_use]
    pub fn next_fire_after(
        &self,
        now: DateTime<Utc>,
        last_fired: Option<DateTime<Utc>>,
    ) -> NextFire {
        self.next_fire(last_fired.map_or(now, |fired| fired.max(now)))
    }
}

/// Background loop firing [`ResetJobs`] on a [`ResetSchedule`].
pub struct ResetScheduler {
    jobs: Arc<ResetJobs>,
    schedule: ResetSchedule,
    clock: Arc<dyn Clock>,
}

impl ResetScheduler {
    pub fn new(jobs: Arc<ResetJobs>, schedule: ResetSchedule, clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs,
            schedule,
            clock,
        }
    }

    /// Run on the current runtime until aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run_until(std::future::pending::<()>()))
    }

    /// Loop until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        info!(
            daily_at = %self.schedule.daily_at,
            weekly_day = %self.schedule.weekly_day,
            weekly_at = %self.schedule.weekly_at,
            "reset scheduler started"
        );
        let mut last_fired: Option<DateTime<Utc>> = None;
        loop {
            let now = self.clock.utc();
            let next = self.schedule.next_fire_after(now, last_fired);
            let delay = (next.at - now).to_std().unwrap_or_default();
            debug!(next = %next.at, "reset scheduler sleeping");

            tokio::select! {
                () = &mut shutdown => {
                    info!("reset scheduler stopped");
                    return;
                }
                () = tokio::time::sleep(delay) => {
                    self.fire(next);
                    last_fired = Some(next.at);
                }
            }
        }
    }

    /// Start the jobs due at `next` for the period containing `next.at`,
    /// returning their handles.
    pub fn fire(&self, next: NextFire) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        if next.daily {
            let jobs = self.jobs.clone();
            handles.push(tokio::spawn(async move {
                report("daily_reset", jobs.reset_daily_tasks_at(next.at).await);
            }));
        }
        if next.weekly {
            let jobs = self.jobs.clone();
            handles.push(tokio::spawn(async move {
                report("weekly_reset", jobs.reset_weekly_tasks_at(next.at).await);
            }));
        }
        handles
    }
}

fn report(job: &'static str, result: Result<ResetRun, crate::domain::Error>) {
    match result {
        Ok(ResetRun::Completed(_)) => {}
        Ok(ResetRun::Skipped) => debug!(job, "run skipped"),
        Err(err) => error!(job, code = ?err.code(), error = %err, "reset job failed"),
    }
}
