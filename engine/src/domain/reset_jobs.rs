//! Periodic task reset jobs and their fire-time arithmetic.
//!
//! A reset never deletes rows. It pre-assigns the new period's pending tasks
//! to every recently active user; the period-window dedup makes re-runs and
//! interrupted runs safe. Each job admits one running instance at a time
//! across every process sharing the store, enforced by a lease.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, Duration, NaiveTime, Utc, Weekday};
use mockable::Clock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::ports::{JobLeaseRepository, UserProgressRepository};
use crate::domain::{Error, TaskFrequency, TaskTracker, period_window};

/// Default look-back for "active users", in days.
pub const DEFAULT_ACTIVE_USER_DAYS: u32 = 30;

/// Lifetime of a job lease; a crashed run frees the job after it.
pub const DEFAULT_JOB_LEASE_MINUTES: i64 = 60;

const DAILY_JOB: &str = "daily_reset";
const WEEKLY_JOB: &str = "weekly_reset";

/// Summary of one completed reset run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub frequency: Option<TaskFrequency>,
    pub period_key: Option<String>,
    pub users: usize,
    pub tasks: usize,
    pub created: usize,
    pub existing: usize,
    pub failures: usize,
    pub streaks_reset: u64,
}

/// Outcome of triggering a reset job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetRun {
    Completed(ResetReport),
    /// Another run of the same job was still in progress.
    Skipped,
}

/// Daily and weekly reset jobs.
pub struct ResetJobs {
    tracker: Arc<TaskTracker>,
    progress: Arc<dyn UserProgressRepository>,
    leases: Arc<dyn JobLeaseRepository>,
    clock: Arc<dyn Clock>,
    active_user_days: u32,
    lease_ttl: Duration,
}

impl ResetJobs {
    /// Create the jobs with the default active-user look-back.
    pub fn new(
        tracker: Arc<TaskTracker>,
        progress: Arc<dyn UserProgressRepository>,
        leases: Arc<dyn JobLeaseRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tracker,
            progress,
            leases,
            clock,
            active_user_days: DEFAULT_ACTIVE_USER_DAYS,
            lease_ttl: Duration::minutes(DEFAULT_JOB_LEASE_MINUTES),
        }
    }

    /// Override how far back a user's last activity may lie.
    #[must_use]
    pub fn with_active_user_days(mut self, days: u32) -> Self {
        self.active_user_days = days;
        self
    }

    /// Pre-assign today's daily tasks and reset lapsed streaks.
    pub async fn reset_daily_tasks(&self) -> Result<ResetRun, Error> {
        self.reset_daily_tasks_at(self.clock.utc()).await
    }

    /// Daily reset for the day containing `now`.
    pub async fn reset_daily_tasks_at(&self, now: DateTime<Utc>) -> Result<ResetRun, Error> {
        self.exclusive(DAILY_JOB, async {
            let mut report = self.assign_period(TaskFrequency::Daily, now).await?;
            let yesterday = now
                .date_naive()
                .checked_sub_days(Days::new(1))
                .unwrap_or_else(|| now.date_naive())
                .and_time(NaiveTime::MIN)
                .and_utc();
            report.streaks_reset = self.progress.reset_lapsed_streaks(yesterday).await?;
            Ok(report)
        })
        .await
    }

    /// Pre-assign this ISO week's weekly tasks.
    pub async fn reset_weekly_tasks(&self) -> Result<ResetRun, Error> {
        self.reset_weekly_tasks_at(self.clock.utc()).await
    }

    /// Weekly reset for the ISO week containing `now`.
    pub async fn reset_weekly_tasks_at(&self, now: DateTime<Utc>) -> Result<ResetRun, Error> {
        self.exclusive(WEEKLY_JOB, self.assign_period(TaskFrequency::Weekly, now))
            .await
    }

    async fn exclusive<F>(&self, job: &'static str, run: F) -> Result<ResetRun, Error>
    where
        F: Future<Output = Result<ResetReport, Error>>,
    {
        let holder = Uuid::new_v4();
        let Some(lease) = self
            .leases
            .try_acquire(job, holder, self.clock.utc(), self.lease_ttl)
            .await?
        else {
            info!(job, "another run holds the job; skipping");
            return Ok(ResetRun::Skipped);
        };

        let outcome = run.await;
        if let Err(error) = self.leases.release(&lease).await {
            warn!(job, error = %error, "job lease not released; it expires on its own");
        }
        let report = outcome?;
        log_report(job, &report);
        Ok(ResetRun::Completed(report))
    }

    async fn assign_period(
        &self,
        frequency: TaskFrequency,
        now: DateTime<Utc>,
    ) -> Result<ResetReport, Error> {
        let since = now - Duration::days(i64::from(self.active_user_days));
        let users = self.progress.list_active_users(since).await?;
        let tasks = self.tracker.active_tasks(frequency).await?;
        let mut report = ResetReport {
            frequency: Some(frequency),
            period_key: period_window(now, &frequency).key().map(str::to_owned),
            users: users.len(),
            tasks: tasks.len(),
            ..ResetReport::default()
        };

        for user_id in &users {
            for task in &tasks {
                match self.tracker.ensure_assigned(task, *user_id, now).await {
                    Ok(assignment) if assignment.created => report.created += 1,
                    Ok(_) => report.existing += 1,
                    Err(error) => {
                        report.failures += 1;
                        warn!(
                            user_id = %user_id,
                            task_id = %task.id,
                            error = %error,
                            "reset assignment failed"
                        );
                    }
                }
            }
        }
        Ok(report)
    }
}

fn log_report(job: &'static str, report: &ResetReport) {
    info!(
        job,
        period = report.period_key.as_deref().unwrap_or("-"),
        users = report.users,
        tasks = report.tasks,
        created = report.created,
        existing = report.existing,
        failures = report.failures,
        streaks_reset = report.streaks_reset,
        "reset job finished"
    );
}

/// Next daily fire time strictly after `now`.
///
/// # Examples
/// ```
/// use chrono::{NaiveTime, TimeZone, Utc};
/// use engine::domain::next_daily_run;
///
/// let now = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).single().expect("valid time");
/// let at = NaiveTime::from_hms_opt(0, 5, 0).expect("valid time");
/// assert_eq!(
///     next_daily_run(now, at),
///     Utc.with_ymd_and_hms(2026, 3, 5, 0, 5, 0).single().expect("valid time"),
/// );
/// ```
#[must_use]
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Next weekly fire time on `day` at `at`, strictly after `now`.
#[must_use]
pub fn next_weekly_run(now: DateTime<Utc>, day: Weekday, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive();
    let ahead = (7 + day.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
    let candidate = today.and_time(at).and_utc() + Duration::days(i64::from(ahead));
    if candidate > now {
        candidate
    } else {
        candidate + Duration::days(7)
    }
}
