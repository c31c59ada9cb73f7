//! Relevance windows for recurring tasks.
//!
//! One pure function, [`period_window`], decides which assignments count as
//! "current" for a task frequency. Assignment, completion, listing and the
//! reset jobs all go through it so they can never disagree.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};

use super::TaskFrequency;

/// The window in which an assignment is considered current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodWindow {
    /// Half-open UTC interval `[start, end)` identified by `key`.
    Bounded {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        key: String,
    },
    /// No time bound; used for one-off tasks.
    Unbounded,
}

impl PeriodWindow {
    /// Whether `instant` falls inside the window.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        match self {
            Self::Bounded { start, end, .. } => *start <= instant && instant < *end,
            Self::Unbounded => true,
        }
    }

    /// Stable period identifier: `YYYY-MM-DD` or `YYYY-Www`.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Bounded { key, .. } => Some(key),
            Self::Unbounded => None,
        }
    }

    /// Start of the window, when bounded.
    #[must_use]
    pub const fn start(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Bounded { start, .. } => Some(*start),
            Self::Unbounded => None,
        }
    }
}

/// Compute the window containing `now` for `frequency`.
///
/// Daily windows are UTC calendar days; weekly windows are ISO weeks starting
/// on Monday.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use engine::domain::{PeriodWindow, TaskFrequency, period_window};
///
/// let now = Utc.with_ymd_and_hms(2026, 1, 1, 15, 30, 0).single().expect("valid time");
/// let window = period_window(now, &TaskFrequency::Weekly);
/// assert_eq!(window.key(), Some("2026-W01"));
/// assert!(matches!(period_window(now, &TaskFrequency::OneOff), PeriodWindow::Unbounded));
/// ```
#[must_use]
pub fn period_window(now: DateTime<Utc>, frequency: &TaskFrequency) -> PeriodWindow {
    let today = now.date_naive();
    match frequency {
        TaskFrequency::Daily => bounded(today, 1, today.format("%Y-%m-%d").to_string()),
        TaskFrequency::Weekly => {
            let monday = today
                .checked_sub_days(Days::new(u64::from(today.weekday().num_days_from_monday())))
                .unwrap_or(today);
            let week = today.iso_week();
            bounded(monday, 7, format!("{:04}-W{:02}", week.year(), week.week()))
        }
        TaskFrequency::OneOff => PeriodWindow::Unbounded,
    }
}

fn bounded(first_day: NaiveDate, days: u64, key: String) -> PeriodWindow {
    let start = first_day.and_time(NaiveTime::MIN).and_utc();
    let end = first_day
        .checked_add_days(Days::new(days))
        .map_or(DateTime::<Utc>::MAX_UTC, |day| {
            day.and_time(NaiveTime::MIN).and_utc()
        });
    PeriodWindow::Bounded { start, end, key }
}
