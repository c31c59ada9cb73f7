//! Progression domain: entities, rules and services.
//!
//! Purpose: own the XP, level, badge and task rules together with the
//! achievement pipeline that turns committed changes into events. Storage,
//! transport and queueing sit behind the traits in [`ports`].
//!
//! Public surface:
//! - [`XpLedger`], [`LevelResolver`], [`BadgeRegistry`], [`TaskTracker`]:
//!   the progression components.
//! - [`AchievementPipeline`] and [`EventFanOut`]: fact recording and
//!   isolated subscriber dispatch.
//! - [`ResetJobs`]: periodic task pre-assignment and streak upkeep.
//! - [`ProgressionService`]: implementation of the driving ports.

pub mod ports;

mod achievement_pipeline;
mod achievements;
mod badge_registry;
mod badges;
mod effects;
mod error;
mod fan_out;
mod level_resolver;
mod levels;
mod period;
mod progression_service;
mod reset_jobs;
mod retry;
mod subscribers;
mod task_tracker;
mod tasks;
mod user;
mod xp;
mod xp_ledger;

pub use self::achievement_pipeline::AchievementPipeline;
pub use self::achievements::{
    AchievementEvent, AchievementFact, AchievementKind, AchievementLogEntry,
    ParseAchievementKindError,
};
pub use self::badge_registry::{BadgeAward, BadgeRegistry};
pub use self::badges::{AwardedBadge, Badge, BadgeKind, UserBadge};
pub use self::effects::{ChainedXpEffects, DeferredEffect, chained_effect_for};
pub use self::error::{DomainError, Error, ErrorCode};
pub use self::fan_out::{EventFanOut, FanOutReport, SubscriberRegistry};
pub use self::level_resolver::LevelResolver;
pub use self::levels::{Level, LevelCatalog, LevelCatalogError, LevelChange, LevelProgress};
pub use self::period::{PeriodWindow, period_window};
pub use self::progression_service::{MAX_HISTORY_LIMIT, ProgressionService};
pub use self::reset_jobs::{
    DEFAULT_ACTIVE_USER_DAYS, DEFAULT_JOB_LEASE_MINUTES, ResetJobs, ResetReport, ResetRun,
    next_daily_run, next_weekly_run,
};
pub use self::retry::{BackoffJitter, NoJitter, RandomJitter, RetryPolicy, Sleeper, TokioSleeper};
pub use self::subscribers::{AuditLogger, QueuedEffects, RealtimeNotifier};
pub use self::task_tracker::{TaskAssignment, TaskCompletion, TaskTracker};
pub use self::tasks::{
    ParseTaskFrequencyError, ParseTaskStatusError, Task, TaskFrequency, TaskStatus, UserTask,
    in_window, select_relevant,
};
pub use self::user::{UserId, UserProgress, UserValidationError};
pub use self::xp::{Metadata, XpAmount, XpEventType, XpLogEntry};
pub use self::xp_ledger::{DEFAULT_GRANT_MAX_ATTEMPTS, XpGrant, XpLedger};
