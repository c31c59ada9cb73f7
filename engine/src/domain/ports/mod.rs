//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod achievement_log_repository;
mod achievement_subscriber;
mod badge_repository;
mod effect_queue;
mod event_audit_repository;
mod job_lease_repository;
mod level_repository;
mod progression_command;
mod progression_query;
mod realtime_transport;
mod task_repository;
mod user_progress_repository;

#[cfg(test)]
pub use achievement_log_repository::MockAchievementLogRepository;
pub use achievement_log_repository::{AchievementLogRepository, AchievementLogRepositoryError};
#[cfg(test)]
pub use achievement_subscriber::MockAchievementSubscriber;
pub use achievement_subscriber::{AchievementSubscriber, SubscriberError};
#[cfg(test)]
pub use badge_repository::MockBadgeRepository;
pub use badge_repository::{AwardOutcome, BadgeAwardCommit, BadgeRepository, BadgeRepositoryError};
#[cfg(test)]
pub use effect_queue::{MockEffectHandler, MockEffectQueue};
pub use effect_queue::{EffectHandler, EffectQueue, EffectQueueError};
#[cfg(test)]
pub use event_audit_repository::MockEventAuditRepository;
pub use event_audit_repository::{EventAuditRepository, EventAuditRepositoryError};
#[cfg(test)]
pub use job_lease_repository::MockJobLeaseRepository;
pub use job_lease_repository::{JobLease, JobLeaseRepository, JobLeaseRepositoryError};
#[cfg(test)]
pub use level_repository::MockLevelRepository;
pub use level_repository::{LevelRepository, LevelRepositoryError};
#[cfg(test)]
pub use progression_command::MockProgressionCommand;
pub use progression_command::{
    ActionOutcome, AnswerVerifiedRequest, GrantXpRequest, OutcomeKind, ProgressionCommand,
};
#[cfg(test)]
pub use progression_query::MockProgressionQuery;
pub use progression_query::{ProgressSnapshot, ProgressionQuery, TaskView};
#[cfg(test)]
pub use realtime_transport::MockRealtimeTransport;
pub use realtime_transport::{RealtimeTransport, RealtimeTransportError};
#[cfg(test)]
pub use task_repository::MockTaskRepository;
pub use task_repository::{
    AssignmentInsert, CompletionOutcome, TaskCompletionCommit, TaskRepository, TaskRepositoryError,
};
#[cfg(test)]
pub use user_progress_repository::MockUserProgressRepository;
pub use user_progress_repository::{
    TotalReconciliation, UserProgressRepository, UserProgressRepositoryError, XpGrantCommit,
};
