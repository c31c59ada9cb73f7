//! Port for task templates and user assignments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{AchievementLogEntry, Task, TaskFrequency, UserId, UserTask};

use super::define_port_error;

define_port_error! {
    /// Errors raised by task repository adapters.
    pub enum TaskRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "task repository connection failed: {message}"; transient,
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "task repository query failed: {message}",
    }
}

/// Outcome of inserting an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentInsert {
    /// The new row was stored.
    Inserted(UserTask),
    /// A uniqueness constraint kept an existing row; that row is returned.
    Existing(UserTask),
}

impl AssignmentInsert {
    /// The stored assignment, whichever side won.
    #[must_use]
    pub fn into_assignment(self) -> UserTask {
        match self {
            Self::Inserted(task) | Self::Existing(task) => task,
        }
    }
}

/// Conditional completion of one assignment plus its achievement entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCompletionCommit {
    pub assignment_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub achievement: AchievementLogEntry,
}

/// Outcome of a completion commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The assignment moved from pending to completed.
    Completed(UserTask),
    /// The assignment was no longer pending; nothing was written.
    NotPending,
}

/// Port for task storage.
///
/// Uniqueness the adapter must enforce:
/// - one assignment per `(user_id, task_id, period_key)` when a period key
///   is present;
/// - one pending assignment per `(user_id, task_id)` when it is absent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Look a task up by id, active or not.
    async fn find_task(&self, task_id: &Uuid) -> Result<Option<Task>, TaskRepositoryError>;

    /// Active tasks, optionally restricted to one frequency, ordered by title.
    async fn list_active_tasks(
        &self,
        frequency: Option<TaskFrequency>,
    ) -> Result<Vec<Task>, TaskRepositoryError>;

    /// Every assignment of `task_id` to `user_id`, newest first.
    async fn list_assignments(
        &self,
        user_id: &UserId,
        task_id: &Uuid,
    ) -> Result<Vec<UserTask>, TaskRepositoryError>;

    /// Every assignment held by `user_id`, newest first.
    async fn list_user_assignments(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserTask>, TaskRepositoryError>;

    /// Store a new assignment unless a uniqueness constraint already holds
    /// one.
    async fn insert_assignment(
        &self,
        assignment: &UserTask,
    ) -> Result<AssignmentInsert, TaskRepositoryError>;

    /// Transition a pending assignment to completed and append the
    /// achievement entry, atomically.
    async fn commit_completion(
        &self,
        commit: &TaskCompletionCommit,
    ) -> Result<CompletionOutcome, TaskRepositoryError>;

    /// Insert a task or replace the one with the same id.
    async fn upsert_task(&self, task: &Task) -> Result<(), TaskRepositoryError>;
}
