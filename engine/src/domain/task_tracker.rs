//! Task catalogue and assignment tracker.
//!
//! Every decision about which assignment is "current" goes through
//! [`period_window`]; duplicates under concurrency are prevented by the
//! store's unique constraints, and completion is a conditional
//! `pending -> completed` transition.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{
    AssignmentInsert, CompletionOutcome, TaskCompletionCommit, TaskRepository, TaskView,
};
use crate::domain::{
    AchievementEvent, AchievementFact, AchievementPipeline, Error, PeriodWindow, Task,
    TaskFrequency, TaskStatus, UserId, UserTask, in_window, period_window, select_relevant,
};

/// Result of an assignment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskAssignment {
    pub task: Task,
    pub assignment: UserTask,
    /// Whether this call created the assignment.
    pub created: bool,
}

/// Result of a completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCompletion {
    pub task: Task,
    pub assignment: UserTask,
    /// Event emitted when this call performed the transition.
    pub event: Option<AchievementEvent>,
}

impl TaskCompletion {
    /// Whether this call moved the assignment to completed.
    #[must_use]
    pub const fn newly_completed(&self) -> bool {
        self.event.is_some()
    }
}

/// Tracks per-user task assignments across periods.
pub struct TaskTracker {
    tasks: Arc<dyn TaskRepository>,
    pipeline: Arc<AchievementPipeline>,
    clock: Arc<dyn Clock>,
}

impl TaskTracker {
    /// Create a tracker.
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        pipeline: Arc<AchievementPipeline>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tasks,
            pipeline,
            clock,
        }
    }

    async fn require_task(&self, task_id: Uuid) -> Result<Task, Error> {
        self.tasks.find_task(&task_id).await?.ok_or_else(|| {
            Error::not_found(format!("task {task_id} does not exist"))
                .with_details(json!({ "taskId": task_id }))
        })
    }

    /// Assign `task_id` to `user_id` for the current period.
    ///
    /// An assignment already inside the window is returned unchanged; for
    /// one-off tasks only a pending assignment counts. Inactive tasks yield
    /// `invalid_request`.
    pub async fn assign_to_user(&self, task_id: Uuid, user_id: UserId) -> Result<TaskAssignment, Error> {
        let task = self.require_task(task_id).await?;
        if !task.is_active {
            return Err(Error::invalid_request(format!("task {task_id} is not active"))
                .with_details(json!({ "taskId": task_id })));
        }
        self.assign_at(task, user_id, self.clock.utc()).await
    }

    async fn assign_at(
        &self,
        task: Task,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<TaskAssignment, Error> {
        let window = period_window(now, &task.frequency);
        let existing = self.tasks.list_assignments(&user_id, &task.id).await?;
        if let Some(current) = current_assignment(&existing, &window, task.frequency) {
            return Ok(TaskAssignment {
                task,
                assignment: current.clone(),
                created: false,
            });
        }

        let candidate = UserTask::pending(user_id, task.id, &window, now);
        match self.tasks.insert_assignment(&candidate).await? {
            AssignmentInsert::Inserted(assignment) => Ok(TaskAssignment {
                task,
                assignment,
                created: true,
            }),
            AssignmentInsert::Existing(assignment) => {
                debug!(user_id = %user_id, task_id = %task.id, "concurrent assignment won elsewhere");
                Ok(TaskAssignment {
                    task,
                    assignment,
                    created: false,
                })
            }
        }
    }

    /// Complete the current period's assignment of `task_id`.
    ///
    /// A completion that finds the assignment already completed returns it
    /// unchanged and emits nothing. Without any current assignment the call
    /// fails with `no_pending_assignment`.
    pub async fn mark_completed(&self, task_id: Uuid, user_id: UserId) -> Result<TaskCompletion, Error> {
        let task = self.require_task(task_id).await?;
        let now = self.clock.utc();
        let window = period_window(now, &task.frequency);
        let existing = self.tasks.list_assignments(&user_id, &task_id).await?;

        let pending = in_window(&existing, &window)
            .find(|assignment| assignment.status == TaskStatus::Pending)
            .cloned();
        let Some(pending) = pending else {
            return completed_in(&existing, &window)
                .map(|assignment| TaskCompletion {
                    task: task.clone(),
                    assignment,
                    event: None,
                })
                .ok_or_else(|| no_pending(task_id));
        };

        let mut achievements = self.pipeline.record(
            user_id,
            &[AchievementFact::TaskCompleted(task.clone())],
            now,
        );
        let Some(achievement) = achievements.pop() else {
            return Err(Error::internal("task completion produced no achievement entry"));
        };
        let commit = TaskCompletionCommit {
            assignment_id: pending.id,
            completed_at: now,
            achievement,
        };

        match self.tasks.commit_completion(&commit).await? {
            CompletionOutcome::Completed(assignment) => {
                let event = self
                    .pipeline
                    .publish(std::slice::from_ref(&commit.achievement))
                    .await
                    .pop();
                Ok(TaskCompletion {
                    task,
                    assignment,
                    event,
                })
            }
            CompletionOutcome::NotPending => {
                debug!(user_id = %user_id, task_id = %task_id, "concurrent completion won elsewhere");
                let reread = self.tasks.list_assignments(&user_id, &task_id).await?;
                completed_in(&reread, &window)
                    .map(|assignment| TaskCompletion {
                        task,
                        assignment,
                        event: None,
                    })
                    .ok_or_else(|| no_pending(task_id))
            }
        }
    }

    /// Exactly one row per active task with a current assignment.
    ///
    /// Tasks without an assignment in the current period are omitted.
    pub async fn tasks_for_user(
        &self,
        user_id: &UserId,
        frequency: Option<TaskFrequency>,
    ) -> Result<Vec<TaskView>, Error> {
        let now = self.clock.utc();
        let tasks = self.tasks.list_active_tasks(frequency).await?;
        let mut by_task: HashMap<Uuid, Vec<UserTask>> = HashMap::new();
        for assignment in self.tasks.list_user_assignments(user_id).await? {
            by_task.entry(assignment.task_id).or_default().push(assignment);
        }

        let views = tasks
            .into_iter()
            .filter_map(|task| {
                let window = period_window(now, &task.frequency);
                let assignments = by_task.get(&task.id)?;
                let assignment = select_relevant(assignments, &window)?.clone();
                Some(TaskView { task, assignment })
            })
            .collect();
        Ok(views)
    }

    /// Active tasks of one frequency.
    pub async fn active_tasks(&self, frequency: TaskFrequency) -> Result<Vec<Task>, Error> {
        Ok(self.tasks.list_active_tasks(Some(frequency)).await?)
    }

    /// Assign `task` to `user_id` for the period containing `now`.
    ///
    /// Used by the reset jobs; idempotent per period.
    pub async fn ensure_assigned(
        &self,
        task: &Task,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<TaskAssignment, Error> {
        self.assign_at(task.clone(), user_id, now).await
    }
}

fn current_assignment<'a>(
    existing: &'a [UserTask],
    window: &'a PeriodWindow,
    frequency: TaskFrequency,
) -> Option<&'a UserTask> {
    match frequency {
        TaskFrequency::OneOff => in_window(existing, window)
            .find(|assignment| assignment.status == TaskStatus::Pending),
        TaskFrequency::Daily | TaskFrequency::Weekly => select_relevant(existing, window),
    }
}

fn completed_in(existing: &[UserTask], window: &PeriodWindow) -> Option<UserTask> {
    in_window(existing, window)
        .find(|assignment| assignment.is_completed())
        .cloned()
}

fn no_pending(task_id: Uuid) -> Error {
    Error::no_pending_assignment(format!("task {task_id} has no pending assignment"))
        .with_details(json!({ "taskId": task_id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::{MockAchievementLogRepository, MockTaskRepository};
    use crate::domain::{EventFanOut, SubscriberRegistry};
    use crate::test_support::FixtureClock;
    use chrono::Duration;
    use rstest::rstest;

    fn task(frequency: TaskFrequency, is_active: bool) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "Answer a question".to_owned(),
            description: String::new(),
            frequency,
            xp_reward: 10,
            is_active,
        }
    }

    fn now() -> DateTime<Utc> {
        FixtureClock::default().now
    }

    fn row(task: &Task, user_id: UserId, status: TaskStatus, assigned_at: DateTime<Utc>) -> UserTask {
        let window = period_window(assigned_at, &task.frequency);
        UserTask {
            status,
            completed_at: (status == TaskStatus::Completed).then_some(assigned_at),
            ..UserTask::pending(user_id, task.id, &window, assigned_at)
        }
    }

    fn tracker(repo: MockTaskRepository) -> TaskTracker {
        let clock: Arc<dyn Clock> = Arc::new(FixtureClock::default());
        let pipeline = Arc::new(AchievementPipeline::new(
            Arc::new(MockAchievementLogRepository::new()),
            EventFanOut::new(SubscriberRegistry::new()),
            Arc::clone(&clock),
        ));
        TaskTracker::new(Arc::new(repo), pipeline, clock)
    }

    fn expect_task(repo: &mut MockTaskRepository, task: &Task) {
        let found = task.clone();
        repo.expect_find_task()
            .returning(move |_| Ok(Some(found.clone())));
    }

    #[tokio::test]
    async fn assign_creates_pending_row_with_period_key() {
        let daily = task(TaskFrequency::Daily, true);
        let mut repo = MockTaskRepository::new();
        expect_task(&mut repo, &daily);
        repo.expect_list_assignments().returning(|_, _| Ok(vec![]));
        repo.expect_insert_assignment()
            .withf(|row| row.period_key.as_deref() == Some("2026-03-04"))
            .times(1)
            .returning(|row| Ok(AssignmentInsert::Inserted(row.clone())));

        let assignment = tracker(repo)
            .assign_to_user(daily.id, UserId::random())
            .await
            .expect("assigned");

        assert!(assignment.created);
        assert_eq!(assignment.assignment.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn assign_returns_existing_row_in_window() {
        let daily = task(TaskFrequency::Daily, true);
        let user_id = UserId::random();
        let existing = row(&daily, user_id, TaskStatus::Completed, now() - Duration::hours(2));
        let rows = vec![existing.clone()];
        let mut repo = MockTaskRepository::new();
        expect_task(&mut repo, &daily);
        repo.expect_list_assignments()
            .returning(move |_, _| Ok(rows.clone()));
        repo.expect_insert_assignment().times(0);

        let assignment = tracker(repo)
            .assign_to_user(daily.id, user_id)
            .await
            .expect("assigned");

        assert!(!assignment.created);
        assert_eq!(assignment.assignment, existing);
    }

    #[tokio::test]
    async fn assign_rejects_inactive_tasks() {
        let inactive = task(TaskFrequency::Weekly, false);
        let mut repo = MockTaskRepository::new();
        expect_task(&mut repo, &inactive);
        repo.expect_insert_assignment().times(0);

        let error = tracker(repo)
            .assign_to_user(inactive.id, UserId::random())
            .await
            .expect_err("inactive");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn one_off_reassigns_after_completion() {
        let one_off = task(TaskFrequency::OneOff, true);
        let user_id = UserId::random();
        let rows = vec![row(&one_off, user_id, TaskStatus::Completed, now() - Duration::days(9))];
        let mut repo = MockTaskRepository::new();
        expect_task(&mut repo, &one_off);
        repo.expect_list_assignments()
            .returning(move |_, _| Ok(rows.clone()));
        repo.expect_insert_assignment()
            .withf(|row| row.period_key.is_none())
            .times(1)
            .returning(|row| Ok(AssignmentInsert::Inserted(row.clone())));

        let assignment = tracker(repo)
            .assign_to_user(one_off.id, user_id)
            .await
            .expect("assigned");
        assert!(assignment.created);
    }

    #[tokio::test]
    async fn complete_transitions_pending_and_emits() {
        let daily = task(TaskFrequency::Daily, true);
        let user_id = UserId::random();
        let pending = row(&daily, user_id, TaskStatus::Pending, now() - Duration::hours(1));
        let rows = vec![pending.clone()];
        let mut repo = MockTaskRepository::new();
        expect_task(&mut repo, &daily);
        repo.expect_list_assignments()
            .returning(move |_, _| Ok(rows.clone()));
        let completed = UserTask {
            status: TaskStatus::Completed,
            completed_at: Some(now()),
            ..pending.clone()
        };
        repo.expect_commit_completion()
            .withf(move |commit| commit.assignment_id == pending.id)
            .times(1)
            .returning(move |_| Ok(CompletionOutcome::Completed(completed.clone())));

        let completion = tracker(repo)
            .mark_completed(daily.id, user_id)
            .await
            .expect("completed");

        assert!(completion.newly_completed());
        assert_eq!(completion.assignment.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn second_completion_returns_existing_record() {
        let daily = task(TaskFrequency::Daily, true);
        let user_id = UserId::random();
        let done = row(&daily, user_id, TaskStatus::Completed, now() - Duration::hours(1));
        let rows = vec![done.clone()];
        let mut repo = MockTaskRepository::new();
        expect_task(&mut repo, &daily);
        repo.expect_list_assignments()
            .returning(move |_, _| Ok(rows.clone()));
        repo.expect_commit_completion().times(0);

        let completion = tracker(repo)
            .mark_completed(daily.id, user_id)
            .await
            .expect("idempotent");

        assert!(!completion.newly_completed());
        assert_eq!(completion.assignment, done);
    }

    #[tokio::test]
    async fn lost_completion_race_returns_winner() {
        let daily = task(TaskFrequency::Daily, true);
        let user_id = UserId::random();
        let pending = row(&daily, user_id, TaskStatus::Pending, now() - Duration::hours(1));
        let winner = UserTask {
            status: TaskStatus::Completed,
            completed_at: Some(now()),
            ..pending.clone()
        };
        let mut reads = 0;
        let (first, second) = (pending.clone(), winner.clone());
        let mut repo = MockTaskRepository::new();
        expect_task(&mut repo, &daily);
        repo.expect_list_assignments().times(2).returning(move |_, _| {
            reads += 1;
            Ok(vec![if reads == 1 { first.clone() } else { second.clone() }])
        });
        repo.expect_commit_completion()
            .times(1)
            .returning(|_| Ok(CompletionOutcome::NotPending));

        let completion = tracker(repo)
            .mark_completed(daily.id, user_id)
            .await
            .expect("winner returned");

        assert!(!completion.newly_completed());
        assert_eq!(completion.assignment, winner);
    }

    #[rstest]
    #[case(TaskFrequency::Daily, Duration::days(1))]
    #[case(TaskFrequency::Weekly, Duration::days(8))]
    #[tokio::test]
    async fn previous_period_does_not_count(
        #[case] frequency: TaskFrequency,
        #[case] age: Duration,
    ) {
        let recurring = task(frequency, true);
        let user_id = UserId::random();
        let rows = vec![row(&recurring, user_id, TaskStatus::Pending, now() - age)];
        let mut repo = MockTaskRepository::new();
        expect_task(&mut repo, &recurring);
        repo.expect_list_assignments()
            .returning(move |_, _| Ok(rows.clone()));
        repo.expect_commit_completion().times(0);

        let error = tracker(repo)
            .mark_completed(recurring.id, user_id)
            .await
            .expect_err("stale assignment");
        assert_eq!(error.code(), ErrorCode::NoPendingAssignment);
    }

    #[tokio::test]
    async fn listing_yields_one_row_per_task_and_omits_unassigned() {
        let assigned = task(TaskFrequency::Daily, true);
        let unassigned = task(TaskFrequency::Daily, true);
        let user_id = UserId::random();
        let rows = vec![
            row(&assigned, user_id, TaskStatus::Pending, now() - Duration::hours(1)),
            row(&assigned, user_id, TaskStatus::Completed, now() - Duration::hours(3)),
            row(&assigned, user_id, TaskStatus::Completed, now() - Duration::days(1)),
        ];
        let catalogue = vec![assigned.clone(), unassigned];
        let mut repo = MockTaskRepository::new();
        repo.expect_list_active_tasks()
            .returning(move |_| Ok(catalogue.clone()));
        repo.expect_list_user_assignments()
            .returning(move |_| Ok(rows.clone()));

        let views = tracker(repo)
            .tasks_for_user(&user_id, None)
            .await
            .expect("listed");

        assert_eq!(views.len(), 1);
        let view = views.first().expect("one view");
        assert_eq!(view.task.id, assigned.id);
        assert_eq!(view.assignment.status, TaskStatus::Completed);
        assert_eq!(view.assignment.period_key.as_deref(), Some("2026-03-04"));
    }
}
