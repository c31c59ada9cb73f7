//! PostgreSQL-backed `TaskRepository`.
//!
//! Assignment uniqueness lives in two partial indexes: one row per
//! `(user, task, period_key)` for recurring tasks and one open row per
//! `(user, task)` for one-off tasks. Completion is a conditional update that
//! only matches a pending row, so two racing completions cannot both win.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{
    AssignmentInsert, CompletionOutcome, TaskCompletionCommit, TaskRepository, TaskRepositoryError,
};
use crate::domain::{Task, TaskFrequency, UserId, UserTask};

use super::diesel_helpers::{TxError, insert_achievements, map_diesel_error, map_pool_error};
use super::models::{COMPLETED, PENDING, TaskRow, UserTaskRow};
use super::pool::DbPool;
use super::schema::{tasks, user_tasks};

/// Diesel implementation of the task catalogue and assignment store.
#[derive(Clone)]
pub struct DieselTaskRepository {
    pool: DbPool,
}

impl DieselTaskRepository {
    /// Create a repository over `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_assignments(rows: Vec<UserTaskRow>) -> Result<Vec<UserTask>, TaskRepositoryError> {
    rows.into_iter()
        .map(UserTask::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(TaskRepositoryError::query)
}

/// The row that made an assignment insert conflict.
async fn conflicting_assignment(
    conn: &mut AsyncPgConnection,
    row: &UserTaskRow,
) -> Result<Option<UserTaskRow>, diesel::result::Error> {
    let query = user_tasks::table
        .filter(user_tasks::user_id.eq(row.user_id))
        .filter(user_tasks::task_id.eq(row.task_id))
        .select(UserTaskRow::as_select())
        .into_boxed();
    let query = match &row.period_key {
        Some(period_key) => query.filter(user_tasks::period_key.eq(period_key.clone())),
        None => query
            .filter(user_tasks::period_key.is_null())
            .filter(user_tasks::status.eq(PENDING)),
    };
    query.first(conn).await.optional()
}

#[async_trait]
impl TaskRepository for DieselTaskRepository {
    async fn find_task(&self, task_id: &Uuid) -> Result<Option<Task>, TaskRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<TaskRow> = tasks::table
            .find(*task_id)
            .select(TaskRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(Task::try_from)
            .transpose()
            .map_err(TaskRepositoryError::query)
    }

    async fn list_active_tasks(
        &self,
        frequency: Option<TaskFrequency>,
    ) -> Result<Vec<Task>, TaskRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut query = tasks::table
            .filter(tasks::is_active.eq(true))
            .order(tasks::title.asc())
            .select(TaskRow::as_select())
            .into_boxed();
        if let Some(frequency) = frequency {
            query = query.filter(tasks::frequency.eq(frequency.as_str()));
        }
        let rows: Vec<TaskRow> = query.load(&mut conn).await.map_err(map_diesel_error)?;
        rows.into_iter()
            .map(Task::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(TaskRepositoryError::query)
    }

    async fn list_assignments(
        &self,
        user_id: &UserId,
        task_id: &Uuid,
    ) -> Result<Vec<UserTask>, TaskRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<UserTaskRow> = user_tasks::table
            .filter(user_tasks::user_id.eq(*user_id.as_uuid()))
            .filter(user_tasks::task_id.eq(*task_id))
            .order(user_tasks::assigned_at.desc())
            .select(UserTaskRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        to_assignments(rows)
    }

    async fn list_user_assignments(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserTask>, TaskRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<UserTaskRow> = user_tasks::table
            .filter(user_tasks::user_id.eq(*user_id.as_uuid()))
            .order(user_tasks::assigned_at.desc())
            .select(UserTaskRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        to_assignments(rows)
    }

    async fn insert_assignment(
        &self,
        assignment: &UserTask,
    ) -> Result<AssignmentInsert, TaskRepositoryError> {
        let row = UserTaskRow::from(assignment);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let inserted = diesel::insert_into(user_tasks::table)
            .values(&row)
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        if inserted > 0 {
            return Ok(AssignmentInsert::Inserted(assignment.clone()));
        }

        let existing = conflicting_assignment(&mut conn, &row)
            .await
            .map_err(map_diesel_error)?
            .ok_or_else(|| TaskRepositoryError::query("assignment conflict without a stored row"))?;
        debug!(
            user_id = %assignment.user_id,
            task_id = %assignment.task_id,
            "assignment already present"
        );
        UserTask::try_from(existing)
            .map(AssignmentInsert::Existing)
            .map_err(TaskRepositoryError::query)
    }

    async fn commit_completion(
        &self,
        commit: &TaskCompletionCommit,
    ) -> Result<CompletionOutcome, TaskRepositoryError> {
        let assignment_id = commit.assignment_id;
        let completed_at = commit.completed_at;
        let achievement = std::slice::from_ref(&commit.achievement);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let completed = conn
            .transaction::<_, TxError<TaskRepositoryError>, _>(|conn| {
                async move {
                    let updated: Option<UserTaskRow> = diesel::update(
                        user_tasks::table
                            .filter(user_tasks::id.eq(assignment_id))
                            .filter(user_tasks::status.eq(PENDING)),
                    )
                    .set((
                        user_tasks::status.eq(COMPLETED),
                        user_tasks::completed_at.eq(Some(completed_at)),
                    ))
                    .returning(UserTaskRow::as_returning())
                    .get_result(conn)
                    .await
                    .optional()?;
                    if updated.is_some() {
                        insert_achievements(conn, achievement).await?;
                    }
                    Ok(updated)
                }
                .scope_boxed()
            })
            .await
            .map_err(TxError::into_port_error)?;

        match completed {
            Some(row) => UserTask::try_from(row)
                .map(CompletionOutcome::Completed)
                .map_err(TaskRepositoryError::query),
            None => Ok(CompletionOutcome::NotPending),
        }
    }

    async fn upsert_task(&self, task: &Task) -> Result<(), TaskRepositoryError> {
        let row = TaskRow::from(task);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(tasks::table)
            .values(&row)
            .on_conflict(tasks::id)
            .do_update()
            .set((
                tasks::title.eq(excluded(tasks::title)),
                tasks::description.eq(excluded(tasks::description)),
                tasks::frequency.eq(excluded(tasks::frequency)),
                tasks::xp_reward.eq(excluded(tasks::xp_reward)),
                tasks::is_active.eq(excluded(tasks::is_active)),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }
}
