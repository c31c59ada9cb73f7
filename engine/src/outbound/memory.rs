//! In-memory adapter implementing every storage port.
//!
//! Used when no database is configured and by the integration tests. All
//! state sits behind one mutex, so each port call is atomic and the
//! uniqueness rules of the relational schema hold without further locking.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::ports::{
    AchievementLogRepository, AchievementLogRepositoryError, AssignmentInsert, AwardOutcome,
    BadgeAwardCommit, BadgeRepository, BadgeRepositoryError, CompletionOutcome,
    EventAuditRepository, EventAuditRepositoryError, JobLease, JobLeaseRepository,
    JobLeaseRepositoryError, LevelRepository, LevelRepositoryError,
    TaskCompletionCommit, TaskRepository, TaskRepositoryError, TotalReconciliation,
    UserProgressRepository, UserProgressRepositoryError, XpGrantCommit,
};
use crate::domain::{
    AchievementEvent, AchievementLogEntry, AwardedBadge, Badge, Level, Task, TaskFrequency,
    TaskStatus, UserBadge, UserId, UserProgress, UserTask, XpLogEntry,
};

#[derive(Default)]
struct MemoryState {
    levels: HashMap<Uuid, Level>,
    badges: HashMap<Uuid, Badge>,
    tasks: HashMap<Uuid, Task>,
    progress: HashMap<UserId, UserProgress>,
    xp_log: Vec<XpLogEntry>,
    user_badges: HashMap<(UserId, Uuid), UserBadge>,
    assignments: Vec<UserTask>,
    achievements: Vec<AchievementLogEntry>,
    audit: HashMap<Uuid, AchievementEvent>,
    leases: HashMap<String, JobLease>,
}

impl MemoryState {
    fn conflicting_assignment(&self, candidate: &UserTask) -> Option<&UserTask> {
        self.assignments.iter().find(|row| {
            row.user_id == candidate.user_id
                && row.task_id == candidate.task_id
                && match (&row.period_key, &candidate.period_key) {
                    (Some(existing), Some(requested)) => existing == requested,
                    (None, None) => {
                        row.status == TaskStatus::Pending
                            && candidate.status == TaskStatus::Pending
                    }
                    _ => false,
                }
        })
    }
}

/// Process-local progression store.
#[derive(Default)]
pub struct InMemoryProgressionStore {
    state: Mutex<MemoryState>,
}

impl InMemoryProgressionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ledger entries of a user in insertion order.
    #[must_use]
    pub fn xp_entries(&self, user_id: &UserId) -> Vec<XpLogEntry> {
        self.lock()
            .xp_log
            .iter()
            .filter(|entry| entry.user_id == *user_id)
            .cloned()
            .collect()
    }

    /// Number of audited events.
    #[must_use]
    pub fn audited_events(&self) -> usize {
        self.lock().audit.len()
    }

    /// Overwrite a user's cached total without touching the ledger.
    #[cfg(test)]
    pub(crate) fn corrupt_total(&self, user_id: &UserId, total_xp: i64) {
        if let Some(progress) = self.lock().progress.get_mut(user_id) {
            progress.total_xp = total_xp;
        }
    }
}

fn newest_first<T, F>(rows: &mut [T], key: F)
where
    F: Fn(&T) -> DateTime<Utc>,
{
    rows.sort_by_key(|row| std::cmp::Reverse(key(row)));
}

#[async_trait]
impl UserProgressRepository for InMemoryProgressionStore {
    async fn find_progress(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserProgress>, UserProgressRepositoryError> {
        Ok(self.lock().progress.get(user_id).cloned())
    }

    async fn commit_xp_grant(
        &self,
        commit: &XpGrantCommit,
    ) -> Result<(), UserProgressRepositoryError> {
        let mut state = self.lock();
        let stored = state
            .progress
            .get(&commit.progress.user_id)
            .map(|progress| progress.revision);
        match (stored, commit.expected_revision) {
            (None, None) => {}
            (Some(actual), Some(expected)) if actual == expected => {}
            (actual, expected) => {
                return Err(UserProgressRepositoryError::revision_mismatch(
                    expected.unwrap_or(0),
                    actual.unwrap_or(0),
                ));
            }
        }
        state
            .progress
            .insert(commit.progress.user_id, commit.progress.clone());
        state.xp_log.push(commit.entry.clone());
        state
            .achievements
            .extend(commit.achievements.iter().cloned());
        Ok(())
    }

    async fn reconcile_total(
        &self,
        user_id: &UserId,
    ) -> Result<TotalReconciliation, UserProgressRepositoryError> {
        let mut state = self.lock();
        let ledger_total: i64 = state
            .xp_log
            .iter()
            .filter(|entry| entry.user_id == *user_id)
            .map(|entry| entry.xp_amount.get())
            .sum();
        let Some(progress) = state.progress.get_mut(user_id) else {
            return Ok(TotalReconciliation {
                recorded_total: 0,
                ledger_total,
            });
        };
        let recorded_total = progress.total_xp;
        if recorded_total != ledger_total {
            progress.total_xp = ledger_total;
            progress.revision = progress.revision.saturating_add(1);
        }
        Ok(TotalReconciliation {
            recorded_total,
            ledger_total,
        })
    }

    async fn list_active_users(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<UserId>, UserProgressRepositoryError> {
        let mut users: Vec<UserId> = self
            .lock()
            .progress
            .values()
            .filter(|progress| progress.last_active_at.is_some_and(|at| at >= since))
            .map(|progress| progress.user_id)
            .collect();
        users.sort();
        Ok(users)
    }

    async fn reset_lapsed_streaks(
        &self,
        active_since: DateTime<Utc>,
    ) -> Result<u64, UserProgressRepositoryError> {
        let mut reset = 0;
        for progress in self.lock().progress.values_mut() {
            let lapsed = progress.last_active_at.is_none_or(|at| at < active_since);
            if lapsed && progress.streak_days > 0 {
                progress.streak_days = 0;
                progress.revision = progress.revision.saturating_add(1);
                reset += 1;
            }
        }
        Ok(reset)
    }
}

#[async_trait]
impl LevelRepository for InMemoryProgressionStore {
    async fn list_levels(&self) -> Result<Vec<Level>, LevelRepositoryError> {
        Ok(self.lock().levels.values().cloned().collect())
    }

    async fn upsert_level(&self, level: &Level) -> Result<(), LevelRepositoryError> {
        self.lock().levels.insert(level.id, level.clone());
        Ok(())
    }
}

#[async_trait]
impl BadgeRepository for InMemoryProgressionStore {
    async fn find_badge(&self, badge_id: &Uuid) -> Result<Option<Badge>, BadgeRepositoryError> {
        Ok(self.lock().badges.get(badge_id).cloned())
    }

    async fn list_active_badges(&self) -> Result<Vec<Badge>, BadgeRepositoryError> {
        let mut badges: Vec<Badge> = self
            .lock()
            .badges
            .values()
            .filter(|badge| badge.is_active)
            .cloned()
            .collect();
        badges.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(badges)
    }

    async fn list_user_badges(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AwardedBadge>, BadgeRepositoryError> {
        let state = self.lock();
        let mut awarded: Vec<AwardedBadge> = state
            .user_badges
            .values()
            .filter(|award| award.user_id == *user_id)
            .filter_map(|award| {
                state.badges.get(&award.badge_id).map(|badge| AwardedBadge {
                    badge: badge.clone(),
                    awarded_at: award.awarded_at,
                })
            })
            .collect();
        newest_first(&mut awarded, |row| row.awarded_at);
        Ok(awarded)
    }

    async fn find_user_badge(
        &self,
        user_id: &UserId,
        badge_id: &Uuid,
    ) -> Result<Option<UserBadge>, BadgeRepositoryError> {
        Ok(self.lock().user_badges.get(&(*user_id, *badge_id)).cloned())
    }

    async fn commit_award(
        &self,
        commit: &BadgeAwardCommit,
    ) -> Result<AwardOutcome, BadgeRepositoryError> {
        let mut state = self.lock();
        let key = (commit.award.user_id, commit.award.badge_id);
        if let Some(existing) = state.user_badges.get(&key) {
            return Ok(AwardOutcome::AlreadyHeld(existing.clone()));
        }
        state.user_badges.insert(key, commit.award.clone());
        state.achievements.push(commit.achievement.clone());
        Ok(AwardOutcome::Awarded)
    }

    async fn upsert_badge(&self, badge: &Badge) -> Result<(), BadgeRepositoryError> {
        let mut state = self.lock();
        let slug_taken = state
            .badges
            .values()
            .any(|existing| existing.slug == badge.slug && existing.id != badge.id);
        if slug_taken {
            return Err(BadgeRepositoryError::query(format!(
                "badge slug {} is already in use",
                badge.slug
            )));
        }
        state.badges.insert(badge.id, badge.clone());
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for InMemoryProgressionStore {
    async fn find_task(&self, task_id: &Uuid) -> Result<Option<Task>, TaskRepositoryError> {
        Ok(self.lock().tasks.get(task_id).cloned())
    }

    async fn list_active_tasks(
        &self,
        frequency: Option<TaskFrequency>,
    ) -> Result<Vec<Task>, TaskRepositoryError> {
        let mut tasks: Vec<Task> = self
            .lock()
            .tasks
            .values()
            .filter(|task| task.is_active)
            .filter(|task| frequency.is_none_or(|wanted| task.frequency == wanted))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(tasks)
    }

    async fn list_assignments(
        &self,
        user_id: &UserId,
        task_id: &Uuid,
    ) -> Result<Vec<UserTask>, TaskRepositoryError> {
        let mut rows: Vec<UserTask> = self
            .lock()
            .assignments
            .iter()
            .filter(|row| row.user_id == *user_id && row.task_id == *task_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |row| row.assigned_at);
        Ok(rows)
    }

    async fn list_user_assignments(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserTask>, TaskRepositoryError> {
        let mut rows: Vec<UserTask> = self
            .lock()
            .assignments
            .iter()
            .filter(|row| row.user_id == *user_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |row| row.assigned_at);
        Ok(rows)
    }

    async fn insert_assignment(
        &self,
        assignment: &UserTask,
    ) -> Result<AssignmentInsert, TaskRepositoryError> {
        let mut state = self.lock();
        if let Some(existing) = state.conflicting_assignment(assignment) {
            return Ok(AssignmentInsert::Existing(existing.clone()));
        }
        state.assignments.push(assignment.clone());
        Ok(AssignmentInsert::Inserted(assignment.clone()))
    }

    async fn commit_completion(
        &self,
        commit: &TaskCompletionCommit,
    ) -> Result<CompletionOutcome, TaskRepositoryError> {
        let mut state = self.lock();
        let Some(row) = state
            .assignments
            .iter_mut()
            .find(|row| row.id == commit.assignment_id && row.status == TaskStatus::Pending)
        else {
            return Ok(CompletionOutcome::NotPending);
        };
        row.status = TaskStatus::Completed;
        row.completed_at = Some(commit.completed_at);
        let completed = row.clone();
        state.achievements.push(commit.achievement.clone());
        Ok(CompletionOutcome::Completed(completed))
    }

    async fn upsert_task(&self, task: &Task) -> Result<(), TaskRepositoryError> {
        self.lock().tasks.insert(task.id, task.clone());
        Ok(())
    }
}

#[async_trait]
impl AchievementLogRepository for InMemoryProgressionStore {
    async fn append(
        &self,
        entry: &AchievementLogEntry,
    ) -> Result<(), AchievementLogRepositoryError> {
        self.lock().achievements.push(entry.clone());
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<AchievementLogEntry>, AchievementLogRepositoryError> {
        let state = self.lock();
        // Insertion order breaks timestamp ties so facts of one commit keep
        // their order.
        let mut rows: Vec<(usize, &AchievementLogEntry)> = state
            .achievements
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.user_id == *user_id)
            .collect();
        rows.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|(_, entry)| entry.clone())
            .collect())
    }
}

#[async_trait]
impl EventAuditRepository for InMemoryProgressionStore {
    async fn record(&self, event: &AchievementEvent) -> Result<(), EventAuditRepositoryError> {
        self.lock()
            .audit
            .entry(event.id)
            .or_insert_with(|| event.clone());
        Ok(())
    }
}

#[async_trait]
impl JobLeaseRepository for InMemoryProgressionStore {
    async fn try_acquire(
        &self,
        job: &str,
        holder: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Option<JobLease>, JobLeaseRepositoryError> {
        let mut state = self.lock();
        if state
            .leases
            .get(job)
            .is_some_and(|lease| lease.expires_at > now)
        {
            return Ok(None);
        }
        let lease = JobLease {
            job: job.to_owned(),
            holder,
            expires_at: now + ttl,
        };
        state.leases.insert(lease.job.clone(), lease.clone());
        Ok(Some(lease))
    }

    async fn release(&self, lease: &JobLease) -> Result<(), JobLeaseRepositoryError> {
        let mut state = self.lock();
        if state
            .leases
            .get(&lease.job)
            .is_some_and(|held| held.holder == lease.holder)
        {
            state.leases.remove(&lease.job);
        }
        Ok(())
    }
}
