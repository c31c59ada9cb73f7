//! Progression service implementing the driving ports.
//!
//! Thin orchestration over the ledger, registry and tracker: each caller
//! action is translated into one domain operation and wrapped in an
//! [`ActionOutcome`] envelope.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::ports::{
    ActionOutcome, AnswerVerifiedRequest, GrantXpRequest, OutcomeKind, ProgressSnapshot,
    ProgressionCommand, ProgressionQuery, TaskView,
};
use crate::domain::{
    AchievementFact, AchievementLogEntry, AchievementPipeline, AwardedBadge, Badge, BadgeAward,
    BadgeRegistry, Error, LevelResolver, TaskFrequency, TaskTracker, UserId, XpLedger,
};

/// Largest history page a caller may request.
pub const MAX_HISTORY_LIMIT: usize = 200;

/// Progression service backed by the engine's domain components.
#[derive(Clone)]
pub struct ProgressionService {
    ledger: Arc<XpLedger>,
    badges: Arc<BadgeRegistry>,
    tasks: Arc<TaskTracker>,
    pipeline: Arc<AchievementPipeline>,
    levels: Arc<LevelResolver>,
}

impl ProgressionService {
    /// Create a new service.
    pub fn new(
        ledger: Arc<XpLedger>,
        badges: Arc<BadgeRegistry>,
        tasks: Arc<TaskTracker>,
        pipeline: Arc<AchievementPipeline>,
        levels: Arc<LevelResolver>,
    ) -> Self {
        Self {
            ledger,
            badges,
            tasks,
            pipeline,
            levels,
        }
    }
}

#[async_trait]
impl ProgressionCommand for ProgressionService {
    async fn grant_xp(&self, request: GrantXpRequest) -> Result<ActionOutcome, Error> {
        let grant = self
            .ledger
            .grant_xp(
                request.user_id,
                &request.event_type,
                request.amount,
                request.metadata,
            )
            .await?;
        let level = self.levels.resolve_level(grant.progress.total_xp);
        Ok(ActionOutcome::success(
            OutcomeKind::XpGained,
            json!({
                "entry": grant.entry,
                "totalXp": grant.progress.total_xp,
                "streakDays": grant.progress.streak_days,
                "level": level,
                "leveledUp": grant.level_change.is_some(),
            }),
        ))
    }

    async fn assign_task(
        &self,
        user_id: UserId,
        task_id: uuid::Uuid,
    ) -> Result<ActionOutcome, Error> {
        let assignment = self.tasks.assign_to_user(task_id, user_id).await?;
        Ok(ActionOutcome::success(
            OutcomeKind::TaskAssigned,
            json!({
                "task": assignment.task,
                "assignment": assignment.assignment,
                "created": assignment.created,
            }),
        ))
    }

    async fn complete_task(
        &self,
        user_id: UserId,
        task_id: uuid::Uuid,
    ) -> Result<ActionOutcome, Error> {
        let completion = self.tasks.mark_completed(task_id, user_id).await?;
        let kind = if completion.newly_completed() {
            OutcomeKind::TaskCompleted
        } else {
            OutcomeKind::TaskAlreadyCompleted
        };
        Ok(ActionOutcome::success(
            kind,
            json!({
                "task": completion.task,
                "assignment": completion.assignment,
            }),
        ))
    }

    async fn award_badge(
        &self,
        user_id: UserId,
        badge_id: uuid::Uuid,
    ) -> Result<ActionOutcome, Error> {
        let outcome = match self.badges.award_badge(user_id, badge_id).await? {
            BadgeAward::Awarded { badge, award, .. } => ActionOutcome::success(
                OutcomeKind::BadgeUnlocked,
                json!({ "badge": badge, "awardedAt": award.awarded_at }),
            ),
            BadgeAward::AlreadyHeld { badge, award } => ActionOutcome::success(
                OutcomeKind::BadgeAlreadyAwarded,
                json!({ "badge": badge, "awardedAt": award.awarded_at }),
            ),
        };
        Ok(outcome)
    }

    async fn verify_answer(&self, request: AnswerVerifiedRequest) -> Result<ActionOutcome, Error> {
        let fact = AchievementFact::AnswerVerified {
            answer_id: request.answer_id,
            question_id: request.question_id,
            score: request.score,
        };
        let event = self
            .pipeline
            .record_standalone(request.user_id, &fact)
            .await?;
        Ok(ActionOutcome::success(
            OutcomeKind::AnswerVerified,
            json!({
                "eventId": event.id,
                "answerId": request.answer_id,
                "questionId": request.question_id,
                "score": request.score,
            }),
        ))
    }
}

#[async_trait]
impl ProgressionQuery for ProgressionService {
    async fn level_progress(&self, user_id: &UserId) -> Result<ProgressSnapshot, Error> {
        let progress = self.ledger.progress(user_id).await?;
        let position = self.levels.compute_progress(progress.total_xp);
        Ok(ProgressSnapshot {
            user_id: *user_id,
            total_xp: progress.total_xp,
            streak_days: progress.streak_days,
            last_active_at: progress.last_active_at,
            current_level: position.current_level,
            next_level: position.next_level,
            xp_to_next: position.xp_to_next,
        })
    }

    async fn user_badges(&self, user_id: &UserId) -> Result<Vec<AwardedBadge>, Error> {
        self.badges.badges_for_user(user_id).await
    }

    async fn active_badges(&self) -> Result<Vec<Badge>, Error> {
        self.badges.all_badges().await
    }

    async fn tasks_for_user(
        &self,
        user_id: &UserId,
        frequency: Option<TaskFrequency>,
    ) -> Result<Vec<TaskView>, Error> {
        self.tasks.tasks_for_user(user_id, frequency).await
    }

    async fn achievement_history(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<AchievementLogEntry>, Error> {
        if limit == 0 {
            return Err(Error::invalid_request("limit must be positive"));
        }
        self.pipeline
            .history(user_id, limit.min(MAX_HISTORY_LIMIT))
            .await
    }
}
